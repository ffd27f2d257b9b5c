//! Genetic algorithm over observing schedules.
//!
//! The chromosome is a [`Schedule`]: an ordered list of
//! [`ScheduledObservation`] genes that exactly tiles the observing window.
//! Crossover and mutation always return a new, repaired schedule, so every
//! individual in a population satisfies the tiling invariants.
//!
//! # Key Types
//!
//! - [`Schedule`]: chromosome, repair operators, cached merits
//! - [`Objective`] / [`Constraint`]: what a run maximizes or counts
//! - [`Population`]: single-objective generational GA
//! - [`Nsga2Population`]: multi-objective NSGA-II
//! - [`GaConfig`]: algorithm parameters (population size, selection, presets)
//! - [`GaRunner`]: executes the evolutionary loop and reports a [`GaResult`]
//!
//! # Submodules
//!
//! - [`multi_objective`]: Pareto dominance, non-dominated sorting, crowding distance
//!
//! # References
//!
//! - Holland (1975), *Adaptation in Natural and Artificial Systems*
//! - Goldberg (1989), *Genetic Algorithms in Search, Optimization, and Machine Learning*
//! - Deb et al. (2002), *A Fast and Elitist Multiobjective GA: NSGA-II*

mod config;
mod gene;
pub mod merit;
pub mod multi_objective;
mod nsga2;
mod population;
mod runner;
mod schedule;
mod selection;

pub use config::{GaConfig, Strategy};
pub use gene::ScheduledObservation;
pub use merit::{Constraint, MeritCache, Objective, MAX_ACCOUNT_MERIT};
pub use nsga2::Nsga2Population;
pub use population::Population;
pub use runner::{Evolution, GaResult, GaRunner};
pub use schedule::{DurationRange, Schedule, CONSTRUCT_RETRIES};
pub use selection::Selection;
