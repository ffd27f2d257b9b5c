//! GA evolutionary loop execution.
//!
//! [`GaRunner`] drives a [`Population`] or an [`Nsga2Population`] until
//! one of the termination conditions holds:
//! `max_generations`, stagnation, wall-clock limit, or cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use log::info;

use crate::context::SchedulingContext;
use crate::ephemeris::Ephemeris;
use crate::error::Result;

use super::config::{GaConfig, Strategy};
use super::nsga2::Nsga2Population;
use super::population::Population;
use super::schedule::Schedule;

/// A population the runner can advance one generation at a time.
pub trait Evolution {
    /// Advances one generation.
    fn step(&mut self) -> Result<()>;

    /// Completed generations.
    fn generation(&self) -> usize;

    /// Best schedule by the configured fitness objective, with its value.
    fn best(&mut self) -> Result<(&Schedule, f64)>;

    /// Trade-off set reported at the end of a run.
    fn front(&mut self) -> Result<Vec<Schedule>>;
}

impl<E: Ephemeris> Evolution for Population<'_, E> {
    fn step(&mut self) -> Result<()> {
        Population::step(self)
    }

    fn generation(&self) -> usize {
        Population::generation(self)
    }

    fn best(&mut self) -> Result<(&Schedule, f64)> {
        Population::best(self)
    }

    fn front(&mut self) -> Result<Vec<Schedule>> {
        Ok(vec![Population::best(self)?.0.clone()])
    }
}

impl<E: Ephemeris> Evolution for Nsga2Population<'_, E> {
    fn step(&mut self) -> Result<()> {
        Nsga2Population::step(self)
    }

    fn generation(&self) -> usize {
        Nsga2Population::generation(self)
    }

    fn best(&mut self) -> Result<(&Schedule, f64)> {
        Nsga2Population::best(self)
    }

    fn front(&mut self) -> Result<Vec<Schedule>> {
        Ok(self.pareto_front()?.into_iter().cloned().collect())
    }
}

/// Result of a GA run.
#[derive(Debug, Clone)]
pub struct GaResult {
    /// The best schedule seen during the entire run.
    pub best: Schedule,

    /// Fitness of `best` on [`GaConfig::fitness`].
    pub best_fitness: f64,

    /// Final trade-off set: the Pareto front for NSGA-II, `[best]` otherwise.
    pub pareto_front: Vec<Schedule>,

    /// Total number of generations executed.
    pub generations: usize,

    /// Whether the run stopped because the best fitness stopped improving.
    pub stagnated: bool,

    /// Whether the run stopped on the wall-clock limit.
    pub timed_out: bool,

    /// Whether the run was cancelled externally.
    pub cancelled: bool,

    /// Best fitness so far, recorded before the first and after every generation.
    pub fitness_history: Vec<f64>,
}

/// Executes the GA evolutionary loop.
///
/// # Usage
///
/// ```ignore
/// let ctx = SchedulingContext::new(&catalog, &accounts, &ephemeris, jd0, jd1, 60.0)?;
/// let result = GaRunner::run(ctx, &GaConfig::default().with_seed(42))?;
/// println!("best visibility: {}", result.best_fitness);
/// ```
pub struct GaRunner;

impl GaRunner {
    /// Runs the GA with the loop selected by [`GaConfig::strategy`].
    ///
    /// # Errors
    /// [`SchedError::Config`](crate::error::SchedError::Config) for an invalid
    /// configuration; any error raised while constructing or evolving
    /// schedules.
    pub fn run<E: Ephemeris>(ctx: SchedulingContext<'_, E>, config: &GaConfig) -> Result<GaResult> {
        Self::run_with_cancel(ctx, config, None)
    }

    /// Runs the GA with an optional cancellation token.
    ///
    /// If `cancel` is `Some` and the flag is set to `true`, the GA stops
    /// before the next generation and returns the best schedule so far.
    pub fn run_with_cancel<E: Ephemeris>(
        ctx: SchedulingContext<'_, E>,
        config: &GaConfig,
        cancel: Option<Arc<AtomicBool>>,
    ) -> Result<GaResult> {
        config.validate()?;
        info!(
            "starting {:?} GA: {} tickets, window {:.0}s, population {}",
            config.strategy,
            ctx.catalog().len(),
            ctx.window_seconds(),
            config.population_size
        );
        match config.strategy {
            Strategy::Single => {
                let population = Population::new(ctx, config.clone())?;
                Self::drive(population, config, cancel)
            }
            Strategy::Nsga2 => {
                let population = Nsga2Population::new(ctx, config.clone())?;
                Self::drive(population, config, cancel)
            }
        }
    }

    /// Runs the evolutionary loop on any [`Evolution`].
    pub fn drive<P: Evolution>(
        mut population: P,
        config: &GaConfig,
        cancel: Option<Arc<AtomicBool>>,
    ) -> Result<GaResult> {
        let started = Instant::now();

        let (best, best_fitness) = population.best()?;
        let mut best = best.clone();
        let mut best_fitness = best_fitness;
        let mut fitness_history = Vec::with_capacity(config.max_generations + 1);
        fitness_history.push(best_fitness);

        let mut stagnation_counter = 0usize;
        let mut stagnated = false;
        let mut timed_out = false;
        let mut cancelled = false;

        for _ in 0..config.max_generations {
            if let Some(ref flag) = cancel {
                if flag.load(Ordering::Relaxed) {
                    cancelled = true;
                    break;
                }
            }
            if let Some(limit) = config.time_limit_ms {
                if started.elapsed().as_millis() >= u128::from(limit) {
                    timed_out = true;
                    break;
                }
            }

            population.step()?;

            let (gen_best, gen_fitness) = population.best()?;
            if gen_fitness > best_fitness {
                best = gen_best.clone();
                best_fitness = gen_fitness;
                stagnation_counter = 0;
            } else {
                stagnation_counter += 1;
            }
            fitness_history.push(best_fitness);

            if config.stagnation_limit > 0 && stagnation_counter >= config.stagnation_limit {
                stagnated = true;
                break;
            }
        }

        let generations = population.generation();
        info!(
            "GA finished after {} generations: best {:?} = {:.6}{}",
            generations,
            config.fitness,
            best_fitness,
            if stagnated {
                " (stagnated)"
            } else if timed_out {
                " (time limit)"
            } else if cancelled {
                " (cancelled)"
            } else {
                ""
            }
        );

        Ok(GaResult {
            pareto_front: population.front()?,
            best,
            best_fitness,
            generations,
            stagnated,
            timed_out,
            cancelled,
            fitness_history,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
