//! GA configuration.
//!
//! [`GaConfig`] holds all parameters that control the evolutionary loop.

use crate::error::{Result, SchedError};

use super::merit::{Constraint, Objective};
use super::schedule::DurationRange;
use super::selection::Selection;

/// Which evolutionary loop the runner drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Strategy {
    /// Single-objective generational GA on [`GaConfig::fitness`].
    #[default]
    Single,
    /// NSGA-II over [`GaConfig::objectives`].
    Nsga2,
}

/// Configuration for the scheduling GA.
///
/// Controls population size, selection, elitism, mutation, the objective
/// and constraint sets, termination, and parallelism.
///
/// # Defaults
///
/// ```
/// use u_obsched::ga::GaConfig;
///
/// let config = GaConfig::default();
/// assert_eq!(config.population_size, 50);
/// assert_eq!(config.max_generations, 200);
/// ```
///
/// # Builder Pattern
///
/// ```
/// use u_obsched::ga::{GaConfig, Objective, Strategy};
///
/// let config = GaConfig::default()
///     .with_population_size(80)
///     .with_strategy(Strategy::Nsga2)
///     .with_objectives(vec![Objective::Visibility, Objective::Distance])
///     .with_mutation_count(5);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct GaConfig {
    /// Number of schedules kept between generations.
    pub population_size: usize,

    /// Maximum number of generations run by [`GaRunner`](super::GaRunner).
    pub max_generations: usize,

    /// Evolutionary loop to use.
    pub strategy: Strategy,

    /// Objective optimized by the single-objective GA.
    pub fitness: Objective,

    /// Objectives optimized by NSGA-II.
    pub objectives: Vec<Objective>,

    /// Constraints counted by NSGA-II's constrained dominance.
    ///
    /// Empty disables constraint handling.
    pub constraints: Vec<Constraint>,

    /// Parent selection for the single-objective GA.
    pub selection: Selection,

    /// Fraction of the population kept unchanged as elites (0.0–1.0).
    pub elite_ratio: f64,

    /// Upper bound on gene mutations per generation.
    ///
    /// Each generation applies a uniformly random number of mutations in
    /// `[0, mutation_count]`.
    pub mutation_count: usize,

    /// Range for randomly drawn observation durations.
    pub duration_range: DurationRange,

    /// Generations without improvement of the best fitness before stopping.
    ///
    /// Set to 0 to disable stagnation-based termination.
    pub stagnation_limit: usize,

    /// Whether to evaluate merits in parallel using rayon.
    ///
    /// Has no effect without the `parallel` feature.
    pub parallel: bool,

    /// Random seed for reproducibility.
    ///
    /// `None` uses a random seed.
    pub seed: Option<u64>,

    /// Optional wall-clock time limit in milliseconds.
    ///
    /// Checked at the start of each generation.
    pub time_limit_ms: Option<u64>,
}

impl Default for GaConfig {
    fn default() -> Self {
        Self {
            population_size: 50,
            max_generations: 200,
            strategy: Strategy::default(),
            fitness: Objective::default(),
            objectives: Objective::ALL.to_vec(),
            constraints: Vec::new(),
            selection: Selection::default(),
            elite_ratio: 0.5,
            mutation_count: 10,
            duration_range: DurationRange::default(),
            stagnation_limit: 50,
            parallel: true,
            seed: None,
            time_limit_ms: None,
        }
    }
}

impl GaConfig {
    /// Sets the population size.
    pub fn with_population_size(mut self, n: usize) -> Self {
        self.population_size = n;
        self
    }

    /// Sets the maximum number of generations.
    pub fn with_max_generations(mut self, n: usize) -> Self {
        self.max_generations = n;
        self
    }

    /// Sets the evolutionary strategy.
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Sets the single-objective fitness.
    pub fn with_fitness(mut self, objective: Objective) -> Self {
        self.fitness = objective;
        self
    }

    /// Sets the NSGA-II objective set.
    pub fn with_objectives(mut self, objectives: Vec<Objective>) -> Self {
        self.objectives = objectives;
        self
    }

    /// Sets the constraint set.
    pub fn with_constraints(mut self, constraints: Vec<Constraint>) -> Self {
        self.constraints = constraints;
        self
    }

    /// Sets the selection strategy.
    pub fn with_selection(mut self, sel: Selection) -> Self {
        self.selection = sel;
        self
    }

    /// Sets the elite ratio.
    pub fn with_elite_ratio(mut self, ratio: f64) -> Self {
        self.elite_ratio = ratio.clamp(0.0, 1.0);
        self
    }

    /// Sets the maximum number of mutations per generation.
    pub fn with_mutation_count(mut self, n: usize) -> Self {
        self.mutation_count = n;
        self
    }

    /// Sets the duration draw range.
    pub fn with_duration_range(mut self, range: DurationRange) -> Self {
        self.duration_range = range;
        self
    }

    /// Sets the stagnation limit (0 to disable).
    pub fn with_stagnation_limit(mut self, limit: usize) -> Self {
        self.stagnation_limit = limit;
        self
    }

    /// Enables or disables parallel evaluation.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Sets the random seed for reproducibility.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Sets the wall-clock time limit in milliseconds.
    pub fn with_time_limit_ms(mut self, ms: u64) -> Self {
        self.time_limit_ms = Some(ms);
        self
    }

    /// Number of elites kept by the single-objective GA.
    pub fn elite_count(&self) -> usize {
        (self.population_size as f64 * self.elite_ratio) as usize
    }

    /// Preset for quick plans: small population, few generations.
    ///
    /// - Population: 30, Generations: 50, Time limit: 10s
    /// - Stagnation limit: 15
    pub fn fast() -> Self {
        Self {
            population_size: 30,
            max_generations: 50,
            stagnation_limit: 15,
            mutation_count: 5,
            time_limit_ms: Some(10_000),
            ..Self::default()
        }
    }

    /// Preset balancing plan quality and computation time.
    ///
    /// - Population: 60, Generations: 200, Time limit: 30s
    /// - Stagnation limit: 40
    pub fn balanced() -> Self {
        Self {
            population_size: 60,
            max_generations: 200,
            stagnation_limit: 40,
            mutation_count: 10,
            time_limit_ms: Some(30_000),
            ..Self::default()
        }
    }

    /// Preset for overnight planning: large population, many generations.
    ///
    /// - Population: 120, Generations: 500, Time limit: 120s
    /// - Stagnation limit: 80
    pub fn quality() -> Self {
        Self {
            population_size: 120,
            max_generations: 500,
            stagnation_limit: 80,
            mutation_count: 20,
            time_limit_ms: Some(120_000),
            ..Self::default()
        }
    }

    /// Selects a preset from the catalog size.
    ///
    /// - `ticket_count < 50` → [`fast()`](Self::fast)
    /// - `50 ≤ ticket_count < 200` → [`balanced()`](Self::balanced)
    /// - `ticket_count ≥ 200` → [`quality()`](Self::quality)
    pub fn auto_select(ticket_count: usize) -> Self {
        if ticket_count < 50 {
            Self::fast()
        } else if ticket_count < 200 {
            Self::balanced()
        } else {
            Self::quality()
        }
    }

    /// Convenience builder for tournament selection.
    pub fn with_tournament_size(self, k: usize) -> Self {
        self.with_selection(Selection::Tournament(k))
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// [`SchedError::Config`] describing the first invalid parameter.
    pub fn validate(&self) -> Result<()> {
        if self.population_size < 2 {
            return Err(SchedError::Config("population_size must be at least 2".into()));
        }
        if self.max_generations == 0 {
            return Err(SchedError::Config("max_generations must be at least 1".into()));
        }
        if self.strategy == Strategy::Single {
            let elites = self.elite_count();
            if elites < 2 {
                return Err(SchedError::Config(
                    "elite_ratio too low: at least two elites are needed as parents".into(),
                ));
            }
            if elites >= self.population_size {
                return Err(SchedError::Config(
                    "elite_ratio too high: elites fill entire population".into(),
                ));
            }
        }
        if self.strategy == Strategy::Nsga2 && self.objectives.is_empty() {
            return Err(SchedError::Config("NSGA-II needs at least one objective".into()));
        }
        let range = self.duration_range;
        if !(range.min_s > 0.0) || !range.max_s.is_finite() || range.max_s < range.min_s {
            return Err(SchedError::Config(format!(
                "invalid duration range [{}, {}]",
                range.min_s, range.max_s
            )));
        }
        if self.time_limit_ms == Some(0) {
            return Err(SchedError::Config("time_limit_ms must be positive or None".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GaConfig::default();
        assert_eq!(config.population_size, 50);
        assert_eq!(config.strategy, Strategy::Single);
        assert_eq!(config.fitness, Objective::Visibility);
        assert_eq!(config.selection, Selection::Roulette);
        assert!((config.elite_ratio - 0.5).abs() < 1e-10);
        assert_eq!(config.elite_count(), 25);
        assert_eq!(config.objectives.len(), 6);
        assert!(config.constraints.is_empty());
        assert!(config.parallel);
        assert!(config.seed.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let config = GaConfig::default()
            .with_population_size(20)
            .with_max_generations(10)
            .with_fitness(Objective::Altitude)
            .with_constraints(vec![Constraint::Quota])
            .with_mutation_count(3)
            .with_parallel(false)
            .with_seed(42);

        assert_eq!(config.population_size, 20);
        assert_eq!(config.max_generations, 10);
        assert_eq!(config.fitness, Objective::Altitude);
        assert_eq!(config.constraints, vec![Constraint::Quota]);
        assert_eq!(config.mutation_count, 3);
        assert!(!config.parallel);
        assert_eq!(config.seed, Some(42));
    }

    #[test]
    fn test_validate_population_too_small() {
        let config = GaConfig::default().with_population_size(1);
        assert!(matches!(config.validate(), Err(SchedError::Config(_))));
    }

    #[test]
    fn test_validate_elites() {
        let too_few = GaConfig::default().with_population_size(10).with_elite_ratio(0.1);
        assert!(too_few.validate().is_err());

        let too_many = GaConfig::default().with_population_size(10).with_elite_ratio(1.0);
        assert!(too_many.validate().is_err());

        // Elite ratio is irrelevant for NSGA-II.
        let nsga = too_few.with_strategy(Strategy::Nsga2);
        assert!(nsga.validate().is_ok());
    }

    #[test]
    fn test_validate_empty_objectives() {
        let config = GaConfig::default()
            .with_strategy(Strategy::Nsga2)
            .with_objectives(Vec::new());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_duration_range() {
        let config = GaConfig::default().with_duration_range(DurationRange::new(600.0, 60.0));
        assert!(config.validate().is_err());
        let config = GaConfig::default().with_duration_range(DurationRange::new(0.0, 60.0));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_time_limit() {
        assert!(GaConfig::default().with_time_limit_ms(0).validate().is_err());
        assert!(GaConfig::default().with_time_limit_ms(1).validate().is_ok());
    }

    #[test]
    fn test_clamp_elite_ratio() {
        let config = GaConfig::default().with_elite_ratio(1.5);
        assert!((config.elite_ratio - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_presets_validate() {
        for config in [GaConfig::fast(), GaConfig::balanced(), GaConfig::quality()] {
            assert!(config.validate().is_ok());
        }
    }

    #[test]
    fn test_auto_select_boundaries() {
        assert_eq!(GaConfig::auto_select(49).population_size, 30);
        assert_eq!(GaConfig::auto_select(50).population_size, 60);
        assert_eq!(GaConfig::auto_select(199).population_size, 60);
        assert_eq!(GaConfig::auto_select(200).population_size, 120);
    }

    #[test]
    fn test_with_tournament_size() {
        let config = GaConfig::default().with_tournament_size(4);
        assert_eq!(config.selection, Selection::Tournament(4));
    }
}
