//! Single-objective generational GA.
//!
//! [`Population`] owns one generation of schedules and advances it with
//! [`step`](Population::step):
//! evaluate → keep elites → roulette/crossover → mutate → truncate.

use log::debug;
use rand::rngs::StdRng;
use rand::Rng;
#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::context::SchedulingContext;
use crate::ephemeris::Ephemeris;
use crate::error::{Result, SchedError};
use crate::random::rng_from_option;

use super::config::GaConfig;
use super::schedule::Schedule;

/// Distance kept between a crossover cut and the window edges (seconds).
const CUT_MARGIN_S: f64 = 1.0;

/// Redraws allowed when both parents of a pair come out identical.
pub(crate) const MAX_PAIR_REDRAWS: usize = 16;

/// Evaluates `f` over every individual, in parallel when enabled.
///
/// Results keep the order of `individuals`. Evaluation draws no random
/// numbers, so parallel and sequential runs produce the same values.
#[cfg(feature = "parallel")]
pub(crate) fn evaluate_with<T, F>(
    individuals: &mut [Schedule],
    parallel: bool,
    f: F,
) -> Result<Vec<T>>
where
    T: Send,
    F: Fn(&mut Schedule) -> Result<T> + Sync + Send,
{
    if parallel {
        individuals.par_iter_mut().map(|s| f(s)).collect()
    } else {
        individuals.iter_mut().map(f).collect()
    }
}

/// Rejects catalogs that cannot give crossover two different tickets.
pub(crate) fn require_two_tickets<E: Ephemeris>(ctx: &SchedulingContext<'_, E>) -> Result<()> {
    let n = ctx.catalog().len();
    if n < 2 {
        return Err(SchedError::Catalog(format!(
            "evolving schedules needs at least two tickets, catalog has {n}"
        )));
    }
    Ok(())
}

/// Evaluates `f` over every individual.
#[cfg(not(feature = "parallel"))]
pub(crate) fn evaluate_with<T, F>(
    individuals: &mut [Schedule],
    _parallel: bool,
    f: F,
) -> Result<Vec<T>>
where
    T: Send,
    F: Fn(&mut Schedule) -> Result<T> + Sync + Send,
{
    individuals.iter_mut().map(f).collect()
}

/// Draws a crossover cut strictly inside `(0, total_s)`.
pub(crate) fn draw_cut<R: Rng>(total_s: f64, rng: &mut R) -> f64 {
    if total_s > 2.0 * CUT_MARGIN_S {
        rng.random_range(CUT_MARGIN_S..total_s - CUT_MARGIN_S)
    } else {
        total_s / 2.0
    }
}

/// Draws a second parent index different from `first` out of `n >= 2`.
///
/// `draw` is retried up to [`MAX_PAIR_REDRAWS`] times; after that a
/// uniformly random other index is used.
pub(crate) fn distinct_partner<R: Rng>(
    first: usize,
    n: usize,
    rng: &mut R,
    mut draw: impl FnMut(&mut R) -> usize,
) -> usize {
    for _ in 0..MAX_PAIR_REDRAWS {
        let second = draw(rng);
        if second != first {
            return second;
        }
    }
    (first + 1 + rng.random_range(0..n - 1)) % n
}

/// Moves the individuals at `keep` (in that order) out of `pool`.
pub(crate) fn take_indices(pool: Vec<Schedule>, keep: &[usize]) -> Vec<Schedule> {
    let mut slots: Vec<Option<Schedule>> = pool.into_iter().map(Some).collect();
    keep.iter().filter_map(|&i| slots[i].take()).collect()
}

/// One generation of the single-objective GA.
///
/// # Usage
///
/// ```ignore
/// let ctx = SchedulingContext::new(&catalog, &accounts, &ephemeris, jd0, jd1, 60.0)?;
/// let mut population = Population::new(ctx, GaConfig::default().with_seed(42))?;
/// for _ in 0..100 {
///     population.step()?;
/// }
/// let (best, fitness) = population.best()?;
/// ```
pub struct Population<'a, E: Ephemeris> {
    ctx: SchedulingContext<'a, E>,
    config: GaConfig,
    individuals: Vec<Schedule>,
    rng: StdRng,
    generation: usize,
}

impl<'a, E: Ephemeris> Population<'a, E> {
    /// Creates a random initial population.
    ///
    /// # Errors
    /// [`SchedError::Config`] for an invalid configuration,
    /// [`SchedError::Catalog`] for a catalog with fewer than two tickets; any
    /// error from [`Schedule::construct`].
    pub fn new(ctx: SchedulingContext<'a, E>, config: GaConfig) -> Result<Self> {
        config.validate()?;
        require_two_tickets(&ctx)?;
        let mut rng = rng_from_option(config.seed);
        let individuals = (0..config.population_size)
            .map(|_| Schedule::construct(&ctx, config.duration_range, &mut rng))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            ctx,
            config,
            individuals,
            rng,
            generation: 0,
        })
    }

    /// Creates a population from existing schedules.
    ///
    /// # Errors
    /// [`SchedError::Config`] if the configuration is invalid or the number
    /// of schedules differs from `population_size`; [`SchedError::Catalog`]
    /// for a catalog with fewer than two tickets.
    pub fn from_individuals(
        ctx: SchedulingContext<'a, E>,
        config: GaConfig,
        individuals: Vec<Schedule>,
    ) -> Result<Self> {
        config.validate()?;
        require_two_tickets(&ctx)?;
        if individuals.len() != config.population_size {
            return Err(SchedError::Config(format!(
                "expected {} individuals, got {}",
                config.population_size,
                individuals.len()
            )));
        }
        let rng = rng_from_option(config.seed);
        Ok(Self {
            ctx,
            config,
            individuals,
            rng,
            generation: 0,
        })
    }

    /// Advances one generation.
    ///
    /// 1. Evaluate the configured fitness of every schedule.
    /// 2. Keep the top `elite_count` schedules unchanged.
    /// 3. Breed offspring from roulette-selected elite pairs until the pool
    ///    holds `2 × population_size` schedules.
    /// 4. Apply a random number (at most `mutation_count`) of gene mutations
    ///    to random offspring.
    /// 5. Keep the best `population_size` schedules of the pool.
    ///
    /// # Errors
    /// Propagates merit, crossover, and mutation errors. On error the
    /// population is left as it was before the call.
    pub fn step(&mut self) -> Result<()> {
        let ctx = self.ctx;
        let objective = self.config.fitness;
        let parallel = self.config.parallel;

        let fitness = evaluate_with(&mut self.individuals, parallel, |s| s.merit(objective, &ctx))?;
        let order = descending_order(&fitness);
        let elite_count = self.config.elite_count().min(order.len());

        let mut pool: Vec<Schedule> = order[..elite_count]
            .iter()
            .map(|&i| self.individuals[i].clone())
            .collect();
        let elite_fitness: Vec<f64> = order[..elite_count].iter().map(|&i| fitness[i]).collect();

        let target = 2 * self.config.population_size;
        let selection = self.config.selection;
        while pool.len() < target {
            let p1 = selection.select(&elite_fitness, &mut self.rng);
            let p2 = distinct_partner(p1, elite_count, &mut self.rng, |rng| {
                selection.select(&elite_fitness, rng)
            });
            let cut = draw_cut(pool[p1].total_duration_s(), &mut self.rng);
            let child = Schedule::crossover(&pool[p1], &pool[p2], cut)?;
            pool.push(child);
        }

        let mutations = self.rng.random_range(0..=self.config.mutation_count);
        for _ in 0..mutations {
            let i = self.rng.random_range(elite_count..pool.len());
            pool[i] = pool[i].mutate_gene(&ctx, self.config.duration_range, &mut self.rng)?;
        }

        let pool_fitness = evaluate_with(&mut pool, parallel, |s| s.merit(objective, &ctx))?;
        let mut keep = descending_order(&pool_fitness);
        keep.truncate(self.config.population_size);

        self.individuals = take_indices(pool, &keep);
        self.generation += 1;

        if log::log_enabled!(log::Level::Debug) {
            let kept: Vec<f64> = keep.iter().map(|&i| pool_fitness[i]).collect();
            let mean = kept.iter().sum::<f64>() / kept.len() as f64;
            debug!(
                "generation {}: best {:?} = {:.6}, mean {:.6}, {} mutations",
                self.generation,
                objective,
                kept.first().copied().unwrap_or(f64::NAN),
                mean,
                mutations
            );
        }
        Ok(())
    }

    /// Fitness of every individual, in population order.
    pub fn fitness(&mut self) -> Result<Vec<f64>> {
        let ctx = self.ctx;
        let objective = self.config.fitness;
        evaluate_with(&mut self.individuals, self.config.parallel, |s| {
            s.merit(objective, &ctx)
        })
    }

    /// Mean fitness of the population.
    pub fn average_fitness(&mut self) -> Result<f64> {
        let fitness = self.fitness()?;
        Ok(fitness.iter().sum::<f64>() / fitness.len() as f64)
    }

    /// The fittest schedule and its fitness.
    pub fn best(&mut self) -> Result<(&Schedule, f64)> {
        let fitness = self.fitness()?;
        let best = descending_order(&fitness)[0];
        Ok((&self.individuals[best], fitness[best]))
    }

    /// Current schedules.
    pub fn individuals(&self) -> &[Schedule] {
        &self.individuals
    }

    /// Consumes the population, returning its schedules.
    pub fn into_individuals(self) -> Vec<Schedule> {
        self.individuals
    }

    /// Number of completed [`step`](Self::step) calls.
    pub fn generation(&self) -> usize {
        self.generation
    }

    /// Run context.
    pub fn context(&self) -> &SchedulingContext<'a, E> {
        &self.ctx
    }

    /// Configuration.
    pub fn config(&self) -> &GaConfig {
        &self.config
    }
}

/// Indices of `fitness` sorted best (highest) first; ties keep index order.
fn descending_order(fitness: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..fitness.len()).collect();
    order.sort_by(|&a, &b| fitness[b].total_cmp(&fitness[a]));
    order
}
