//! NSGA-II over schedules.
//!
//! [`Nsga2Population`] evolves schedules against a vector of maximized
//! [`Objective`]s. An optional set of [`Constraint`]s is
//! summed into a violation count and handled by constrained dominance, so
//! schedules with fewer violations always rank first.
//!
//! # References
//!
//! - Deb et al. (2002), "A Fast and Elitist Multiobjective Genetic Algorithm: NSGA-II"
//!
//! [`Objective`]: super::Objective
//! [`Constraint`]: super::Constraint

use log::debug;
use rand::rngs::StdRng;
use rand::Rng;

use crate::context::SchedulingContext;
use crate::ephemeris::Ephemeris;
use crate::error::{Result, SchedError};
use crate::random::rng_from_option;

use super::config::GaConfig;
use super::multi_objective::{
    assign_ranks, binary_tournament, environmental_selection, non_dominated_sort,
};
use super::population::{
    distinct_partner, draw_cut, evaluate_with, require_two_tickets, take_indices,
};
use super::schedule::Schedule;

/// Objective vectors and violation counts of a set of schedules.
struct Evaluation {
    objectives: Vec<Vec<f64>>,
    violations: Option<Vec<usize>>,
}

/// One generation of NSGA-II.
pub struct Nsga2Population<'a, E: Ephemeris> {
    ctx: SchedulingContext<'a, E>,
    config: GaConfig,
    individuals: Vec<Schedule>,
    rng: StdRng,
    generation: usize,
}

impl<'a, E: Ephemeris> Nsga2Population<'a, E> {
    /// Creates a random initial population.
    ///
    /// # Errors
    /// [`SchedError::Config`] for an invalid configuration,
    /// [`SchedError::Catalog`] for a catalog with fewer than two tickets; any
    /// error from [`Schedule::construct`].
    pub fn new(ctx: SchedulingContext<'a, E>, config: GaConfig) -> Result<Self> {
        validate(&config)?;
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
    pub fn from_individuals(
        ctx: SchedulingContext<'a, E>,
        config: GaConfig,
        individuals: Vec<Schedule>,
    ) -> Result<Self> {
        validate(&config)?;
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
    /// 1. Rank parents by front and crowding distance.
    /// 2. Breed `population_size` offspring from binary-tournament pairs.
    /// 3. Mutate at most `mutation_count` random offspring genes.
    /// 4. Merge parents and offspring and keep `population_size` survivors
    ///    by environmental selection.
    pub fn step(&mut self) -> Result<()> {
        let ctx = self.ctx;
        let parents = self.evaluate_individuals()?;
        let ranks = assign_ranks(&parents.objectives, parents.violations.as_deref());

        let n = self.config.population_size;
        let mut offspring = Vec::with_capacity(n);
        while offspring.len() < n {
            let p1 = binary_tournament(&ranks, &mut self.rng);
            let p2 = distinct_partner(p1, ranks.len(), &mut self.rng, |rng| {
                binary_tournament(&ranks, rng)
            });
            let cut = draw_cut(self.individuals[p1].total_duration_s(), &mut self.rng);
            offspring.push(Schedule::crossover(
                &self.individuals[p1],
                &self.individuals[p2],
                cut,
            )?);
        }

        let mutations = self.rng.random_range(0..=self.config.mutation_count);
        for _ in 0..mutations {
            let i = self.rng.random_range(0..offspring.len());
            offspring[i] =
                offspring[i].mutate_gene(&ctx, self.config.duration_range, &mut self.rng)?;
        }

        let mut merged = self.individuals.clone();
        merged.extend(offspring);
        let eval = evaluate(&mut merged, &self.config, &ctx)?;
        let keep = environmental_selection(&eval.objectives, eval.violations.as_deref(), n);

        self.individuals = take_indices(merged, &keep);
        self.generation += 1;

        debug!(
            "nsga2 generation {}: {} mutations, front 0 size {}",
            self.generation,
            mutations,
            non_dominated_sort(&eval.objectives, eval.violations.as_deref())
                .fronts
                .first()
                .map_or(0, Vec::len)
        );
        Ok(())
    }

    /// The current non-dominated schedules.
    pub fn pareto_front(&mut self) -> Result<Vec<&Schedule>> {
        let eval = self.evaluate_individuals()?;
        let sorted = non_dominated_sort(&eval.objectives, eval.violations.as_deref());
        let front = sorted.fronts.into_iter().next().unwrap_or_default();
        Ok(front.into_iter().map(|i| &self.individuals[i]).collect())
    }

    /// Objective vector of every individual, in population order.
    pub fn objective_values(&mut self) -> Result<Vec<Vec<f64>>> {
        Ok(self.evaluate_individuals()?.objectives)
    }

    /// Front-0 schedule with the highest value of the configured fitness.
    pub fn best(&mut self) -> Result<(&Schedule, f64)> {
        let ctx = self.ctx;
        let objective = self.config.fitness;
        let eval = self.evaluate_individuals()?;
        let sorted = non_dominated_sort(&eval.objectives, eval.violations.as_deref());
        let mut best: Option<(usize, f64)> = None;
        for &i in sorted.fronts.first().map_or(&[][..], Vec::as_slice) {
            let value = self.individuals[i].merit(objective, &ctx)?;
            match best {
                Some((_, b)) if value <= b => {}
                _ => best = Some((i, value)),
            }
        }
        let (i, value) = best.ok_or_else(|| SchedError::Config("population is empty".into()))?;
        Ok((&self.individuals[i], value))
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

    fn evaluate_individuals(&mut self) -> Result<Evaluation> {
        let ctx = self.ctx;
        evaluate(&mut self.individuals, &self.config, &ctx)
    }
}

fn validate(config: &GaConfig) -> Result<()> {
    config.validate()?;
    if config.objectives.is_empty() {
        return Err(SchedError::Config("NSGA-II needs at least one objective".into()));
    }
    Ok(())
}

fn evaluate<E: Ephemeris>(
    individuals: &mut [Schedule],
    config: &GaConfig,
    ctx: &SchedulingContext<'_, E>,
) -> Result<Evaluation> {
    let objectives = &config.objectives;
    let constraints = &config.constraints;
    let scored = evaluate_with(individuals, config.parallel, |s| {
        let vector = s.objective_vector(objectives, ctx)?;
        let violation = if constraints.is_empty() {
            0
        } else {
            s.violation(constraints, ctx)?
        };
        Ok((vector, violation))
    })?;
    let (objectives, violations): (Vec<_>, Vec<_>) = scored.into_iter().unzip();
    Ok(Evaluation {
        objectives,
        violations: (!constraints.is_empty()).then_some(violations),
    })
}
