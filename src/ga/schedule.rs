//! Schedule chromosome.
//!
//! # Encoding
//!
//! A [`Schedule`] is an ordered sequence of [`ScheduledObservation`] genes
//! that covers the observing window `[jd_start, jd_end)` without gaps or
//! overlaps. Every public constructor (`construct`, `crossover`,
//! `mutate_gene`, `from_durations`) returns a schedule that satisfies:
//!
//! 1. genes ascending by start time;
//! 2. `gene[i].end == gene[i + 1].start`;
//! 3. total duration equals the window length (within [`JD_TOLERANCE`]);
//! 4. every duration is non-negative and there is at least one gene.
//!
//! Genes are never exposed mutably. Structural edits go through the repair
//! routines ([`adjust_duration`](Schedule::adjust_duration),
//! [`repair_start_times`](Schedule::repair_start_times)), which also drop
//! any cached merits.

use log::{trace, warn};
use rand::Rng;

use crate::catalog::TicketId;
use crate::context::SchedulingContext;
use crate::ephemeris::Ephemeris;
use crate::error::{Result, SchedError};
use crate::plan::Plan;
use crate::time::{jd_span_seconds, seconds_to_days, JD_TOLERANCE};

use super::gene::ScheduledObservation;
use super::merit::{self, cached, Constraint, MeritCache, Objective};

/// How many times [`Schedule::construct`] redraws a degenerate schedule.
pub const CONSTRUCT_RETRIES: usize = 3;

/// Durations below this are rounding residue and get removed (seconds).
pub const NEGLIGIBLE_DURATION_S: f64 = 1.0;

/// Slack kept above the minimum duration when a mutation shortens a neighbour (seconds).
const MUTATION_MARGIN_S: f64 = 1.0;

/// Range for randomly drawn observation durations, in seconds.
///
/// The effective lower bound is never below the run's minimum observation
/// duration.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DurationRange {
    /// Shortest drawn duration (seconds).
    pub min_s: f64,
    /// Longest drawn duration (seconds).
    pub max_s: f64,
}

impl Default for DurationRange {
    fn default() -> Self {
        Self {
            min_s: 60.0,
            max_s: 3600.0,
        }
    }
}

impl DurationRange {
    /// Creates a range.
    pub fn new(min_s: f64, max_s: f64) -> Self {
        Self { min_s, max_s }
    }

    /// Effective `(lo, hi)` once the minimum observation duration is applied.
    fn bounds(&self, min_obs: f64) -> (f64, f64) {
        let lo = self.min_s.max(min_obs);
        (lo, self.max_s.max(lo))
    }

    fn draw<R: Rng>(&self, min_obs: f64, rng: &mut R) -> f64 {
        let (lo, hi) = self.bounds(min_obs);
        rng.random_range(lo..=hi)
    }
}

/// One candidate timetable covering the observing window.
#[derive(Debug, Clone)]
pub struct Schedule {
    genes: Vec<ScheduledObservation>,
    jd_start: f64,
    jd_end: f64,
    min_obs_duration: f64,
    merits: MeritCache,
}

impl Schedule {
    fn from_pieces<E: Ephemeris>(
        ctx: &SchedulingContext<'_, E>,
        pieces: &[(TicketId, f64)],
    ) -> Self {
        let genes = pieces
            .iter()
            .map(|&(ticket, d)| ScheduledObservation::new(ticket, ctx.jd_start(), d))
            .collect();
        Self {
            genes,
            jd_start: ctx.jd_start(),
            jd_end: ctx.jd_end(),
            min_obs_duration: ctx.min_obs_duration(),
            merits: MeritCache::default(),
        }
    }

    /// Builds a schedule from explicit `(ticket, duration)` pairs.
    ///
    /// Start times are derived from the durations.
    ///
    /// # Errors
    ///
    /// - [`SchedError::Config`] if `pieces` is empty, a duration is negative
    ///   or not finite, or the durations do not add up to the window.
    /// - [`SchedError::Catalog`] if a ticket is not in the catalog.
    pub fn from_durations<E: Ephemeris>(
        ctx: &SchedulingContext<'_, E>,
        pieces: &[(TicketId, f64)],
    ) -> Result<Self> {
        if pieces.is_empty() {
            return Err(SchedError::Config("a schedule needs at least one gene".into()));
        }
        for &(ticket, duration) in pieces {
            if ctx.catalog().ticket(ticket).is_none() {
                return Err(SchedError::Catalog(format!("unknown ticket {ticket}")));
            }
            if !duration.is_finite() || duration < 0.0 {
                return Err(SchedError::Config(format!(
                    "invalid duration {duration}s for ticket {ticket}"
                )));
            }
        }
        let total: f64 = pieces.iter().map(|p| p.1).sum();
        if (seconds_to_days(total) - (ctx.jd_end() - ctx.jd_start())).abs() > JD_TOLERANCE {
            return Err(SchedError::Config(format!(
                "durations sum to {total}s but the window is {}s",
                ctx.window_seconds()
            )));
        }
        let mut schedule = Self::from_pieces(ctx, pieces);
        schedule.repair_start_times();
        Ok(schedule)
    }

    /// Creates a random schedule covering the context's window.
    ///
    /// Tickets are drawn uniformly from the catalog and durations uniformly
    /// from `range`, until the window is filled. The last gene is clipped to
    /// the window end; a clipped remainder shorter than the minimum
    /// observation duration is merged into the previous gene.
    ///
    /// # Errors
    ///
    /// [`SchedError::Catalog`] if no valid schedule could be drawn after
    /// [`CONSTRUCT_RETRIES`] retries (e.g. the catalog is empty).
    pub fn construct<E: Ephemeris, R: Rng>(
        ctx: &SchedulingContext<'_, E>,
        range: DurationRange,
        rng: &mut R,
    ) -> Result<Self> {
        for attempt in 0..=CONSTRUCT_RETRIES {
            if let Some(schedule) = Self::try_construct(ctx, range, rng) {
                return Ok(schedule);
            }
            warn!("schedule construction attempt {} produced no valid schedule", attempt + 1);
        }
        Err(SchedError::Catalog(format!(
            "could not construct a schedule from {} tickets after {} retries",
            ctx.catalog().len(),
            CONSTRUCT_RETRIES
        )))
    }

    fn try_construct<E: Ephemeris, R: Rng>(
        ctx: &SchedulingContext<'_, E>,
        range: DurationRange,
        rng: &mut R,
    ) -> Option<Self> {
        let window_s = ctx.window_seconds();
        let min_obs = ctx.min_obs_duration();
        let mut pieces: Vec<(TicketId, f64)> = Vec::new();
        let mut filled = 0.0;

        loop {
            let ticket = ctx.catalog().random_ticket(rng)?.id;
            let duration = range.draw(min_obs, rng);
            let remaining = window_s - filled;
            if duration >= remaining {
                pieces.push((ticket, remaining));
                break;
            }
            pieces.push((ticket, duration));
            filled += duration;
        }

        if pieces.len() > 1 {
            if let Some(&(_, last)) = pieces.last() {
                if last < min_obs {
                    pieces.pop();
                    if let Some(prev) = pieces.last_mut() {
                        prev.1 += last;
                    }
                }
            }
        }

        let mut schedule = Self::from_pieces(ctx, &pieces);
        schedule.repair_start_times();
        schedule.validate().ok().map(|_| schedule)
    }

    /// Single-cut crossover.
    ///
    /// The child takes `a`'s genes up to `cut_s` seconds into the window
    /// (truncating the gene that straddles the cut), then `b`'s genes from
    /// the same offset on (splitting its straddling gene). Adjacent genes of
    /// the same ticket are merged and fragments shorter than the minimum
    /// duration are folded into a neighbour. Any residual coverage error is
    /// absorbed with [`adjust_duration`](Self::adjust_duration) on the last
    /// gene before start times are re-derived.
    ///
    /// # Errors
    ///
    /// - [`SchedError::Config`] if the parents cover different windows or
    ///   `cut_s` is not strictly inside `(0, total duration)`.
    /// - [`SchedError::InfeasibleSchedule`] if the residual cannot be absorbed.
    pub fn crossover(a: &Schedule, b: &Schedule, cut_s: f64) -> Result<Schedule> {
        if (a.jd_start - b.jd_start).abs() > JD_TOLERANCE
            || (a.jd_end - b.jd_end).abs() > JD_TOLERANCE
        {
            return Err(SchedError::Config(
                "crossover parents cover different windows".into(),
            ));
        }
        let total = a.total_duration_s();
        if !(cut_s > 0.0 && cut_s < total) {
            return Err(SchedError::Config(format!(
                "crossover cut {cut_s}s outside (0, {total}s)"
            )));
        }

        let mut pieces: Vec<(TicketId, f64)> = Vec::with_capacity(a.len() + b.len());

        let mut offset = 0.0;
        for gene in &a.genes {
            let end = offset + gene.duration_s;
            if end < cut_s {
                pieces.push((gene.ticket, gene.duration_s));
                offset = end;
            } else {
                pieces.push((gene.ticket, cut_s - offset));
                break;
            }
        }

        let mut offset = 0.0;
        for gene in &b.genes {
            let end = offset + gene.duration_s;
            if end > cut_s {
                let skipped = (cut_s - offset).max(0.0);
                pieces.push((gene.ticket, gene.duration_s - skipped));
            }
            offset = end;
        }

        let pieces = merge_same_ticket(fold_fragments(
            merge_same_ticket(pieces),
            a.min_obs_duration,
        ));

        let mut child = Schedule {
            genes: pieces
                .iter()
                .map(|&(ticket, d)| ScheduledObservation::new(ticket, a.jd_start, d))
                .collect(),
            jd_start: a.jd_start,
            jd_end: a.jd_end,
            min_obs_duration: a.min_obs_duration,
            merits: MeritCache::default(),
        };

        let residual = child.window_seconds() - child.total_duration_s();
        if residual != 0.0 {
            child.adjust_duration(child.len() - 1, residual)?;
        }
        child.repair_start_times();
        debug_assert!(child.validate().is_ok(), "{:?}", child.validate());
        Ok(child)
    }

    /// Returns a copy with one gene replaced by a random ticket and duration.
    ///
    /// The replaced gene keeps its start time; the duration change is
    /// absorbed by the following gene, then start times are re-derived. The
    /// drawn duration is capped so that the following gene stays above the
    /// minimum duration. The last gene has no follower and ends at the
    /// window end, so it keeps its duration and only changes ticket.
    ///
    /// # Errors
    ///
    /// - [`SchedError::Catalog`] if the catalog is empty.
    /// - [`SchedError::InfeasibleSchedule`] if the delta cannot be absorbed.
    pub fn mutate_gene<E: Ephemeris, R: Rng>(
        &self,
        ctx: &SchedulingContext<'_, E>,
        range: DurationRange,
        rng: &mut R,
    ) -> Result<Schedule> {
        let mut child = Schedule {
            genes: self.genes.clone(),
            jd_start: self.jd_start,
            jd_end: self.jd_end,
            min_obs_duration: self.min_obs_duration,
            merits: MeritCache::default(),
        };

        let index = rng.random_range(0..child.len());
        child.replace_gene(ctx, index, range, rng)?;
        child.repair_start_times();
        Ok(child)
    }

    fn replace_gene<E: Ephemeris, R: Rng>(
        &mut self,
        ctx: &SchedulingContext<'_, E>,
        index: usize,
        range: DurationRange,
        rng: &mut R,
    ) -> Result<()> {
        let n = self.len();
        let ticket = ctx
            .catalog()
            .random_ticket(rng)
            .ok_or_else(|| SchedError::Catalog("cannot mutate with an empty catalog".into()))?
            .id;
        self.genes[index].ticket = ticket;

        if index + 1 < n {
            let next = index + 1;
            let old = self.genes[index].duration_s;
            let (lo, hi) = range.bounds(self.min_obs_duration);
            let cap =
                old + self.genes[next].duration_s - self.min_obs_duration - MUTATION_MARGIN_S;
            let hi = hi.min(cap);
            let duration = if hi >= lo {
                rng.random_range(lo..=hi)
            } else {
                old
            };
            self.genes[index].duration_s = duration;
            let delta = old - duration;
            if delta != 0.0 {
                self.adjust_duration(next, delta)?;
            }
        }
        self.merits.clear();
        Ok(())
    }

    /// Adds `delta_s` seconds to a gene, or to the first gene after it that can take it.
    ///
    /// A gene can absorb the delta if its new duration stays strictly above
    /// the minimum observation duration. The search starts at `index` and
    /// walks forward modulo the gene count, visiting each gene at most once.
    ///
    /// Coverage is not restored here: callers pair this with an opposite
    /// change or with [`repair_start_times`](Self::repair_start_times).
    ///
    /// # Errors
    ///
    /// - [`SchedError::Config`] if `index` is out of range.
    /// - [`SchedError::InfeasibleSchedule`] if no gene can absorb the delta.
    pub(crate) fn adjust_duration(&mut self, index: usize, delta_s: f64) -> Result<()> {
        let n = self.genes.len();
        if index >= n {
            return Err(SchedError::Config(format!(
                "gene index {index} out of range for {n} genes"
            )));
        }
        for step in 0..n {
            let j = (index + step) % n;
            if self.genes[j].duration_s + delta_s > self.min_obs_duration {
                self.genes[j].duration_s += delta_s;
                self.merits.clear();
                if step > 0 {
                    trace!("duration delta {delta_s:.3}s moved from gene {index} to gene {j}");
                }
                return Ok(());
            }
        }
        Err(SchedError::InfeasibleSchedule {
            gene: index,
            genes: n,
            delta_s,
        })
    }

    /// Pins the last gene to the window end and re-derives start times.
    ///
    /// The last duration is the window length minus the preceding
    /// durations, so coverage is exact in seconds. A trailing gene left with
    /// less than [`NEGLIGIBLE_DURATION_S`] is removed and its predecessor
    /// extended to the window end instead.
    pub(crate) fn repair_start_times(&mut self) {
        let window = self.window_seconds();
        while !self.genes.is_empty() {
            let n = self.genes.len();
            let before: f64 = self.genes[..n - 1].iter().map(|g| g.duration_s).sum();
            let duration = window - before;
            if duration < NEGLIGIBLE_DURATION_S && n > 1 {
                self.genes.pop();
                continue;
            }
            self.genes[n - 1].duration_s = duration.max(0.0);
            break;
        }

        let mut elapsed = 0.0;
        for gene in &mut self.genes {
            gene.start_jd = self.jd_start + seconds_to_days(elapsed);
            elapsed += gene.duration_s;
        }
        self.merits.clear();
    }

    /// Checks the structural invariants.
    ///
    /// Returns `Err` with a description of the first violated invariant.
    pub fn validate(&self) -> std::result::Result<(), String> {
        let first = self.genes.first().ok_or("schedule has no genes")?;
        if (first.start_jd - self.jd_start).abs() > JD_TOLERANCE {
            return Err(format!(
                "first gene starts at {} instead of {}",
                first.start_jd, self.jd_start
            ));
        }
        for (i, gene) in self.genes.iter().enumerate() {
            if !gene.duration_s.is_finite() || gene.duration_s < 0.0 {
                return Err(format!("gene {i} has invalid duration {}", gene.duration_s));
            }
        }
        for (i, pair) in self.genes.windows(2).enumerate() {
            if pair[1].start_jd < pair[0].start_jd {
                return Err(format!("gene {} starts before gene {i}", i + 1));
            }
            if (pair[0].end_jd() - pair[1].start_jd).abs() > JD_TOLERANCE {
                return Err(format!("gap or overlap between genes {i} and {}", i + 1));
            }
        }
        let covered = seconds_to_days(self.total_duration_s());
        if (covered - (self.jd_end - self.jd_start)).abs() > JD_TOLERANCE {
            return Err(format!(
                "genes cover {covered} days of a {} day window",
                self.jd_end - self.jd_start
            ));
        }
        Ok(())
    }

    /// Read-only view of the genes.
    pub fn genes(&self) -> &[ScheduledObservation] {
        &self.genes
    }

    /// Number of genes.
    pub fn len(&self) -> usize {
        self.genes.len()
    }

    /// Always `false` for a valid schedule.
    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }

    /// Window start (JD).
    pub fn jd_start(&self) -> f64 {
        self.jd_start
    }

    /// Window end (JD).
    pub fn jd_end(&self) -> f64 {
        self.jd_end
    }

    /// Window length in seconds.
    pub fn window_seconds(&self) -> f64 {
        jd_span_seconds(self.jd_start, self.jd_end)
    }

    /// Sum of gene durations in seconds.
    pub fn total_duration_s(&self) -> f64 {
        self.genes.iter().map(|g| g.duration_s).sum()
    }

    /// Converts the schedule into an observing plan.
    ///
    /// # Errors
    /// See [`Plan::from_schedule`].
    pub fn into_plan<E: Ephemeris>(self, ctx: &SchedulingContext<'_, E>) -> Result<Plan> {
        Plan::from_schedule(&self, ctx)
    }

    /// Cached merits (for inspection; values are `None` until computed).
    pub fn merit_cache(&self) -> &MeritCache {
        &self.merits
    }

    // ---- merits ----

    /// Fraction of genes observable at their start time.
    pub fn visibility_ratio<E: Ephemeris>(
        &mut self,
        ctx: &SchedulingContext<'_, E>,
    ) -> Result<f64> {
        cached(&mut self.merits.visibility_ratio, || {
            merit::visibility_ratio(&self.genes, ctx)
        })
    }

    /// Mean altitude merit of the scheduled targets.
    pub fn altitude_merit<E: Ephemeris>(&mut self, ctx: &SchedulingContext<'_, E>) -> Result<f64> {
        cached(&mut self.merits.altitude, || merit::altitude_merit(&self.genes, ctx))
    }

    /// Account fairness merit.
    pub fn account_merit<E: Ephemeris>(&mut self, ctx: &SchedulingContext<'_, E>) -> Result<f64> {
        cached(&mut self.merits.account, || merit::account_merit(&self.genes, ctx))
    }

    /// Inverse total slew distance.
    pub fn distance_merit<E: Ephemeris>(&mut self, ctx: &SchedulingContext<'_, E>) -> Result<f64> {
        cached(&mut self.merits.distance, || merit::distance_merit(&self.genes, ctx))
    }

    /// Number of distinct targets.
    pub fn diversity_target_merit<E: Ephemeris>(
        &mut self,
        ctx: &SchedulingContext<'_, E>,
    ) -> Result<usize> {
        cached(&mut self.merits.diversity_target, || {
            merit::diversity_target_merit(&self.genes, ctx)
        })
    }

    /// Number of observations.
    pub fn diversity_observation_merit(&mut self) -> usize {
        let n = self.genes.len();
        *self.merits.diversity_observation.get_or_insert(n)
    }

    /// Genes whose target is not observable at their start time.
    pub fn violated_schedule_count<E: Ephemeris>(
        &mut self,
        ctx: &SchedulingContext<'_, E>,
    ) -> Result<usize> {
        cached(&mut self.merits.violated_schedule, || {
            merit::violated_schedule_count(&self.genes, ctx)
        })
    }

    /// Observable tickets with remaining quota that are missing from the schedule.
    pub fn unobserved_ticket_count<E: Ephemeris>(
        &mut self,
        ctx: &SchedulingContext<'_, E>,
    ) -> Result<usize> {
        cached(&mut self.merits.unobserved_ticket, || {
            merit::unobserved_ticket_count(&self.genes, ctx)
        })
    }

    /// Genes that exceed their ticket's quota.
    pub fn violated_obs_num_count<E: Ephemeris>(
        &mut self,
        ctx: &SchedulingContext<'_, E>,
    ) -> Result<usize> {
        cached(&mut self.merits.violated_obs_num, || {
            merit::violated_obs_num_count(&self.genes, ctx)
        })
    }

    /// Value of one objective (higher is better).
    pub fn merit<E: Ephemeris>(
        &mut self,
        objective: Objective,
        ctx: &SchedulingContext<'_, E>,
    ) -> Result<f64> {
        match objective {
            Objective::Visibility => self.visibility_ratio(ctx),
            Objective::Altitude => self.altitude_merit(ctx),
            Objective::Account => self.account_merit(ctx),
            Objective::Distance => self.distance_merit(ctx),
            Objective::DiversityTarget => self.diversity_target_merit(ctx).map(|v| v as f64),
            Objective::DiversityObservations => Ok(self.diversity_observation_merit() as f64),
        }
    }

    /// Objective vector in the order of `objectives`.
    pub fn objective_vector<E: Ephemeris>(
        &mut self,
        objectives: &[Objective],
        ctx: &SchedulingContext<'_, E>,
    ) -> Result<Vec<f64>> {
        objectives.iter().map(|&o| self.merit(o, ctx)).collect()
    }

    /// Total violation count over a constraint set (lower is better).
    pub fn violation<E: Ephemeris>(
        &mut self,
        constraints: &[Constraint],
        ctx: &SchedulingContext<'_, E>,
    ) -> Result<usize> {
        let mut total = 0;
        for constraint in constraints {
            total += match constraint {
                Constraint::Visibility => self.violated_schedule_count(ctx)?,
                Constraint::Coverage => self.unobserved_ticket_count(ctx)?,
                Constraint::Quota => self.violated_obs_num_count(ctx)?,
            };
        }
        Ok(total)
    }
}

/// Merges runs of consecutive pieces that reference the same ticket.
fn merge_same_ticket(pieces: Vec<(TicketId, f64)>) -> Vec<(TicketId, f64)> {
    let mut merged: Vec<(TicketId, f64)> = Vec::with_capacity(pieces.len());
    for (ticket, duration) in pieces {
        if duration <= 0.0 {
            continue;
        }
        match merged.last_mut() {
            Some(last) if last.0 == ticket => last.1 += duration,
            _ => merged.push((ticket, duration)),
        }
    }
    merged
}

/// Folds pieces shorter than `min_obs` into their predecessor (or, for a
/// leading fragment, into the piece that follows).
fn fold_fragments(pieces: Vec<(TicketId, f64)>, min_obs: f64) -> Vec<(TicketId, f64)> {
    let mut folded: Vec<(TicketId, f64)> = Vec::with_capacity(pieces.len());
    for (ticket, duration) in pieces {
        match folded.last_mut() {
            Some(last) if duration < min_obs => last.1 += duration,
            _ => folded.push((ticket, duration)),
        }
    }
    if folded.len() > 1 && folded[0].1 < min_obs {
        let head = folded.remove(0);
        folded[0].1 += head.1;
    }
    folded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Account, AccountRegistry, Target, Ticket, TicketCatalog};
    use crate::ephemeris::{SkyPosition, StaticEphemeris};
    use crate::random::create_rng;
    use proptest::prelude::*;

    const JD0: f64 = 2_460_000.5;
    const HOUR: f64 = 1.0 / 24.0;

    struct Fixture {
        catalog: TicketCatalog,
        accounts: AccountRegistry,
        ephemeris: StaticEphemeris,
    }

    impl Fixture {
        fn new(tickets: u32) -> Self {
            let mut catalog = TicketCatalog::new();
            let mut ephemeris = StaticEphemeris::new();
            for i in 1..=tickets {
                let target = format!("t{i}");
                catalog = catalog
                    .with_target(Target::new(target.clone(), format!("Target {i}")))
                    .with_ticket(Ticket::new(
                        i,
                        target.clone(),
                        if i % 2 == 0 { "accB" } else { "accA" },
                        10,
                    ));
                ephemeris = ephemeris.with_target(target, SkyPosition::new(i as f64 * 15.0, 20.0));
            }
            let accounts =
                AccountRegistry::new([Account::new("accA", 1.0), Account::new("accB", 1.0)])
                    .unwrap();
            Self {
                catalog,
                accounts,
                ephemeris,
            }
        }

        fn ctx(&self, hours: f64, min_obs: f64) -> SchedulingContext<'_, StaticEphemeris> {
            SchedulingContext::new(
                &self.catalog,
                &self.accounts,
                &self.ephemeris,
                JD0,
                JD0 + hours * HOUR,
                min_obs,
            )
            .unwrap()
        }
    }

    fn assert_invariants(s: &Schedule) {
        if let Err(e) = s.validate() {
            panic!("invariant violated: {e}\n{:#?}", s.genes());
        }
    }

    // ---- construct ----

    #[test]
    fn test_construct_two_tickets_six_slots() {
        let fx = Fixture::new(2);
        let ctx = fx.ctx(1.0, 600.0);
        let mut rng = create_rng(42);
        for _ in 0..50 {
            let s = Schedule::construct(&ctx, DurationRange::default(), &mut rng).unwrap();
            assert!((1..=6).contains(&s.len()), "got {} genes", s.len());
            assert_invariants(&s);
        }
    }

    #[test]
    fn test_construct_respects_min_duration() {
        let fx = Fixture::new(5);
        let ctx = fx.ctx(8.0, 300.0);
        let mut rng = create_rng(7);
        for _ in 0..50 {
            let s = Schedule::construct(&ctx, DurationRange::default(), &mut rng).unwrap();
            assert_invariants(&s);
            assert!(s.genes().iter().all(|g| g.duration_s >= 300.0 - 1e-3));
        }
    }

    #[test]
    fn test_construct_empty_catalog_is_catalog_error() {
        let fx = Fixture::new(0);
        let ctx = fx.ctx(1.0, 60.0);
        let mut rng = create_rng(1);
        let err = Schedule::construct(&ctx, DurationRange::default(), &mut rng).unwrap_err();
        assert!(matches!(err, SchedError::Catalog(_)));
    }

    // ---- from_durations ----

    #[test]
    fn test_from_durations_rejects_wrong_total() {
        let fx = Fixture::new(2);
        let ctx = fx.ctx(1.0, 60.0);
        assert!(matches!(
            Schedule::from_durations(&ctx, &[(1, 1000.0)]),
            Err(SchedError::Config(_))
        ));
        assert!(matches!(
            Schedule::from_durations(&ctx, &[(99, 3600.0)]),
            Err(SchedError::Catalog(_))
        ));
        assert!(Schedule::from_durations(&ctx, &[]).is_err());
    }

    // ---- crossover ----

    #[test]
    fn test_crossover_at_midpoint_preserves_total() {
        let fx = Fixture::new(3);
        let ctx = fx.ctx(2.0, 60.0);
        let a = Schedule::from_durations(&ctx, &[(1, 1800.0), (2, 3600.0), (3, 1800.0)]).unwrap();
        let b = Schedule::from_durations(&ctx, &[(3, 2400.0), (1, 2400.0), (2, 2400.0)]).unwrap();
        let mid = a.total_duration_s() / 2.0;

        let child = Schedule::crossover(&a, &b, mid).unwrap();

        assert_invariants(&child);
        assert!((child.total_duration_s() - a.total_duration_s()).abs() < 1e-6);
        let expected = [(1, 1800.0), (2, 1800.0), (1, 1200.0), (2, 2400.0)];
        assert_eq!(child.len(), expected.len());
        for (gene, (ticket, d)) in child.genes().iter().zip(expected) {
            assert_eq!(gene.ticket, ticket);
            assert!((gene.duration_s - d).abs() < 1e-6);
        }
    }

    #[test]
    fn test_crossover_merges_same_ticket() {
        let fx = Fixture::new(2);
        let ctx = fx.ctx(1.0, 60.0);
        let a = Schedule::from_durations(&ctx, &[(1, 3600.0)]).unwrap();
        let b = Schedule::from_durations(&ctx, &[(2, 1200.0), (1, 2400.0)]).unwrap();

        let child = Schedule::crossover(&a, &b, 1800.0).unwrap();

        assert_eq!(child.len(), 1);
        assert_eq!(child.genes()[0].ticket, 1);
        assert_invariants(&child);
    }

    #[test]
    fn test_crossover_folds_short_fragment() {
        let fx = Fixture::new(3);
        let ctx = fx.ctx(1.0, 300.0);
        let a = Schedule::from_durations(&ctx, &[(1, 1000.0), (2, 2600.0)]).unwrap();
        let b = Schedule::from_durations(&ctx, &[(3, 1100.0), (1, 2500.0)]).unwrap();

        // Cut at 1050s: a contributes 1000s of ticket 1 and 50s of ticket 2,
        // b contributes 50s of ticket 3 then ticket 1.
        let child = Schedule::crossover(&a, &b, 1050.0).unwrap();

        assert_invariants(&child);
        assert!(child.genes().iter().all(|g| g.duration_s >= 300.0));
    }

    #[test]
    fn test_crossover_rejects_bad_cut() {
        let fx = Fixture::new(2);
        let ctx = fx.ctx(1.0, 60.0);
        let a = Schedule::from_durations(&ctx, &[(1, 3600.0)]).unwrap();
        assert!(matches!(
            Schedule::crossover(&a, &a, 0.0),
            Err(SchedError::Config(_))
        ));
        assert!(matches!(
            Schedule::crossover(&a, &a, 3600.0),
            Err(SchedError::Config(_))
        ));
        assert!(Schedule::crossover(&a, &a, f64::NAN).is_err());
    }

    #[test]
    fn test_crossover_rejects_mismatched_windows() {
        let fx = Fixture::new(2);
        let a = Schedule::from_durations(&fx.ctx(1.0, 60.0), &[(1, 3600.0)]).unwrap();
        let b = Schedule::from_durations(&fx.ctx(2.0, 60.0), &[(1, 7200.0)]).unwrap();
        assert!(matches!(
            Schedule::crossover(&a, &b, 100.0),
            Err(SchedError::Config(_))
        ));
    }

    // ---- mutation ----

    #[test]
    fn test_mutate_single_gene_single_ticket_is_noop() {
        let fx = Fixture::new(1);
        let ctx = fx.ctx(1.0, 60.0);
        let s = Schedule::from_durations(&ctx, &[(1, 3600.0)]).unwrap();
        let mut rng = create_rng(3);
        let m = s.mutate_gene(&ctx, DurationRange::default(), &mut rng).unwrap();
        assert_eq!(m.genes(), s.genes());
    }

    #[test]
    fn test_mutate_keeps_invariants() {
        let fx = Fixture::new(4);
        let ctx = fx.ctx(6.0, 120.0);
        let mut rng = create_rng(11);
        let mut s = Schedule::construct(&ctx, DurationRange::default(), &mut rng).unwrap();
        for _ in 0..200 {
            s = s.mutate_gene(&ctx, DurationRange::default(), &mut rng).unwrap();
            assert_invariants(&s);
            assert!(s.genes().iter().all(|g| g.duration_s > 120.0 - 1e-3));
        }
    }

    #[test]
    fn test_replaced_gene_keeps_start_at_every_index() {
        let fx = Fixture::new(4);
        let ctx = fx.ctx(1.0, 60.0);
        let s = Schedule::from_durations(&ctx, &[(1, 1200.0), (2, 1200.0), (3, 1200.0)]).unwrap();
        let last = s.len() - 1;
        for seed in 0..100 {
            let mut rng = create_rng(seed);
            for index in 0..s.len() {
                let mut m = s.clone();
                m.replace_gene(&ctx, index, DurationRange::default(), &mut rng).unwrap();
                m.repair_start_times();
                assert_invariants(&m);
                assert_eq!(m.len(), s.len());
                assert_eq!(&m.genes()[..index], &s.genes()[..index]);
                assert_eq!(m.genes()[index].start_jd, s.genes()[index].start_jd);
                if index == last {
                    assert_eq!(m.genes()[last].duration_s, s.genes()[last].duration_s);
                }
            }
        }
    }

    #[test]
    fn test_mutate_gene_keeps_start_of_first_changed_gene() {
        let fx = Fixture::new(5);
        let ctx = fx.ctx(3.0, 120.0);
        for seed in 0..200 {
            let mut rng = create_rng(seed);
            let s = Schedule::construct(&ctx, DurationRange::default(), &mut rng).unwrap();
            let m = s.mutate_gene(&ctx, DurationRange::default(), &mut rng).unwrap();
            assert_invariants(&m);
            let changed = s.genes().iter().zip(m.genes()).position(|(a, b)| {
                a.ticket != b.ticket || a.duration_s != b.duration_s
            });
            if let Some(i) = changed {
                assert_eq!(m.genes()[i].start_jd, s.genes()[i].start_jd, "seed {seed}");
            }
        }
    }

    #[test]
    fn test_mutate_does_not_touch_parent() {
        let fx = Fixture::new(4);
        let ctx = fx.ctx(2.0, 60.0);
        let mut rng = create_rng(5);
        let mut s = Schedule::construct(&ctx, DurationRange::default(), &mut rng).unwrap();
        s.visibility_ratio(&ctx).unwrap();
        let before = s.genes().to_vec();
        let m = s.mutate_gene(&ctx, DurationRange::default(), &mut rng).unwrap();
        assert_eq!(s.genes(), &before[..]);
        assert!(s.merit_cache().visibility_ratio.is_some());
        assert!(m.merit_cache().is_empty());
    }

    // ---- adjust_duration / repair ----

    #[test]
    fn test_adjust_duration_infeasible_single_gene() {
        let fx = Fixture::new(1);
        let ctx = fx.ctx(1.0, 600.0);
        let mut s = Schedule::from_durations(&ctx, &[(1, 3600.0)]).unwrap();
        let err = s.adjust_duration(0, -3100.0).unwrap_err();
        assert!(matches!(err, SchedError::InfeasibleSchedule { genes: 1, .. }));
    }

    #[test]
    fn test_adjust_duration_wraps_to_absorbing_gene() {
        let fx = Fixture::new(3);
        let ctx = fx.ctx(1.0, 300.0);
        let mut s =
            Schedule::from_durations(&ctx, &[(1, 2400.0), (2, 600.0), (3, 600.0)]).unwrap();
        // Genes 1 and 2 cannot lose 500s; the search wraps to gene 0.
        s.adjust_duration(1, -500.0).unwrap();
        let d: Vec<f64> = s.genes().iter().map(|g| g.duration_s).collect();
        assert!((d[0] - 1900.0).abs() < 1e-9);
        assert!((d[1] - 600.0).abs() < 1e-9);
        assert!((d[2] - 600.0).abs() < 1e-9);
    }

    #[test]
    fn test_adjust_duration_out_of_range() {
        let fx = Fixture::new(1);
        let ctx = fx.ctx(1.0, 60.0);
        let mut s = Schedule::from_durations(&ctx, &[(1, 3600.0)]).unwrap();
        assert!(matches!(s.adjust_duration(3, 1.0), Err(SchedError::Config(_))));
    }

    #[test]
    fn test_repair_removes_negligible_tail() {
        let fx = Fixture::new(2);
        let ctx = fx.ctx(1.0, 60.0);
        let mut s = Schedule::from_durations(&ctx, &[(1, 3000.0), (2, 600.0)]).unwrap();
        // Push the tail gene past the window end; it collapses and is removed.
        s.genes[0].duration_s = 3599.5;
        s.repair_start_times();
        assert_eq!(s.len(), 1);
        assert_invariants(&s);
    }

    #[test]
    fn test_repair_matches_window_exactly() {
        let fx = Fixture::new(3);
        for hours in [1.0, 2.0, 7.0, 13.0] {
            let ctx = fx.ctx(hours, 60.0);
            let window = ctx.window_seconds();
            let third = window / 3.0;
            let pieces = [(1, third), (2, third), (3, window - 2.0 * third)];
            let mut s = Schedule::from_durations(&ctx, &pieces).unwrap();
            s.genes[0].duration_s += 250.0;
            s.genes[1].duration_s -= 100.0;
            s.repair_start_times();
            assert_invariants(&s);
            assert!((s.total_duration_s() - window).abs() < 1e-9, "{hours} h");
            assert!((s.genes()[2].duration_s - (third - 150.0)).abs() < 1e-9);
        }
    }

    #[test]
    fn test_crossover_total_is_exact() {
        let fx = Fixture::new(3);
        let ctx = fx.ctx(7.0, 60.0);
        let a = Schedule::from_durations(&ctx, &[(1, 9000.0), (2, 9000.0), (3, 7200.0)]).unwrap();
        let b = Schedule::from_durations(&ctx, &[(3, 5000.0), (1, 12_000.0), (2, 8200.0)]).unwrap();
        for cut in [1234.5, 9000.5, 15_000.25, 20_000.0] {
            let child = Schedule::crossover(&a, &b, cut).unwrap();
            assert_invariants(&child);
            assert!((child.total_duration_s() - a.total_duration_s()).abs() < 1e-9);
        }
    }

    // ---- merits ----

    #[test]
    fn test_visibility_ratio_cached() {
        let fx = Fixture::new(3);
        let ctx = fx.ctx(3.0, 60.0);
        let mut rng = create_rng(9);
        let mut s = Schedule::construct(&ctx, DurationRange::default(), &mut rng).unwrap();
        assert!(s.merit_cache().visibility_ratio.is_none());
        let v = s.visibility_ratio(&ctx).unwrap();
        assert!((0.0..=1.0).contains(&v));
        assert_eq!(s.merit_cache().visibility_ratio, Some(v));
    }

    #[test]
    fn test_violation_sums_constraints() {
        let fx = Fixture::new(3);
        let ctx = fx.ctx(1.0, 60.0);
        let mut s = Schedule::from_durations(&ctx, &[(1, 3600.0)]).unwrap();
        // Tickets 2 and 3 are always observable and missing.
        assert_eq!(s.violation(&[Constraint::Coverage], &ctx).unwrap(), 2);
        assert_eq!(
            s.violation(&[Constraint::Coverage, Constraint::Quota, Constraint::Visibility], &ctx)
                .unwrap(),
            2
        );
    }

    // ---- properties ----

    proptest! {
        #[test]
        fn prop_crossover_keeps_invariants(seed in 0u64..1000, frac in 0.001f64..0.999) {
            let fx = Fixture::new(4);
            let ctx = fx.ctx(8.0, 60.0);
            let mut rng = create_rng(seed);
            let a = Schedule::construct(&ctx, DurationRange::default(), &mut rng).unwrap();
            let b = Schedule::construct(&ctx, DurationRange::default(), &mut rng).unwrap();
            let cut = a.total_duration_s() * frac;
            let child = Schedule::crossover(&a, &b, cut).unwrap();
            prop_assert!(child.validate().is_ok(), "{:?}", child.validate());
        }

        #[test]
        fn prop_construct_covers_window(seed in 0u64..1000, hours in 1.0f64..12.0) {
            let fx = Fixture::new(3);
            let ctx = fx.ctx(hours, 60.0);
            let mut rng = create_rng(seed);
            let s = Schedule::construct(&ctx, DurationRange::default(), &mut rng).unwrap();
            prop_assert!(s.validate().is_ok());
            let covered = seconds_to_days(s.total_duration_s());
            prop_assert!((covered - hours * HOUR).abs() < JD_TOLERANCE);
        }

        #[test]
        fn prop_visibility_ratio_in_unit_interval(seed in 0u64..500) {
            let fx = Fixture::new(3);
            let eph = StaticEphemeris::new()
                .with_target("t1", SkyPosition::new(0.0, 0.0))
                .with_target("t2", SkyPosition::new(0.0, 0.0))
                .with_target("t3", SkyPosition::new(0.0, 0.0))
                .with_window("t1", JD0, JD0 + HOUR)
                .with_never_observable("t2");
            let window_end = JD0 + 4.0 * HOUR;
            let ctx =
                SchedulingContext::new(&fx.catalog, &fx.accounts, &eph, JD0, window_end, 60.0)
                    .unwrap();
            let mut rng = create_rng(seed);
            let mut s = Schedule::construct(&ctx, DurationRange::default(), &mut rng).unwrap();
            let v = s.visibility_ratio(&ctx).unwrap();
            prop_assert!((0.0..=1.0).contains(&v));
        }
    }
}
