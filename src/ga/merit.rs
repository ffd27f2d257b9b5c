//! Merit functions, objectives, and constraints.
//!
//! Every merit is a pure function of a gene sequence and the run context.
//! [`Schedule`](super::Schedule) caches the results in a [`MeritCache`];
//! the functions here do the actual work.
//!
//! All objectives are **maximized**: higher visibility, altitude, fairness,
//! compactness, and diversity are better. Constraint counts are minimized.

use std::collections::{BTreeSet, HashMap};

use crate::catalog::TicketId;
use crate::context::SchedulingContext;
use crate::ephemeris::Ephemeris;
use crate::error::{Result, SchedError};

use super::gene::ScheduledObservation;

/// Account merit reported for a schedule whose observed shares match the
/// configured shares exactly (the fairness deviation is zero).
pub const MAX_ACCOUNT_MERIT: f64 = 1e12;

/// A schedule quality measure that the GA can optimize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Objective {
    /// Fraction of observations whose target is observable at start time.
    #[default]
    Visibility,
    /// Mean integrated altitude merit of the observed targets.
    Altitude,
    /// Inverse of the share-weighted deviation from configured account shares.
    Account,
    /// Inverse of the total slew distance.
    Distance,
    /// Number of distinct targets.
    DiversityTarget,
    /// Number of observations.
    DiversityObservations,
}

impl Objective {
    /// All objectives, in declaration order.
    pub const ALL: [Objective; 6] = [
        Objective::Visibility,
        Objective::Altitude,
        Objective::Account,
        Objective::Distance,
        Objective::DiversityTarget,
        Objective::DiversityObservations,
    ];
}

/// A hard requirement whose violations are counted (lower is better).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Constraint {
    /// Observations scheduled while their target is not observable.
    Visibility,
    /// Observable tickets with remaining quota that were left out.
    Coverage,
    /// Observations beyond a ticket's quota.
    Quota,
}

/// Lazily computed merits of one schedule.
///
/// `None` means "not computed yet". A schedule clears its cache whenever
/// its genes change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeritCache {
    pub(crate) visibility_ratio: Option<f64>,
    pub(crate) altitude: Option<f64>,
    pub(crate) account: Option<f64>,
    pub(crate) distance: Option<f64>,
    pub(crate) diversity_target: Option<usize>,
    pub(crate) diversity_observation: Option<usize>,
    pub(crate) violated_schedule: Option<usize>,
    pub(crate) unobserved_ticket: Option<usize>,
    pub(crate) violated_obs_num: Option<usize>,
}

impl MeritCache {
    /// Forgets every cached value.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Returns `true` if no merit has been computed.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Returns the cached value or computes and stores it.
pub(crate) fn cached<T: Copy>(
    slot: &mut Option<T>,
    compute: impl FnOnce() -> Result<T>,
) -> Result<T> {
    if let Some(v) = *slot {
        return Ok(v);
    }
    let v = compute()?;
    *slot = Some(v);
    Ok(v)
}

fn target_of<'a, E: Ephemeris>(
    ctx: &SchedulingContext<'a, E>,
    ticket: TicketId,
) -> Result<&'a crate::catalog::TargetId> {
    ctx.catalog().target_of(ticket)
}

/// Number of genes whose target is not observable at their start time.
pub fn violated_schedule_count<E: Ephemeris>(
    genes: &[ScheduledObservation],
    ctx: &SchedulingContext<'_, E>,
) -> Result<usize> {
    let mut violated = 0;
    for gene in genes {
        let target = target_of(ctx, gene.ticket)?;
        if !ctx.ephemeris().is_observable(target, gene.start_jd)? {
            violated += 1;
        }
    }
    Ok(violated)
}

/// Fraction of genes whose target is observable at their start time, in `[0, 1]`.
pub fn visibility_ratio<E: Ephemeris>(
    genes: &[ScheduledObservation],
    ctx: &SchedulingContext<'_, E>,
) -> Result<f64> {
    if genes.is_empty() {
        return Ok(0.0);
    }
    let violated = violated_schedule_count(genes, ctx)?;
    Ok((genes.len() - violated) as f64 / genes.len() as f64)
}

/// Mean ephemeris altitude merit, each gene integrated over its own interval.
pub fn altitude_merit<E: Ephemeris>(
    genes: &[ScheduledObservation],
    ctx: &SchedulingContext<'_, E>,
) -> Result<f64> {
    if genes.is_empty() {
        return Ok(0.0);
    }
    let mut sum = 0.0;
    for gene in genes {
        let target = target_of(ctx, gene.ticket)?;
        sum += ctx
            .ephemeris()
            .altitude_merit(target, gene.start_jd, gene.end_jd())?;
    }
    Ok(sum / genes.len() as f64)
}

/// Account fairness: `1 / Σ_a |observed(a) − configured(a)| · configured(a)`.
///
/// `observed(a)` is the account's fraction of the total scheduled duration,
/// `configured(a)` its normalized registry share. A zero deviation yields
/// [`MAX_ACCOUNT_MERIT`].
pub fn account_merit<E: Ephemeris>(
    genes: &[ScheduledObservation],
    ctx: &SchedulingContext<'_, E>,
) -> Result<f64> {
    let total: f64 = genes.iter().map(|g| g.duration_s).sum();
    let mut per_account: HashMap<&str, f64> = HashMap::new();
    for gene in genes {
        let ticket = ctx
            .catalog()
            .ticket(gene.ticket)
            .ok_or_else(|| SchedError::Catalog(format!("unknown ticket {}", gene.ticket)))?;
        *per_account.entry(ticket.account.as_str()).or_insert(0.0) += gene.duration_s;
    }

    let accounts = ctx.accounts();
    let deviation: f64 = accounts
        .accounts()
        .map(|account| {
            let configured = accounts.configured_share(&account.id);
            let observed = if total > 0.0 {
                per_account.get(account.id.as_str()).copied().unwrap_or(0.0) / total
            } else {
                0.0
            };
            (observed - configured).abs() * configured
        })
        .sum();

    if deviation <= 0.0 {
        Ok(MAX_ACCOUNT_MERIT)
    } else {
        Ok(1.0 / deviation)
    }
}

/// Slew compactness: `1 / Σ separation(end of gene i, start of gene i+1)`.
///
/// Exactly `1` when the separations sum to zero (including single-gene
/// schedules).
pub fn distance_merit<E: Ephemeris>(
    genes: &[ScheduledObservation],
    ctx: &SchedulingContext<'_, E>,
) -> Result<f64> {
    let eph = ctx.ephemeris();
    let mut total = 0.0;
    for pair in genes.windows(2) {
        let from = eph.position(target_of(ctx, pair[0].ticket)?, pair[0].end_jd())?;
        let to = eph.position(target_of(ctx, pair[1].ticket)?, pair[1].start_jd)?;
        total += eph.angular_separation(from, to);
    }
    if total == 0.0 {
        Ok(1.0)
    } else {
        Ok(1.0 / total)
    }
}

/// Number of distinct targets observed.
pub fn diversity_target_merit<E: Ephemeris>(
    genes: &[ScheduledObservation],
    ctx: &SchedulingContext<'_, E>,
) -> Result<usize> {
    let mut targets = BTreeSet::new();
    for gene in genes {
        targets.insert(target_of(ctx, gene.ticket)?);
    }
    Ok(targets.len())
}

/// Catalog tickets that should appear in the window but do not.
///
/// A ticket should appear if it has quota left and its target is observable
/// at some point of the window.
pub fn unobserved_ticket_count<E: Ephemeris>(
    genes: &[ScheduledObservation],
    ctx: &SchedulingContext<'_, E>,
) -> Result<usize> {
    let scheduled: BTreeSet<TicketId> = genes.iter().map(|g| g.ticket).collect();
    let mut missing = 0;
    for ticket in ctx.catalog().tickets() {
        if scheduled.contains(&ticket.id) || ticket.remaining_quota() == 0 {
            continue;
        }
        if ctx
            .ephemeris()
            .is_observable_during(&ticket.target, ctx.jd_start(), ctx.jd_end())?
        {
            missing += 1;
        }
    }
    Ok(missing)
}

/// Number of genes that push a ticket's realized observation count above its quota.
pub fn violated_obs_num_count<E: Ephemeris>(
    genes: &[ScheduledObservation],
    ctx: &SchedulingContext<'_, E>,
) -> Result<usize> {
    let mut realized: HashMap<TicketId, u32> = HashMap::new();
    let mut violated = 0;
    for gene in genes {
        let ticket = ctx
            .catalog()
            .ticket(gene.ticket)
            .ok_or_else(|| SchedError::Catalog(format!("unknown ticket {}", gene.ticket)))?;
        let count = realized.entry(ticket.id).or_insert(ticket.completed);
        *count += 1;
        if *count > ticket.quota {
            violated += 1;
        }
    }
    Ok(violated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Account, AccountRegistry, Target, Ticket, TicketCatalog};
    use crate::ephemeris::{SkyPosition, StaticEphemeris};

    const JD0: f64 = 2_460_000.5;

    fn gene(ticket: TicketId, offset_s: f64, duration_s: f64) -> ScheduledObservation {
        ScheduledObservation::new(ticket, JD0 + offset_s / 86_400.0, duration_s)
    }

    fn fixture() -> (TicketCatalog, AccountRegistry, StaticEphemeris) {
        let catalog = TicketCatalog::new()
            .with_target(Target::new("a", "Alpha"))
            .with_target(Target::new("b", "Beta"))
            .with_target(Target::new("c", "Gamma"))
            .with_ticket(Ticket::new(1, "a", "acc1", 1))
            .with_ticket(Ticket::new(2, "b", "acc2", 2))
            .with_ticket(Ticket::new(3, "c", "acc2", 1));
        let reg = AccountRegistry::new([Account::new("acc1", 1.0), Account::new("acc2", 1.0)])
            .unwrap();
        let eph = StaticEphemeris::new()
            .with_target("a", SkyPosition::new(0.0, 0.0))
            .with_target("b", SkyPosition::new(10.0, 0.0))
            .with_target("c", SkyPosition::new(10.0, 0.0))
            .with_altitude("a", 0.2)
            .with_altitude("b", 0.6)
            .with_never_observable("c");
        (catalog, reg, eph)
    }

    #[test]
    fn test_visibility_ratio_and_violations() {
        let (c, r, e) = fixture();
        let ctx = SchedulingContext::new(&c, &r, &e, JD0, JD0 + 1.0 / 24.0, 60.0).unwrap();
        let genes = [gene(1, 0.0, 1200.0), gene(3, 1200.0, 1200.0), gene(2, 2400.0, 1200.0)];
        let ratio = visibility_ratio(&genes, &ctx).unwrap();
        assert!((ratio - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(violated_schedule_count(&genes, &ctx).unwrap(), 1);
    }

    #[test]
    fn test_altitude_mean() {
        let (c, r, e) = fixture();
        let ctx = SchedulingContext::new(&c, &r, &e, JD0, JD0 + 1.0 / 24.0, 60.0).unwrap();
        let genes = [gene(1, 0.0, 1800.0), gene(2, 1800.0, 1800.0)];
        assert!((altitude_merit(&genes, &ctx).unwrap() - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_account_merit() {
        let (c, r, e) = fixture();
        let ctx = SchedulingContext::new(&c, &r, &e, JD0, JD0 + 1.0 / 24.0, 60.0).unwrap();

        // Perfectly balanced: 50/50 split on two 50/50 accounts.
        let balanced = [gene(1, 0.0, 1800.0), gene(2, 1800.0, 1800.0)];
        assert_eq!(account_merit(&balanced, &ctx).unwrap(), MAX_ACCOUNT_MERIT);

        // All time on acc1: |1 - .5|*.5 + |0 - .5|*.5 = 0.5 → merit 2.
        let skewed = [gene(1, 0.0, 3600.0)];
        assert!((account_merit(&skewed, &ctx).unwrap() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_distance_merit() {
        let (c, r, e) = fixture();
        let ctx = SchedulingContext::new(&c, &r, &e, JD0, JD0 + 1.0 / 24.0, 60.0).unwrap();

        // a → b is a 10 degree slew.
        let genes = [gene(1, 0.0, 1800.0), gene(2, 1800.0, 1800.0)];
        assert!((distance_merit(&genes, &ctx).unwrap() - 0.1).abs() < 1e-9);

        // b and c share a position: zero slew is defined as merit 1.
        let still = [gene(2, 0.0, 1800.0), gene(3, 1800.0, 1800.0)];
        assert_eq!(distance_merit(&still, &ctx).unwrap(), 1.0);

        assert_eq!(distance_merit(&[gene(1, 0.0, 3600.0)], &ctx).unwrap(), 1.0);
    }

    #[test]
    fn test_distance_merit_propagates_ephemeris_error() {
        let (c, r, _) = fixture();
        let eph = StaticEphemeris::new()
            .with_target("a", SkyPosition::new(f64::NAN, 0.0))
            .with_target("b", SkyPosition::new(0.0, 0.0));
        let ctx = SchedulingContext::new(&c, &r, &eph, JD0, JD0 + 1.0 / 24.0, 60.0).unwrap();
        let genes = [gene(1, 0.0, 1800.0), gene(2, 1800.0, 1800.0)];
        assert!(matches!(
            distance_merit(&genes, &ctx),
            Err(SchedError::Ephemeris(_))
        ));
    }

    #[test]
    fn test_diversity_counts() {
        let (c, r, e) = fixture();
        let ctx = SchedulingContext::new(&c, &r, &e, JD0, JD0 + 1.0 / 24.0, 60.0).unwrap();
        let genes = [gene(1, 0.0, 1200.0), gene(2, 1200.0, 1200.0), gene(1, 2400.0, 1200.0)];
        assert_eq!(diversity_target_merit(&genes, &ctx).unwrap(), 2);
    }

    #[test]
    fn test_unobserved_tickets() {
        let (c, r, e) = fixture();
        let ctx = SchedulingContext::new(&c, &r, &e, JD0, JD0 + 1.0 / 24.0, 60.0).unwrap();
        // Ticket 2 is observable and missing; ticket 3's target never rises.
        let genes = [gene(1, 0.0, 3600.0)];
        assert_eq!(unobserved_ticket_count(&genes, &ctx).unwrap(), 1);
    }

    #[test]
    fn test_quota_violations() {
        let (c, r, e) = fixture();
        let ctx = SchedulingContext::new(&c, &r, &e, JD0, JD0 + 1.0 / 24.0, 60.0).unwrap();
        // Ticket 1 has quota 1: its second and third observations violate.
        let genes = [
            gene(1, 0.0, 900.0),
            gene(2, 900.0, 900.0),
            gene(1, 1800.0, 900.0),
            gene(1, 2700.0, 900.0),
        ];
        assert_eq!(violated_obs_num_count(&genes, &ctx).unwrap(), 2);
    }

    #[test]
    fn test_cached_computes_once() {
        let mut slot = None;
        let mut calls = 0;
        for _ in 0..3 {
            let v = cached(&mut slot, || {
                calls += 1;
                Ok(7usize)
            })
            .unwrap();
            assert_eq!(v, 7);
        }
        assert_eq!(calls, 1);
    }
}
