//! Read-only run context.
//!
//! A [`SchedulingContext`] bundles everything a schedule needs to be built
//! and scored: the catalog, the account registry, the ephemeris provider,
//! the observing window, and the minimum observation duration. It borrows
//! all external data, so it (and every schedule scored against it) cannot
//! outlive the loaded catalog.

use crate::catalog::{AccountRegistry, TicketCatalog};
use crate::ephemeris::Ephemeris;
use crate::error::{Result, SchedError};
use crate::time::jd_span_seconds;

/// Everything shared by the schedules of one run.
#[derive(Debug)]
pub struct SchedulingContext<'a, E: Ephemeris> {
    catalog: &'a TicketCatalog,
    accounts: &'a AccountRegistry,
    ephemeris: &'a E,
    jd_start: f64,
    jd_end: f64,
    min_obs_duration: f64,
}

impl<E: Ephemeris> Clone for SchedulingContext<'_, E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E: Ephemeris> Copy for SchedulingContext<'_, E> {}

impl<'a, E: Ephemeris> SchedulingContext<'a, E> {
    /// Builds and validates a context.
    ///
    /// # Errors
    ///
    /// - [`SchedError::Config`] if the window is empty or not finite, or if
    ///   `min_obs_duration` (seconds) is not positive or does not fit the window.
    /// - [`SchedError::Catalog`] if a ticket references an unknown target or account.
    pub fn new(
        catalog: &'a TicketCatalog,
        accounts: &'a AccountRegistry,
        ephemeris: &'a E,
        jd_start: f64,
        jd_end: f64,
        min_obs_duration: f64,
    ) -> Result<Self> {
        if !jd_start.is_finite() || !jd_end.is_finite() || jd_end <= jd_start {
            return Err(SchedError::Config(format!(
                "window end ({jd_end}) must be after window start ({jd_start})"
            )));
        }
        if !(min_obs_duration > 0.0) {
            return Err(SchedError::Config(format!(
                "min_obs_duration must be positive, got {min_obs_duration}"
            )));
        }
        let window_s = jd_span_seconds(jd_start, jd_end);
        if min_obs_duration >= window_s {
            return Err(SchedError::Config(format!(
                "min_obs_duration ({min_obs_duration}s) does not fit the {window_s}s window"
            )));
        }

        catalog.validate()?;
        for ticket in catalog.tickets() {
            if !accounts.contains(&ticket.account) {
                return Err(SchedError::Catalog(format!(
                    "ticket {} belongs to unknown account {}",
                    ticket.id, ticket.account
                )));
            }
        }

        Ok(Self {
            catalog,
            accounts,
            ephemeris,
            jd_start,
            jd_end,
            min_obs_duration,
        })
    }

    /// Ticket catalog.
    pub fn catalog(&self) -> &'a TicketCatalog {
        self.catalog
    }

    /// Account registry.
    pub fn accounts(&self) -> &'a AccountRegistry {
        self.accounts
    }

    /// Ephemeris provider.
    pub fn ephemeris(&self) -> &'a E {
        self.ephemeris
    }

    /// Window start (JD).
    pub fn jd_start(&self) -> f64 {
        self.jd_start
    }

    /// Window end (JD, exclusive).
    pub fn jd_end(&self) -> f64 {
        self.jd_end
    }

    /// Window length in seconds.
    pub fn window_seconds(&self) -> f64 {
        jd_span_seconds(self.jd_start, self.jd_end)
    }

    /// Minimum observation duration in seconds.
    pub fn min_obs_duration(&self) -> f64 {
        self.min_obs_duration
    }
}
