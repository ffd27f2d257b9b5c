//! Observing plan output.
//!
//! A [`Plan`] is the externally visible form of a [`Schedule`]: one entry
//! per observation carrying the ticket, the target name, the UTC start
//! time and the duration. Its [`Display`](std::fmt::Display) output has one
//! line per entry:
//!
//! ```text
//! <ticketId> <targetName> <startISO8601> <durationSeconds>
//! ```

use std::fmt;

use crate::catalog::TicketId;
use crate::context::SchedulingContext;
use crate::ephemeris::Ephemeris;
use crate::error::{Result, SchedError};
use crate::ga::Schedule;
use crate::time::jd_to_iso8601;

/// One scheduled observation.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PlanEntry {
    /// Ticket being observed.
    pub ticket: TicketId,
    /// Display name of the ticket's target.
    pub target_name: String,
    /// Start time as a Julian Date.
    pub start_jd: f64,
    /// Start time as an ISO 8601 UTC timestamp.
    pub start_utc: String,
    /// Duration in seconds.
    pub duration_s: f64,
}

/// An ordered observing plan.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Plan {
    entries: Vec<PlanEntry>,
}

impl Plan {
    /// Builds the plan for `schedule`.
    ///
    /// # Errors
    ///
    /// - [`SchedError::Catalog`] if a gene's ticket or target is unknown.
    /// - [`SchedError::Config`] if a start time cannot be expressed as a
    ///   calendar date.
    pub fn from_schedule<E: Ephemeris>(
        schedule: &Schedule,
        ctx: &SchedulingContext<'_, E>,
    ) -> Result<Self> {
        let catalog = ctx.catalog();
        let entries = schedule
            .genes()
            .iter()
            .map(|gene| {
                let target_id = catalog.target_of(gene.ticket)?;
                let target = catalog.target(target_id).ok_or_else(|| {
                    SchedError::Catalog(format!(
                        "ticket {} references unknown target {target_id}",
                        gene.ticket
                    ))
                })?;
                let start_utc = jd_to_iso8601(gene.start_jd).ok_or_else(|| {
                    SchedError::Config(format!("JD {} is out of calendar range", gene.start_jd))
                })?;
                Ok(PlanEntry {
                    ticket: gene.ticket,
                    target_name: target.name.clone(),
                    start_jd: gene.start_jd,
                    start_utc,
                    duration_s: gene.duration_s,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { entries })
    }

    /// Entries in start-time order.
    pub fn entries(&self) -> &[PlanEntry] {
        &self.entries
    }

    /// `(ticket, start_jd, duration_s)` triples.
    pub fn triples(&self) -> Vec<(TicketId, f64, f64)> {
        self.entries
            .iter()
            .map(|e| (e.ticket, e.start_jd, e.duration_s))
            .collect()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the plan has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for PlanEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {:.0}",
            self.ticket, self.target_name, self.start_utc, self.duration_s
        )
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            writeln!(f, "{entry}")?;
        }
        Ok(())
    }
}
