//! Schedule gene: one timed observation.

use crate::catalog::TicketId;
use crate::time::seconds_to_days;

/// A single observation slot in a schedule.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScheduledObservation {
    /// Ticket being observed (back-reference into the catalog).
    pub ticket: TicketId,
    /// Start time (JD).
    pub start_jd: f64,
    /// Duration in seconds.
    pub duration_s: f64,
}

impl ScheduledObservation {
    /// Creates a gene.
    pub fn new(ticket: TicketId, start_jd: f64, duration_s: f64) -> Self {
        Self {
            ticket,
            start_jd,
            duration_s,
        }
    }

    /// End time (JD, exclusive).
    #[inline]
    pub fn end_jd(&self) -> f64 {
        self.start_jd + seconds_to_days(self.duration_s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_end_jd() {
        let g = ScheduledObservation::new(1, 2_460_000.5, 43_200.0);
        assert!((g.end_jd() - 2_460_001.0).abs() < 1e-9);
    }
}
