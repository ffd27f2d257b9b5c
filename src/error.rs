//! Error types for the scheduling engine.

use thiserror::Error;

/// Result type for scheduling operations.
pub type Result<T> = std::result::Result<T, SchedError>;

/// Errors raised by the external ephemeris provider.
///
/// The engine never inspects the message; it is propagated verbatim
/// inside [`SchedError::Ephemeris`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EphemerisError {
    /// The provider knows nothing about the requested target.
    #[error("unknown target: {0}")]
    UnknownTarget(String),

    /// A computed position is not a finite number.
    #[error("invalid position for target {target}: ra={ra}, dec={dec}")]
    InvalidPosition {
        /// Target identifier.
        target: String,
        /// Right ascension in degrees.
        ra: f64,
        /// Declination in degrees.
        dec: f64,
    },

    /// Any other provider failure.
    #[error("ephemeris failure: {0}")]
    Provider(String),
}

/// Errors that can occur while building or evolving schedules.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchedError {
    /// Invalid run or GA configuration (window, durations, rates, cut points).
    #[error("configuration error: {0}")]
    Config(String),

    /// The catalog or account registry cannot support the requested operation.
    #[error("catalog error: {0}")]
    Catalog(String),

    /// A duration delta could not be absorbed by any gene of the schedule.
    #[error("infeasible schedule: cannot absorb {delta_s:.3}s starting at gene {gene} of {genes}")]
    InfeasibleSchedule {
        /// Index where the search started.
        gene: usize,
        /// Number of genes in the schedule.
        genes: usize,
        /// Delta that could not be placed, in seconds.
        delta_s: f64,
    },

    /// Failure reported by the ephemeris provider.
    #[error(transparent)]
    Ephemeris(#[from] EphemerisError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ephemeris_error_is_transparent() {
        let err: SchedError = EphemerisError::UnknownTarget("M31".into()).into();
        assert_eq!(err.to_string(), "unknown target: M31");
    }

    #[test]
    fn test_infeasible_message() {
        let err = SchedError::InfeasibleSchedule {
            gene: 0,
            genes: 1,
            delta_s: -3100.0,
        };
        assert!(err.to_string().contains("-3100.000s"));
    }
}
