//! Ephemeris provider contract.
//!
//! All celestial mechanics (rise/set, altitude, positions) live outside the
//! engine. The GA only asks the four questions of [`Ephemeris`]; a site
//! integration implements the trait against its astronomy library.
//!
//! [`StaticEphemeris`] is a small in-memory provider with fixed positions
//! and explicit visibility windows, used by tests and benchmarks.

use std::collections::HashMap;

use crate::catalog::TargetId;
use crate::error::EphemerisError;

/// Sampling step used by the default [`Ephemeris::is_observable_during`] (days).
pub const VISIBILITY_SAMPLE_STEP: f64 = 5.0 / 1440.0;

/// Equatorial sky position in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SkyPosition {
    /// Right ascension (degrees).
    pub ra: f64,
    /// Declination (degrees).
    pub dec: f64,
}

impl SkyPosition {
    /// Creates a position from degrees.
    pub fn new(ra: f64, dec: f64) -> Self {
        Self { ra, dec }
    }

    /// Returns `true` if both coordinates are finite.
    pub fn is_finite(&self) -> bool {
        self.ra.is_finite() && self.dec.is_finite()
    }
}

/// Great-circle separation between two positions, in degrees.
///
/// Uses the Vincenty formula, which stays accurate for both tiny and
/// antipodal separations.
pub fn great_circle_separation(a: SkyPosition, b: SkyPosition) -> f64 {
    let (ra1, dec1) = (a.ra.to_radians(), a.dec.to_radians());
    let (ra2, dec2) = (b.ra.to_radians(), b.dec.to_radians());
    let d_ra = ra2 - ra1;

    let (sin_d1, cos_d1) = dec1.sin_cos();
    let (sin_d2, cos_d2) = dec2.sin_cos();
    let (sin_dra, cos_dra) = d_ra.sin_cos();

    let num1 = cos_d2 * sin_dra;
    let num2 = cos_d1 * sin_d2 - sin_d1 * cos_d2 * cos_dra;
    let den = sin_d1 * sin_d2 + cos_d1 * cos_d2 * cos_dra;

    num1.hypot(num2).atan2(den).to_degrees()
}

/// Astronomical queries consumed by the merit functions.
///
/// Implementations must be thread-safe: merits may be evaluated for many
/// schedules concurrently.
pub trait Ephemeris: Send + Sync {
    /// Whether the target can be observed at `jd`.
    fn is_observable(&self, target: &TargetId, jd: f64) -> Result<bool, EphemerisError>;

    /// Integrated altitude merit of the target over `[jd_start, jd_end]`.
    fn altitude_merit(
        &self,
        target: &TargetId,
        jd_start: f64,
        jd_end: f64,
    ) -> Result<f64, EphemerisError>;

    /// Sky position of the target at `jd`.
    fn position(&self, target: &TargetId, jd: f64) -> Result<SkyPosition, EphemerisError>;

    /// Angular separation between two positions, in degrees.
    fn angular_separation(&self, a: SkyPosition, b: SkyPosition) -> f64 {
        great_circle_separation(a, b)
    }

    /// Whether the target is observable at any time inside `[jd_start, jd_end]`.
    ///
    /// The default samples [`is_observable`](Self::is_observable) every
    /// [`VISIBILITY_SAMPLE_STEP`]; providers with analytic rise/set times
    /// should override it.
    fn is_observable_during(
        &self,
        target: &TargetId,
        jd_start: f64,
        jd_end: f64,
    ) -> Result<bool, EphemerisError> {
        let mut jd = jd_start;
        while jd < jd_end {
            if self.is_observable(target, jd)? {
                return Ok(true);
            }
            jd += VISIBILITY_SAMPLE_STEP;
        }
        self.is_observable(target, jd_end)
    }
}

/// Per-target data held by [`StaticEphemeris`].
#[derive(Debug, Clone)]
struct StaticTarget {
    position: SkyPosition,
    /// `None` means always observable.
    windows: Option<Vec<(f64, f64)>>,
    altitude: f64,
}

/// In-memory ephemeris with fixed positions and explicit visibility windows.
///
/// # Examples
///
/// ```
/// use u_obsched::ephemeris::{Ephemeris, SkyPosition, StaticEphemeris};
///
/// let eph = StaticEphemeris::new()
///     .with_target("M31", SkyPosition::new(10.68, 41.27))
///     .with_window("M31", 2_460_000.5, 2_460_000.7);
///
/// assert!(eph.is_observable(&"M31".to_string(), 2_460_000.6).unwrap());
/// assert!(!eph.is_observable(&"M31".to_string(), 2_460_000.8).unwrap());
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticEphemeris {
    targets: HashMap<TargetId, StaticTarget>,
}

impl StaticEphemeris {
    /// Creates an empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a target that is always observable with altitude merit 1.
    pub fn with_target(mut self, id: impl Into<TargetId>, position: SkyPosition) -> Self {
        self.targets.insert(
            id.into(),
            StaticTarget {
                position,
                windows: None,
                altitude: 1.0,
            },
        );
        self
    }

    /// Restricts a target's visibility to the given windows (may be called repeatedly).
    ///
    /// Unknown targets are ignored.
    pub fn with_window(mut self, id: &str, jd_start: f64, jd_end: f64) -> Self {
        if let Some(t) = self.targets.get_mut(id) {
            t.windows.get_or_insert_with(Vec::new).push((jd_start, jd_end));
        }
        self
    }

    /// Marks a target as never observable.
    pub fn with_never_observable(mut self, id: &str) -> Self {
        if let Some(t) = self.targets.get_mut(id) {
            t.windows = Some(Vec::new());
        }
        self
    }

    /// Sets the altitude merit reported for a target.
    pub fn with_altitude(mut self, id: &str, altitude: f64) -> Self {
        if let Some(t) = self.targets.get_mut(id) {
            t.altitude = altitude;
        }
        self
    }

    fn target(&self, id: &TargetId) -> Result<&StaticTarget, EphemerisError> {
        self.targets
            .get(id)
            .ok_or_else(|| EphemerisError::UnknownTarget(id.clone()))
    }
}

impl Ephemeris for StaticEphemeris {
    fn is_observable(&self, target: &TargetId, jd: f64) -> Result<bool, EphemerisError> {
        let t = self.target(target)?;
        Ok(match &t.windows {
            None => true,
            Some(windows) => windows.iter().any(|&(s, e)| jd >= s && jd < e),
        })
    }

    fn altitude_merit(
        &self,
        target: &TargetId,
        _jd_start: f64,
        _jd_end: f64,
    ) -> Result<f64, EphemerisError> {
        Ok(self.target(target)?.altitude)
    }

    fn position(&self, target: &TargetId, _jd: f64) -> Result<SkyPosition, EphemerisError> {
        let t = self.target(target)?;
        if !t.position.is_finite() {
            return Err(EphemerisError::InvalidPosition {
                target: target.clone(),
                ra: t.position.ra,
                dec: t.position.dec,
            });
        }
        Ok(t.position)
    }

    fn is_observable_during(
        &self,
        target: &TargetId,
        jd_start: f64,
        jd_end: f64,
    ) -> Result<bool, EphemerisError> {
        let t = self.target(target)?;
        Ok(match &t.windows {
            None => true,
            Some(windows) => windows.iter().any(|&(s, e)| s < jd_end && e > jd_start),
        })
    }
}
