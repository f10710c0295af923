//! Per-command motion parameters.
//!
//! A [`MoveSpec`] is the loose input bag a command hands over; a
//! [`MoveParams`] is the validated, immutable form a [`JointDrive`]
//! (crate::drive::JointDrive) actually runs. Contradictory fields are
//! rejected at construction, before any simulation step.

use serde::{Deserialize, Serialize};

use waldo_core::error::CommandError;
use waldo_core::types::MotionSign;

// ---------------------------------------------------------------------------
// MoveSpec
// ---------------------------------------------------------------------------

/// Raw per-command motion request for one joint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MoveSpec {
    /// Signed displacement along the joint's controlled axis.
    pub displacement: f32,
    /// Travel speed in axis units per second.
    pub speed: f32,
    /// Arrival slack; the joint counts as arrived within this distance.
    pub tolerance: f32,
    /// Safety valve: give up after this much simulated time.
    pub max_time: f32,
    /// Number of recent positions kept for stall detection.
    pub cache_size: usize,
}

impl MoveSpec {
    /// A spec with the default tolerance (1 mm), timeout (10 s), and stall
    /// window (10 samples).
    #[must_use]
    pub const fn new(displacement: f32, speed: f32) -> Self {
        Self {
            displacement,
            speed,
            tolerance: 1e-3,
            max_time: 10.0,
            cache_size: 10,
        }
    }

    #[must_use]
    pub const fn with_tolerance(mut self, tolerance: f32) -> Self {
        self.tolerance = tolerance;
        self
    }

    #[must_use]
    pub const fn with_max_time(mut self, max_time: f32) -> Self {
        self.max_time = max_time;
        self
    }

    #[must_use]
    pub const fn with_cache_size(mut self, cache_size: usize) -> Self {
        self.cache_size = cache_size;
        self
    }
}

// ---------------------------------------------------------------------------
// MoveParams
// ---------------------------------------------------------------------------

/// Validated, immutable motion parameters for one joint and one command.
///
/// `total_distance` is the displacement magnitude; the sign lives in
/// `direction` and is applied uniformly every step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveParams {
    total_distance: f32,
    speed: f32,
    tolerance: f32,
    max_time: f32,
    cache_size: usize,
    direction: MotionSign,
}

impl MoveParams {
    /// Validate a [`MoveSpec`] into runnable parameters.
    ///
    /// # Errors
    ///
    /// - `NonFiniteTarget` for a NaN/infinite displacement
    /// - `NonPositiveSpeed` for speed ≤ 0 or non-finite (a zero speed would
    ///   silently convert every command into a timeout)
    /// - `NegativeTolerance`, `NonPositiveMaxTime`
    /// - `CacheWindowTooSmall` for a stall window under 2 samples
    pub fn from_spec(spec: MoveSpec) -> Result<Self, CommandError> {
        if !spec.displacement.is_finite() {
            return Err(CommandError::NonFiniteTarget);
        }
        if !spec.speed.is_finite() || spec.speed <= 0.0 {
            return Err(CommandError::NonPositiveSpeed(spec.speed));
        }
        if !spec.tolerance.is_finite() || spec.tolerance < 0.0 {
            return Err(CommandError::NegativeTolerance(spec.tolerance));
        }
        if !spec.max_time.is_finite() || spec.max_time <= 0.0 {
            return Err(CommandError::NonPositiveMaxTime(spec.max_time));
        }
        if spec.cache_size < 2 {
            return Err(CommandError::CacheWindowTooSmall(spec.cache_size));
        }
        Ok(Self {
            total_distance: spec.displacement.abs(),
            speed: spec.speed,
            tolerance: spec.tolerance,
            max_time: spec.max_time,
            cache_size: spec.cache_size,
            direction: MotionSign::from_displacement(spec.displacement),
        })
    }

    #[must_use]
    pub const fn total_distance(&self) -> f32 {
        self.total_distance
    }

    #[must_use]
    pub const fn speed(&self) -> f32 {
        self.speed
    }

    #[must_use]
    pub const fn tolerance(&self) -> f32 {
        self.tolerance
    }

    #[must_use]
    pub const fn max_time(&self) -> f32 {
        self.max_time
    }

    #[must_use]
    pub const fn cache_size(&self) -> usize {
        self.cache_size
    }

    #[must_use]
    pub const fn direction(&self) -> MotionSign {
        self.direction
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_defaults() {
        let spec = MoveSpec::new(0.08, 0.25);
        assert!((spec.tolerance - 1e-3).abs() < f32::EPSILON);
        assert!((spec.max_time - 10.0).abs() < f32::EPSILON);
        assert_eq!(spec.cache_size, 10);
    }

    #[test]
    fn params_split_magnitude_and_sign() {
        let params = MoveParams::from_spec(MoveSpec::new(-0.3, 0.5)).unwrap();
        assert!((params.total_distance() - 0.3).abs() < f32::EPSILON);
        assert_eq!(params.direction(), MotionSign::Negative);
    }

    #[test]
    fn zero_displacement_is_valid_with_no_direction() {
        let params = MoveParams::from_spec(MoveSpec::new(0.0, 0.5)).unwrap();
        assert!(params.total_distance().abs() < f32::EPSILON);
        assert!(params.direction().is_none());
    }

    #[test]
    fn rejects_non_finite_displacement() {
        assert_eq!(
            MoveParams::from_spec(MoveSpec::new(f32::NAN, 0.5)),
            Err(CommandError::NonFiniteTarget)
        );
        assert!(MoveParams::from_spec(MoveSpec::new(f32::INFINITY, 0.5)).is_err());
    }

    #[test]
    fn rejects_zero_and_negative_speed() {
        assert_eq!(
            MoveParams::from_spec(MoveSpec::new(0.1, 0.0)),
            Err(CommandError::NonPositiveSpeed(0.0))
        );
        assert!(MoveParams::from_spec(MoveSpec::new(0.1, -1.0)).is_err());
    }

    #[test]
    fn rejects_negative_tolerance() {
        let spec = MoveSpec::new(0.1, 0.5).with_tolerance(-1e-3);
        assert_eq!(
            MoveParams::from_spec(spec),
            Err(CommandError::NegativeTolerance(-1e-3))
        );
    }

    #[test]
    fn rejects_degenerate_timeout_and_cache() {
        assert!(MoveParams::from_spec(MoveSpec::new(0.1, 0.5).with_max_time(0.0)).is_err());
        assert_eq!(
            MoveParams::from_spec(MoveSpec::new(0.1, 0.5).with_cache_size(1)),
            Err(CommandError::CacheWindowTooSmall(1))
        );
    }
}
