//! Per-command parameter structs.
//!
//! Each command is a plain value constructed by the caller, carried across
//! the controller boundary, and validated there before any drive is touched.

use nalgebra::{Point3, Vector3};

use waldo_core::types::{CoordinateSpace, StepMode};

// ---------------------------------------------------------------------------
// MoveArmTarget
// ---------------------------------------------------------------------------

/// Move the wrist toward a point.
#[derive(Debug, Clone, PartialEq)]
pub struct MoveArmTarget {
    /// Target point, interpreted in `space`.
    pub target: Point3<f32>,
    /// Travel speed in units per second.
    pub speed: f32,
    pub space: CoordinateSpace,
    /// Clamp an unreachable target into the workspace instead of rejecting.
    pub restrict_target: bool,
    pub step_mode: StepMode,
    /// Restore the starting pose before reporting a failure.
    pub return_to_start_on_failure: bool,
}

impl MoveArmTarget {
    #[must_use]
    pub fn new(target: Point3<f32>, speed: f32) -> Self {
        Self {
            target,
            speed,
            space: CoordinateSpace::default(),
            restrict_target: false,
            step_mode: StepMode::default(),
            return_to_start_on_failure: false,
        }
    }

    #[must_use]
    pub const fn with_space(mut self, space: CoordinateSpace) -> Self {
        self.space = space;
        self
    }

    #[must_use]
    pub const fn with_restrict_target(mut self, restrict: bool) -> Self {
        self.restrict_target = restrict;
        self
    }

    #[must_use]
    pub const fn with_step_mode(mut self, mode: StepMode) -> Self {
        self.step_mode = mode;
        self
    }

    #[must_use]
    pub const fn with_return_to_start(mut self, enabled: bool) -> Self {
        self.return_to_start_on_failure = enabled;
        self
    }
}

// ---------------------------------------------------------------------------
// MoveBase
// ---------------------------------------------------------------------------

/// Raise or lower the base lift joint.
#[derive(Debug, Clone, PartialEq)]
pub struct MoveBase {
    /// Target height: absolute, or a fraction of the lift range when
    /// `normalized`.
    pub height: f32,
    pub speed: f32,
    pub normalized: bool,
    pub step_mode: StepMode,
    pub return_to_start_on_failure: bool,
}

impl MoveBase {
    #[must_use]
    pub fn new(height: f32, speed: f32) -> Self {
        Self {
            height,
            speed,
            normalized: false,
            step_mode: StepMode::default(),
            return_to_start_on_failure: false,
        }
    }

    #[must_use]
    pub const fn normalized(mut self) -> Self {
        self.normalized = true;
        self
    }

    #[must_use]
    pub const fn with_step_mode(mut self, mode: StepMode) -> Self {
        self.step_mode = mode;
        self
    }

    #[must_use]
    pub const fn with_return_to_start(mut self, enabled: bool) -> Self {
        self.return_to_start_on_failure = enabled;
        self
    }
}

// ---------------------------------------------------------------------------
// RotateWrist / RotateElbow
// ---------------------------------------------------------------------------

/// Rotate the wrist about its roll axis.
#[derive(Debug, Clone, PartialEq)]
pub struct RotateWrist {
    /// Rotation axis; must be non-zero and parallel to the wrist roll axis
    /// (+Z in the arm frame).
    pub axis: Vector3<f32>,
    /// Signed rotation in degrees about `axis`.
    pub degrees: f32,
    pub speed_degrees: f32,
    pub step_mode: StepMode,
}

impl RotateWrist {
    #[must_use]
    pub fn new(degrees: f32, speed_degrees: f32) -> Self {
        Self {
            axis: Vector3::z(),
            degrees,
            speed_degrees,
            step_mode: StepMode::default(),
        }
    }

    #[must_use]
    pub const fn about(mut self, axis: Vector3<f32>) -> Self {
        self.axis = axis;
        self
    }

    #[must_use]
    pub const fn with_step_mode(mut self, mode: StepMode) -> Self {
        self.step_mode = mode;
        self
    }
}

/// Rotate the elbow joint, on arms that have one.
#[derive(Debug, Clone, PartialEq)]
pub struct RotateElbow {
    pub degrees: f32,
    pub speed_degrees: f32,
    pub step_mode: StepMode,
}

impl RotateElbow {
    #[must_use]
    pub fn new(degrees: f32, speed_degrees: f32) -> Self {
        Self {
            degrees,
            speed_degrees,
            step_mode: StepMode::default(),
        }
    }

    #[must_use]
    pub const fn with_step_mode(mut self, mode: StepMode) -> Self {
        self.step_mode = mode;
        self
    }
}

// ---------------------------------------------------------------------------
// Pickup
// ---------------------------------------------------------------------------

/// Grasp the nearest pickupable object inside the magnet sphere.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pickup {
    /// Magnet sphere radius around the wrist.
    pub radius: f32,
}

impl Pickup {
    #[must_use]
    pub const fn new(radius: f32) -> Self {
        Self { radius }
    }
}

impl Default for Pickup {
    fn default() -> Self {
        Self { radius: 0.12 }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn move_arm_target_builder() {
        let cmd = MoveArmTarget::new(Point3::new(0.0, 0.1, 0.3), 0.25)
            .with_space(CoordinateSpace::World)
            .with_restrict_target(true)
            .with_return_to_start(true);
        assert_eq!(cmd.space, CoordinateSpace::World);
        assert!(cmd.restrict_target);
        assert!(cmd.return_to_start_on_failure);
        assert_eq!(cmd.step_mode, StepMode::Unrolled);
    }

    #[test]
    fn rotate_wrist_defaults_to_roll_axis() {
        let cmd = RotateWrist::new(90.0, 45.0);
        assert_eq!(cmd.axis, Vector3::z());
    }

    #[test]
    fn pickup_default_radius() {
        let cmd = Pickup::default();
        assert!((cmd.radius - 0.12).abs() < f32::EPSILON);
    }
}
