use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Stable identifiers
// ---------------------------------------------------------------------------

/// Stable identifier for a collider.
///
/// Assigned by the backend when the collider is created and never reused.
/// Keeps the contact registry independent of engine handle lifetimes and
/// gives deterministic ordering wherever colliders are iterated.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ColliderId(pub u64);

/// Stable identifier for a simulation object (a rigid body with metadata).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ObjectId(pub u64);

/// Stable identifier for a controlled joint.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct JointId(pub u64);

impl fmt::Display for ColliderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "collider#{}", self.0)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "object#{}", self.0)
    }
}

impl fmt::Display for JointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "joint#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// CompletionResult
// ---------------------------------------------------------------------------

/// Terminal record returned for every motion command.
///
/// This is the only channel by which failure reasons propagate to the caller;
/// nothing throws across the controller boundary. Created once per command
/// and never partially filled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionResult {
    pub success: bool,
    /// Human-readable reason on failure; empty on success.
    pub error_message: String,
}

impl CompletionResult {
    /// Successful completion.
    #[must_use]
    pub const fn ok() -> Self {
        Self {
            success: true,
            error_message: String::new(),
        }
    }

    /// Failed completion with a human-readable reason.
    #[must_use]
    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error_message: message.into(),
        }
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.success
    }
}

// ---------------------------------------------------------------------------
// CoordinateSpace
// ---------------------------------------------------------------------------

/// Frame in which a command target is expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinateSpace {
    /// World frame.
    World,
    /// Frame of the arm's base link.
    #[default]
    ArmBase,
    /// Offset relative to the current wrist pose.
    Wrist,
}

// ---------------------------------------------------------------------------
// MotionSign
// ---------------------------------------------------------------------------

/// Direction of a one-axis motion, computed once from the sign of the
/// requested displacement and applied uniformly to every joint allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MotionSign {
    Negative,
    /// No motion requested.
    #[default]
    None,
    Positive,
}

impl MotionSign {
    /// Sign of `displacement`. Zero and NaN map to `None`.
    #[must_use]
    pub fn from_displacement(displacement: f32) -> Self {
        if displacement > 0.0 {
            Self::Positive
        } else if displacement < 0.0 {
            Self::Negative
        } else {
            Self::None
        }
    }

    /// The sign as a multiplier: -1.0, 0.0, or +1.0.
    #[must_use]
    pub const fn as_f32(self) -> f32 {
        match self {
            Self::Negative => -1.0,
            Self::None => 0.0,
            Self::Positive => 1.0,
        }
    }

    /// Returns `true` if no motion is requested.
    #[must_use]
    pub const fn is_none(self) -> bool {
        matches!(self, Self::None)
    }
}

// ---------------------------------------------------------------------------
// StepMode
// ---------------------------------------------------------------------------

/// How a command's simulation steps are dispensed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepMode {
    /// One step per caller tick; the caller observes motion frame by frame
    /// and may cancel between steps.
    Live,
    /// All steps executed back-to-back without yielding. The contact
    /// registry is still re-queried after every internal step.
    #[default]
    Unrolled,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_ordered_and_displayable() {
        let a = ColliderId(1);
        let b = ColliderId(2);
        assert!(a < b);
        assert_eq!(a.to_string(), "collider#1");
        assert_eq!(ObjectId(7).to_string(), "object#7");
        assert_eq!(JointId(3).to_string(), "joint#3");
    }

    #[test]
    fn completion_result_ok() {
        let r = CompletionResult::ok();
        assert!(r.is_success());
        assert!(r.error_message.is_empty());
    }

    #[test]
    fn completion_result_fail() {
        let r = CompletionResult::fail("arm collided with CounterTop");
        assert!(!r.is_success());
        assert_eq!(r.error_message, "arm collided with CounterTop");
    }

    #[test]
    fn motion_sign_from_displacement() {
        assert_eq!(MotionSign::from_displacement(0.08), MotionSign::Positive);
        assert_eq!(MotionSign::from_displacement(-0.3), MotionSign::Negative);
        assert_eq!(MotionSign::from_displacement(0.0), MotionSign::None);
        assert_eq!(MotionSign::from_displacement(f32::NAN), MotionSign::None);
    }

    #[test]
    fn motion_sign_multiplier() {
        assert!((MotionSign::Positive.as_f32() - 1.0).abs() < f32::EPSILON);
        assert!((MotionSign::Negative.as_f32() + 1.0).abs() < f32::EPSILON);
        assert!(MotionSign::None.as_f32().abs() < f32::EPSILON);
        assert!(MotionSign::None.is_none());
    }

    #[test]
    fn coordinate_space_default_is_arm_base() {
        assert_eq!(CoordinateSpace::default(), CoordinateSpace::ArmBase);
    }

    #[test]
    fn step_mode_default_is_unrolled() {
        assert_eq!(StepMode::default(), StepMode::Unrolled);
    }
}
