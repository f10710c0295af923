//! The closed set of arm embodiments.
//!
//! Embodiment-specific code only supplies the joint roster and the extension
//! allocation; the shared step-driver logic in
//! [`controller`](crate::controller) is identical for every variant.

use waldo_core::error::CommandError;
use waldo_core::types::JointId;
use waldo_motion::allocation::proportional_split;

// ---------------------------------------------------------------------------
// ArmKind
// ---------------------------------------------------------------------------

/// Which robot embodiment an arm is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmKind {
    /// Jointed arm with a controllable elbow.
    Articulated,
    /// Telescoping arm (no elbow); extension is shared across the
    /// telescope segments.
    Stretch,
}

// ---------------------------------------------------------------------------
// ExtendJoint
// ---------------------------------------------------------------------------

/// One joint participating in linear extension.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtendJoint {
    pub id: JointId,
    /// Upper travel limit; this joint's share of the total reach.
    pub upper_limit: f32,
}

impl ExtendJoint {
    #[must_use]
    pub const fn new(id: JointId, upper_limit: f32) -> Self {
        Self { id, upper_limit }
    }
}

// ---------------------------------------------------------------------------
// Embodiment
// ---------------------------------------------------------------------------

/// Joint roster and allocation policy of one arm variant.
pub trait Embodiment {
    fn kind(&self) -> ArmKind;

    /// Extend joints, base-most first.
    fn extend_joints(&self) -> &[ExtendJoint];

    /// The vertical lift joint.
    fn base_joint(&self) -> JointId;

    /// The wrist roll joint.
    fn wrist_joint(&self) -> JointId;

    /// The elbow joint, on embodiments that have one.
    fn elbow_joint(&self) -> Option<JointId> {
        None
    }

    /// Split an extension displacement across the extend joints.
    ///
    /// The default is the proportional split over upper limits; a variant
    /// with different mechanics overrides this.
    fn allocate_extension(&self, displacement: f32) -> Result<Vec<f32>, CommandError> {
        let limits: Vec<f32> = self.extend_joints().iter().map(|j| j.upper_limit).collect();
        proportional_split(displacement, &limits)
    }

    /// Total reach along the extend axis.
    fn total_extension(&self) -> f32 {
        self.extend_joints().iter().map(|j| j.upper_limit).sum()
    }
}

// ---------------------------------------------------------------------------
// StretchArm
// ---------------------------------------------------------------------------

/// Telescoping arm: a stack of prismatic segments, a lift, and a wrist.
#[derive(Debug, Clone)]
pub struct StretchArm {
    base: JointId,
    wrist: JointId,
    extend: Vec<ExtendJoint>,
}

impl StretchArm {
    #[must_use]
    pub const fn new(base: JointId, wrist: JointId, extend: Vec<ExtendJoint>) -> Self {
        Self {
            base,
            wrist,
            extend,
        }
    }
}

impl Embodiment for StretchArm {
    fn kind(&self) -> ArmKind {
        ArmKind::Stretch
    }

    fn extend_joints(&self) -> &[ExtendJoint] {
        &self.extend
    }

    fn base_joint(&self) -> JointId {
        self.base
    }

    fn wrist_joint(&self) -> JointId {
        self.wrist
    }
}

// ---------------------------------------------------------------------------
// ArticulatedArm
// ---------------------------------------------------------------------------

/// Jointed arm with an elbow in addition to the extension stack.
#[derive(Debug, Clone)]
pub struct ArticulatedArm {
    base: JointId,
    wrist: JointId,
    elbow: JointId,
    extend: Vec<ExtendJoint>,
}

impl ArticulatedArm {
    #[must_use]
    pub const fn new(
        base: JointId,
        wrist: JointId,
        elbow: JointId,
        extend: Vec<ExtendJoint>,
    ) -> Self {
        Self {
            base,
            wrist,
            elbow,
            extend,
        }
    }
}

impl Embodiment for ArticulatedArm {
    fn kind(&self) -> ArmKind {
        ArmKind::Articulated
    }

    fn extend_joints(&self) -> &[ExtendJoint] {
        &self.extend
    }

    fn base_joint(&self) -> JointId {
        self.base
    }

    fn wrist_joint(&self) -> JointId {
        self.wrist
    }

    fn elbow_joint(&self) -> Option<JointId> {
        Some(self.elbow)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn stretch() -> StretchArm {
        StretchArm::new(
            JointId(0),
            JointId(5),
            vec![
                ExtendJoint::new(JointId(1), 0.1),
                ExtendJoint::new(JointId(2), 0.1),
                ExtendJoint::new(JointId(3), 0.1),
                ExtendJoint::new(JointId(4), 0.1),
            ],
        )
    }

    #[test]
    fn stretch_roster() {
        let arm = stretch();
        assert_eq!(arm.kind(), ArmKind::Stretch);
        assert_eq!(arm.extend_joints().len(), 4);
        assert_eq!(arm.elbow_joint(), None);
        assert_relative_eq!(arm.total_extension(), 0.4, epsilon = 1e-6);
    }

    #[test]
    fn stretch_allocates_proportionally() {
        let alloc = stretch().allocate_extension(0.08).unwrap();
        for share in alloc {
            assert_relative_eq!(share, 0.02, epsilon = 1e-6);
        }
    }

    #[test]
    fn articulated_has_an_elbow() {
        let arm = ArticulatedArm::new(
            JointId(0),
            JointId(3),
            JointId(2),
            vec![ExtendJoint::new(JointId(1), 0.3)],
        );
        assert_eq!(arm.kind(), ArmKind::Articulated);
        assert_eq!(arm.elbow_joint(), Some(JointId(2)));
    }
}
