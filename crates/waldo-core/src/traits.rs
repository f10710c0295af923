//! Boundary traits between the arm-motion core and the physics backend.
//!
//! The core never subscribes to engine callbacks. A backend implements these
//! traits and the step driver polls them at fixed points in the step, so the
//! same registry/solver logic runs under any physics engine (or under the
//! scripted mock in `waldo-test-utils`).

use std::collections::{BTreeMap, BTreeSet};

use nalgebra::{Isometry3, Point3};

use crate::types::{ColliderId, JointId, ObjectId};

// ---------------------------------------------------------------------------
// PhysicsWorld
// ---------------------------------------------------------------------------

/// Fixed-timestep physics stepping and single-axis joint access.
///
/// A joint's "position" is its scalar coordinate along the one axis it
/// controls: meters for prismatic joints, degrees for revolute ones.
pub trait PhysicsWorld {
    /// Advance the physics world by one fixed step.
    fn advance_physics(&mut self, dt: f32);

    /// Current realized coordinate of `joint` along its controlled axis.
    fn joint_position(&self, joint: JointId) -> f32;

    /// Command `joint` toward `position` for the next physics step.
    fn set_joint_target(&mut self, joint: JointId, position: f32);

    /// Pose of the arm's base link in the world frame.
    fn base_pose(&self) -> Isometry3<f32>;

    /// Pose of the wrist (end link) in the world frame.
    fn wrist_pose(&self) -> Isometry3<f32>;
}

// ---------------------------------------------------------------------------
// CollisionFeed
// ---------------------------------------------------------------------------

/// Sensor-overlap events resolved by the most recent physics step.
///
/// Both methods drain: a pair is reported exactly once, on the step its
/// overlap began or ended. Pairs are unordered; the contact registry decides
/// which side is one of its probes.
pub trait CollisionFeed {
    fn overlaps_beginning_this_step(&mut self) -> Vec<(ColliderId, ColliderId)>;

    fn overlaps_ending_this_step(&mut self) -> Vec<(ColliderId, ColliderId)>;
}

// ---------------------------------------------------------------------------
// SceneQuery
// ---------------------------------------------------------------------------

/// Read-only object metadata used by the collision classifier.
///
/// All queries are pure; a collider with no discoverable owner returns `None`
/// from [`owner_of`](Self::owner_of) and the classifier fails open.
pub trait SceneQuery {
    /// Nearest owning object of `collider`, if any.
    fn owner_of(&self, collider: ColliderId) -> Option<ObjectId>;

    /// Parent object in the rigid hierarchy, if any.
    fn parent_of(&self, object: ObjectId) -> Option<ObjectId>;

    /// Whether `object` is part of the agent's own body.
    fn is_agent_body(&self, object: ObjectId) -> bool;

    /// Whether `object` is flagged immovable.
    fn is_immovable(&self, object: ObjectId) -> bool;

    /// Whether `object` can be picked up.
    fn is_pickupable(&self, object: ObjectId) -> bool;

    /// Mass of `object` in kilograms.
    fn mass_of(&self, object: ObjectId) -> f32;

    /// Whether `collider` is tagged as static world structure (walls,
    /// floors) rather than belonging to a sim object.
    fn is_structure(&self, collider: ColliderId) -> bool;

    /// Human-readable name of `object` for error messages.
    fn display_name(&self, object: ObjectId) -> String;

    /// Human-readable name of a structure collider for error messages.
    fn structure_name(&self, collider: ColliderId) -> String;
}

// ---------------------------------------------------------------------------
// ShapeQuery
// ---------------------------------------------------------------------------

/// Volume overlap queries, used for magnet-sphere pickup detection.
pub trait ShapeQuery {
    /// All colliders intersecting the sphere at `center` with `radius`.
    fn overlap_sphere(&self, center: Point3<f32>, radius: f32) -> Vec<ColliderId>;
}

// ---------------------------------------------------------------------------
// GraspProvider
// ---------------------------------------------------------------------------

/// Exposes the set of currently grasped objects and their colliders.
pub trait GraspProvider {
    fn held_objects(&self) -> &BTreeMap<ObjectId, BTreeSet<ColliderId>>;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
