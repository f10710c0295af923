//! A deterministic in-memory world implementing the core boundary traits.
//!
//! Joints realize their commanded targets exactly (unless pinned), and
//! overlap begin/end events are scripted against the physics step index, so
//! collision scenarios replay identically in live and unrolled stepping.

use std::collections::BTreeMap;

use nalgebra::{Isometry3, Point3, Translation3, UnitQuaternion};

use waldo_core::traits::{CollisionFeed, PhysicsWorld, SceneQuery, ShapeQuery};
use waldo_core::types::{ColliderId, JointId, ObjectId};

// ---------------------------------------------------------------------------
// Metadata records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
struct ObjectMeta {
    name: String,
    parent: Option<ObjectId>,
    agent_body: bool,
    immovable: bool,
    pickupable: bool,
    mass: f32,
}

#[derive(Debug, Clone, Default)]
struct ColliderMeta {
    owner: Option<ObjectId>,
    structure: Option<String>,
}

// ---------------------------------------------------------------------------
// ScriptedWorld
// ---------------------------------------------------------------------------

/// Mock implementation of `PhysicsWorld + CollisionFeed + SceneQuery +
/// ShapeQuery` with scripted sensor events.
#[derive(Debug, Default)]
pub struct ScriptedWorld {
    step_count: u32,
    joints: BTreeMap<JointId, f32>,
    /// Realized positions are clamped to at most this value (contact force
    /// below sensing resolution).
    pins: BTreeMap<JointId, f32>,
    extend_joints: Vec<JointId>,
    base_joint: Option<JointId>,
    base_pose: Isometry3<f32>,

    next_object: u64,
    next_collider: u64,
    objects: BTreeMap<ObjectId, ObjectMeta>,
    colliders: BTreeMap<ColliderId, ColliderMeta>,

    scripted_begins: BTreeMap<u32, Vec<(ColliderId, ColliderId)>>,
    scripted_ends: BTreeMap<u32, Vec<(ColliderId, ColliderId)>>,
    pending_begins: Vec<(ColliderId, ColliderId)>,
    pending_ends: Vec<(ColliderId, ColliderId)>,

    sphere_hits: Vec<ColliderId>,
}

impl ScriptedWorld {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // -- scene authoring --

    /// Register a joint at position 0.
    pub fn add_joint(&mut self, joint: JointId) {
        self.joints.entry(joint).or_insert(0.0);
    }

    /// Register a joint that participates in wrist extension (+Z).
    pub fn add_extend_joint(&mut self, joint: JointId) {
        self.add_joint(joint);
        self.extend_joints.push(joint);
    }

    /// Register the base lift joint (+Y).
    pub fn set_base_joint(&mut self, joint: JointId) {
        self.add_joint(joint);
        self.base_joint = Some(joint);
    }

    /// Clamp a joint's realized position to at most `max`.
    pub fn pin_joint(&mut self, joint: JointId, max: f32) {
        self.pins.insert(joint, max);
    }

    pub fn set_base_pose(&mut self, pose: Isometry3<f32>) {
        self.base_pose = pose;
    }

    /// Add a sim object; returns its stable ID.
    pub fn add_object(&mut self, name: &str) -> ObjectId {
        let id = ObjectId(self.next_object);
        self.next_object += 1;
        self.objects.insert(
            id,
            ObjectMeta {
                name: name.to_owned(),
                ..ObjectMeta::default()
            },
        );
        id
    }

    pub fn set_parent(&mut self, object: ObjectId, parent: ObjectId) {
        if let Some(meta) = self.objects.get_mut(&object) {
            meta.parent = Some(parent);
        }
    }

    pub fn mark_agent_body(&mut self, object: ObjectId) {
        if let Some(meta) = self.objects.get_mut(&object) {
            meta.agent_body = true;
        }
    }

    pub fn mark_immovable(&mut self, object: ObjectId) {
        if let Some(meta) = self.objects.get_mut(&object) {
            meta.immovable = true;
        }
    }

    pub fn mark_pickupable(&mut self, object: ObjectId, mass: f32) {
        if let Some(meta) = self.objects.get_mut(&object) {
            meta.pickupable = true;
            meta.mass = mass;
        }
    }

    /// Add a collider owned by `object`; returns its stable ID.
    pub fn add_collider(&mut self, object: ObjectId) -> ColliderId {
        self.insert_collider(ColliderMeta {
            owner: Some(object),
            structure: None,
        })
    }

    /// Add an ownerless collider tagged as static world structure.
    pub fn add_structure_collider(&mut self, name: &str) -> ColliderId {
        self.insert_collider(ColliderMeta {
            owner: None,
            structure: Some(name.to_owned()),
        })
    }

    /// Add a collider with no owner and no tag (unknown touch).
    pub fn add_unknown_collider(&mut self) -> ColliderId {
        self.insert_collider(ColliderMeta::default())
    }

    fn insert_collider(&mut self, meta: ColliderMeta) -> ColliderId {
        let id = ColliderId(self.next_collider);
        self.next_collider += 1;
        self.colliders.insert(id, meta);
        id
    }

    // -- event scripting --

    /// Script an overlap to begin on physics step `step` (1-based: the
    /// first `advance_physics` call is step 1).
    pub fn begin_overlap_at(&mut self, step: u32, a: ColliderId, b: ColliderId) {
        self.scripted_begins.entry(step).or_default().push((a, b));
    }

    /// Script an overlap to end on physics step `step`.
    pub fn end_overlap_at(&mut self, step: u32, a: ColliderId, b: ColliderId) {
        self.scripted_ends.entry(step).or_default().push((a, b));
    }

    /// Canned response for [`ShapeQuery::overlap_sphere`].
    pub fn set_sphere_hits(&mut self, hits: Vec<ColliderId>) {
        self.sphere_hits = hits;
    }

    /// Number of physics steps taken so far.
    #[must_use]
    pub const fn step_count(&self) -> u32 {
        self.step_count
    }
}

impl PhysicsWorld for ScriptedWorld {
    fn advance_physics(&mut self, _dt: f32) {
        self.step_count += 1;
        if let Some(events) = self.scripted_begins.remove(&self.step_count) {
            self.pending_begins.extend(events);
        }
        if let Some(events) = self.scripted_ends.remove(&self.step_count) {
            self.pending_ends.extend(events);
        }
    }

    fn joint_position(&self, joint: JointId) -> f32 {
        let position = self.joints.get(&joint).copied().unwrap_or(0.0);
        match self.pins.get(&joint) {
            Some(max) => position.min(*max),
            None => position,
        }
    }

    fn set_joint_target(&mut self, joint: JointId, position: f32) {
        self.joints.insert(joint, position);
    }

    fn base_pose(&self) -> Isometry3<f32> {
        self.base_pose
    }

    fn wrist_pose(&self) -> Isometry3<f32> {
        let lift = self
            .base_joint
            .map_or(0.0, |joint| self.joint_position(joint));
        let extension: f32 = self
            .extend_joints
            .iter()
            .map(|&joint| self.joint_position(joint))
            .sum();
        self.base_pose
            * Isometry3::from_parts(
                Translation3::new(0.0, lift, extension),
                UnitQuaternion::identity(),
            )
    }
}

impl CollisionFeed for ScriptedWorld {
    fn overlaps_beginning_this_step(&mut self) -> Vec<(ColliderId, ColliderId)> {
        std::mem::take(&mut self.pending_begins)
    }

    fn overlaps_ending_this_step(&mut self) -> Vec<(ColliderId, ColliderId)> {
        std::mem::take(&mut self.pending_ends)
    }
}

impl SceneQuery for ScriptedWorld {
    fn owner_of(&self, collider: ColliderId) -> Option<ObjectId> {
        self.colliders.get(&collider).and_then(|meta| meta.owner)
    }

    fn parent_of(&self, object: ObjectId) -> Option<ObjectId> {
        self.objects.get(&object).and_then(|meta| meta.parent)
    }

    fn is_agent_body(&self, object: ObjectId) -> bool {
        self.objects.get(&object).is_some_and(|meta| meta.agent_body)
    }

    fn is_immovable(&self, object: ObjectId) -> bool {
        self.objects.get(&object).is_some_and(|meta| meta.immovable)
    }

    fn is_pickupable(&self, object: ObjectId) -> bool {
        self.objects.get(&object).is_some_and(|meta| meta.pickupable)
    }

    fn mass_of(&self, object: ObjectId) -> f32 {
        self.objects.get(&object).map_or(0.0, |meta| meta.mass)
    }

    fn is_structure(&self, collider: ColliderId) -> bool {
        self.colliders
            .get(&collider)
            .is_some_and(|meta| meta.structure.is_some())
    }

    fn display_name(&self, object: ObjectId) -> String {
        self.objects
            .get(&object)
            .map_or_else(|| object.to_string(), |meta| meta.name.clone())
    }

    fn structure_name(&self, collider: ColliderId) -> String {
        self.colliders
            .get(&collider)
            .and_then(|meta| meta.structure.clone())
            .unwrap_or_else(|| collider.to_string())
    }
}

impl ShapeQuery for ScriptedWorld {
    fn overlap_sphere(&self, _center: Point3<f32>, _radius: f32) -> Vec<ColliderId> {
        self.sphere_hits.clone()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
