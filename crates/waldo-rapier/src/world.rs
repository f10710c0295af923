//! All rapier state behind the core boundary traits.

use std::collections::{BTreeMap, HashMap};

use nalgebra::{Isometry3, Point3, Translation3, UnitQuaternion, UnitVector3, Vector3};
use rapier3d::prelude::{
    ActiveCollisionTypes, ActiveEvents, Ball, CCDSolver, ColliderBuilder, ColliderHandle,
    ColliderSet, DefaultBroadPhase, ImpulseJointSet, IntegrationParameters, IslandManager,
    MultibodyJointSet, NarrowPhase, PhysicsPipeline, QueryFilter, QueryPipeline, RigidBodyBuilder,
    RigidBodyHandle, RigidBodySet,
};

use waldo_collision::ledger::AttachmentLedger;
use waldo_core::error::SetupError;
use waldo_core::traits::{CollisionFeed, PhysicsWorld, SceneQuery, ShapeQuery};
use waldo_core::types::{ColliderId, JointId, ObjectId};

use crate::events::CollisionBuffer;

// ---------------------------------------------------------------------------
// Metadata records
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct ObjectMeta {
    name: String,
    parent: Option<ObjectId>,
    body: RigidBodyHandle,
    /// Authored pose; joint coordinates displace from here.
    rest: Isometry3<f32>,
    agent_body: bool,
    immovable: bool,
    pickupable: bool,
    mass: f32,
}

#[derive(Debug)]
struct ColliderMeta {
    owner: Option<ObjectId>,
    structure: Option<String>,
}

#[derive(Debug)]
struct JointBinding {
    /// The agent link this joint drives. Prismatic displacement also
    /// carries every descendant link, so a telescoping stack composes.
    link: ObjectId,
    axis: UnitVector3<f32>,
    prismatic: bool,
    position: f32,
}

/// Authoring description of a free sim object.
#[derive(Debug, Clone)]
pub struct ObjectSpec {
    pub name: String,
    pub half_extents: Vector3<f32>,
    pub pose: Isometry3<f32>,
    pub immovable: bool,
    pub pickupable: bool,
    pub mass: f32,
}

impl ObjectSpec {
    #[must_use]
    pub fn new(name: &str, half_extents: Vector3<f32>) -> Self {
        Self {
            name: name.to_owned(),
            half_extents,
            pose: Isometry3::identity(),
            immovable: false,
            pickupable: false,
            mass: 1.0,
        }
    }

    #[must_use]
    pub fn at(mut self, pose: Isometry3<f32>) -> Self {
        self.pose = pose;
        self
    }

    #[must_use]
    pub fn immovable(mut self) -> Self {
        self.immovable = true;
        self
    }

    #[must_use]
    pub fn pickupable(mut self, mass: f32) -> Self {
        self.pickupable = true;
        self.mass = mass;
        self
    }
}

// ---------------------------------------------------------------------------
// RapierWorld
// ---------------------------------------------------------------------------

/// rapier3d-backed world implementing `PhysicsWorld + CollisionFeed +
/// SceneQuery + ShapeQuery`.
///
/// `PhysicsPipeline::step()` needs mutable access to every set at once, so
/// they all live together here. Stable IDs are assigned at authoring time
/// and never reused; the handle maps translate rapier events back into IDs.
pub struct RapierWorld {
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    pipeline: PhysicsPipeline,
    islands: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    ccd: CCDSolver,
    query_pipeline: QueryPipeline,
    integration: IntegrationParameters,
    gravity: Vector3<f32>,
    events: CollisionBuffer,

    next_object: u64,
    next_collider: u64,
    objects: BTreeMap<ObjectId, ObjectMeta>,
    collider_meta: BTreeMap<ColliderId, ColliderMeta>,
    handle_to_id: HashMap<ColliderHandle, ColliderId>,
    joints: BTreeMap<JointId, JointBinding>,
    base_body: Option<RigidBodyHandle>,
    wrist_body: Option<RigidBodyHandle>,
    ledger: AttachmentLedger,

    pending_begins: Vec<(ColliderId, ColliderId)>,
    pending_ends: Vec<(ColliderId, ColliderId)>,
}

impl RapierWorld {
    /// An empty world with Y-down gravity.
    #[must_use]
    pub fn new() -> Self {
        Self {
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            pipeline: PhysicsPipeline::new(),
            islands: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            ccd: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            integration: IntegrationParameters::default(),
            gravity: Vector3::new(0.0, -9.81, 0.0),
            events: CollisionBuffer::new(),
            next_object: 0,
            next_collider: 0,
            objects: BTreeMap::new(),
            collider_meta: BTreeMap::new(),
            handle_to_id: HashMap::new(),
            joints: BTreeMap::new(),
            base_body: None,
            wrist_body: None,
            ledger: AttachmentLedger::new(),
            pending_begins: Vec::new(),
            pending_ends: Vec::new(),
        }
    }

    // -- scene authoring --

    /// Static world structure (wall, floor, counter slab): a fixed body
    /// whose collider carries the structure tag and no owning object.
    pub fn add_structure(
        &mut self,
        name: &str,
        half_extents: Vector3<f32>,
        pose: Isometry3<f32>,
    ) -> ColliderId {
        let body = RigidBodyBuilder::fixed().position(pose).build();
        let handle = self.bodies.insert(body);
        let collider = ColliderBuilder::cuboid(half_extents.x, half_extents.y, half_extents.z)
            .build();
        let collider_handle = self
            .colliders
            .insert_with_parent(collider, handle, &mut self.bodies);
        self.record_collider(
            collider_handle,
            ColliderMeta {
                owner: None,
                structure: Some(name.to_owned()),
            },
        )
    }

    /// A free sim object with metadata; fixed when immovable, dynamic
    /// otherwise.
    pub fn add_object(&mut self, spec: ObjectSpec) -> (ObjectId, ColliderId) {
        let builder = if spec.immovable {
            RigidBodyBuilder::fixed()
        } else {
            RigidBodyBuilder::dynamic()
        };
        let handle = self.bodies.insert(builder.position(spec.pose).build());
        let collider = ColliderBuilder::cuboid(
            spec.half_extents.x,
            spec.half_extents.y,
            spec.half_extents.z,
        )
        .mass(spec.mass)
        .build();
        let collider_handle = self
            .colliders
            .insert_with_parent(collider, handle, &mut self.bodies);

        let object = self.record_object(ObjectMeta {
            name: spec.name,
            parent: None,
            body: handle,
            rest: spec.pose,
            agent_body: false,
            immovable: spec.immovable,
            pickupable: spec.pickupable,
            mass: spec.mass,
        });
        let collider = self.record_collider(
            collider_handle,
            ColliderMeta {
                owner: Some(object),
                structure: None,
            },
        );
        (object, collider)
    }

    /// One link of the agent's body: a kinematic position-based body.
    pub fn add_agent_link(
        &mut self,
        name: &str,
        parent: Option<ObjectId>,
        pose: Isometry3<f32>,
    ) -> ObjectId {
        let body = RigidBodyBuilder::kinematic_position_based()
            .position(pose)
            .build();
        let handle = self.bodies.insert(body);
        self.record_object(ObjectMeta {
            name: name.to_owned(),
            parent,
            body: handle,
            rest: pose,
            agent_body: true,
            immovable: false,
            pickupable: false,
            mass: 0.0,
        })
    }

    /// A sensing-only probe collider on an agent link: a sensor ball that
    /// raises collision events but never affects physical response.
    pub fn add_probe(
        &mut self,
        link: ObjectId,
        radius: f32,
        offset: Vector3<f32>,
    ) -> Result<ColliderId, SetupError> {
        let meta = self.objects.get(&link).ok_or(SetupError::UnknownObject(link))?;
        let collider = ColliderBuilder::ball(radius)
            .translation(offset)
            .sensor(true)
            .active_events(ActiveEvents::COLLISION_EVENTS)
            .active_collision_types(
                ActiveCollisionTypes::default()
                    | ActiveCollisionTypes::KINEMATIC_FIXED
                    | ActiveCollisionTypes::KINEMATIC_KINEMATIC,
            )
            .build();
        let handle = self
            .colliders
            .insert_with_parent(collider, meta.body, &mut self.bodies);
        Ok(self.record_collider(
            handle,
            ColliderMeta {
                owner: Some(link),
                structure: None,
            },
        ))
    }

    /// Drive `link` along `axis` as prismatic joint `joint`.
    pub fn bind_prismatic(
        &mut self,
        joint: JointId,
        link: ObjectId,
        axis: UnitVector3<f32>,
    ) -> Result<(), SetupError> {
        self.bind_joint(joint, link, axis, true)
    }

    /// Drive `link` about `axis` (degrees) as revolute joint `joint`.
    pub fn bind_revolute(
        &mut self,
        joint: JointId,
        link: ObjectId,
        axis: UnitVector3<f32>,
    ) -> Result<(), SetupError> {
        self.bind_joint(joint, link, axis, false)
    }

    fn bind_joint(
        &mut self,
        joint: JointId,
        link: ObjectId,
        axis: UnitVector3<f32>,
        prismatic: bool,
    ) -> Result<(), SetupError> {
        if !self.objects.contains_key(&link) {
            return Err(SetupError::UnknownObject(link));
        }
        self.joints.insert(
            joint,
            JointBinding {
                link,
                axis,
                prismatic,
                position: 0.0,
            },
        );
        Ok(())
    }

    /// Designate the link whose pose is the arm-base frame.
    pub fn set_base_link(&mut self, link: ObjectId) -> Result<(), SetupError> {
        let meta = self.objects.get(&link).ok_or(SetupError::UnknownObject(link))?;
        self.base_body = Some(meta.body);
        Ok(())
    }

    /// Designate the wrist (end) link.
    pub fn set_wrist_link(&mut self, link: ObjectId) -> Result<(), SetupError> {
        let meta = self.objects.get(&link).ok_or(SetupError::UnknownObject(link))?;
        self.wrist_body = Some(meta.body);
        Ok(())
    }

    /// Claim `root`'s rigid hierarchy for a contact registry. Fails fast
    /// when the hierarchy already hosts one.
    pub fn attach_registry(&mut self, root: ObjectId) -> Result<(), SetupError> {
        if !self.objects.contains_key(&root) {
            return Err(SetupError::UnknownObject(root));
        }
        let mut ledger = std::mem::take(&mut self.ledger);
        let outcome = ledger.claim(&*self, root);
        self.ledger = ledger;
        outcome
    }

    /// Re-derive every agent link's kinematic target from the joint
    /// coordinates: a prismatic joint displaces its link and all descendant
    /// links, a revolute joint rotates its own link. Revolute joints sit at
    /// the end of the roster, so local rotation is sufficient.
    fn refresh_links(&mut self) {
        let links: Vec<(ObjectId, RigidBodyHandle, Isometry3<f32>)> = self
            .objects
            .iter()
            .filter(|(_, meta)| meta.agent_body)
            .map(|(&id, meta)| (id, meta.body, meta.rest))
            .collect();

        for (link, body, rest) in links {
            let mut displacement = Vector3::zeros();
            let mut rotation = rest.rotation;
            for binding in self.joints.values() {
                if binding.prismatic {
                    if self.is_same_or_ancestor(binding.link, link) {
                        displacement += binding.axis.into_inner() * binding.position;
                    }
                } else if binding.link == link {
                    rotation = rest.rotation
                        * UnitQuaternion::from_axis_angle(
                            &binding.axis,
                            binding.position.to_radians(),
                        );
                }
            }
            let target = Isometry3::from_parts(
                Translation3::from(rest.translation.vector + displacement),
                rotation,
            );
            if let Some(body) = self.bodies.get_mut(body) {
                body.set_next_kinematic_position(target);
            }
        }
    }

    fn is_same_or_ancestor(&self, candidate: ObjectId, link: ObjectId) -> bool {
        let mut node = Some(link);
        for _ in 0..64 {
            match node {
                Some(current) if current == candidate => return true,
                Some(current) => node = self.parent_of(current),
                None => return false,
            }
        }
        false
    }

    fn record_object(&mut self, meta: ObjectMeta) -> ObjectId {
        let id = ObjectId(self.next_object);
        self.next_object += 1;
        self.objects.insert(id, meta);
        id
    }

    fn record_collider(&mut self, handle: ColliderHandle, meta: ColliderMeta) -> ColliderId {
        let id = ColliderId(self.next_collider);
        self.next_collider += 1;
        self.collider_meta.insert(id, meta);
        self.handle_to_id.insert(handle, id);
        id
    }

    fn body_pose(&self, body: Option<RigidBodyHandle>) -> Isometry3<f32> {
        body.and_then(|handle| self.bodies.get(handle))
            .map_or_else(Isometry3::identity, |body| *body.position())
    }
}

impl Default for RapierWorld {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Trait implementations
// ---------------------------------------------------------------------------

impl PhysicsWorld for RapierWorld {
    fn advance_physics(&mut self, dt: f32) {
        self.integration.dt = dt;
        self.pipeline.step(
            &self.gravity,
            &self.integration,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd,
            Some(&mut self.query_pipeline),
            &(),
            &self.events,
        );

        for (a, b) in self.events.drain_started() {
            if let (Some(&id_a), Some(&id_b)) =
                (self.handle_to_id.get(&a), self.handle_to_id.get(&b))
            {
                self.pending_begins.push((id_a, id_b));
            }
        }
        for (a, b) in self.events.drain_stopped() {
            if let (Some(&id_a), Some(&id_b)) =
                (self.handle_to_id.get(&a), self.handle_to_id.get(&b))
            {
                self.pending_ends.push((id_a, id_b));
            }
        }
    }

    fn joint_position(&self, joint: JointId) -> f32 {
        // Kinematic position-based bodies realize their targets exactly, so
        // the commanded coordinate is the realized one.
        self.joints.get(&joint).map_or(0.0, |binding| binding.position)
    }

    fn set_joint_target(&mut self, joint: JointId, position: f32) {
        let Some(binding) = self.joints.get_mut(&joint) else {
            return;
        };
        binding.position = position;
        self.refresh_links();
    }

    fn base_pose(&self) -> Isometry3<f32> {
        self.body_pose(self.base_body)
    }

    fn wrist_pose(&self) -> Isometry3<f32> {
        self.body_pose(self.wrist_body)
    }
}

impl CollisionFeed for RapierWorld {
    fn overlaps_beginning_this_step(&mut self) -> Vec<(ColliderId, ColliderId)> {
        std::mem::take(&mut self.pending_begins)
    }

    fn overlaps_ending_this_step(&mut self) -> Vec<(ColliderId, ColliderId)> {
        std::mem::take(&mut self.pending_ends)
    }
}

impl SceneQuery for RapierWorld {
    fn owner_of(&self, collider: ColliderId) -> Option<ObjectId> {
        self.collider_meta.get(&collider).and_then(|meta| meta.owner)
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
        self.collider_meta
            .get(&collider)
            .is_some_and(|meta| meta.structure.is_some())
    }

    fn display_name(&self, object: ObjectId) -> String {
        self.objects
            .get(&object)
            .map_or_else(|| object.to_string(), |meta| meta.name.clone())
    }

    fn structure_name(&self, collider: ColliderId) -> String {
        self.collider_meta
            .get(&collider)
            .and_then(|meta| meta.structure.clone())
            .unwrap_or_else(|| collider.to_string())
    }
}

impl ShapeQuery for RapierWorld {
    fn overlap_sphere(&self, center: Point3<f32>, radius: f32) -> Vec<ColliderId> {
        let shape = Ball::new(radius);
        let pose = Isometry3::translation(center.x, center.y, center.z);
        let mut hits = Vec::new();
        self.query_pipeline.intersections_with_shape(
            &self.bodies,
            &self.colliders,
            &pose,
            &shape,
            QueryFilter::default(),
            |handle| {
                if let Some(&id) = self.handle_to_id.get(&handle) {
                    hits.push(id);
                }
                true
            },
        );
        hits.sort_unstable();
        hits
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    const DT: f32 = 0.02;

    fn arm_world() -> (RapierWorld, ObjectId, ColliderId) {
        let mut world = RapierWorld::new();
        let link = world.add_agent_link("arm_link", None, Isometry3::identity());
        world.set_base_link(link).unwrap();
        world.set_wrist_link(link).unwrap();
        world
            .bind_prismatic(JointId(1), link, UnitVector3::new_normalize(Vector3::z()))
            .unwrap();
        let probe = world.add_probe(link, 0.2, Vector3::zeros()).unwrap();
        (world, link, probe)
    }

    #[test]
    fn kinematic_joint_realizes_its_target() {
        let (mut world, _, _) = arm_world();
        world.set_joint_target(JointId(1), 0.1);
        world.advance_physics(DT);

        assert_relative_eq!(world.joint_position(JointId(1)), 0.1);
        let wrist = world.wrist_pose();
        assert_relative_eq!(wrist.translation.vector.z, 0.1, epsilon = 1e-5);
    }

    #[test]
    fn prismatic_displacement_carries_descendant_links() {
        let mut world = RapierWorld::new();
        let lift = world.add_agent_link("lift", None, Isometry3::translation(0.0, 0.5, 0.0));
        let seg = world.add_agent_link("seg", Some(lift), Isometry3::translation(0.0, 0.5, 0.1));
        let wrist =
            world.add_agent_link("wrist", Some(seg), Isometry3::translation(0.0, 0.5, 0.2));
        world.set_wrist_link(wrist).unwrap();
        world
            .bind_prismatic(JointId(0), lift, UnitVector3::new_normalize(Vector3::y()))
            .unwrap();
        world
            .bind_prismatic(JointId(1), seg, UnitVector3::new_normalize(Vector3::z()))
            .unwrap();

        world.set_joint_target(JointId(0), 0.2);
        world.set_joint_target(JointId(1), 0.1);
        world.advance_physics(DT);

        // The wrist rides both its ancestor joints: lift in Y, extension in Z.
        let t = world.wrist_pose().translation.vector;
        assert_relative_eq!(t.y, 0.7, epsilon = 1e-5);
        assert_relative_eq!(t.z, 0.3, epsilon = 1e-5);
    }

    #[test]
    fn unbound_joint_reads_zero_and_ignores_targets() {
        let (mut world, _, _) = arm_world();
        world.set_joint_target(JointId(99), 5.0);
        assert_relative_eq!(world.joint_position(JointId(99)), 0.0);
    }

    #[test]
    fn probe_intersection_raises_begin_and_end_events() {
        let (mut world, _, probe) = arm_world();
        // A wall ahead of the probe: z in [0.4, 0.6], probe radius 0.2.
        let wall = world.add_structure(
            "Wall_1",
            Vector3::new(0.5, 0.5, 0.1),
            Isometry3::translation(0.0, 0.0, 0.5),
        );

        world.advance_physics(DT);
        assert!(world.overlaps_beginning_this_step().is_empty());

        // Push the link forward until the probe reaches into the wall.
        world.set_joint_target(JointId(1), 0.3);
        world.advance_physics(DT);
        let begins = world.overlaps_beginning_this_step();
        assert!(
            begins.contains(&(probe, wall)) || begins.contains(&(wall, probe)),
            "expected a begin event, got {begins:?}"
        );

        // Pull back out; the overlap ends.
        world.set_joint_target(JointId(1), 0.0);
        world.advance_physics(DT);
        let ends = world.overlaps_ending_this_step();
        assert!(
            ends.contains(&(probe, wall)) || ends.contains(&(wall, probe)),
            "expected an end event, got {ends:?}"
        );
    }

    #[test]
    fn overlap_sphere_finds_nearby_colliders() {
        let mut world = RapierWorld::new();
        let (_, cup_collider) = world.add_object(
            ObjectSpec::new("Cup", Vector3::new(0.05, 0.05, 0.05))
                .pickupable(0.3)
                .at(Isometry3::translation(0.0, 0.0, 0.3)),
        );
        // The query pipeline is refreshed by the step.
        world.advance_physics(DT);

        let hits = world.overlap_sphere(Point3::new(0.0, 0.0, 0.3), 0.2);
        assert!(hits.contains(&cup_collider));

        let far = world.overlap_sphere(Point3::new(5.0, 0.0, 0.0), 0.2);
        assert!(!far.contains(&cup_collider));
    }

    #[test]
    fn scene_queries_reflect_authored_metadata() {
        let mut world = RapierWorld::new();
        let torso = world.add_agent_link("torso", None, Isometry3::identity());
        let hand = world.add_agent_link("hand", Some(torso), Isometry3::identity());
        let (counter, counter_collider) = world.add_object(
            ObjectSpec::new("CounterTop_1", Vector3::new(0.5, 0.05, 0.5)).immovable(),
        );
        let floor = world.add_structure(
            "Floor",
            Vector3::new(5.0, 0.1, 5.0),
            Isometry3::translation(0.0, -0.1, 0.0),
        );

        assert!(world.is_agent_body(torso));
        assert_eq!(world.parent_of(hand), Some(torso));
        assert!(world.is_immovable(counter));
        assert_eq!(world.owner_of(counter_collider), Some(counter));
        assert!(world.is_structure(floor));
        assert_eq!(world.owner_of(floor), None);
        assert_eq!(world.display_name(counter), "CounterTop_1");
        assert_eq!(world.structure_name(floor), "Floor");
    }

    #[test]
    fn duplicate_registry_attachment_fails_fast() {
        let mut world = RapierWorld::new();
        let torso = world.add_agent_link("torso", None, Isometry3::identity());
        let hand = world.add_agent_link("hand", Some(torso), Isometry3::identity());

        world.attach_registry(torso).unwrap();
        assert!(matches!(
            world.attach_registry(hand),
            Err(SetupError::DuplicateContactRegistry(_))
        ));
    }

    #[test]
    fn attach_registry_rejects_unknown_objects() {
        let mut world = RapierWorld::new();
        assert!(matches!(
            world.attach_registry(ObjectId(42)),
            Err(SetupError::UnknownObject(_))
        ));
    }
}
