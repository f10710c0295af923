//! The arm controller façade.
//!
//! One high-level command comes in; per-joint allocations fan out; the step
//! driver in [`stepper`](crate::stepper) polls every joint drive plus the
//! halt oracle once per fixed step until a terminal state. Every public
//! operation returns a [`CompletionResult`]; validation failures are folded
//! into it before any physics step runs.

use std::collections::{BTreeMap, BTreeSet};

use nalgebra::Point3;
use tracing::{debug, info};

use waldo_collision::classify::Classifier;
use waldo_collision::registry::ContactRegistry;
use waldo_core::config::{ArmConfig, SimConfig};
use waldo_core::error::{CommandError, ConfigError};
use waldo_core::traits::{CollisionFeed, PhysicsWorld, SceneQuery, ShapeQuery};
use waldo_core::types::{ColliderId, CompletionResult, CoordinateSpace, JointId, ObjectId};
use waldo_motion::drive::{DriveState, JointDrive};
use waldo_motion::params::{MoveParams, MoveSpec};

use crate::command::{MoveArmTarget, MoveBase, Pickup, RotateElbow, RotateWrist};
use crate::embodiment::Embodiment;
use crate::held::HeldObjects;
use crate::stepper::MotionPlan;

/// A validated command, ready to arm the drives.
pub(crate) struct PreparedMotion {
    pub motions: Vec<(JointId, MoveParams)>,
    /// Commanded extension target, when the command moves the extend stack.
    pub planned_extension: Option<f32>,
    pub return_to_start_on_failure: bool,
}

// ---------------------------------------------------------------------------
// ArmController
// ---------------------------------------------------------------------------

/// Owns the joint drives, the held-objects map, the contact registry, and
/// the classifier for one arm.
pub struct ArmController<E: Embodiment> {
    pub(crate) embodiment: E,
    pub(crate) sim: SimConfig,
    pub(crate) arm: ArmConfig,
    pub(crate) drives: BTreeMap<JointId, JointDrive>,
    pub(crate) held: HeldObjects,
    pub(crate) registry: ContactRegistry,
    pub(crate) classifier: Classifier,
    pub(crate) active: Option<MotionPlan>,
    /// Logical extension handle: the baseline the next extension command
    /// measures its displacement from.
    pub(crate) handle_extension: f32,
    self_ignore_probe: Option<ColliderId>,
}

impl<E: Embodiment> ArmController<E> {
    /// Build a controller, validating both configs up front.
    pub fn new(embodiment: E, sim: SimConfig, arm: ArmConfig) -> Result<Self, ConfigError> {
        sim.validate()?;
        arm.validate()?;

        let mut drives = BTreeMap::new();
        for joint in embodiment.extend_joints() {
            drives.insert(joint.id, JointDrive::new(joint.id));
        }
        for joint in [embodiment.base_joint(), embodiment.wrist_joint()] {
            drives.insert(joint, JointDrive::new(joint));
        }
        if let Some(elbow) = embodiment.elbow_joint() {
            drives.insert(elbow, JointDrive::new(elbow));
        }

        let mut controller = Self {
            embodiment,
            sim,
            arm,
            drives,
            held: HeldObjects::new(),
            registry: ContactRegistry::new(),
            classifier: Classifier::new(),
            active: None,
            handle_extension: 0.0,
            self_ignore_probe: None,
        };
        controller.rebuild_classifier();
        Ok(controller)
    }

    // -- wiring --

    /// Register one of the agent's probe colliders with the registry.
    pub fn register_probe(&mut self, probe: ColliderId) {
        self.registry.register_probe(probe);
    }

    /// Designate the probe whose solo contacts never count as obstacles.
    pub fn set_self_ignore_probe(&mut self, probe: ColliderId) {
        self.self_ignore_probe = Some(probe);
        self.rebuild_classifier();
    }

    fn rebuild_classifier(&mut self) {
        let mut classifier = Classifier::new();
        if let Some(threshold) = self.arm.mass_threshold {
            classifier = classifier.with_mass_threshold(threshold);
        }
        if let Some(probe) = self.self_ignore_probe {
            classifier = classifier.with_self_ignore_probe(probe);
        }
        self.classifier = classifier;
    }

    // -- accessors --

    #[must_use]
    pub fn registry(&self) -> &ContactRegistry {
        &self.registry
    }

    #[must_use]
    pub fn held(&self) -> &HeldObjects {
        &self.held
    }

    #[must_use]
    pub fn embodiment(&self) -> &E {
        &self.embodiment
    }

    /// Whether a motion is currently in flight.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.active.is_some()
    }

    /// The fixed physics timestep this controller steps with.
    #[must_use]
    pub const fn physics_dt(&self) -> f64 {
        self.sim.physics_dt
    }

    #[must_use]
    pub fn drive(&self, joint: JointId) -> Option<&JointDrive> {
        self.drives.get(&joint)
    }

    // -- commands --

    /// Move the wrist toward a target point, blocking until terminal.
    pub fn move_arm_target<W>(&mut self, world: &mut W, cmd: &MoveArmTarget) -> CompletionResult
    where
        W: PhysicsWorld + CollisionFeed + SceneQuery,
    {
        match self.start_move_arm_target(world, cmd) {
            Some(result) => result,
            None => self.run_active(world),
        }
    }

    /// Start a wrist move without stepping it. `None` means the motion is
    /// active and the caller now drives [`step_active`](Self::step_active).
    pub fn start_move_arm_target<W>(
        &mut self,
        world: &mut W,
        cmd: &MoveArmTarget,
    ) -> Option<CompletionResult>
    where
        W: PhysicsWorld,
    {
        if self.active.is_some() {
            return Some(CommandError::MotionInProgress.into());
        }
        debug!(point = ?cmd.target, space = ?cmd.space, speed = cmd.speed, "move_arm_target");
        match self.plan_move_arm_target(world, cmd) {
            Ok(prepared) => self.begin(world, prepared),
            Err(err) => {
                info!(%err, "command rejected");
                Some(err.into())
            }
        }
    }

    /// Raise or lower the base, blocking until terminal.
    pub fn move_base<W>(&mut self, world: &mut W, cmd: &MoveBase) -> CompletionResult
    where
        W: PhysicsWorld + CollisionFeed + SceneQuery,
    {
        match self.start_move_base(world, cmd) {
            Some(result) => result,
            None => self.run_active(world),
        }
    }

    /// Start a base move without stepping it.
    pub fn start_move_base<W>(&mut self, world: &mut W, cmd: &MoveBase) -> Option<CompletionResult>
    where
        W: PhysicsWorld,
    {
        if self.active.is_some() {
            return Some(CommandError::MotionInProgress.into());
        }
        debug!(height = cmd.height, normalized = cmd.normalized, "move_base");
        match self.plan_move_base(world, cmd) {
            Ok(prepared) => self.begin(world, prepared),
            Err(err) => {
                info!(%err, "command rejected");
                Some(err.into())
            }
        }
    }

    /// Rotate the wrist about its roll axis, blocking until terminal.
    pub fn rotate_wrist<W>(&mut self, world: &mut W, cmd: &RotateWrist) -> CompletionResult
    where
        W: PhysicsWorld + CollisionFeed + SceneQuery,
    {
        if self.active.is_some() {
            return CommandError::MotionInProgress.into();
        }
        debug!(degrees = cmd.degrees, "rotate_wrist");
        match self.plan_rotate_wrist(cmd) {
            Ok(prepared) => match self.begin(world, prepared) {
                Some(result) => result,
                None => self.run_active(world),
            },
            Err(err) => {
                info!(%err, "command rejected");
                err.into()
            }
        }
    }

    /// Rotate the elbow, blocking until terminal. Rejected on arms without
    /// an elbow.
    pub fn rotate_elbow<W>(&mut self, world: &mut W, cmd: &RotateElbow) -> CompletionResult
    where
        W: PhysicsWorld + CollisionFeed + SceneQuery,
    {
        if self.active.is_some() {
            return CommandError::MotionInProgress.into();
        }
        debug!(degrees = cmd.degrees, "rotate_elbow");
        match self.plan_rotate_elbow(cmd) {
            Ok(prepared) => match self.begin(world, prepared) {
                Some(result) => result,
                None => self.run_active(world),
            },
            Err(err) => {
                info!(%err, "command rejected");
                err.into()
            }
        }
    }

    /// Grasp the nearest pickupable object inside the magnet sphere at the
    /// wrist. Rejected when already holding; the held map is untouched on
    /// any failure.
    pub fn pickup<W>(&mut self, world: &W, cmd: &Pickup) -> CompletionResult
    where
        W: PhysicsWorld + SceneQuery + ShapeQuery,
    {
        if !self.held.is_empty() {
            return CommandError::AlreadyHolding(self.held.count()).into();
        }
        if !cmd.radius.is_finite() || cmd.radius <= 0.0 {
            return CompletionResult::fail(format!(
                "magnet radius must be positive, got {}",
                cmd.radius
            ));
        }

        let center = Point3::from(world.wrist_pose().translation.vector);
        let mut candidates: BTreeMap<ObjectId, BTreeSet<ColliderId>> = BTreeMap::new();
        for collider in world.overlap_sphere(center, cmd.radius) {
            if let Some(owner) = world.owner_of(collider) {
                if world.is_pickupable(owner) && !world.is_agent_body(owner) {
                    candidates.entry(owner).or_default().insert(collider);
                }
            }
        }

        let Some((&object, colliders)) = candidates.iter().next() else {
            return CommandError::NothingWithinReach(cmd.radius).into();
        };
        let colliders = colliders.clone();
        self.held.grasp(object, colliders);
        info!(object = %world.display_name(object), "picked up");
        CompletionResult::ok()
    }

    /// Drop everything held. Succeeds even when empty-handed.
    pub fn release(&mut self) -> CompletionResult {
        let dropped = self.held.release_all();
        debug!(count = dropped.len(), "released held objects");
        CompletionResult::ok()
    }

    /// Abandon any active motion and clear all collision state.
    pub fn reset(&mut self) {
        self.cancel_active();
        for drive in self.drives.values_mut() {
            drive.reset();
        }
        self.registry.reset();
        self.handle_extension = 0.0;
    }

    // -- planning --

    fn spec(&self, displacement: f32, speed: f32) -> MoveSpec {
        MoveSpec::new(displacement, speed)
            .with_tolerance(self.arm.tolerance)
            .with_max_time(self.arm.max_time)
            .with_cache_size(self.arm.position_cache_size)
    }

    fn plan_move_arm_target<W: PhysicsWorld>(
        &self,
        world: &W,
        cmd: &MoveArmTarget,
    ) -> Result<PreparedMotion, CommandError> {
        if !cmd.target.coords.iter().all(|c| c.is_finite()) {
            return Err(CommandError::NonFiniteTarget);
        }

        let base = world.base_pose();
        let local: Point3<f32> = match cmd.space {
            CoordinateSpace::ArmBase => cmd.target,
            CoordinateSpace::World => base.inverse_transform_point(&cmd.target),
            CoordinateSpace::Wrist => {
                base.inverse_transform_point(&world.wrist_pose().transform_point(&cmd.target))
            }
        };

        // The arm has no lateral joint; X offsets are only droppable when
        // the caller asked for target restriction.
        if local.x.abs() > self.arm.tolerance && !cmd.restrict_target {
            return Err(CommandError::LateralTarget(local.x));
        }

        let reach = self.embodiment.total_extension();
        let mut target_extension = local.z;
        if target_extension < 0.0 || target_extension > reach {
            if cmd.restrict_target {
                target_extension = target_extension.clamp(0.0, reach);
            } else {
                return Err(CommandError::OutOfReach {
                    requested: target_extension,
                    max: reach,
                });
            }
        }
        let extension_delta = target_extension - self.handle_extension;
        let shares = self.embodiment.allocate_extension(extension_delta)?;

        let [lift_min, lift_max] = self.arm.base_limits;
        let mut target_lift = local.y;
        if target_lift < lift_min || target_lift > lift_max {
            if cmd.restrict_target {
                target_lift = target_lift.clamp(lift_min, lift_max);
            } else {
                return Err(CommandError::OutOfReach {
                    requested: target_lift,
                    max: lift_max,
                });
            }
        }
        let lift_delta = target_lift - world.joint_position(self.embodiment.base_joint());

        let mut motions = Vec::with_capacity(shares.len() + 1);
        for (joint, share) in self.embodiment.extend_joints().iter().zip(shares) {
            motions.push((joint.id, MoveParams::from_spec(self.spec(share, cmd.speed))?));
        }
        motions.push((
            self.embodiment.base_joint(),
            MoveParams::from_spec(self.spec(lift_delta, cmd.speed))?,
        ));

        Ok(PreparedMotion {
            motions,
            planned_extension: Some(target_extension),
            return_to_start_on_failure: cmd.return_to_start_on_failure,
        })
    }

    fn plan_move_base<W: PhysicsWorld>(
        &self,
        world: &W,
        cmd: &MoveBase,
    ) -> Result<PreparedMotion, CommandError> {
        if !cmd.height.is_finite() {
            return Err(CommandError::NonFiniteTarget);
        }
        let [lift_min, lift_max] = self.arm.base_limits;
        let target = if cmd.normalized {
            if !(0.0..=1.0).contains(&cmd.height) {
                return Err(CommandError::OutOfReach {
                    requested: cmd.height,
                    max: 1.0,
                });
            }
            lift_min + cmd.height * (lift_max - lift_min)
        } else {
            if cmd.height < lift_min || cmd.height > lift_max {
                return Err(CommandError::OutOfReach {
                    requested: cmd.height,
                    max: lift_max,
                });
            }
            cmd.height
        };

        let base = self.embodiment.base_joint();
        let delta = target - world.joint_position(base);
        let params = MoveParams::from_spec(self.spec(delta, cmd.speed))?;
        Ok(PreparedMotion {
            motions: vec![(base, params)],
            planned_extension: None,
            return_to_start_on_failure: cmd.return_to_start_on_failure,
        })
    }

    fn plan_rotate_wrist(&self, cmd: &RotateWrist) -> Result<PreparedMotion, CommandError> {
        let norm = cmd.axis.norm();
        if !norm.is_finite() || norm < 1e-6 {
            return Err(CommandError::ZeroLengthAxis);
        }
        let unit = cmd.axis / norm;
        if unit.z.abs() < 1.0 - 1e-4 {
            return Err(CommandError::UnsupportedRotationAxis);
        }
        if !cmd.degrees.is_finite() {
            return Err(CommandError::NonFiniteTarget);
        }

        let signed = cmd.degrees * unit.z.signum();
        let params = MoveParams::from_spec(self.spec(signed, cmd.speed_degrees))?;
        Ok(PreparedMotion {
            motions: vec![(self.embodiment.wrist_joint(), params)],
            planned_extension: None,
            return_to_start_on_failure: false,
        })
    }

    fn plan_rotate_elbow(&self, cmd: &RotateElbow) -> Result<PreparedMotion, CommandError> {
        let elbow = self.embodiment.elbow_joint().ok_or(CommandError::NoElbow)?;
        if !cmd.degrees.is_finite() {
            return Err(CommandError::NonFiniteTarget);
        }
        let params = MoveParams::from_spec(self.spec(cmd.degrees, cmd.speed_degrees))?;
        Ok(PreparedMotion {
            motions: vec![(elbow, params)],
            planned_extension: None,
            return_to_start_on_failure: false,
        })
    }

    // -- arming --

    /// Prepare every drive; `None` means the motion is now active. A
    /// command whose allocations are all inside tolerance completes on the
    /// spot without a single physics step.
    pub(crate) fn begin<W: PhysicsWorld>(
        &mut self,
        world: &W,
        prepared: PreparedMotion,
    ) -> Option<CompletionResult> {
        let mut joints = Vec::with_capacity(prepared.motions.len());
        let mut starts = Vec::with_capacity(prepared.motions.len());
        for (joint, params) in &prepared.motions {
            let start = world.joint_position(*joint);
            if let Some(drive) = self.drives.get_mut(joint) {
                drive.prepare(*params, start);
                joints.push(*joint);
                starts.push((*joint, start));
            }
        }

        if joints
            .iter()
            .all(|joint| self.drives[joint].state() == DriveState::Idle)
        {
            self.snap_handle(world, prepared.planned_extension);
            return Some(CompletionResult::ok());
        }

        self.active = Some(MotionPlan {
            joints,
            starts,
            planned_extension: prepared.planned_extension,
            steps_taken: 0,
            max_steps: self.sim.max_command_steps,
            return_to_start_on_failure: prepared.return_to_start_on_failure,
        });
        None
    }

    /// Update the logical extension handle after a command terminates.
    pub(crate) fn snap_handle<W: PhysicsWorld>(&mut self, world: &W, planned: Option<f32>) {
        let Some(planned) = planned else { return };
        self.handle_extension = if self.arm.snap_handle_on_finish {
            self.embodiment
                .extend_joints()
                .iter()
                .map(|joint| world.joint_position(joint.id))
                .sum()
        } else {
            planned
        };
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
