//! The step driver.
//!
//! One [`step_active`](crate::controller::ArmController::step_active) call is
//! one fixed simulation step: advance the drives, let physics resolve, read
//! back, ingest sensor events, then ask the halt oracle, strictly in that
//! order, so the halt decision never sees stale collider poses. Live and
//! unrolled stepping share this one code path; the only difference is who
//! calls it and how often.

use tracing::{debug, info};

use waldo_core::traits::{CollisionFeed, PhysicsWorld, SceneQuery};
use waldo_core::types::{ColliderId, CompletionResult, JointId};
use waldo_motion::drive::{DriveState, StopReason};

use crate::controller::ArmController;
use crate::embodiment::Embodiment;

// ---------------------------------------------------------------------------
// MotionPlan / StepOutcome
// ---------------------------------------------------------------------------

/// State of one in-flight command.
#[derive(Debug)]
pub(crate) struct MotionPlan {
    /// Drives participating in this command.
    pub joints: Vec<JointId>,
    /// Start positions, for restore-on-failure.
    pub starts: Vec<(JointId, f32)>,
    pub planned_extension: Option<f32>,
    pub steps_taken: u32,
    pub max_steps: u32,
    pub return_to_start_on_failure: bool,
}

/// Result of stepping the active motion once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// No motion is active.
    Idle,
    /// The motion continues; step again.
    Running,
    /// The motion reached a terminal state.
    Finished(CompletionResult),
}

// ---------------------------------------------------------------------------
// Step driver
// ---------------------------------------------------------------------------

impl<E: Embodiment> ArmController<E> {
    /// Advance the active motion by one fixed step.
    pub fn step_active<W>(&mut self, world: &mut W) -> StepOutcome
    where
        W: PhysicsWorld + CollisionFeed + SceneQuery,
    {
        let Some(mut plan) = self.active.take() else {
            return StepOutcome::Idle;
        };

        #[allow(clippy::cast_possible_truncation)]
        let dt = self.sim.physics_dt as f32;

        // Advance every moving drive and push its commanded target.
        for joint in &plan.joints {
            if let Some(drive) = self.drives.get_mut(joint) {
                if drive.state() == DriveState::Moving {
                    drive.advance(dt);
                    world.set_joint_target(*joint, drive.target_position());
                }
            }
        }

        world.advance_physics(dt);

        // Read back the realized positions (stall detection feeds on these).
        for joint in &plan.joints {
            if let Some(drive) = self.drives.get_mut(joint) {
                drive.observe(world.joint_position(*joint));
            }
        }

        // Collision state must reflect this step's poses before the halt
        // decision; skipping the re-query in unrolled runs would let the arm
        // tunnel through obstacles.
        self.registry.ingest(world);

        if let Some(obstacle) = self.classifier.first_obstacle(&self.registry, world, &self.held) {
            self.halt_all(&plan.joints);
            let label = obstacle_label(world, obstacle);
            let result = CompletionResult::fail(format!(
                "arm collided with {label}, could not reach target"
            ));
            return StepOutcome::Finished(self.finish(world, plan, result));
        }

        // Non-collision joint failures, surfaced distinctly from halts.
        if let Some(message) = self.joint_failure(&plan.joints) {
            self.halt_all(&plan.joints);
            return StepOutcome::Finished(self.finish(world, plan, CompletionResult::fail(message)));
        }

        if plan
            .joints
            .iter()
            .all(|joint| self.drives[joint].state() == DriveState::Idle)
        {
            return StepOutcome::Finished(self.finish(world, plan, CompletionResult::ok()));
        }

        plan.steps_taken += 1;
        if plan.steps_taken >= plan.max_steps {
            self.halt_all(&plan.joints);
            let message = format!(
                "command exceeded {} steps without completing",
                plan.max_steps
            );
            return StepOutcome::Finished(self.finish(world, plan, CompletionResult::fail(message)));
        }

        self.active = Some(plan);
        StepOutcome::Running
    }

    /// Step the active motion back-to-back until terminal.
    pub fn run_active<W>(&mut self, world: &mut W) -> CompletionResult
    where
        W: PhysicsWorld + CollisionFeed + SceneQuery,
    {
        loop {
            match self.step_active(world) {
                StepOutcome::Running => {}
                StepOutcome::Finished(result) => return result,
                StepOutcome::Idle => return CompletionResult::fail("no active motion to run"),
            }
        }
    }

    /// Abandon the active motion between steps. Every drive ends `Idle`;
    /// the held-objects map is untouched.
    pub fn cancel_active(&mut self) {
        if let Some(plan) = self.active.take() {
            self.halt_all(&plan.joints);
            debug!("active motion cancelled");
        }
    }

    fn halt_all(&mut self, joints: &[JointId]) {
        for joint in joints {
            if let Some(drive) = self.drives.get_mut(joint) {
                drive.halt();
            }
        }
    }

    fn joint_failure(&self, joints: &[JointId]) -> Option<String> {
        for joint in joints {
            let drive = &self.drives[joint];
            if drive.should_halt_joint() {
                let message = match drive.stop_reason() {
                    Some(StopReason::TimedOut) => format!(
                        "{joint} did not reach its target within {:.1}s",
                        self.arm.max_time
                    ),
                    _ => format!("{joint} stopped making progress before reaching its target"),
                };
                return Some(message);
            }
        }
        None
    }

    fn finish<W>(
        &mut self,
        world: &mut W,
        plan: MotionPlan,
        result: CompletionResult,
    ) -> CompletionResult
    where
        W: PhysicsWorld + CollisionFeed + SceneQuery,
    {
        if !result.success && plan.return_to_start_on_failure {
            debug!("restoring start pose after failure");
            for (joint, start) in &plan.starts {
                world.set_joint_target(*joint, *start);
            }
            #[allow(clippy::cast_possible_truncation)]
            world.advance_physics(self.sim.physics_dt as f32);
            self.registry.ingest(world);
        }

        self.snap_handle(world, plan.planned_extension);

        if result.success {
            info!(steps = plan.steps_taken, "command complete");
        } else {
            info!(error = %result.error_message, "command failed");
        }
        result
    }
}

/// Name the blocking object for the failure message: the owning sim
/// object's display name, the structure name for non-object world
/// structure, or the raw collider ID as a last resort.
pub(crate) fn obstacle_label<W: SceneQuery>(world: &W, obstacle: ColliderId) -> String {
    match world.owner_of(obstacle) {
        Some(owner) => world.display_name(owner),
        None if world.is_structure(obstacle) => world.structure_name(obstacle),
        None => obstacle.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use nalgebra::Point3;

    use waldo_core::config::{ArmConfig, SimConfig};
    use waldo_motion::drive::StopReason;
    use waldo_test_utils::ScriptedWorld;

    use crate::command::MoveArmTarget;
    use crate::controller::ArmController;
    use crate::embodiment::{ExtendJoint, StretchArm};

    use super::*;

    const BASE: JointId = JointId(0);
    const WRIST: JointId = JointId(5);
    const PROBE: ColliderId = ColliderId(1000);

    fn stretch_arm() -> StretchArm {
        StretchArm::new(
            BASE,
            WRIST,
            (1..=4)
                .map(|i| ExtendJoint::new(JointId(i), 0.1))
                .collect(),
        )
    }

    fn controller_with(arm: ArmConfig) -> ArmController<StretchArm> {
        let mut controller =
            ArmController::new(stretch_arm(), SimConfig::default(), arm).unwrap();
        controller.register_probe(PROBE);
        controller
    }

    fn controller() -> ArmController<StretchArm> {
        controller_with(ArmConfig::default())
    }

    fn world() -> ScriptedWorld {
        let mut world = ScriptedWorld::new();
        world.set_base_joint(BASE);
        for i in 1..=4 {
            world.add_extend_joint(JointId(i));
        }
        world.add_joint(WRIST);
        world
    }

    fn extend_positions(world: &ScriptedWorld) -> Vec<f32> {
        (1..=4).map(|i| world.joint_position(JointId(i))).collect()
    }

    // -- scenario: clear path --

    #[test]
    fn four_joint_extension_completes_with_equal_shares() {
        let mut controller = controller();
        let mut world = world();
        let cmd = MoveArmTarget::new(Point3::new(0.0, 0.0, 0.08), 0.25);
        let result = controller.move_arm_target(&mut world, &cmd);
        assert!(result.success, "{}", result.error_message);

        for position in extend_positions(&world) {
            assert_relative_eq!(position, 0.02, epsilon = 6e-3);
        }
        for i in 1..=4 {
            let drive = controller.drive(JointId(i)).unwrap();
            assert_eq!(drive.state(), DriveState::Idle);
            assert_eq!(drive.stop_reason(), Some(StopReason::Reached));
            // 0.02 at 0.25 units/s is 80 ms of stepping.
            assert_relative_eq!(drive.elapsed(), 0.08, epsilon = 0.021);
        }
    }

    // -- scenario: zero displacement --

    #[test]
    fn zero_displacement_succeeds_without_stepping() {
        let mut controller = controller();
        let mut world = world();
        let cmd = MoveArmTarget::new(Point3::new(0.0, 0.0, 0.0), 0.25);
        let result = controller.move_arm_target(&mut world, &cmd);
        assert!(result.success);
        assert_eq!(world.step_count(), 0);
        assert!(!controller.is_busy());
    }

    // -- scenario: halted by world structure --

    /// Structure overlap begins at t = 0.3 s (step 15 at 20 ms steps); the
    /// command must fail on that very step, naming the structure, with no
    /// joint advancing afterwards.
    #[test]
    fn structure_overlap_halts_on_its_step() {
        let mut controller = controller();
        let mut world = world();
        let wall = world.add_structure_collider("Wall_3");
        world.begin_overlap_at(15, PROBE, wall);

        let cmd = MoveArmTarget::new(Point3::new(0.0, 0.0, 0.4), 0.25);
        let result = controller.move_arm_target(&mut world, &cmd);
        assert!(!result.success);
        assert!(
            result.error_message.contains("Wall_3"),
            "unexpected message: {}",
            result.error_message
        );

        // 15 steps of 0.25 × 0.02 per joint, frozen there.
        assert_eq!(world.step_count(), 15);
        for position in extend_positions(&world) {
            assert_relative_eq!(position, 0.075, epsilon = 1e-5);
        }
        for i in 1..=4 {
            let drive = controller.drive(JointId(i)).unwrap();
            assert_eq!(drive.stop_reason(), Some(StopReason::Halted));
        }
    }

    #[test]
    fn obstacle_owned_by_object_is_named_in_the_failure() {
        let mut controller = controller();
        let mut world = world();
        let counter = world.add_object("CounterTop_1");
        world.mark_immovable(counter);
        let counter_collider = world.add_collider(counter);
        world.begin_overlap_at(3, counter_collider, PROBE);

        let cmd = MoveArmTarget::new(Point3::new(0.0, 0.0, 0.4), 0.25);
        let result = controller.move_arm_target(&mut world, &cmd);
        assert!(!result.success);
        assert!(result.error_message.contains("CounterTop_1"));
    }

    #[test]
    fn held_object_contact_does_not_halt() {
        let mut controller = controller();
        let mut world = world();
        let cup = world.add_object("Cup");
        world.mark_pickupable(cup, 0.3);
        world.mark_immovable(cup);
        let cup_collider = world.add_collider(cup);
        world.set_sphere_hits(vec![cup_collider]);
        assert!(controller.pickup(&world, &crate::command::Pickup::default()).success);

        world.begin_overlap_at(2, PROBE, cup_collider);
        let cmd = MoveArmTarget::new(Point3::new(0.0, 0.0, 0.08), 0.25);
        let result = controller.move_arm_target(&mut world, &cmd);
        assert!(result.success, "{}", result.error_message);
    }

    #[test]
    fn overlap_that_ends_before_motion_does_not_halt() {
        let mut controller = controller();
        let mut world = world();
        let wall = world.add_structure_collider("Wall_3");
        world.begin_overlap_at(2, PROBE, wall);
        world.end_overlap_at(2, PROBE, wall);

        let cmd = MoveArmTarget::new(Point3::new(0.0, 0.0, 0.08), 0.25);
        let result = controller.move_arm_target(&mut world, &cmd);
        // Begin and end land on the same step; the map is empty by the time
        // the oracle runs.
        assert!(result.success, "{}", result.error_message);
    }

    // -- timeout and stall --

    #[test]
    fn timeout_is_surfaced_distinctly_from_collision() {
        let arm = ArmConfig {
            max_time: 0.1,
            ..ArmConfig::default()
        };
        let mut controller = controller_with(arm);
        let mut world = world();
        let cmd = MoveArmTarget::new(Point3::new(0.0, 0.0, 0.4), 0.25);
        let result = controller.move_arm_target(&mut world, &cmd);
        assert!(!result.success);
        assert!(result.error_message.contains("did not reach its target within"));
        assert!(!result.error_message.contains("collided"));
    }

    #[test]
    fn pinned_joint_stalls_and_fails_the_command() {
        let mut controller = controller();
        let mut world = world();
        world.pin_joint(JointId(1), 0.001);

        let cmd = MoveArmTarget::new(Point3::new(0.0, 0.0, 0.4), 0.25);
        let result = controller.move_arm_target(&mut world, &cmd);
        assert!(!result.success);
        assert!(result.error_message.contains("stopped making progress"));
        assert_eq!(
            controller.drive(JointId(1)).unwrap().stop_reason(),
            Some(StopReason::Stalled)
        );
    }

    // -- return to start --

    #[test]
    fn failure_restores_start_pose_when_requested() {
        let mut controller = controller();
        let mut world = world();
        let wall = world.add_structure_collider("Wall_3");
        world.begin_overlap_at(10, PROBE, wall);

        let cmd = MoveArmTarget::new(Point3::new(0.0, 0.0, 0.4), 0.25)
            .with_return_to_start(true);
        let result = controller.move_arm_target(&mut world, &cmd);
        assert!(!result.success);
        for position in extend_positions(&world) {
            assert_relative_eq!(position, 0.0, epsilon = 1e-6);
        }
    }

    // -- cancellation --

    #[test]
    fn cancel_between_steps_leaves_drives_idle_and_held_intact() {
        let mut controller = controller();
        let mut world = world();
        let cup = world.add_object("Cup");
        world.mark_pickupable(cup, 0.3);
        let cup_collider = world.add_collider(cup);
        world.set_sphere_hits(vec![cup_collider]);
        assert!(controller.pickup(&world, &crate::command::Pickup::default()).success);

        let cmd = MoveArmTarget::new(Point3::new(0.0, 0.0, 0.4), 0.25);
        assert!(controller.start_move_arm_target(&mut world, &cmd).is_none());
        for _ in 0..3 {
            assert_eq!(controller.step_active(&mut world), StepOutcome::Running);
        }
        controller.cancel_active();

        assert!(!controller.is_busy());
        for i in 1..=4 {
            assert_eq!(
                controller.drive(JointId(i)).unwrap().state(),
                DriveState::Idle
            );
        }
        assert!(controller.held().holds_object(cup));
        assert_eq!(controller.step_active(&mut world), StepOutcome::Idle);
    }

    // -- mode equivalence --

    fn blocked_scene() -> (ArmController<StretchArm>, ScriptedWorld) {
        let controller = controller();
        let mut world = world();
        let wall = world.add_structure_collider("Wall_3");
        world.begin_overlap_at(15, PROBE, wall);
        (controller, world)
    }

    #[test]
    fn live_and_unrolled_modes_end_in_the_same_state() {
        let cmd = MoveArmTarget::new(Point3::new(0.0, 0.0, 0.4), 0.25);

        let (mut unrolled_controller, mut unrolled_world) = blocked_scene();
        let unrolled_result = unrolled_controller.move_arm_target(&mut unrolled_world, &cmd);

        let (mut live_controller, mut live_world) = blocked_scene();
        assert!(live_controller
            .start_move_arm_target(&mut live_world, &cmd)
            .is_none());
        let live_result = loop {
            // One step per "frame", as an engine scheduler would drive it.
            match live_controller.step_active(&mut live_world) {
                StepOutcome::Running => {}
                StepOutcome::Finished(result) => break result,
                StepOutcome::Idle => unreachable!("motion vanished mid-flight"),
            }
        };

        assert_eq!(unrolled_result, live_result);
        assert_eq!(
            extend_positions(&unrolled_world),
            extend_positions(&live_world)
        );
        assert_eq!(unrolled_world.step_count(), live_world.step_count());
    }
}
