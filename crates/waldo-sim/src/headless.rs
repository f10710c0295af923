//! Headless integration tests across the whole stack: session, controller,
//! step driver, registry, and classifier against the scripted world.

use approx::assert_relative_eq;
use nalgebra::Point3;

use waldo_arm::command::{MoveArmTarget, MoveBase, Pickup};
use waldo_arm::controller::ArmController;
use waldo_arm::embodiment::{ExtendJoint, StretchArm};
use waldo_arm::stepper::StepOutcome;
use waldo_core::config::{ArmConfig, SimConfig};
use waldo_core::traits::PhysicsWorld;
use waldo_core::types::{ColliderId, JointId, StepMode};
use waldo_test_utils::ScriptedWorld;

use crate::session::SimSession;

const BASE: JointId = JointId(0);
const WRIST: JointId = JointId(5);
const PROBE: ColliderId = ColliderId(1000);

fn stretch_arm() -> StretchArm {
    StretchArm::new(
        BASE,
        WRIST,
        (1..=4).map(|i| ExtendJoint::new(JointId(i), 0.1)).collect(),
    )
}

fn session() -> SimSession<ScriptedWorld, StretchArm> {
    let mut world = ScriptedWorld::new();
    world.set_base_joint(BASE);
    for i in 1..=4 {
        world.add_extend_joint(JointId(i));
    }
    world.add_joint(WRIST);

    let mut controller =
        ArmController::new(stretch_arm(), SimConfig::default(), ArmConfig::default()).unwrap();
    controller.register_probe(PROBE);
    SimSession::new(world, controller)
}

// -------------------------------------------------------------------
// Command sequence with statistics
// -------------------------------------------------------------------

#[test]
fn command_sequence_accumulates_stats_and_time() {
    let mut session = session();

    // Raise the base, extend, grasp, then run into a wall.
    let result = session.move_base(&MoveBase::new(0.5, 0.5));
    assert!(result.success, "{}", result.error_message);

    let result = session.move_arm_target(&MoveArmTarget::new(Point3::new(0.0, 0.5, 0.2), 0.25));
    assert!(result.success, "{}", result.error_message);

    let cup = session.world_mut().add_object("Mug_7");
    session.world_mut().mark_pickupable(cup, 0.3);
    let cup_collider = session.world_mut().add_collider(cup);
    session.world_mut().set_sphere_hits(vec![cup_collider]);
    assert!(session.pickup(&Pickup::default()).success);

    let wall_step = session.world().step_count() + 5;
    let wall = session.world_mut().add_structure_collider("Wall_2");
    session.world_mut().begin_overlap_at(wall_step, PROBE, wall);
    let result = session.move_arm_target(&MoveArmTarget::new(Point3::new(0.0, 0.5, 0.4), 0.25));
    assert!(!result.success);
    assert!(result.error_message.contains("Wall_2"));

    let stats = session.stats();
    assert_eq!(stats.commands_run, 4);
    assert_eq!(stats.succeeded, 3);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.last_error.as_deref(), Some(result.error_message.as_str()));
    assert!(stats.steps_run > 0);

    // The clock tracks exactly the steps that ran.
    let expected = session.world().step_count() as f64 * 0.02;
    assert!((session.clock().secs_f64() - expected).abs() < 1e-6);

    // The mug survived the collision failure.
    assert!(session.controller().held().holds_object(cup));
}

// -------------------------------------------------------------------
// Live pacing through the session
// -------------------------------------------------------------------

#[test]
fn live_command_is_paced_by_the_caller() {
    let mut session = session();
    let cmd = MoveArmTarget::new(Point3::new(0.0, 0.0, 0.08), 0.25)
        .with_step_mode(StepMode::Live);

    // Live start returns immediately; the result arrives via step().
    let started = session.move_arm_target(&cmd);
    assert!(started.success);
    assert!(session.controller().is_busy());

    let mut finished = None;
    for _ in 0..1_000 {
        match session.step() {
            StepOutcome::Running => {}
            StepOutcome::Finished(result) => {
                finished = Some(result);
                break;
            }
            StepOutcome::Idle => panic!("motion vanished"),
        }
    }
    let result = finished.expect("live motion never finished");
    assert!(result.success, "{}", result.error_message);

    let extension: f32 = (1..=4)
        .map(|i| session.world().joint_position(JointId(i)))
        .sum();
    assert_relative_eq!(extension, 0.08, epsilon = 0.02);
}

#[test]
fn cancel_mid_live_command_leaves_a_consistent_session() {
    let mut session = session();
    let cmd = MoveArmTarget::new(Point3::new(0.0, 0.0, 0.4), 0.25)
        .with_step_mode(StepMode::Live);
    assert!(session.move_arm_target(&cmd).success);

    for _ in 0..3 {
        assert_eq!(session.step(), StepOutcome::Running);
    }
    session.cancel();
    assert!(!session.controller().is_busy());
    assert_eq!(session.step(), StepOutcome::Idle);

    // A fresh command runs fine afterwards.
    let result = session.move_base(&MoveBase::new(0.3, 0.5));
    assert!(result.success, "{}", result.error_message);
}

// -------------------------------------------------------------------
// Rejected commands never touch the world
// -------------------------------------------------------------------

#[test]
fn rejected_command_is_counted_but_steps_nothing() {
    let mut session = session();
    let before = session.world().step_count();

    let result = session.move_arm_target(&MoveArmTarget::new(Point3::new(0.0, 0.0, 9.0), 0.25));
    assert!(!result.success);
    assert_eq!(session.world().step_count(), before);
    assert_eq!(session.stats().failed, 1);
    assert_eq!(session.stats().steps_run, 0);
}
