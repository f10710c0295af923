//! waldo demo CLI.
//!
//! Builds a small kitchen scene on the rapier backend, mounts a Stretch-style
//! arm, and runs a command sequence that ends with a collision halt:
//! - `demo`: every command unrolled back-to-back
//! - `live`: the same sequence paced frame-by-frame through a step
//!   accumulator, as an engine scheduler would drive it

use std::time::Duration;

use clap::{Parser, Subcommand};
use nalgebra::{Isometry3, Point3, UnitVector3, Vector3};
use tracing::info;

use waldo_arm::command::{MoveArmTarget, MoveBase, Pickup, RotateWrist};
use waldo_arm::controller::ArmController;
use waldo_arm::embodiment::{ExtendJoint, StretchArm};
use waldo_arm::stepper::StepOutcome;
use waldo_core::config::{ArmConfig, SimConfig};
use waldo_core::error::WaldoError;
use waldo_core::time::StepAccumulator;
use waldo_core::types::{CompletionResult, JointId, StepMode};
use waldo_rapier::{ObjectSpec, RapierWorld};
use waldo_sim::SimSession;

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

/// waldo manipulator simulation demo.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the kitchen sequence with every command unrolled.
    Demo,
    /// Run the same sequence paced one step per simulated frame.
    Live,
}

fn main() -> Result<(), WaldoError> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let mode = match cli.command.unwrap_or(Commands::Demo) {
        Commands::Demo => StepMode::Unrolled,
        Commands::Live => StepMode::Live,
    };
    run_sequence(mode)
}

// ---------------------------------------------------------------------------
// Scene assembly
// ---------------------------------------------------------------------------

const BASE: JointId = JointId(0);
const WRIST: JointId = JointId(5);

fn build_session() -> Result<SimSession<RapierWorld, StretchArm>, WaldoError> {
    let mut world = RapierWorld::new();

    // Static structure and furniture.
    world.add_structure(
        "Floor",
        Vector3::new(5.0, 0.1, 5.0),
        Isometry3::translation(0.0, -0.1, 0.0),
    );
    world.add_object(
        ObjectSpec::new("CounterTop_1", Vector3::new(0.6, 0.45, 0.1))
            .immovable()
            .at(Isometry3::translation(0.0, 0.45, 0.85)),
    );
    // Resting on the counter's front edge, inside magnet reach at partial
    // extension.
    let (apple, _) = world.add_object(
        ObjectSpec::new("Apple_3", Vector3::new(0.04, 0.04, 0.04))
            .pickupable(0.2)
            .at(Isometry3::translation(0.0, 0.94, 0.8)),
    );
    info!(%apple, "scene furnished");

    // Agent: torso, lift, four telescoping segments, wrist.
    let torso = world.add_agent_link("torso", None, Isometry3::identity());
    let lift = world.add_agent_link("arm_lift", Some(torso), Isometry3::translation(0.0, 0.5, 0.0));
    world.bind_prismatic(BASE, lift, UnitVector3::new_normalize(Vector3::y()))?;

    let mut parent = lift;
    for i in 1..=4_u64 {
        #[allow(clippy::cast_precision_loss)]
        let pose = Isometry3::translation(0.0, 0.5, 0.1 * i as f32);
        let segment = world.add_agent_link(&format!("arm_seg_{i}"), Some(parent), pose);
        world.bind_prismatic(JointId(i), segment, UnitVector3::new_normalize(Vector3::z()))?;
        parent = segment;
    }

    let wrist = world.add_agent_link("arm_wrist", Some(parent), Isometry3::translation(0.0, 0.5, 0.5));
    world.bind_revolute(WRIST, wrist, UnitVector3::new_normalize(Vector3::z()))?;
    world.set_base_link(torso)?;
    world.set_wrist_link(wrist)?;

    let probe = world.add_probe(wrist, 0.08, Vector3::zeros())?;
    world.attach_registry(torso)?;

    let arm = StretchArm::new(
        BASE,
        WRIST,
        (1..=4).map(|i| ExtendJoint::new(JointId(i), 0.1)).collect(),
    );
    let mut controller = ArmController::new(arm, SimConfig::default(), ArmConfig::default())?;
    controller.register_probe(probe);

    Ok(SimSession::new(world, controller))
}

// ---------------------------------------------------------------------------
// Command sequence
// ---------------------------------------------------------------------------

fn run_sequence(mode: StepMode) -> Result<(), WaldoError> {
    let mut session = build_session()?;

    let result = session.move_base(&MoveBase::new(0.4, 0.4).with_step_mode(mode));
    report("move_base", &settle(&mut session, mode, result));

    let result = session.move_arm_target(
        &MoveArmTarget::new(Point3::new(0.0, 0.4, 0.15), 0.25)
            .with_restrict_target(true)
            .with_step_mode(mode),
    );
    report("move_arm_target", &settle(&mut session, mode, result));

    let result = session.rotate_wrist(&RotateWrist::new(90.0, 90.0));
    report("rotate_wrist", &result);

    let result = session.pickup(&Pickup::default());
    report("pickup", &result);

    // Full extension drives the wrist probe into the counter slab.
    let result = session.move_arm_target(
        &MoveArmTarget::new(Point3::new(0.0, 0.4, 0.4), 0.25)
            .with_restrict_target(true)
            .with_step_mode(mode),
    );
    report("extend_into_counter", &settle(&mut session, mode, result));

    let stats = session.stats();
    println!(
        "ran {} commands ({} ok, {} failed) across {} steps, {} simulated",
        stats.commands_run,
        stats.succeeded,
        stats.failed,
        stats.steps_run,
        session.clock()
    );
    Ok(())
}

/// In live mode a started command finishes through the frame loop; unrolled
/// commands arrive terminal already.
fn settle(
    session: &mut SimSession<RapierWorld, StretchArm>,
    mode: StepMode,
    started: CompletionResult,
) -> CompletionResult {
    match mode {
        StepMode::Unrolled => started,
        StepMode::Live => {
            if !started.success || !session.controller().is_busy() {
                return started;
            }
            pace(session)
        }
    }
}

/// Drive the active motion one fixed step at a time, the way an engine
/// scheduler would: accumulate a frame delta, dispense whole steps.
fn pace(session: &mut SimSession<RapierWorld, StretchArm>) -> CompletionResult {
    let mut frames = StepAccumulator::new(session.controller().physics_dt()).with_frame_cap(4);
    loop {
        frames.accumulate(Duration::from_millis(20));
        while frames.should_step() {
            match session.step() {
                StepOutcome::Running => {}
                StepOutcome::Finished(result) => return result,
                StepOutcome::Idle => return CompletionResult::ok(),
            }
        }
    }
}

fn report(label: &str, result: &CompletionResult) {
    if result.success {
        println!("{label}: ok");
    } else {
        println!("{label}: failed: {}", result.error_message);
    }
}
