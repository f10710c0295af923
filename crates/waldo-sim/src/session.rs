//! The simulation session façade.

use tracing::info;

use waldo_arm::command::{MoveArmTarget, MoveBase, Pickup, RotateElbow, RotateWrist};
use waldo_arm::controller::ArmController;
use waldo_arm::embodiment::Embodiment;
use waldo_arm::stepper::StepOutcome;
use waldo_core::time::SimTime;
use waldo_core::traits::{CollisionFeed, PhysicsWorld, SceneQuery, ShapeQuery};
use waldo_core::types::{CompletionResult, StepMode};

use crate::stats::CommandStats;

/// A world, an arm controller, a clock, and command statistics.
///
/// Unrolled commands are looped to completion inside the session; live
/// commands are started here and then paced by the caller through
/// [`step`](Self::step), one call per scheduler tick. Both paths execute
/// the controller's single per-step sequence, so they end in identical
/// states.
pub struct SimSession<W, E: Embodiment> {
    world: W,
    controller: ArmController<E>,
    clock: SimTime,
    stats: CommandStats,
}

impl<W, E> SimSession<W, E>
where
    W: PhysicsWorld + CollisionFeed + SceneQuery + ShapeQuery,
    E: Embodiment,
{
    pub fn new(world: W, controller: ArmController<E>) -> Self {
        Self {
            world,
            controller,
            clock: SimTime::new(),
            stats: CommandStats::new(),
        }
    }

    // -- accessors --

    pub fn world(&self) -> &W {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut W {
        &mut self.world
    }

    pub fn controller(&self) -> &ArmController<E> {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut ArmController<E> {
        &mut self.controller
    }

    #[must_use]
    pub const fn clock(&self) -> SimTime {
        self.clock
    }

    #[must_use]
    pub fn stats(&self) -> &CommandStats {
        &self.stats
    }

    // -- stepping --

    /// Advance the active motion by one fixed step, ticking the clock.
    pub fn step(&mut self) -> StepOutcome {
        let outcome = self.controller.step_active(&mut self.world);
        match &outcome {
            StepOutcome::Idle => {}
            StepOutcome::Running => {
                self.tick();
            }
            StepOutcome::Finished(result) => {
                self.tick();
                self.stats.record(result);
            }
        }
        outcome
    }

    fn tick(&mut self) {
        self.clock.advance_secs(self.controller.physics_dt());
        self.stats.record_step();
    }

    fn drain(&mut self, mode: StepMode) -> CompletionResult {
        match mode {
            StepMode::Live => CompletionResult::ok(),
            StepMode::Unrolled => loop {
                match self.step() {
                    StepOutcome::Running => {}
                    StepOutcome::Finished(result) => break result,
                    StepOutcome::Idle => {
                        break CompletionResult::fail("no active motion to run");
                    }
                }
            },
        }
    }

    fn finish_immediate(&mut self, result: CompletionResult) -> CompletionResult {
        self.stats.record(&result);
        result
    }

    // -- commands --

    /// Move the wrist toward a target. Unrolled commands block until
    /// terminal; live commands return `ok` immediately and are then paced
    /// through [`step`](Self::step).
    pub fn move_arm_target(&mut self, cmd: &MoveArmTarget) -> CompletionResult {
        info!(point = ?cmd.target, mode = ?cmd.step_mode, "session: move_arm_target");
        match self
            .controller
            .start_move_arm_target(&mut self.world, cmd)
        {
            Some(result) => self.finish_immediate(result),
            None => self.drain(cmd.step_mode),
        }
    }

    /// Raise or lower the base lift.
    pub fn move_base(&mut self, cmd: &MoveBase) -> CompletionResult {
        info!(height = cmd.height, mode = ?cmd.step_mode, "session: move_base");
        match self.controller.start_move_base(&mut self.world, cmd) {
            Some(result) => self.finish_immediate(result),
            None => self.drain(cmd.step_mode),
        }
    }

    /// Rotate the wrist. Always blocking (single-joint, short).
    pub fn rotate_wrist(&mut self, cmd: &RotateWrist) -> CompletionResult {
        let result = self.controller.rotate_wrist(&mut self.world, cmd);
        self.finish_immediate(result)
    }

    /// Rotate the elbow. Always blocking.
    pub fn rotate_elbow(&mut self, cmd: &RotateElbow) -> CompletionResult {
        let result = self.controller.rotate_elbow(&mut self.world, cmd);
        self.finish_immediate(result)
    }

    /// Magnet-sphere pickup at the wrist.
    pub fn pickup(&mut self, cmd: &Pickup) -> CompletionResult {
        let result = self.controller.pickup(&self.world, cmd);
        self.finish_immediate(result)
    }

    /// Drop everything held.
    pub fn release(&mut self) -> CompletionResult {
        let result = self.controller.release();
        self.finish_immediate(result)
    }

    /// Abandon any in-flight motion between steps.
    pub fn cancel(&mut self) {
        self.controller.cancel_active();
    }
}
