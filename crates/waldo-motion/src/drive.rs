//! One joint's incremental-motion state machine.

use waldo_core::types::JointId;

use crate::cache::PositionCache;
use crate::params::MoveParams;

// ---------------------------------------------------------------------------
// DriveState / StopReason
// ---------------------------------------------------------------------------

/// Lifecycle state of a joint drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DriveState {
    /// At rest; `advance` is a no-op.
    #[default]
    Idle,
    /// Actively stepping toward the target.
    Moving,
}

/// Why a drive returned to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Within tolerance of the allocated distance.
    Reached,
    /// Exceeded `max_time` without arriving; a configuration smell, not a
    /// collision.
    TimedOut,
    /// The position window stopped spreading: the joint is commanded forward
    /// but physically held in place.
    Stalled,
    /// Stopped externally by the halt oracle.
    Halted,
}

// ---------------------------------------------------------------------------
// JointDrive
// ---------------------------------------------------------------------------

/// Advances one joint along its single controlled axis.
///
/// `Idle → Moving` on [`prepare`](Self::prepare); `Moving → Idle` when the
/// allocated distance is covered, the safety-valve timeout fires, the stall
/// window collapses, or [`halt`](Self::halt) is called. Once `Idle`, every
/// further [`advance`](Self::advance) and [`observe`](Self::observe) is a
/// no-op, so termination is idempotent.
#[derive(Debug)]
pub struct JointDrive {
    joint: JointId,
    params: Option<MoveParams>,
    start: f32,
    position: f32,
    elapsed: f32,
    moved: f32,
    cache: PositionCache,
    state: DriveState,
    stop: Option<StopReason>,
}

impl JointDrive {
    #[must_use]
    pub fn new(joint: JointId) -> Self {
        Self {
            joint,
            params: None,
            start: 0.0,
            position: 0.0,
            elapsed: 0.0,
            moved: 0.0,
            cache: PositionCache::new(2),
            state: DriveState::Idle,
            stop: None,
        }
    }

    #[must_use]
    pub const fn joint(&self) -> JointId {
        self.joint
    }

    /// Load fresh parameters and arm the drive.
    ///
    /// A zero-distance request (or `MotionSign::None`) completes on the
    /// spot: the drive stays `Idle` with `StopReason::Reached` and no
    /// tolerance/ratio math ever runs on the zero.
    pub fn prepare(&mut self, params: MoveParams, start_position: f32) {
        self.cache = PositionCache::new(params.cache_size());
        self.start = start_position;
        self.position = start_position;
        self.elapsed = 0.0;
        self.moved = 0.0;

        if params.direction().is_none() || params.total_distance() == 0.0 {
            self.state = DriveState::Idle;
            self.stop = Some(StopReason::Reached);
        } else {
            self.state = DriveState::Moving;
            self.stop = None;
        }
        self.params = Some(params);
    }

    /// Advance one fixed step: displace by `direction × speed × dt`, record
    /// the new position, accumulate time, and re-derive the state.
    pub fn advance(&mut self, dt: f32) -> DriveState {
        if self.state != DriveState::Moving {
            return self.state;
        }
        let Some(params) = self.params else {
            return self.state;
        };

        self.position += params.direction().as_f32() * params.speed() * dt;
        self.elapsed += dt;
        self.cache.push(self.position);
        self.moved = (self.position - self.start).abs();
        self.evaluate(&params);
        self.state
    }

    /// Physics read-back after the world resolved this step: overwrite the
    /// integrated position with the realized one and re-derive the state.
    ///
    /// Backends whose joints always realize their targets may still call
    /// this; it is then a no-op beyond replacing the identical sample.
    pub fn observe(&mut self, realized: f32) -> DriveState {
        if self.state != DriveState::Moving {
            return self.state;
        }
        let Some(params) = self.params else {
            return self.state;
        };

        self.position = realized;
        self.cache.replace_last(realized);
        self.moved = (realized - self.start).abs();
        self.evaluate(&params);
        self.state
    }

    fn evaluate(&mut self, params: &MoveParams) {
        if self.moved >= params.total_distance() - params.tolerance() {
            self.finish(StopReason::Reached);
        } else if self.elapsed >= params.max_time() {
            self.finish(StopReason::TimedOut);
        } else if self.cache.is_full() && self.cache.spread() < params.tolerance() {
            self.finish(StopReason::Stalled);
        }
    }

    fn finish(&mut self, reason: StopReason) {
        self.state = DriveState::Idle;
        self.stop = Some(reason);
    }

    /// External stop from the halt oracle: freeze at the current position.
    pub fn halt(&mut self) {
        if self.state == DriveState::Moving {
            self.finish(StopReason::Halted);
        }
    }

    /// Forget the current command entirely.
    pub fn reset(&mut self) {
        self.params = None;
        self.state = DriveState::Idle;
        self.stop = None;
        self.elapsed = 0.0;
        self.moved = 0.0;
        self.cache.clear();
    }

    #[must_use]
    pub const fn state(&self) -> DriveState {
        self.state
    }

    #[must_use]
    pub const fn stop_reason(&self) -> Option<StopReason> {
        self.stop
    }

    /// `true` iff the drive stopped for a non-collision failure reason
    /// (timeout or stall) and the command should end unsuccessfully.
    #[must_use]
    pub fn should_halt_joint(&self) -> bool {
        matches!(self.stop, Some(StopReason::TimedOut | StopReason::Stalled))
    }

    /// Commanded axis coordinate for the backend this step.
    #[must_use]
    pub const fn target_position(&self) -> f32 {
        self.position
    }

    #[must_use]
    pub const fn start_position(&self) -> f32 {
        self.start
    }

    #[must_use]
    pub const fn distance_moved(&self) -> f32 {
        self.moved
    }

    #[must_use]
    pub const fn elapsed(&self) -> f32 {
        self.elapsed
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
