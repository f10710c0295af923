use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// SimTime
// ---------------------------------------------------------------------------

/// Integer-nanosecond simulation clock.
///
/// Tracks elapsed simulated time as a monotonically increasing `u64`
/// nanosecond count, so long unrolled runs don't accumulate float error.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct SimTime {
    nanos: u64,
}

impl SimTime {
    /// A clock at zero.
    #[must_use]
    pub const fn new() -> Self {
        Self { nanos: 0 }
    }

    /// Build from seconds.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn from_secs(secs: f64) -> Self {
        Self {
            nanos: (secs * 1_000_000_000.0) as u64,
        }
    }

    /// Raw nanosecond count.
    #[must_use]
    pub const fn nanos(&self) -> u64 {
        self.nanos
    }

    /// Elapsed seconds as `f64`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn secs_f64(&self) -> f64 {
        self.nanos as f64 / 1_000_000_000.0
    }

    /// Elapsed seconds as `f32`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn secs_f32(&self) -> f32 {
        self.nanos as f32 / 1_000_000_000.0
    }

    /// Advance by `delta_secs` seconds.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn advance_secs(&mut self, delta_secs: f64) {
        let delta_nanos = (delta_secs * 1_000_000_000.0) as u64;
        self.nanos = self.nanos.saturating_add(delta_nanos);
    }

    /// Reset to zero.
    pub fn reset(&mut self) {
        self.nanos = 0;
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.nanos / 1_000_000_000;
        let millis = (self.nanos % 1_000_000_000) / 1_000_000;
        write!(f, "{secs}.{millis:03}s")
    }
}

// ---------------------------------------------------------------------------
// StepAccumulator
// ---------------------------------------------------------------------------

/// Live-mode pacing: feed real frame deltas, dispense fixed simulation steps.
///
/// Caps the number of steps dispensed per frame so a long frame cannot stall
/// the caller in a catch-up loop.
#[derive(Debug, Clone)]
pub struct StepAccumulator {
    accumulated: u64,
    timestep_nanos: u64,
    frame_cap: u32,
    steps_this_frame: u32,
}

impl StepAccumulator {
    /// Accumulator dispensing steps of `timestep_secs` seconds.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn new(timestep_secs: f64) -> Self {
        Self {
            accumulated: 0,
            timestep_nanos: (timestep_secs * 1_000_000_000.0) as u64,
            frame_cap: 8,
            steps_this_frame: 0,
        }
    }

    /// Set the maximum number of steps dispensed per frame.
    #[must_use]
    pub const fn with_frame_cap(mut self, cap: u32) -> Self {
        self.frame_cap = cap;
        self
    }

    /// Feed a real frame delta; resets the per-frame step counter.
    #[allow(clippy::cast_possible_truncation)]
    pub fn accumulate(&mut self, delta: Duration) {
        self.accumulated = self.accumulated.saturating_add(delta.as_nanos() as u64);
        self.steps_this_frame = 0;
    }

    /// Consume one timestep if available and under the frame cap.
    pub fn should_step(&mut self) -> bool {
        if self.steps_this_frame >= self.frame_cap {
            return false;
        }
        if self.accumulated >= self.timestep_nanos {
            self.accumulated -= self.timestep_nanos;
            self.steps_this_frame += 1;
            return true;
        }
        false
    }

    /// Discard accumulated time.
    pub fn reset(&mut self) {
        self.accumulated = 0;
        self.steps_this_frame = 0;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simtime_starts_at_zero() {
        assert_eq!(SimTime::new().nanos(), 0);
    }

    #[test]
    fn simtime_from_and_to_secs() {
        let t = SimTime::from_secs(1.5);
        assert_eq!(t.nanos(), 1_500_000_000);
        assert!((t.secs_f64() - 1.5).abs() < 1e-9);
        assert!((t.secs_f32() - 1.5).abs() < 1e-4);
    }

    #[test]
    fn simtime_advance_accumulates() {
        let mut t = SimTime::new();
        for _ in 0..50 {
            t.advance_secs(0.02);
        }
        assert!((t.secs_f64() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn simtime_reset() {
        let mut t = SimTime::from_secs(3.0);
        t.reset();
        assert_eq!(t.nanos(), 0);
    }

    #[test]
    fn simtime_display() {
        assert_eq!(SimTime::from_secs(1.25).to_string(), "1.250s");
    }

    #[test]
    fn accumulator_dispenses_whole_steps() {
        let mut acc = StepAccumulator::new(0.01);
        acc.accumulate(Duration::from_millis(35));
        let mut steps = 0;
        while acc.should_step() {
            steps += 1;
        }
        assert_eq!(steps, 3);
    }

    #[test]
    fn accumulator_respects_frame_cap() {
        let mut acc = StepAccumulator::new(0.001).with_frame_cap(4);
        acc.accumulate(Duration::from_millis(100));
        let mut steps = 0;
        while acc.should_step() {
            steps += 1;
        }
        assert_eq!(steps, 4);
    }

    #[test]
    fn accumulator_carries_remainder() {
        let mut acc = StepAccumulator::new(0.01);
        acc.accumulate(Duration::from_millis(15));
        assert!(acc.should_step());
        assert!(!acc.should_step());
        // 5ms left over; the next 5ms frame completes a step.
        acc.accumulate(Duration::from_millis(5));
        assert!(acc.should_step());
    }

    #[test]
    fn accumulator_reset_discards_time() {
        let mut acc = StepAccumulator::new(0.01);
        acc.accumulate(Duration::from_millis(50));
        acc.reset();
        assert!(!acc.should_step());
    }
}
