//! Engine-free incremental joint motion for the waldo manipulator.
//!
//! Pure Rust with no physics-engine dependencies. Each controlled joint gets
//! a [`JointDrive`](drive::JointDrive) that advances a validated, immutable
//! set of [`MoveParams`](params::MoveParams) one fixed step at a time and
//! halts itself on arrival, timeout, or stall.
//!
//! # Per-step pipeline
//!
//! ```text
//! MoveSpec → MoveParams → prepare → advance(dt) ┐ per step
//!            (validated)            observe(pos)┘ (physics read-back)
//! ```
//!
//! # Quick Start
//!
//! ```
//! use waldo_core::types::JointId;
//! use waldo_motion::prelude::*;
//!
//! let params = MoveParams::from_spec(MoveSpec::new(0.08, 0.25)).unwrap();
//! let mut drive = JointDrive::new(JointId(0));
//! drive.prepare(params, 0.0);
//!
//! let dt = 0.02;
//! while drive.advance(dt) == DriveState::Moving {}
//! assert_eq!(drive.stop_reason(), Some(StopReason::Reached));
//! ```

pub mod allocation;
pub mod cache;
pub mod drive;
pub mod params;

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::allocation::proportional_split;
    pub use crate::cache::PositionCache;
    pub use crate::drive::{DriveState, JointDrive, StopReason};
    pub use crate::params::{MoveParams, MoveSpec};
}
