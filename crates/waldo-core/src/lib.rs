// waldo-core: Types, stable IDs, boundary traits, config, time, errors for
// the waldo manipulator simulation.

pub mod config;
pub mod error;
pub mod time;
pub mod traits;
pub mod types;

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::config::{ArmConfig, SimConfig};
    pub use crate::error::{CommandError, ConfigError, SetupError, WaldoError};
    pub use crate::time::{SimTime, StepAccumulator};
    pub use crate::traits::{
        CollisionFeed, GraspProvider, PhysicsWorld, SceneQuery, ShapeQuery,
    };
    pub use crate::types::{
        ColliderId, CompletionResult, CoordinateSpace, JointId, MotionSign, ObjectId, StepMode,
    };
}
