// waldo-arm: Arm controller façade and step driver for the waldo
// manipulator simulation.
//
// Takes one high-level command (move the wrist to a point, raise the base,
// rotate the wrist), fans it out into per-joint allocations, then polls the
// joint drives and the halt oracle once per fixed step until completion,
// timeout, or halt. Every public operation returns a `CompletionResult`;
// nothing throws across this boundary.

pub mod command;
pub mod controller;
pub mod embodiment;
pub mod held;
pub mod stepper;

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::command::{MoveArmTarget, MoveBase, Pickup, RotateElbow, RotateWrist};
    pub use crate::controller::ArmController;
    pub use crate::embodiment::{ArmKind, ArticulatedArm, Embodiment, ExtendJoint, StretchArm};
    pub use crate::held::HeldObjects;
    pub use crate::stepper::StepOutcome;
}
