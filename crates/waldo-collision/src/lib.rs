// waldo-collision: Contact registry, collision classifier, and halt oracle
// for the waldo manipulator simulation.
//
// The registry aggregates sensor-overlap events into a map of externally
// touched colliders; the classifier turns each touched collider into a
// semantic verdict; the halt oracle reduces the whole map to the single
// "must motion stop now?" decision the step driver polls every step.

pub mod classify;
pub mod ledger;
pub mod registry;

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::classify::{Classifier, Verdict};
    pub use crate::ledger::AttachmentLedger;
    pub use crate::registry::ContactRegistry;
}
