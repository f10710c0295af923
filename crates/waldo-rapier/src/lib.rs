// waldo-rapier: rapier3d-backed implementation of the waldo boundary traits.
//
// Arm links are kinematic position-based bodies driven one axis per joint;
// probe colliders are sensors whose begin/end intersection events feed the
// contact registry through the `CollisionFeed` trait. The rest of the core
// never sees a rapier type.

pub mod events;
pub mod world;

pub use world::{ObjectSpec, RapierWorld};
