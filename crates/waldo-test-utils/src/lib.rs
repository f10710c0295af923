// waldo-test-utils: Scripted mock world for cross-crate tests.

pub mod world;

pub use world::ScriptedWorld;
