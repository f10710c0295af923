//! Buffering event handler for rapier collision events.

use std::sync::Mutex;

use rapier3d::prelude::{
    ColliderHandle, ColliderSet, CollisionEvent, ContactPair, EventHandler, Real, RigidBodySet,
};

/// Collects `Started`/`Stopped` collision events during a physics step.
///
/// Rapier hands events to the handler from inside the pipeline, so the
/// buffers sit behind mutexes; the world drains them right after the step,
/// on the same thread.
#[derive(Debug, Default)]
pub struct CollisionBuffer {
    started: Mutex<Vec<(ColliderHandle, ColliderHandle)>>,
    stopped: Mutex<Vec<(ColliderHandle, ColliderHandle)>>,
}

impl CollisionBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take every pair whose overlap began during the last step.
    pub fn drain_started(&self) -> Vec<(ColliderHandle, ColliderHandle)> {
        self.started
            .lock()
            .map(|mut pairs| std::mem::take(&mut *pairs))
            .unwrap_or_default()
    }

    /// Take every pair whose overlap ended during the last step.
    pub fn drain_stopped(&self) -> Vec<(ColliderHandle, ColliderHandle)> {
        self.stopped
            .lock()
            .map(|mut pairs| std::mem::take(&mut *pairs))
            .unwrap_or_default()
    }
}

impl EventHandler for CollisionBuffer {
    fn handle_collision_event(
        &self,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        event: CollisionEvent,
        _contact_pair: Option<&ContactPair>,
    ) {
        match event {
            CollisionEvent::Started(a, b, _) => {
                if let Ok(mut pairs) = self.started.lock() {
                    pairs.push((a, b));
                }
            }
            CollisionEvent::Stopped(a, b, _) => {
                if let Ok(mut pairs) = self.stopped.lock() {
                    pairs.push((a, b));
                }
            }
        }
    }

    fn handle_contact_force_event(
        &self,
        _dt: Real,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        _contact_pair: &ContactPair,
        _total_force_magnitude: Real,
    ) {
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
