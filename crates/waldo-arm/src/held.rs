//! Bookkeeping of grasped objects.

use std::collections::{BTreeMap, BTreeSet};

use waldo_core::traits::GraspProvider;
use waldo_core::types::{ColliderId, ObjectId};

/// Grasped object → its colliders, owned by the arm controller.
///
/// Entries are added on pickup and removed on release/drop; the collision
/// classifier consults this map so contact with a carried object never
/// reads as an obstacle.
#[derive(Debug, Clone, Default)]
pub struct HeldObjects {
    map: BTreeMap<ObjectId, BTreeSet<ColliderId>>,
}

impl HeldObjects {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a grasp. Replaces the collider set if the object was somehow
    /// already held.
    pub fn grasp(&mut self, object: ObjectId, colliders: BTreeSet<ColliderId>) {
        self.map.insert(object, colliders);
    }

    /// Release one object. Returns `true` if it was held.
    pub fn release(&mut self, object: ObjectId) -> bool {
        self.map.remove(&object).is_some()
    }

    /// Release everything, returning the dropped objects.
    pub fn release_all(&mut self) -> Vec<ObjectId> {
        let objects: Vec<_> = self.map.keys().copied().collect();
        self.map.clear();
        objects
    }

    #[must_use]
    pub fn holds_object(&self, object: ObjectId) -> bool {
        self.map.contains_key(&object)
    }

    #[must_use]
    pub fn holds_collider(&self, collider: ColliderId) -> bool {
        self.map.values().any(|set| set.contains(&collider))
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl GraspProvider for HeldObjects {
    fn held_objects(&self) -> &BTreeMap<ObjectId, BTreeSet<ColliderId>> {
        &self.map
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn colliders(ids: &[u64]) -> BTreeSet<ColliderId> {
        ids.iter().map(|&id| ColliderId(id)).collect()
    }

    #[test]
    fn grasp_and_release_round_trip() {
        let mut held = HeldObjects::new();
        held.grasp(ObjectId(1), colliders(&[10, 11]));

        assert!(held.holds_object(ObjectId(1)));
        assert!(held.holds_collider(ColliderId(10)));
        assert!(!held.holds_collider(ColliderId(12)));
        assert_eq!(held.count(), 1);

        assert!(held.release(ObjectId(1)));
        assert!(held.is_empty());
        assert!(!held.release(ObjectId(1)));
    }

    #[test]
    fn release_all_returns_dropped_objects() {
        let mut held = HeldObjects::new();
        held.grasp(ObjectId(2), colliders(&[20]));
        held.grasp(ObjectId(1), colliders(&[10]));

        let dropped = held.release_all();
        assert_eq!(dropped, vec![ObjectId(1), ObjectId(2)]);
        assert!(held.is_empty());
    }

    #[test]
    fn grasp_provider_exposes_map() {
        let mut held = HeldObjects::new();
        held.grasp(ObjectId(1), colliders(&[10]));
        let map = held.held_objects();
        assert!(map[&ObjectId(1)].contains(&ColliderId(10)));
    }
}
