//! Per-agent bookkeeping of which probe colliders touch which externals.
//!
//! The registry owns the external overlap map exclusively: it is mutated
//! only by sensor-event ingestion, never by the controller or the joint
//! drives. Classification happens elsewhere; the registry records, the
//! [`Classifier`](crate::classify::Classifier) judges.

use std::collections::{BTreeMap, BTreeSet};

use waldo_core::traits::CollisionFeed;
use waldo_core::types::ColliderId;

// ---------------------------------------------------------------------------
// ContactRegistry
// ---------------------------------------------------------------------------

/// Tracks, for every externally touched collider, the set of the agent's own
/// probe colliders currently overlapping it.
///
/// Invariant: a probe appears under an external key only while the overlap
/// is live; removing the last probe for a key removes the key. BTree storage
/// keyed by stable IDs makes iteration deterministic, so "the first
/// obstacle" is the same collider run after run.
#[derive(Debug, Default)]
pub struct ContactRegistry {
    probes: BTreeSet<ColliderId>,
    touching: BTreeMap<ColliderId, BTreeSet<ColliderId>>,
}

impl ContactRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a probe collider. Registering an already-registered probe is
    /// a no-op.
    pub fn register_probe(&mut self, probe: ColliderId) {
        self.probes.insert(probe);
    }

    /// Deregister a probe (its owning body part was destroyed) and drop it
    /// from every live overlap, removing externals it was the last toucher of.
    pub fn deregister_probe(&mut self, probe: ColliderId) {
        self.probes.remove(&probe);
        self.touching.retain(|_, probes| {
            probes.remove(&probe);
            !probes.is_empty()
        });
    }

    /// Whether `collider` is one of this registry's probes.
    #[must_use]
    pub fn is_probe(&self, collider: ColliderId) -> bool {
        self.probes.contains(&collider)
    }

    /// Record the start of an overlap. The pair is unordered; exactly one
    /// side must be a registered probe, otherwise the event is ignored
    /// (probe-probe contacts carry no information about the outside world).
    pub fn on_overlap_begin(&mut self, a: ColliderId, b: ColliderId) {
        let Some((probe, external)) = self.split_pair(a, b) else {
            return;
        };
        self.touching.entry(external).or_default().insert(probe);
    }

    /// Record the end of an overlap; drops the external key when its last
    /// probe leaves.
    pub fn on_overlap_end(&mut self, a: ColliderId, b: ColliderId) {
        let Some((probe, external)) = self.split_pair(a, b) else {
            return;
        };
        if let Some(probes) = self.touching.get_mut(&external) {
            probes.remove(&probe);
            if probes.is_empty() {
                self.touching.remove(&external);
            }
        }
    }

    /// Drain one step's worth of sensor events from the backend.
    pub fn ingest<F: CollisionFeed>(&mut self, feed: &mut F) {
        for (a, b) in feed.overlaps_beginning_this_step() {
            self.on_overlap_begin(a, b);
        }
        for (a, b) in feed.overlaps_ending_this_step() {
            self.on_overlap_end(a, b);
        }
    }

    /// Clear the overlap map wholesale. Probe registrations survive.
    pub fn reset(&mut self) {
        self.touching.clear();
    }

    /// Lazy, restartable iteration over currently touched externals.
    pub fn current_obstacles(&self) -> impl Iterator<Item = ColliderId> + '_ {
        self.touching.keys().copied()
    }

    /// Iteration over (external, touching probes) entries.
    pub fn overlaps(&self) -> impl Iterator<Item = (ColliderId, &BTreeSet<ColliderId>)> + '_ {
        self.touching.iter().map(|(external, probes)| (*external, probes))
    }

    /// Probes currently touching `external`, if any.
    #[must_use]
    pub fn touching_probes(&self, external: ColliderId) -> Option<&BTreeSet<ColliderId>> {
        self.touching.get(&external)
    }

    /// Number of externally touched colliders.
    #[must_use]
    pub fn touched_count(&self) -> usize {
        self.touching.len()
    }

    /// Whether nothing external is currently touched.
    #[must_use]
    pub fn is_clear(&self) -> bool {
        self.touching.is_empty()
    }

    fn split_pair(&self, a: ColliderId, b: ColliderId) -> Option<(ColliderId, ColliderId)> {
        match (self.probes.contains(&a), self.probes.contains(&b)) {
            (true, false) => Some((a, b)),
            (false, true) => Some((b, a)),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
