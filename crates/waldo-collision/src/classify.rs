//! Semantic verdicts over touched colliders, and the halt oracle.
//!
//! Classification is derived, never stored: every halt query re-walks the
//! registry's overlap map against current scene state, so a verdict can be
//! computed speculatively (diagnostics, tests) with no side effects.

use std::collections::BTreeSet;

use waldo_core::traits::{GraspProvider, SceneQuery};
use waldo_core::types::{ColliderId, ObjectId};

use crate::registry::ContactRegistry;

/// Bound on ancestor walks; a rigid hierarchy deeper than this is malformed.
const MAX_HIERARCHY_DEPTH: usize = 64;

// ---------------------------------------------------------------------------
// Verdict
// ---------------------------------------------------------------------------

/// What a touched external collider means for arm motion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Expected or pushable contact; motion continues.
    Ignore,
    /// Immovable obstacle; continued motion into it must stop the arm.
    StaticObstacle,
}

// ---------------------------------------------------------------------------
// Classifier
// ---------------------------------------------------------------------------

/// Turns a raw overlap into a [`Verdict`] and answers the per-step halt
/// query.
///
/// Decision precedence, first match wins:
/// 1. external's ancestor is the agent's own body → obstacle
/// 2. only the designated self-ignore probe touches it → ignore;
///    the external belongs to a held object → ignore
/// 3. external's owner is flagged immovable → obstacle
/// 4. owner is pickupable but heavier than the mass threshold → obstacle
/// 5. external is tagged static world structure → obstacle
/// 6. otherwise → ignore
///
/// A collider with no discoverable owner and no structure tag falls all the
/// way through to `Ignore`: an unknown touch must not spuriously halt
/// legitimate motion.
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    self_ignore_probe: Option<ColliderId>,
    mass_threshold: Option<f32>,
}

impl Classifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Designate the probe whose solo contacts are always expected.
    #[must_use]
    pub const fn with_self_ignore_probe(mut self, probe: ColliderId) -> Self {
        self.self_ignore_probe = Some(probe);
        self
    }

    /// Treat pickupable objects above `threshold` kilograms as immovable.
    #[must_use]
    pub const fn with_mass_threshold(mut self, threshold: f32) -> Self {
        self.mass_threshold = Some(threshold);
        self
    }

    /// Classify one touched external collider. Pure; no mutation.
    pub fn classify<Q, G>(
        &self,
        scene: &Q,
        grasp: &G,
        external: ColliderId,
        probes: &BTreeSet<ColliderId>,
    ) -> Verdict
    where
        Q: SceneQuery + ?Sized,
        G: GraspProvider + ?Sized,
    {
        let owner = scene.owner_of(external);

        // 1. The arm can never push the agent's own body out of the way.
        if let Some(owner) = owner {
            if has_agent_ancestor(scene, owner) {
                return Verdict::StaticObstacle;
            }
        }

        // 2. Contacts made solely through the self-ignore probe are expected,
        //    held or not. A second, ordinary probe alongside it falls through
        //    to the ancestry rules below.
        if let Some(probe) = self.self_ignore_probe {
            if probes.len() == 1 && probes.contains(&probe) {
                return Verdict::Ignore;
            }
        }
        if is_held(grasp, external, owner) {
            return Verdict::Ignore;
        }

        // 3. / 4. Ancestry-based immovability.
        if let Some(owner) = owner {
            if scene.is_immovable(owner) {
                return Verdict::StaticObstacle;
            }
            if let Some(threshold) = self.mass_threshold {
                if scene.is_pickupable(owner) && scene.mass_of(owner) > threshold {
                    return Verdict::StaticObstacle;
                }
            }
        }

        // 5. Static world structure (walls, floors).
        if scene.is_structure(external) {
            return Verdict::StaticObstacle;
        }

        // 6. Unknown or freely movable: fail open.
        Verdict::Ignore
    }

    /// First external in the overlap map that classifies as an obstacle.
    /// Short-circuits; deterministic because the registry iterates in stable
    /// ID order.
    pub fn first_obstacle<Q, G>(
        &self,
        registry: &ContactRegistry,
        scene: &Q,
        grasp: &G,
    ) -> Option<ColliderId>
    where
        Q: SceneQuery + ?Sized,
        G: GraspProvider + ?Sized,
    {
        registry
            .overlaps()
            .find(|(external, probes)| {
                self.classify(scene, grasp, *external, probes) == Verdict::StaticObstacle
            })
            .map(|(external, _)| external)
    }

    /// The halt oracle: `true` iff any currently touched external is an
    /// immovable obstacle. This is the sole stop signal for motion.
    pub fn should_halt<Q, G>(&self, registry: &ContactRegistry, scene: &Q, grasp: &G) -> bool
    where
        Q: SceneQuery + ?Sized,
        G: GraspProvider + ?Sized,
    {
        self.first_obstacle(registry, scene, grasp).is_some()
    }
}

fn has_agent_ancestor<Q: SceneQuery + ?Sized>(scene: &Q, object: ObjectId) -> bool {
    let mut node = Some(object);
    for _ in 0..MAX_HIERARCHY_DEPTH {
        let Some(current) = node else {
            return false;
        };
        if scene.is_agent_body(current) {
            return true;
        }
        node = scene.parent_of(current);
    }
    false
}

fn is_held<G>(grasp: &G, external: ColliderId, owner: Option<ObjectId>) -> bool
where
    G: GraspProvider + ?Sized,
{
    let held = grasp.held_objects();
    if owner.is_some_and(|owner| held.contains_key(&owner)) {
        return true;
    }
    held.values().any(|colliders| colliders.contains(&external))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    const SELF_IGNORE: ColliderId = ColliderId(9);
    const OTHER_PROBE: ColliderId = ColliderId(8);

    #[derive(Default)]
    struct TestScene {
        owners: BTreeMap<ColliderId, ObjectId>,
        parents: BTreeMap<ObjectId, ObjectId>,
        agent_bodies: BTreeSet<ObjectId>,
        immovable: BTreeSet<ObjectId>,
        pickupable: BTreeSet<ObjectId>,
        masses: BTreeMap<ObjectId, f32>,
        structures: BTreeSet<ColliderId>,
    }

    impl SceneQuery for TestScene {
        fn owner_of(&self, collider: ColliderId) -> Option<ObjectId> {
            self.owners.get(&collider).copied()
        }
        fn parent_of(&self, object: ObjectId) -> Option<ObjectId> {
            self.parents.get(&object).copied()
        }
        fn is_agent_body(&self, object: ObjectId) -> bool {
            self.agent_bodies.contains(&object)
        }
        fn is_immovable(&self, object: ObjectId) -> bool {
            self.immovable.contains(&object)
        }
        fn is_pickupable(&self, object: ObjectId) -> bool {
            self.pickupable.contains(&object)
        }
        fn mass_of(&self, object: ObjectId) -> f32 {
            self.masses.get(&object).copied().unwrap_or(0.0)
        }
        fn is_structure(&self, collider: ColliderId) -> bool {
            self.structures.contains(&collider)
        }
        fn display_name(&self, object: ObjectId) -> String {
            object.to_string()
        }
        fn structure_name(&self, collider: ColliderId) -> String {
            collider.to_string()
        }
    }

    #[derive(Default)]
    struct TestGrasp {
        held: BTreeMap<ObjectId, BTreeSet<ColliderId>>,
    }

    impl GraspProvider for TestGrasp {
        fn held_objects(&self) -> &BTreeMap<ObjectId, BTreeSet<ColliderId>> {
            &self.held
        }
    }

    fn probes(ids: &[ColliderId]) -> BTreeSet<ColliderId> {
        ids.iter().copied().collect()
    }

    #[test]
    fn unknown_collider_fails_open() {
        let scene = TestScene::default();
        let grasp = TestGrasp::default();
        let verdict =
            Classifier::new().classify(&scene, &grasp, ColliderId(50), &probes(&[OTHER_PROBE]));
        assert_eq!(verdict, Verdict::Ignore);
    }

    #[test]
    fn own_body_is_obstacle_even_while_held() {
        let mut scene = TestScene::default();
        let hand = ObjectId(1);
        scene.owners.insert(ColliderId(50), hand);
        scene.agent_bodies.insert(hand);

        let mut grasp = TestGrasp::default();
        grasp.held.insert(hand, probes(&[ColliderId(50)]));

        let verdict =
            Classifier::new().classify(&scene, &grasp, ColliderId(50), &probes(&[OTHER_PROBE]));
        assert_eq!(verdict, Verdict::StaticObstacle);
    }

    #[test]
    fn agent_ancestry_is_transitive() {
        let mut scene = TestScene::default();
        let torso = ObjectId(1);
        let shoulder = ObjectId(2);
        let finger = ObjectId(3);
        scene.agent_bodies.insert(torso);
        scene.parents.insert(shoulder, torso);
        scene.parents.insert(finger, shoulder);
        scene.owners.insert(ColliderId(50), finger);

        let verdict = Classifier::new().classify(
            &scene,
            &TestGrasp::default(),
            ColliderId(50),
            &probes(&[OTHER_PROBE]),
        );
        assert_eq!(verdict, Verdict::StaticObstacle);
    }

    #[test]
    fn held_object_is_ignored_even_if_immovable() {
        let mut scene = TestScene::default();
        let mug = ObjectId(4);
        scene.owners.insert(ColliderId(60), mug);
        scene.immovable.insert(mug);

        let mut grasp = TestGrasp::default();
        grasp.held.insert(mug, probes(&[ColliderId(60)]));

        let verdict =
            Classifier::new().classify(&scene, &grasp, ColliderId(60), &probes(&[OTHER_PROBE]));
        assert_eq!(verdict, Verdict::Ignore);
    }

    #[test]
    fn held_collider_without_owner_is_ignored() {
        let scene = TestScene::default();
        let mut grasp = TestGrasp::default();
        grasp.held.insert(ObjectId(4), probes(&[ColliderId(61)]));

        let verdict =
            Classifier::new().classify(&scene, &grasp, ColliderId(61), &probes(&[OTHER_PROBE]));
        assert_eq!(verdict, Verdict::Ignore);
    }

    #[test]
    fn solo_self_ignore_probe_is_unconditional() {
        let mut scene = TestScene::default();
        let wall = ObjectId(5);
        scene.owners.insert(ColliderId(70), wall);
        scene.immovable.insert(wall);

        let classifier = Classifier::new().with_self_ignore_probe(SELF_IGNORE);
        let verdict = classifier.classify(
            &scene,
            &TestGrasp::default(),
            ColliderId(70),
            &probes(&[SELF_IGNORE]),
        );
        assert_eq!(verdict, Verdict::Ignore);
    }

    #[test]
    fn self_ignore_plus_ordinary_probe_falls_through() {
        let mut scene = TestScene::default();
        let wall = ObjectId(5);
        scene.owners.insert(ColliderId(70), wall);
        scene.immovable.insert(wall);

        let classifier = Classifier::new().with_self_ignore_probe(SELF_IGNORE);
        let verdict = classifier.classify(
            &scene,
            &TestGrasp::default(),
            ColliderId(70),
            &probes(&[SELF_IGNORE, OTHER_PROBE]),
        );
        assert_eq!(verdict, Verdict::StaticObstacle);

        // Same two probes against a freely movable object: still Ignore.
        let mut movable_scene = TestScene::default();
        movable_scene.owners.insert(ColliderId(71), ObjectId(6));
        let verdict = classifier.classify(
            &movable_scene,
            &TestGrasp::default(),
            ColliderId(71),
            &probes(&[SELF_IGNORE, OTHER_PROBE]),
        );
        assert_eq!(verdict, Verdict::Ignore);
    }

    #[test]
    fn mass_threshold_only_applies_when_configured() {
        let mut scene = TestScene::default();
        let anvil = ObjectId(7);
        scene.owners.insert(ColliderId(80), anvil);
        scene.pickupable.insert(anvil);
        scene.masses.insert(anvil, 40.0);

        let plain = Classifier::new();
        let verdict =
            plain.classify(&scene, &TestGrasp::default(), ColliderId(80), &probes(&[OTHER_PROBE]));
        assert_eq!(verdict, Verdict::Ignore);

        let strict = Classifier::new().with_mass_threshold(10.0);
        let verdict =
            strict.classify(&scene, &TestGrasp::default(), ColliderId(80), &probes(&[OTHER_PROBE]));
        assert_eq!(verdict, Verdict::StaticObstacle);
    }

    #[test]
    fn structure_tag_is_an_obstacle() {
        let mut scene = TestScene::default();
        scene.structures.insert(ColliderId(90));
        let verdict = Classifier::new().classify(
            &scene,
            &TestGrasp::default(),
            ColliderId(90),
            &probes(&[OTHER_PROBE]),
        );
        assert_eq!(verdict, Verdict::StaticObstacle);
    }

    #[test]
    fn should_halt_short_circuits_on_first_obstacle() {
        let mut scene = TestScene::default();
        scene.structures.insert(ColliderId(90));

        let mut registry = ContactRegistry::new();
        registry.register_probe(OTHER_PROBE);
        // An ignorable unknown first (lower ID), then the structure.
        registry.on_overlap_begin(OTHER_PROBE, ColliderId(30));
        registry.on_overlap_begin(OTHER_PROBE, ColliderId(90));

        let classifier = Classifier::new();
        let grasp = TestGrasp::default();
        assert!(classifier.should_halt(&registry, &scene, &grasp));
        assert_eq!(
            classifier.first_obstacle(&registry, &scene, &grasp),
            Some(ColliderId(90))
        );
    }

    #[test]
    fn own_body_halts_despite_concurrent_ignores() {
        let mut scene = TestScene::default();
        let hand = ObjectId(1);
        scene.agent_bodies.insert(hand);
        scene.owners.insert(ColliderId(50), hand);

        let mut registry = ContactRegistry::new();
        registry.register_probe(OTHER_PROBE);
        registry.on_overlap_begin(OTHER_PROBE, ColliderId(20));
        registry.on_overlap_begin(OTHER_PROBE, ColliderId(50));
        registry.on_overlap_begin(OTHER_PROBE, ColliderId(60));

        assert!(Classifier::new().should_halt(&registry, &scene, &TestGrasp::default()));
    }

    #[test]
    fn clear_registry_never_halts() {
        let registry = ContactRegistry::new();
        assert!(!Classifier::new().should_halt(
            &registry,
            &TestScene::default(),
            &TestGrasp::default()
        ));
    }
}
