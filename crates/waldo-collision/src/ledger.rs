//! One-registry-per-hierarchy enforcement.
//!
//! Two registries on the same rigid hierarchy would double-count or race on
//! the same probes, so attaching a second one is a structural wiring mistake
//! that must fail fast at assembly time, never a runtime condition.

use std::collections::BTreeSet;

use waldo_core::error::SetupError;
use waldo_core::traits::SceneQuery;
use waldo_core::types::ObjectId;

const MAX_HIERARCHY_DEPTH: usize = 64;

/// Records which hierarchy roots already host a contact registry.
#[derive(Debug, Default)]
pub struct AttachmentLedger {
    claimed: BTreeSet<ObjectId>,
}

impl AttachmentLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `root` for a new registry.
    ///
    /// # Errors
    ///
    /// `SetupError::DuplicateContactRegistry` if `root`, one of its
    /// ancestors, or one of its descendants already hosts a registry.
    pub fn claim<Q: SceneQuery + ?Sized>(
        &mut self,
        scene: &Q,
        root: ObjectId,
    ) -> Result<(), SetupError> {
        for &existing in &self.claimed {
            if existing == root
                || is_ancestor_of(scene, existing, root)
                || is_ancestor_of(scene, root, existing)
            {
                return Err(SetupError::DuplicateContactRegistry(root));
            }
        }
        self.claimed.insert(root);
        Ok(())
    }

    /// Whether `root` currently hosts a registry.
    #[must_use]
    pub fn is_claimed(&self, root: ObjectId) -> bool {
        self.claimed.contains(&root)
    }
}

fn is_ancestor_of<Q: SceneQuery + ?Sized>(
    scene: &Q,
    ancestor: ObjectId,
    descendant: ObjectId,
) -> bool {
    let mut node = scene.parent_of(descendant);
    for _ in 0..MAX_HIERARCHY_DEPTH {
        match node {
            Some(current) if current == ancestor => return true,
            Some(current) => node = scene.parent_of(current),
            None => return false,
        }
    }
    false
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
