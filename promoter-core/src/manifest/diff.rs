//! Manifest-to-manifest diffing: what would a `Grow` or a hand edit change,
//! shown to a human before it's committed to disk.
//!
//! This is distinct from the planner's edge diffing (module `plan`), which
//! diffs a manifest against the *registry's* observed state. This diffs two
//! `DMap`s against each other — pure data, no registry I/O.

use crate::model::{DMap, Tag};
use std::collections::BTreeSet;

/// One image's before/after comparison.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DMapDiff {
    /// Tags newly present under any digest.
    pub added: BTreeSet<Tag>,
    /// Tags that no longer appear under any digest.
    pub removed: BTreeSet<Tag>,
    /// Tags that moved from one digest to another.
    pub retagged: Vec<RetaggedEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetaggedEntry {
    pub tag: Tag,
    pub from_digest: crate::model::Digest,
    pub to_digest: crate::model::Digest,
}

impl DMapDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.retagged.is_empty()
    }
}

/// Diffs `before` against `after`, the same `(image, digest) -> tags` shape
/// used throughout the manifest model.
pub fn diff(before: &DMap, after: &DMap) -> DMapDiff {
    let owner = |dmap: &DMap, tag: &Tag| -> Option<crate::model::Digest> {
        crate::model::digest_for_tag(dmap, tag).cloned()
    };

    let before_tags: BTreeSet<Tag> = before.values().flatten().cloned().collect();
    let after_tags: BTreeSet<Tag> = after.values().flatten().cloned().collect();

    let mut added = BTreeSet::new();
    let mut removed = BTreeSet::new();
    let mut retagged = Vec::new();

    for tag in after_tags.difference(&before_tags) {
        added.insert(tag.clone());
    }
    for tag in before_tags.difference(&after_tags) {
        removed.insert(tag.clone());
    }
    for tag in before_tags.intersection(&after_tags) {
        if let (Some(from), Some(to)) = (owner(before, tag), owner(after, tag)) {
            if from != to {
                retagged.push(RetaggedEntry {
                    tag: tag.clone(),
                    from_digest: from,
                    to_digest: to,
                });
            }
        }
    }

    DMapDiff {
        added,
        removed,
        retagged,
    }
}
