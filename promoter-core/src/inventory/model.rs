//! The observed-state data model built by the inventory reader: a registry's
//! actual tag/digest layout, plus manifest-list parent/child bookkeeping.

use crate::model::{Digest, DMap, ImageEntry, ImageName, Registry};
use std::collections::BTreeMap;

/// One repository's observed `(digest -> tags)` map, the same shape a
/// manifest's `ImageEntry` uses so the two sides of reconciliation compare
/// directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegInvImage {
    pub name: ImageName,
    pub dmap: DMap,
}

impl RegInvImage {
    pub fn new(name: ImageName) -> Self {
        Self {
            name,
            dmap: DMap::new(),
        }
    }

    /// Projects this observed image onto the same shape a manifest's
    /// `images` list uses — the staging snapshot `Grow` folds in.
    pub fn to_image_entry(&self) -> ImageEntry {
        ImageEntry {
            name: self.name.clone(),
            dmap: self.dmap.clone(),
        }
    }
}

/// A manifest-list child's link back to its parent, and the image name the
/// parent was discovered under — the prefix the parent-validity check
/// expects every child to share (§4.C.3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentLink {
    pub parent: Digest,
    pub owner_image: ImageName,
}

/// One registry's complete observed inventory.
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    pub images: BTreeMap<ImageName, RegInvImage>,
    /// Maps a manifest-list's child digest to its parent link (§4.C.3).
    pub parent_digest: BTreeMap<Digest, ParentLink>,
    /// Media type observed for each digest.
    pub digest_media_type: BTreeMap<Digest, String>,
    /// Declared size in bytes for each digest, where known.
    pub digest_image_size: BTreeMap<Digest, u64>,
    /// Repositories that failed after exhausting retries; populated only
    /// when the reader ran with `allow_partial: true`.
    pub unreachable_repositories: Vec<String>,
}

impl Inventory {
    /// Looks up the digest a given `(image, tag)` pair resolves to at this registry.
    pub fn digest_for(&self, image: &ImageName, tag: &crate::model::Tag) -> Option<&Digest> {
        self.images
            .get(image)
            .and_then(|img| crate::model::digest_for_tag(&img.dmap, tag))
    }

    /// Returns every manifest-list parent whose child digest was also
    /// observed as a top-level digest under a *different* image name —
    /// i.e. the child does not belong under the same `Registry/ImageName`
    /// prefix as its parent (§4.C "Parent validity check").
    pub fn invalid_parents(&self) -> Vec<Digest> {
        let mut invalid = Vec::new();
        for (child, link) in &self.parent_digest {
            let found_elsewhere = self
                .images
                .iter()
                .any(|(name, img)| *name != link.owner_image && img.dmap.contains_key(child));
            if found_elsewhere {
                invalid.push(link.parent.clone());
            }
        }
        invalid.sort();
        invalid.dedup();
        invalid
    }
}

/// The complete observed state across every registry a run touches.
pub type MasterInventory = BTreeMap<Registry, Inventory>;
