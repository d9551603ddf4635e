//! A single promotion action: move one `(registry, image, tag)` toward the
//! digest the manifest declares.

use crate::digest::Digest;
use crate::model::{ImageName, Registry, Tag};
use serde::Serialize;

/// The action a `PromotionEdge` carries out at the destination registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Op {
    /// The destination has no entry for `(image, tag)`.
    Add,
    /// The destination's `(image, tag)` points at a different digest.
    /// Carries the digest being displaced, for reporting.
    Move { digest_old: Digest },
    /// The destination has a tag the manifest no longer declares.
    /// Only produced in demotion mode (`PlannerOptions::allow_deletions`).
    Delete,
}

/// One reconciliation step: bring `registry`'s `(image, tag)` to `digest`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromotionEdge {
    pub registry: Registry,
    pub image: ImageName,
    pub tag: Tag,
    pub digest: Digest,
    pub op: Op,
}

impl PromotionEdge {
    pub fn add(registry: Registry, image: ImageName, tag: Tag, digest: Digest) -> Self {
        Self {
            registry,
            image,
            tag,
            digest,
            op: Op::Add,
        }
    }

    pub fn mv(registry: Registry, image: ImageName, tag: Tag, digest: Digest, digest_old: Digest) -> Self {
        Self {
            registry,
            image,
            tag,
            digest,
            op: Op::Move { digest_old },
        }
    }

    pub fn delete(registry: Registry, image: ImageName, tag: Tag, digest: Digest) -> Self {
        Self {
            registry,
            image,
            tag,
            digest,
            op: Op::Delete,
        }
    }

    /// The sort key the executor iterates by, making runs reproducible
    /// (§4.D "Determinism").
    pub fn sort_key(&self) -> (String, String, String) {
        (
            self.registry.as_str().to_string(),
            self.image.as_str().to_string(),
            self.tag.as_str().to_string(),
        )
    }
}

impl std::fmt::Display for PromotionEdge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.op {
            Op::Add => write!(f, "ADD {}/{}:{} -> {}", self.registry, self.image, self.tag, self.digest),
            Op::Move { digest_old } => write!(
                f,
                "MOVE {}/{}:{} {} -> {}",
                self.registry, self.image, self.tag, digest_old, self.digest
            ),
            Op::Delete => write!(f, "DELETE {}/{}:{} ({})", self.registry, self.image, self.tag, self.digest),
        }
    }
}
