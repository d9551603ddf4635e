//! Pre-checks (§4.E "Pre-checks"): verification steps that run strictly
//! between planning and execution. A failing pre-check aborts the whole run
//! before any edge executes.

use crate::error::{PromoError, Result};
use crate::inventory::MasterInventory;
use crate::manifest::schema::Manifest;
use crate::model::ImageName;
use crate::plan::PromotionEdge;
use std::collections::BTreeSet;

/// Everything a pre-check needs to judge a plan, bundled so new checks don't
/// grow the trait's argument list.
pub struct PreCheckContext<'a> {
    pub manifest: &'a Manifest,
    pub edges: &'a [PromotionEdge],
    pub master: &'a MasterInventory,
}

/// One verification step run between planning and execution. Implementors
/// return `Err(PromoError::PreCheckFailure)` to abort the run.
pub trait PreCheck: Send + Sync {
    fn name(&self) -> &str;
    fn check(&self, ctx: &PreCheckContext<'_>) -> Result<()>;
}

/// Rejects a plan if any edge's digest is missing size data, zero, or
/// exceeds `max_bytes` (§4.E "image-size check").
#[derive(Debug, Clone, Copy)]
pub struct SizeCheck {
    pub max_bytes: u64,
}

impl SizeCheck {
    pub fn new(max_bytes: u64) -> Self {
        Self { max_bytes }
    }
}

impl PreCheck for SizeCheck {
    fn name(&self) -> &str {
        "size"
    }

    fn check(&self, ctx: &PreCheckContext<'_>) -> Result<()> {
        for edge in ctx.edges {
            let size = ctx
                .master
                .values()
                .find_map(|inv| inv.digest_image_size.get(&edge.digest).copied());
            match size {
                None => {
                    return Err(PromoError::pre_check_failure(
                        self.name(),
                        format!("no size recorded for digest {}", edge.digest),
                    ));
                }
                Some(0) => {
                    return Err(PromoError::pre_check_failure(
                        self.name(),
                        format!("digest {} has zero declared size", edge.digest),
                    ));
                }
                Some(size) if size > self.max_bytes => {
                    return Err(PromoError::pre_check_failure(
                        self.name(),
                        format!(
                            "digest {} is {} bytes, exceeding the {} byte ceiling",
                            edge.digest, size, self.max_bytes
                        ),
                    ));
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

/// Rejects a plan that drops an image previously present in the manifest
/// (§4.E "image-removal check", "in PR mode"). The set of previously-present
/// image names is supplied by the external collaborator that knows the
/// manifest's prior committed state (e.g. the git/PR tooling comparing
/// against the base branch) — this check only compares name sets.
#[derive(Debug, Clone)]
pub struct RemovalCheck {
    pub previously_present: BTreeSet<ImageName>,
}

impl RemovalCheck {
    pub fn new(previously_present: BTreeSet<ImageName>) -> Self {
        Self { previously_present }
    }
}

impl PreCheck for RemovalCheck {
    fn name(&self) -> &str {
        "removal"
    }

    fn check(&self, ctx: &PreCheckContext<'_>) -> Result<()> {
        let current: BTreeSet<&ImageName> = ctx.manifest.images.iter().map(|i| &i.name).collect();
        for prior in &self.previously_present {
            if !current.contains(prior) {
                return Err(PromoError::pre_check_failure(
                    self.name(),
                    format!("image '{}' was present and is no longer declared", prior),
                ));
            }
        }
        Ok(())
    }
}

/// Rejects a plan if any registry's inventory contains an invalid
/// manifest-list parent — a parent whose child digest was also observed
/// under a different `Registry/ImageName` prefix than the parent itself
/// (§4.C "Parent validity check": "Invalid parents are reported and fail
/// the pre-check"). Runs against the full `master` inventory rather than
/// `ctx.edges`, since the violation lives in what was *read*, not in what
/// the plan proposes to change.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParentValidityCheck;

impl PreCheck for ParentValidityCheck {
    fn name(&self) -> &str {
        "parent-validity"
    }

    fn check(&self, ctx: &PreCheckContext<'_>) -> Result<()> {
        for (registry, inventory) in ctx.master {
            let invalid = inventory.invalid_parents();
            if !invalid.is_empty() {
                let digests = invalid
                    .iter()
                    .map(|d| d.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                return Err(PromoError::pre_check_failure(
                    self.name(),
                    format!(
                        "registry {} has manifest-list parent(s) whose child digest resolves under a different image: {}",
                        registry, digests
                    ),
                ));
            }
        }
        Ok(())
    }
}

/// Severity tier reported by a [`VulnerabilityScanner`], ordered low to high.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum VulnSeverity {
    Low,
    Medium,
    High,
    Critical,
}

/// One CVE record a scanner reports for a digest.
#[derive(Debug, Clone)]
pub struct CveRecord {
    pub id: String,
    pub severity: VulnSeverity,
}

/// The external vulnerability scanner collaborator (out of scope per §1;
/// this trait is the seam the engine calls through).
pub trait VulnerabilityScanner: Send + Sync {
    fn scan(&self, digest: &crate::digest::Digest) -> Result<Vec<CveRecord>>;
}

/// Rejects a plan if any edge's digest carries a CVE at or above
/// `max_severity` (§4.E "vulnerability check").
pub struct VulnerabilityCheck {
    pub scanner: std::sync::Arc<dyn VulnerabilityScanner>,
    pub max_severity: VulnSeverity,
}

impl VulnerabilityCheck {
    pub fn new(scanner: std::sync::Arc<dyn VulnerabilityScanner>, max_severity: VulnSeverity) -> Self {
        Self { scanner, max_severity }
    }
}

impl PreCheck for VulnerabilityCheck {
    fn name(&self) -> &str {
        "vulnerability"
    }

    fn check(&self, ctx: &PreCheckContext<'_>) -> Result<()> {
        let mut seen = BTreeSet::new();
        for edge in ctx.edges {
            if !seen.insert(edge.digest.clone()) {
                continue;
            }
            let records = self.scanner.scan(&edge.digest)?;
            if let Some(worst) = records.iter().filter(|r| r.severity > self.max_severity).max_by_key(|r| r.severity) {
                return Err(PromoError::pre_check_failure(
                    self.name(),
                    format!(
                        "digest {} has {:?} finding {} exceeding the {:?} threshold",
                        edge.digest, worst.severity, worst.id, self.max_severity
                    ),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::schema::Manifest;
    use crate::model::{ImageEntry, RegistryContext};
    use std::str::FromStr;

    fn manifest_with_images(names: &[&str]) -> Manifest {
        Manifest::new(
            vec![RegistryContext {
                name: "src.example".parse().unwrap(),
                service_account_hint: None,
                is_source: true,
            }],
            names
                .iter()
                .map(|n| ImageEntry {
                    name: ImageName::new(*n).unwrap(),
                    dmap: crate::model::DMap::new(),
                })
                .collect(),
        )
    }

    #[test]
    fn test_size_check_rejects_missing_size() {
        let manifest = manifest_with_images(&["foo"]);
        let digest = crate::digest::Digest::from_str(&format!("sha256:{}", "a".repeat(64))).unwrap();
        let edge = PromotionEdge::add(
            "dst.example".parse().unwrap(),
            ImageName::new("foo").unwrap(),
            crate::model::Tag::new("1.0").unwrap(),
            digest,
        );
        let master = MasterInventory::new();
        let ctx = PreCheckContext {
            manifest: &manifest,
            edges: std::slice::from_ref(&edge),
            master: &master,
        };
        let check = SizeCheck::new(1_000_000);
        assert!(check.check(&ctx).is_err());
    }

    #[test]
    fn test_removal_check_rejects_dropped_image() {
        let manifest = manifest_with_images(&["foo"]);
        let mut prior = BTreeSet::new();
        prior.insert(ImageName::new("foo").unwrap());
        prior.insert(ImageName::new("bar").unwrap());
        let master = MasterInventory::new();
        let ctx = PreCheckContext {
            manifest: &manifest,
            edges: &[],
            master: &master,
        };
        let check = RemovalCheck::new(prior);
        assert!(check.check(&ctx).is_err());
    }

    #[test]
    fn test_parent_validity_check_rejects_cross_image_child() {
        use crate::inventory::model::{Inventory, ParentLink, RegInvImage};

        let manifest = manifest_with_images(&["foo", "bar"]);
        let child = crate::digest::Digest::from_str(&format!("sha256:{}", "a".repeat(64))).unwrap();
        let parent = crate::digest::Digest::from_str(&format!("sha256:{}", "b".repeat(64))).unwrap();

        let mut inventory = Inventory::default();
        let mut foo = RegInvImage::new(ImageName::new("foo").unwrap());
        foo.dmap.insert(parent.clone(), BTreeSet::new());
        inventory.images.insert(ImageName::new("foo").unwrap(), foo);

        let mut bar = RegInvImage::new(ImageName::new("bar").unwrap());
        bar.dmap.insert(child.clone(), BTreeSet::new());
        inventory.images.insert(ImageName::new("bar").unwrap(), bar);

        inventory.parent_digest.insert(
            child,
            ParentLink {
                parent,
                owner_image: ImageName::new("foo").unwrap(),
            },
        );

        let mut master = MasterInventory::new();
        master.insert("registry.example".parse().unwrap(), inventory);

        let ctx = PreCheckContext {
            manifest: &manifest,
            edges: &[],
            master: &master,
        };
        let check = ParentValidityCheck;
        assert!(check.check(&ctx).is_err());
    }

    #[test]
    fn test_parent_validity_check_passes_when_master_empty() {
        let manifest = manifest_with_images(&["foo"]);
        let master = MasterInventory::new();
        let ctx = PreCheckContext {
            manifest: &manifest,
            edges: &[],
            master: &master,
        };
        let check = ParentValidityCheck;
        assert!(check.check(&ctx).is_ok());
    }

    #[test]
    fn test_removal_check_passes_when_nothing_dropped() {
        let manifest = manifest_with_images(&["foo", "bar"]);
        let mut prior = BTreeSet::new();
        prior.insert(ImageName::new("foo").unwrap());
        let master = MasterInventory::new();
        let ctx = PreCheckContext {
            manifest: &manifest,
            edges: &[],
            master: &master,
        };
        let check = RemovalCheck::new(prior);
        assert!(check.check(&ctx).is_ok());
    }
}
