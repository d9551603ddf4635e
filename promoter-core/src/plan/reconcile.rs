//! Edge generation: diff a manifest's desired state against observed
//! registry state (§4.D).

use crate::digest::Digest;
use crate::inventory::MasterInventory;
use crate::manifest::schema::Manifest;
use crate::model::{digest_for_tag, ImageName, Registry, Tag};
use crate::plan::edge::PromotionEdge;
use crate::plan::summary::PlanSummary;
use std::collections::BTreeMap;

/// Planner tuning knobs.
#[derive(Debug, Clone, Default)]
pub struct PlannerOptions {
    /// Emit `Delete` edges for tags observed at a destination but absent
    /// from the manifest. Off by default (§4.D: "not deleted by default").
    pub allow_deletions: bool,
}

/// Result of reconciling one manifest against the observed state.
#[derive(Debug, Clone, Default)]
pub struct ReconcileOutcome {
    pub edges: Vec<PromotionEdge>,
    pub summary: PlanSummary,
    /// Non-fatal conditions worth surfacing to the operator: dropped edges
    /// whose source digest couldn't be confirmed, or a manifest that
    /// produced zero edges against a non-empty observed state.
    pub warnings: Vec<String>,
}

/// Generates promotion edges for one manifest.
pub fn reconcile(manifest: &Manifest, master: &MasterInventory, options: &PlannerOptions) -> ReconcileOutcome {
    let mut outcome = ReconcileOutcome::default();

    let source_ctx = match manifest.source() {
        Some(ctx) => ctx,
        None => {
            outcome.warnings.push("manifest has no source registry; nothing to reconcile".to_string());
            return outcome;
        }
    };
    let source_inventory = master.get(&source_ctx.name);

    let destination_non_empty = manifest
        .destinations()
        .any(|dst| master.get(&dst.name).map(|inv| !inv.images.is_empty()).unwrap_or(false));

    for dst in manifest.destinations() {
        let dst_inventory = master.get(&dst.name);

        for image in &manifest.images {
            let observed_dmap: BTreeMap<Tag, Digest> = dst_inventory
                .and_then(|inv| inv.images.get(&image.name))
                .map(|reg_inv| {
                    reg_inv
                        .dmap
                        .iter()
                        .flat_map(|(digest, tags)| tags.iter().map(move |t| (t.clone(), digest.clone())))
                        .collect()
                })
                .unwrap_or_default();

            for (digest, tags) in &image.dmap {
                if !source_has_digest(source_inventory, &image.name, digest) {
                    outcome.warnings.push(format!(
                        "dropping edges for {}@{}: not found at source registry {}",
                        image.name, digest, source_ctx.name
                    ));
                    continue;
                }

                for tag in tags {
                    let edge = match observed_dmap.get(tag) {
                        None => Some(PromotionEdge::add(dst.name.clone(), image.name.clone(), tag.clone(), digest.clone())),
                        Some(existing) if existing != digest => Some(PromotionEdge::mv(
                            dst.name.clone(),
                            image.name.clone(),
                            tag.clone(),
                            digest.clone(),
                            existing.clone(),
                        )),
                        Some(_) => None,
                    };
                    if let Some(edge) = edge {
                        outcome.summary.record(&edge);
                        outcome.edges.push(edge);
                    }
                }
            }

            if options.allow_deletions {
                let desired_tags: std::collections::BTreeSet<&Tag> =
                    image.dmap.values().flat_map(|tags| tags.iter()).collect();
                for (tag, digest) in &observed_dmap {
                    if !desired_tags.contains(tag) {
                        let edge = PromotionEdge::delete(dst.name.clone(), image.name.clone(), tag.clone(), digest.clone());
                        outcome.summary.record(&edge);
                        outcome.edges.push(edge);
                    }
                }
            }
        }
    }

    if outcome.edges.is_empty() && destination_non_empty {
        outcome.warnings.push(format!(
            "manifest {} produced zero promotable edges against a non-empty observed state",
            manifest.filepath.as_ref().map(|p| p.display().to_string()).unwrap_or_else(|| "<unnamed>".to_string())
        ));
    }

    outcome
}

fn source_has_digest(source_inventory: Option<&crate::inventory::Inventory>, image: &ImageName, digest: &Digest) -> bool {
    source_inventory
        .and_then(|inv| inv.images.get(image))
        .map(|reg_inv| reg_inv.dmap.contains_key(digest))
        .unwrap_or(false)
}

/// Re-checks every edge against the inventory snapshot one more time and
/// flags cross-manifest conflicts: the same `(destination registry, image,
/// tag)` claimed by two different digests (§4.D "Filter stage").
pub fn filter_promotion_edges(
    edges: Vec<PromotionEdge>,
    master: &MasterInventory,
) -> crate::error::Result<Vec<PromotionEdge>> {
    let mut claims: BTreeMap<(Registry, ImageName, Tag), Digest> = BTreeMap::new();
    let mut filtered = Vec::new();

    for edge in edges {
        let key = (edge.registry.clone(), edge.image.clone(), edge.tag.clone());
        if let Some(existing) = claims.get(&key) {
            if existing != &edge.digest {
                return Err(crate::error::PromoError::plan_conflict(
                    edge.registry.to_string(),
                    edge.image.to_string(),
                    edge.tag.to_string(),
                    existing.to_string(),
                    edge.digest.to_string(),
                ));
            }
            continue;
        }

        let already_correct = master
            .get(&edge.registry)
            .and_then(|inv| inv.images.get(&edge.image))
            .and_then(|reg_inv| digest_for_tag(&reg_inv.dmap, &edge.tag))
            .map(|observed| observed == &edge.digest)
            .unwrap_or(false);
        if already_correct && !matches!(edge.op, crate::plan::edge::Op::Delete) {
            continue;
        }

        claims.insert(key, edge.digest.clone());
        filtered.push(edge);
    }

    filtered.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    Ok(filtered)
}
