//! The `Grow` operation: folding a staging snapshot into a manifest's
//! existing images under filters, per §4.B.
//!
//! The staging snapshot is expressed as the same `ImageEntry` shape a
//! manifest's `images` list already uses — a staging registry's inventory,
//! once read, projects naturally onto `Vec<ImageEntry>` (see
//! `inventory::model::RegInvImage::to_image_entry`).

use crate::error::{PromoError, Result};
use crate::model::{ImageEntry, RESERVED_LATEST};

/// Filters applied to the staging snapshot before it is unioned in.
#[derive(Debug, Clone, Default)]
pub struct GrowFilter {
    /// Keep only images whose name matches, if set.
    pub image_filter: Option<String>,
    /// Keep only tags matching, if set (exact match).
    pub tag_filter: Option<String>,
    /// Keep only digests matching, if set (exact match).
    pub digest_filter: Option<String>,
}

/// Applies `Grow` to `images` in place, returning the count of (image,
/// digest) pairs unioned in. Errors if the post-filter staging snapshot is
/// empty.
pub fn grow(
    images: &mut Vec<ImageEntry>,
    staging: &[ImageEntry],
    filter: &GrowFilter,
) -> Result<usize> {
    let mut unioned = 0usize;

    let filtered: Vec<ImageEntry> = staging
        .iter()
        .filter_map(|entry| apply_filter(entry, filter))
        .collect();

    if filtered.is_empty() {
        return Err(PromoError::validation(
            "grow: staging inventory is empty after applying filters",
        ));
    }

    for staged in filtered {
        match images.iter_mut().find(|i| i.name == staged.name) {
            Some(existing) => {
                for (digest, tags) in staged.dmap {
                    unioned += 1;
                    existing.dmap.entry(digest).or_default().extend(tags);
                }
            }
            None => {
                unioned += staged.dmap.len();
                images.push(staged);
            }
        }
    }

    Ok(unioned)
}

/// Filters a single staged image entry's dmap, stripping `latest` and
/// anything outside the tag/digest filters. Returns `None` if the image
/// name doesn't match or the filtered dmap is empty.
fn apply_filter(entry: &ImageEntry, filter: &GrowFilter) -> Option<ImageEntry> {
    if let Some(wanted) = &filter.image_filter {
        if entry.name.as_str() != wanted {
            return None;
        }
    }

    let mut dmap = crate::model::DMap::new();
    for (digest, tags) in &entry.dmap {
        if let Some(wanted) = &filter.digest_filter {
            if digest.to_string() != *wanted {
                continue;
            }
        }
        let kept: std::collections::BTreeSet<_> = tags
            .iter()
            .filter(|t| t.as_str() != RESERVED_LATEST)
            .filter(|t| {
                filter
                    .tag_filter
                    .as_ref()
                    .map(|wanted| t.as_str() == wanted)
                    .unwrap_or(true)
            })
            .cloned()
            .collect();
        if !kept.is_empty() {
            dmap.insert(digest.clone(), kept);
        }
    }

    if dmap.is_empty() {
        None
    } else {
        Some(ImageEntry {
            name: entry.name.clone(),
            dmap,
        })
    }
}
