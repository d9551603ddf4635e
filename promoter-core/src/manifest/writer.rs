//! Canonical YAML rendering of an image list: the authoritative output
//! format, and the other half of the `parse → validate → write` fixed point.
//!
//! Ordering rules (§4.B "Rendering"):
//! - images sorted lexicographically by name
//! - within an image, digests ordered by the semver of their first tag,
//!   non-semver tags sorted lexicographically after semver ones
//! - tags within a digest sorted lexicographically
//! - empty digest maps render as `[]`

use crate::error::{PromoError, Result};
use crate::model::{Digest, ImageEntry, Tag};
use semver::Version;
use std::io::Write;

/// Presentation toggles the writer supports without changing semantic content.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderOptions {
    /// Quote digest map keys (`"sha256:..."`) instead of leaving them bare.
    pub quote_digest_keys: bool,
    /// Render each digest's tag array across multiple lines instead of inline.
    pub split_tag_lines: bool,
}

/// The first tag of a digest's set, used as the sort key — `BTreeSet`
/// already orders tags lexicographically, so `.iter().next()` is the
/// lexicographically-first tag, which is what "first tag" means here.
fn sort_key_for_digest(tags: &std::collections::BTreeSet<Tag>) -> (bool, Option<Version>, String) {
    match tags.iter().next() {
        None => (true, None, String::new()),
        Some(tag) => match Version::parse(tag.as_str()) {
            Ok(v) => (false, Some(v), tag.as_str().to_string()),
            Err(_) => (true, None, tag.as_str().to_string()),
        },
    }
}

/// Renders a set of image entries to a canonical YAML string.
pub fn render_to_string(images: &[ImageEntry], opts: RenderOptions) -> Result<String> {
    let mut buf = Vec::new();
    render_to_writer(images, opts, &mut buf)?;
    String::from_utf8(buf).map_err(|e| PromoError::validation(e.to_string()))
}

/// Renders a set of image entries to a canonical YAML string, writing to `w`.
pub fn render_to_writer(images: &[ImageEntry], opts: RenderOptions, w: &mut impl Write) -> Result<()> {
    let mut sorted_images: Vec<&ImageEntry> = images.iter().collect();
    sorted_images.sort_by(|a, b| a.name.as_str().cmp(b.name.as_str()));

    for image in sorted_images {
        writeln!(w, "- name: {}", image.name).map_err(io_err)?;
        if image.dmap.is_empty() {
            writeln!(w, "  dmap: {{}}").map_err(io_err)?;
            continue;
        }
        writeln!(w, "  dmap:").map_err(io_err)?;

        let mut entries: Vec<(&Digest, &std::collections::BTreeSet<Tag>)> =
            image.dmap.iter().collect();
        entries.sort_by(|(_, a_tags), (_, b_tags)| {
            sort_key_for_digest(a_tags).cmp(&sort_key_for_digest(b_tags))
        });

        for (digest, tags) in entries {
            let key = if opts.quote_digest_keys {
                format!("\"{}\"", digest)
            } else {
                digest.to_string()
            };

            let mut sorted_tags: Vec<&Tag> = tags.iter().collect();
            sorted_tags.sort_by(|a, b| a.as_str().cmp(b.as_str()));

            if sorted_tags.is_empty() {
                writeln!(w, "    {}: []", key).map_err(io_err)?;
            } else if opts.split_tag_lines {
                writeln!(w, "    {}:", key).map_err(io_err)?;
                for tag in sorted_tags {
                    writeln!(w, "      - {}", tag).map_err(io_err)?;
                }
            } else {
                let joined = sorted_tags
                    .iter()
                    .map(|t| format!("\"{}\"", t))
                    .collect::<Vec<_>>()
                    .join(", ");
                writeln!(w, "    {}: [{}]", key, joined).map_err(io_err)?;
            }
        }
    }
    Ok(())
}

fn io_err(e: std::io::Error) -> PromoError {
    PromoError::validation(e.to_string())
}
