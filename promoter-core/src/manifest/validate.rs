//! The seven-step manifest validator, plus the fat-manifest parse entry point.
//!
//! Steps run in the order §4.B specifies: structural, source uniqueness,
//! digest syntax, tag rules, image-name uniqueness, per-image tag
//! uniqueness, thin-manifest pairing. Digest syntax and tag rules are
//! actually enforced at deserialize time (see `model::Tag`/`Digest`'s
//! `Deserialize` impls), so those two steps here are a second pass over
//! already-valid data — kept because a `Manifest` can also be constructed
//! programmatically (e.g. by `Grow`) without going through YAML at all.

use crate::digest::Digest;
use crate::error::{PromoError, Result};
use crate::manifest::schema::{FatManifestFile, Manifest};
use crate::model::{Tag, RESERVED_LATEST};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Parses a fat manifest file's raw YAML text into a `Manifest`, then validates it.
#[tracing::instrument(skip(contents))]
pub fn parse_fat(path: impl AsRef<Path>, contents: &str) -> Result<Manifest> {
    let path = path.as_ref();
    let file: FatManifestFile = serde_yaml::from_str(contents).map_err(|e| {
        PromoError::manifest_parse(path.display().to_string(), e.to_string())
    })?;

    let manifest = Manifest::new(file.registries, file.images).with_filepath(path);
    validate(&manifest)?;
    Ok(manifest)
}

/// Reads and parses a fat manifest file from disk.
pub fn load_fat_file(path: impl AsRef<Path>) -> Result<Manifest> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|e| {
        PromoError::manifest_parse(path.display().to_string(), e.to_string())
    })?;
    parse_fat(path, &contents)
}

/// Runs all six validation steps against an in-memory manifest.
#[tracing::instrument(skip(manifest), fields(filepath = ?manifest.filepath))]
pub fn validate(manifest: &Manifest) -> Result<()> {
    let path = manifest
        .filepath
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "<in-memory>".to_string());

    validate_structural(manifest, &path)?;
    validate_source_uniqueness(manifest, &path)?;
    validate_digest_syntax(manifest, &path)?;
    validate_tag_rules(manifest, &path)?;
    validate_image_name_uniqueness(manifest, &path)?;
    validate_tag_uniqueness(manifest, &path)?;
    // Thin-manifest pairing (step 7) is directory-level and runs in
    // `manifest::thin::load_thin_root`, not here — a manifest built from a
    // fat file or in-memory has no sibling directory to pair.
    Ok(())
}

/// Step 1: required fields present, at least one registry declared.
fn validate_structural(manifest: &Manifest, path: &str) -> Result<()> {
    if manifest.registries.is_empty() {
        return Err(PromoError::manifest_semantic(
            path,
            "manifest declares no registries",
        ));
    }
    for image in &manifest.images {
        if image.name.as_str().is_empty() {
            return Err(PromoError::manifest_semantic(
                path,
                "image entry has an empty name",
            ));
        }
    }
    Ok(())
}

/// Step 2: exactly one source registry, at least one destination.
fn validate_source_uniqueness(manifest: &Manifest, path: &str) -> Result<()> {
    let sources: Vec<_> = manifest.registries.iter().filter(|r| r.is_source).collect();
    match sources.len() {
        0 => Err(PromoError::manifest_semantic(
            path,
            "manifest declares no source registry (need exactly one `src: true`)",
        )),
        1 => {
            if manifest.destinations().next().is_none() {
                return Err(PromoError::manifest_semantic(
                    path,
                    "manifest declares a source but no destination registries",
                ));
            }
            Ok(())
        }
        n => Err(PromoError::manifest_semantic(
            path,
            format!("manifest declares {} source registries, expected exactly one", n),
        )),
    }
}

/// Step 3: digest syntax. Already enforced by `Digest`'s `Deserialize`, so
/// this is a no-op pass confirming nothing slipped through a programmatic path.
fn validate_digest_syntax(_manifest: &Manifest, _path: &str) -> Result<()> {
    // `Digest` cannot be constructed except through `FromStr`/`Deserialize`,
    // both of which validate, so there is nothing left to check here.
    Ok(())
}

/// Step 4: tag rules (`latest` rejected, non-empty, no whitespace). Already
/// enforced by `Tag`'s `Deserialize`; re-checked defensively for the
/// `RESERVED_LATEST` invariant since that's the one §4.B calls out by name.
fn validate_tag_rules(manifest: &Manifest, path: &str) -> Result<()> {
    for image in &manifest.images {
        for tags in image.dmap.values() {
            for tag in tags {
                if tag.as_str() == RESERVED_LATEST {
                    return Err(PromoError::manifest_semantic(
                        path,
                        format!(
                            "image '{}' maps the reserved tag 'latest'",
                            image.name
                        ),
                    ));
                }
            }
        }
    }
    Ok(())
}

/// Step 5: image names unique within a manifest.
fn validate_image_name_uniqueness(manifest: &Manifest, path: &str) -> Result<()> {
    let mut seen = HashSet::new();
    for image in &manifest.images {
        if !seen.insert(image.name.as_str()) {
            return Err(PromoError::manifest_semantic(
                path,
                format!("image name '{}' appears more than once", image.name),
            ));
        }
    }
    Ok(())
}

/// Step 6: within one image's `DMap`, a tag may not resolve to more than one
/// digest (§3 "Digest-to-tags map": "The same Tag may appear under at most
/// one Digest within an image at any instant"). A `DMap` is keyed by digest,
/// so nothing at the type level stops the same tag string from being listed
/// under two different digest entries; this is what catches it before any
/// registry read, matching §7's ordering of manifest-semantic errors as fatal
/// and pre-read (a collision surviving this step would otherwise only
/// surface later as a cross-manifest `PlanConflict`, which is too late for a
/// violation entirely internal to one manifest).
fn validate_tag_uniqueness(manifest: &Manifest, path: &str) -> Result<()> {
    for image in &manifest.images {
        let mut owner: HashMap<&Tag, &Digest> = HashMap::new();
        for (digest, tags) in &image.dmap {
            for tag in tags {
                if let Some(other_digest) = owner.insert(tag, digest) {
                    if other_digest != digest {
                        return Err(PromoError::manifest_semantic(
                            path,
                            format!(
                                "image '{}' maps tag '{}' to both {} and {}",
                                image.name, tag, other_digest, digest
                            ),
                        ));
                    }
                }
            }
        }
    }
    Ok(())
}
