//! Thin-manifest directory layout: `manifests/<sub>/promoter-manifest.yaml`
//! paired with `images/<sub>/images.yaml`.

use crate::error::{PromoError, Result};
use crate::manifest::schema::{Manifest, ThinImagesFile, ThinRegistriesFile};
use crate::manifest::validate;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

const REGISTRIES_FILE_NAME: &str = "promoter-manifest.yaml";
const IMAGES_FILE_NAME: &str = "images.yaml";

/// One `<sub>` pairing discovered under a thin-manifest root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThinPair {
    pub sub: String,
    pub registries_path: PathBuf,
    pub images_path: PathBuf,
}

/// Step 6: walks `root/manifests` and `root/images`, confirming every
/// `manifests/<sub>` has a sibling `images/<sub>/images.yaml`.
///
/// Returns the set of pairings on success; the caller decides whether to
/// load all of them or just validate the pairing.
#[tracing::instrument]
pub fn discover_pairs(root: impl AsRef<Path> + std::fmt::Debug) -> Result<Vec<ThinPair>> {
    let root = root.as_ref();
    let manifests_dir = root.join("manifests");
    let images_dir = root.join("images");

    let subs = read_subdirs(&manifests_dir)?;
    if subs.is_empty() {
        return Err(PromoError::manifest_semantic(
            manifests_dir.display().to_string(),
            "no manifest subdirectories found",
        ));
    }

    // Pairing is bidirectional (§3 invariant 5, §4.B step 6): an `images/<sub>`
    // with no matching `manifests/<sub>` is just as invalid as the reverse.
    if images_dir.is_dir() {
        let image_subs = read_subdirs(&images_dir)?;
        for sub in image_subs.difference(&subs) {
            return Err(PromoError::manifest_semantic(
                root.display().to_string(),
                format!("images/{} has no sibling manifests/{}", sub, sub),
            ));
        }
    }

    let mut pairs = Vec::new();
    for sub in subs {
        let registries_path = manifests_dir.join(&sub).join(REGISTRIES_FILE_NAME);
        let images_path = images_dir.join(&sub).join(IMAGES_FILE_NAME);
        if !registries_path.is_file() {
            return Err(PromoError::manifest_semantic(
                root.display().to_string(),
                format!(
                    "manifests/{} has no {} file",
                    sub, REGISTRIES_FILE_NAME
                ),
            ));
        }
        if !images_path.is_file() {
            return Err(PromoError::manifest_semantic(
                root.display().to_string(),
                format!(
                    "manifests/{} has no sibling images/{}/{}",
                    sub, sub, IMAGES_FILE_NAME
                ),
            ));
        }
        pairs.push(ThinPair {
            sub,
            registries_path,
            images_path,
        });
    }
    Ok(pairs)
}

fn read_subdirs(dir: &Path) -> Result<BTreeSet<String>> {
    let mut subs = BTreeSet::new();
    let entries = std::fs::read_dir(dir).map_err(|e| {
        PromoError::manifest_semantic(dir.display().to_string(), e.to_string())
    })?;
    for entry in entries {
        let entry = entry.map_err(|e| {
            PromoError::manifest_semantic(dir.display().to_string(), e.to_string())
        })?;
        if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            if let Some(name) = entry.file_name().to_str() {
                subs.insert(name.to_string());
            }
        }
    }
    Ok(subs)
}

/// Loads and validates a single thin-manifest pairing into a `Manifest`.
pub fn load_thin_pair(pair: &ThinPair) -> Result<Manifest> {
    let registries_contents = std::fs::read_to_string(&pair.registries_path).map_err(|e| {
        PromoError::manifest_parse(pair.registries_path.display().to_string(), e.to_string())
    })?;
    let registries_file: ThinRegistriesFile =
        serde_yaml::from_str(&registries_contents).map_err(|e| {
            PromoError::manifest_parse(pair.registries_path.display().to_string(), e.to_string())
        })?;

    let images_contents = std::fs::read_to_string(&pair.images_path).map_err(|e| {
        PromoError::manifest_parse(pair.images_path.display().to_string(), e.to_string())
    })?;
    let images: ThinImagesFile = serde_yaml::from_str(&images_contents).map_err(|e| {
        PromoError::manifest_parse(pair.images_path.display().to_string(), e.to_string())
    })?;

    let manifest = Manifest::new(registries_file.registries, images)
        .with_filepath(pair.registries_path.clone());
    validate::validate(&manifest)?;
    Ok(manifest)
}

/// Discovers every pairing under `root` and loads each into a `Manifest`.
#[tracing::instrument]
pub fn load_thin_root(root: impl AsRef<Path> + std::fmt::Debug) -> Result<Vec<Manifest>> {
    discover_pairs(root)?.iter().map(load_thin_pair).collect()
}
