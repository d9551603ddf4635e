//! The declarative manifest data model and its YAML wire format.
//!
//! Two physical layouts exist, both producing the same in-memory `Manifest`:
//!
//! - *Fat*: a single file holding both `registries` and `images`.
//! - *Thin*: a `manifests/<sub>/promoter-manifest.yaml` holding `registries`,
//!   paired with an `images/<sub>/images.yaml` holding `images`.

use crate::model::{ImageEntry, RegistryContext};
use std::path::PathBuf;

/// A manifest's declarative desired state: the registries involved and the
/// images promoted across them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub registries: Vec<RegistryContext>,
    pub images: Vec<ImageEntry>,
    pub filepath: Option<PathBuf>,
}

impl Manifest {
    pub fn new(registries: Vec<RegistryContext>, images: Vec<ImageEntry>) -> Self {
        Self {
            registries,
            images,
            filepath: None,
        }
    }

    pub fn with_filepath(mut self, path: impl Into<PathBuf>) -> Self {
        self.filepath = Some(path.into());
        self
    }

    /// Returns the manifest's single source registry, if the invariant holds.
    ///
    /// This does not itself validate the invariant (use
    /// [`crate::manifest::validate::validate`] for that) — it simply looks
    /// one up, for callers (the planner) that have already validated.
    pub fn source(&self) -> Option<&RegistryContext> {
        self.registries.iter().find(|r| r.is_source)
    }

    /// Returns every registry that is not the source.
    pub fn destinations(&self) -> impl Iterator<Item = &RegistryContext> {
        self.registries.iter().filter(|r| !r.is_source)
    }

    pub fn image(&self, name: &str) -> Option<&ImageEntry> {
        self.images.iter().find(|i| i.name.as_str() == name)
    }
}

/// The YAML shape of a fat manifest file: `registries` + `images` together.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FatManifestFile {
    pub registries: Vec<RegistryContext>,
    #[serde(default)]
    pub images: Vec<ImageEntry>,
}

/// The YAML shape of a thin manifest's `promoter-manifest.yaml`: registries only.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ThinRegistriesFile {
    pub registries: Vec<RegistryContext>,
}

/// The YAML shape of a thin manifest's `images.yaml`: a bare list of images.
pub type ThinImagesFile = Vec<ImageEntry>;
