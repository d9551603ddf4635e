//! Subcommand handlers. Each takes already-parsed CLI arguments and returns
//! the process exit code the design's §6 "Exit conditions" calls for.

pub mod apply;
pub mod grow;
pub mod plan;
pub mod render;
pub mod validate;

use promoter_core::manifest::schema::Manifest;
use promoter_core::manifest::{thin, validate as validate_mod};
use promoter_core::Result;
use std::path::Path;

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;

/// Loads every manifest at `root`: a thin-manifest directory tree if `root`
/// is a directory, otherwise a single fat manifest file.
pub fn load_manifests(root: &Path) -> Result<Vec<Manifest>> {
    if root.is_dir() {
        thin::load_thin_root(root)
    } else {
        validate_mod::load_fat_file(root).map(|m| vec![m])
    }
}
