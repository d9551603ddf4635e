use crate::format::{self, ColorChoice};
use std::path::Path;

/// Loads and validates every manifest at `root`, reporting each failure and
/// returning the process exit code.
pub fn run(root: &Path, color: ColorChoice) -> i32 {
    match super::load_manifests(root) {
        Ok(manifests) => {
            format::success(color, &format!("{} manifest(s) valid", manifests.len()));
            super::EXIT_SUCCESS
        }
        Err(e) => {
            format::error(color, &e.to_string());
            super::EXIT_FAILURE
        }
    }
}
