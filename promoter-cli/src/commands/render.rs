use crate::format::{self, ColorChoice};
use promoter_core::manifest::schema::ThinImagesFile;
use promoter_core::manifest::writer::{render_to_string, RenderOptions};
use std::path::Path;

/// Rewrites an `images.yaml` file into canonical form (§4.B "Rendering").
/// Writes to stdout unless `in_place` is set, in which case the file is
/// overwritten.
pub fn run(path: &Path, opts: RenderOptions, in_place: bool, color: ColorChoice) -> i32 {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            format::error(color, &format!("failed to read {}: {}", path.display(), e));
            return super::EXIT_FAILURE;
        }
    };

    let images: ThinImagesFile = match serde_yaml::from_str(&contents) {
        Ok(images) => images,
        Err(e) => {
            format::error(color, &format!("failed to parse {}: {}", path.display(), e));
            return super::EXIT_FAILURE;
        }
    };

    let rendered = match render_to_string(&images, opts) {
        Ok(r) => r,
        Err(e) => {
            format::error(color, &e.to_string());
            return super::EXIT_FAILURE;
        }
    };

    if in_place {
        if let Err(e) = std::fs::write(path, &rendered) {
            format::error(color, &format!("failed to write {}: {}", path.display(), e));
            return super::EXIT_FAILURE;
        }
        format::success(color, &format!("rewrote {} in canonical form", path.display()));
    } else {
        print!("{}", rendered);
    }

    super::EXIT_SUCCESS
}
