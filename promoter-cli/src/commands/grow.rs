use crate::format::{self, ColorChoice};
use promoter_core::auth::AnonymousCredentialProvider;
use promoter_core::config::RunConfig;
use promoter_core::context::RunContext;
use promoter_core::inventory::InventoryReader;
use promoter_core::manifest::grow::{grow, GrowFilter};
use promoter_core::manifest::schema::Manifest;
use promoter_core::manifest::thin;
use promoter_core::manifest::writer::{render_to_string, RenderOptions};
use promoter_core::model::RegistryContext;
use std::path::Path;
use std::sync::Arc;

/// Folds a staging registry's inventory into the first manifest found at
/// `root`, then either prints the grown images list or rewrites it in place
/// (thin layout only — a fat manifest's combined `registries`+`images` file
/// has no canonical images-only serialization to overwrite).
pub async fn run(
    root: &Path,
    staging_url: &str,
    filter: GrowFilter,
    in_place: bool,
    color: ColorChoice,
) -> i32 {
    let manifests = match super::load_manifests(root) {
        Ok(manifests) => manifests,
        Err(e) => {
            format::error(color, &e.to_string());
            return super::EXIT_FAILURE;
        }
    };

    let Some(manifest) = manifests.into_iter().next() else {
        format::error(color, "no manifest found to grow");
        return super::EXIT_FAILURE;
    };
    let mut images = manifest.images;

    let staging_manifest = Manifest::new(
        vec![RegistryContext {
            name: match staging_url.parse() {
                Ok(name) => name,
                Err(e) => {
                    format::error(color, &e.to_string());
                    return super::EXIT_FAILURE;
                }
            },
            service_account_hint: None,
            is_source: true,
        }],
        images.clone(),
    );

    let run_ctx = RunContext::new(RunConfig::default());
    let reader = InventoryReader::new(Arc::new(AnonymousCredentialProvider));
    let reader_options = run_ctx.config.reader_options();
    let master = match reader
        .read(&staging_manifest, &run_ctx.counter, &run_ctx.cancellation, &reader_options)
        .await
    {
        Ok(master) => master,
        Err(e) => {
            format::error(color, &e.to_string());
            return super::EXIT_FAILURE;
        }
    };

    let staging_registry = staging_manifest.registries[0].name.clone();
    let staging_entries: Vec<_> = master
        .get(&staging_registry)
        .map(|inv| inv.images.values().map(|i| i.to_image_entry()).collect())
        .unwrap_or_default();

    let unioned = match grow(&mut images, &staging_entries, &filter) {
        Ok(n) => n,
        Err(e) => {
            format::error(color, &e.to_string());
            return super::EXIT_FAILURE;
        }
    };
    format::success(color, &format!("unioned {} (image, digest) pair(s)", unioned));

    let rendered = match render_to_string(&images, RenderOptions::default()) {
        Ok(r) => r,
        Err(e) => {
            format::error(color, &e.to_string());
            return super::EXIT_FAILURE;
        }
    };

    if in_place && root.is_dir() {
        let pairs = match thin::discover_pairs(root) {
            Ok(pairs) => pairs,
            Err(e) => {
                format::error(color, &e.to_string());
                return super::EXIT_FAILURE;
            }
        };
        match pairs.first() {
            Some(pair) => {
                if let Err(e) = std::fs::write(&pair.images_path, &rendered) {
                    format::error(color, &format!("failed to write {}: {}", pair.images_path.display(), e));
                    return super::EXIT_FAILURE;
                }
                format::success(color, &format!("wrote {}", pair.images_path.display()));
            }
            None => {
                format::error(color, "no thin-manifest pairing found under root");
                return super::EXIT_FAILURE;
            }
        }
    } else {
        if in_place {
            format::warning(color, "--in-place is only supported for thin-manifest roots; printing instead");
        }
        print!("{}", rendered);
    }

    super::EXIT_SUCCESS
}
