use crate::format::{self, ColorChoice};
use promoter_core::auth::AnonymousCredentialProvider;
use promoter_core::config::RunConfig;
use promoter_core::context::RunContext;
use promoter_core::inventory::InventoryReader;
use promoter_core::plan::{filter_promotion_edges, reconcile, PlannerOptions};
use std::path::Path;
use std::sync::Arc;

/// Computes and prints the promotion plan for every manifest at `root`,
/// without executing anything.
pub async fn run(root: &Path, allow_deletions: bool, color: ColorChoice) -> i32 {
    let manifests = match super::load_manifests(root) {
        Ok(manifests) => manifests,
        Err(e) => {
            format::error(color, &e.to_string());
            return super::EXIT_FAILURE;
        }
    };

    let run_ctx = RunContext::new(RunConfig::default());
    let reader = InventoryReader::new(Arc::new(AnonymousCredentialProvider));
    let planner_options = PlannerOptions { allow_deletions };
    let reader_options = run_ctx.config.reader_options();

    let mut exit_code = super::EXIT_SUCCESS;

    for manifest in &manifests {
        let master = match reader
            .read(manifest, &run_ctx.counter, &run_ctx.cancellation, &reader_options)
            .await
        {
            Ok(master) => master,
            Err(e) => {
                format::error(color, &e.to_string());
                exit_code = super::EXIT_FAILURE;
                continue;
            }
        };

        let invalid_parents: Vec<_> = master.values().flat_map(|inv| inv.invalid_parents()).collect();
        if !invalid_parents.is_empty() {
            format::error(
                color,
                &format!(
                    "manifest-list parent(s) whose child digest resolves under a different image: {}",
                    invalid_parents.iter().map(|d| d.to_string()).collect::<Vec<_>>().join(", ")
                ),
            );
            exit_code = super::EXIT_FAILURE;
            continue;
        }

        let outcome = reconcile(manifest, &master, &planner_options);
        for warning in &outcome.warnings {
            format::warning(color, warning);
        }

        let edges = match filter_promotion_edges(outcome.edges, &master) {
            Ok(edges) => edges,
            Err(e) => {
                format::error(color, &e.to_string());
                exit_code = super::EXIT_FAILURE;
                continue;
            }
        };

        println!("{}", outcome.summary);
        for edge in &edges {
            println!("  {}", edge);
        }
    }

    exit_code
}
