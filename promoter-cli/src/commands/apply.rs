use crate::format::{self, ColorChoice, OutputFormat};
use promoter_core::auth::AnonymousCredentialProvider;
use promoter_core::config::RunConfig;
use promoter_core::context::RunContext;
use promoter_core::executor::precheck::{ParentValidityCheck, SizeCheck};
use promoter_core::executor::Executor;
use promoter_core::inventory::InventoryReader;
use promoter_core::plan::{filter_promotion_edges, reconcile, PlannerOptions};
use std::path::Path;
use std::sync::Arc;

/// Default image-size ceiling for the `apply` command's size pre-check:
/// 10 GiB. Overridable only through `RunConfig` today; no CLI flag yet since
/// no caller has needed one.
const DEFAULT_SIZE_CEILING_BYTES: u64 = 10 * 1024 * 1024 * 1024;

/// Computes the plan for every manifest at `root` and executes it.
/// `confirm=false` dry-runs (the default); `allow_deletions` enables
/// demotion-mode `Delete` edges.
pub async fn run(root: &Path, confirm: bool, allow_deletions: bool, report_format: OutputFormat, color: ColorChoice) -> i32 {
    let manifests = match super::load_manifests(root) {
        Ok(manifests) => manifests,
        Err(e) => {
            format::error(color, &e.to_string());
            return super::EXIT_FAILURE;
        }
    };

    let mut config = RunConfig::default();
    config.confirm = confirm;
    let run_ctx = RunContext::new(config);
    let credential_provider = Arc::new(AnonymousCredentialProvider);
    let reader = InventoryReader::new(Arc::clone(&credential_provider));
    let executor = Executor::new(Arc::clone(&credential_provider)).with_pre_checks(vec![
        Arc::new(SizeCheck::new(DEFAULT_SIZE_CEILING_BYTES)),
        Arc::new(ParentValidityCheck),
    ]);
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

        let executor_options = run_ctx.config.executor_options();

        let report = match executor.execute(manifest, edges, &master, &run_ctx, &executor_options).await {
            Ok(report) => report,
            Err(e) => {
                format::error(color, &e.to_string());
                exit_code = super::EXIT_FAILURE;
                continue;
            }
        };

        match report_format {
            OutputFormat::Pretty => println!("{}", report),
            OutputFormat::Json => match serde_json::to_string_pretty(&report) {
                Ok(s) => println!("{}", s),
                Err(e) => format::error(color, &format!("failed to render report as JSON: {}", e)),
            },
            OutputFormat::Yaml => match serde_yaml::to_string(&report) {
                Ok(s) => print!("{}", s),
                Err(e) => format::error(color, &format!("failed to render report as YAML: {}", e)),
            },
        }
        if report.is_success() {
            format::success(color, "run complete");
        } else {
            format::error(color, "run completed with failures");
            exit_code = super::EXIT_FAILURE;
        }
    }

    exit_code
}
