//! The concurrent executor (component E): performs promotion edges with
//! bounded parallelism, per-destination serialization, retries, dry-run, and
//! pre-checks, producing a structured [`report::RunReport`].

pub mod precheck;
pub mod report;

use crate::auth::CredentialProvider;
use crate::client::{Client, ClientConfig};
use crate::context::RunContext;
use crate::error::{PromoError, Result, Severity};
use crate::manifest::schema::Manifest;
use crate::model::{ImageName, Registry};
use crate::plan::edge::Op;
use crate::plan::PromotionEdge;
use precheck::{PreCheck, PreCheckContext};
use report::{as_millis, EdgeResult, EdgeStatus, RunReport, SeverityLabel};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Tuning knobs for one execute call.
#[derive(Debug, Clone)]
pub struct ExecutorOptions {
    /// Worker concurrency. Default matches the inventory reader's
    /// `2 * core count` (§4.E "Worker pool").
    pub worker_count: usize,
    pub retry_attempts: u8,
    pub initial_backoff_ms: u64,
    /// `false` (the default) is dry-run: edges are built and logged, not
    /// dispatched (§4.E "Dry-run").
    pub confirm: bool,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            worker_count: 2 * std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4),
            retry_attempts: 8,
            initial_backoff_ms: 500,
            confirm: false,
        }
    }
}

/// Executes promotion edges against a manifest's source and destination
/// registries.
pub struct Executor<C: CredentialProvider> {
    credential_provider: Arc<C>,
    pre_checks: Vec<Arc<dyn PreCheck>>,
}

impl<C: CredentialProvider + 'static> Executor<C> {
    pub fn new(credential_provider: Arc<C>) -> Self {
        Self {
            credential_provider,
            pre_checks: Vec::new(),
        }
    }

    pub fn with_pre_checks(mut self, pre_checks: Vec<Arc<dyn PreCheck>>) -> Self {
        self.pre_checks = pre_checks;
        self
    }

    /// Runs every registered pre-check, then executes `edges` with bounded
    /// parallelism. Returns `Err` only when a pre-check aborts the run
    /// before any edge executes; otherwise returns `Ok(report)` even if
    /// individual edges failed — the caller inspects `report.is_success()`.
    #[tracing::instrument(skip(self, manifest, edges, master, run_ctx))]
    pub async fn execute(
        &self,
        manifest: &Manifest,
        edges: Vec<PromotionEdge>,
        master: &crate::inventory::MasterInventory,
        run_ctx: &RunContext,
        options: &ExecutorOptions,
    ) -> Result<RunReport> {
        let pre_check_ctx = PreCheckContext {
            manifest,
            edges: &edges,
            master,
        };
        for check in &self.pre_checks {
            check.check(&pre_check_ctx)?;
        }

        let mut report = RunReport::new(!options.confirm);

        if edges.is_empty() {
            return Ok(report);
        }

        let source_ctx = manifest
            .source()
            .ok_or_else(|| PromoError::validation("manifest has no source registry"))?;
        let source_client = Arc::new(self.build_client(source_ctx)?);

        let mut dst_clients: HashMap<Registry, Arc<Client>> = HashMap::new();
        for dst in manifest.destinations() {
            dst_clients.insert(dst.name.clone(), Arc::new(self.build_client(dst)?));
        }

        let mut sorted_edges = edges;
        sorted_edges.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

        // One permit-1 semaphore per (destination, image) so edges targeting
        // the same tuple serialize (§4.E.1, §5 ordering guarantee iii);
        // independent edges interleave freely under the global worker cap.
        let mut per_key_semaphores: HashMap<(Registry, ImageName), Arc<Semaphore>> = HashMap::new();
        for edge in &sorted_edges {
            per_key_semaphores
                .entry((edge.registry.clone(), edge.image.clone()))
                .or_insert_with(|| Arc::new(Semaphore::new(1)));
        }

        let global_semaphore = Arc::new(Semaphore::new(options.worker_count.max(1)));
        let mut join_set: JoinSet<EdgeResult> = JoinSet::new();

        for edge in sorted_edges {
            let dst_client = match dst_clients.get(&edge.registry) {
                Some(c) => Arc::clone(c),
                None => {
                    let mut result = EdgeResult {
                        edge: edge.clone(),
                        status: EdgeStatus::Failed,
                        attempts: 0,
                        duration_ms: 0,
                        error: None,
                        severity: Some(SeverityLabel::Permanent),
                    };
                    result.error = Some(format!("no destination client built for registry {}", edge.registry));
                    report.push(result);
                    continue;
                }
            };
            let source_client = Arc::clone(&source_client);
            let key_semaphore = Arc::clone(
                per_key_semaphores
                    .get(&(edge.registry.clone(), edge.image.clone()))
                    .expect("semaphore pre-built for every edge's key"),
            );
            let global_semaphore = Arc::clone(&global_semaphore);
            let counter = Arc::clone(&run_ctx.counter);
            let cancellation = run_ctx.cancellation.clone();
            let retry_attempts = options.retry_attempts;
            let initial_backoff_ms = options.initial_backoff_ms;
            let confirm = options.confirm;

            join_set.spawn(async move {
                let _global_permit = global_semaphore.acquire_owned().await.expect("semaphore not closed");
                let _key_permit = key_semaphore.acquire_owned().await.expect("semaphore not closed");
                tracing::debug!(edge = %edge, "scheduled");
                execute_one_edge(
                    edge,
                    &source_client,
                    &dst_client,
                    &counter,
                    &cancellation,
                    retry_attempts,
                    initial_backoff_ms,
                    confirm,
                )
                .await
            });
        }

        while let Some(joined) = join_set.join_next().await {
            let result = joined.map_err(|e| PromoError::network(format!("executor worker panicked: {}", e)))?;
            report.push(result);
        }

        report.results.sort_by(|a, b| a.edge.sort_key().cmp(&b.edge.sort_key()));
        Ok(report)
    }

    fn build_client(&self, ctx: &crate::model::RegistryContext) -> Result<Client> {
        let credentials = self.credential_provider.resolve(ctx)?;
        Client::with_config(ctx.name.as_str(), ClientConfig::default(), Some(credentials))
    }
}

/// Executes one edge end to end, with retry/backoff, returning its final
/// report entry. Never returns `Err`: failures are folded into the
/// `EdgeResult` itself so one edge's failure doesn't abort the others.
async fn execute_one_edge(
    edge: PromotionEdge,
    source_client: &Client,
    dst_client: &Client,
    counter: &Arc<crate::ratelimit::RequestCounter>,
    cancellation: &tokio_util::sync::CancellationToken,
    retry_attempts: u8,
    initial_backoff_ms: u64,
    confirm: bool,
) -> EdgeResult {
    let started = Instant::now();

    if !confirm {
        tracing::info!(edge = %edge, "would apply (dry-run)");
        return EdgeResult {
            edge,
            status: EdgeStatus::WouldDo,
            attempts: 0,
            duration_ms: as_millis(started.elapsed()),
            error: None,
            severity: None,
        };
    }

    let mut attempts = 0u32;
    let mut last_err: Option<PromoError> = None;

    for attempt in 0..retry_attempts.max(1) {
        attempts = attempt as u32 + 1;
        if cancellation.is_cancelled() {
            last_err = Some(PromoError::validation("execution cancelled"));
            break;
        }

        tracing::debug!(edge = %edge, attempt = attempts, "attempted");
        let outcome = dispatch_edge(&edge, source_client, dst_client, counter).await;

        match outcome {
            Ok(()) => {
                tracing::info!(edge = %edge, attempts, "result: succeeded");
                return EdgeResult {
                    edge,
                    status: EdgeStatus::Succeeded,
                    attempts,
                    duration_ms: as_millis(started.elapsed()),
                    error: None,
                    severity: None,
                };
            }
            Err(e) => {
                let severity = e.severity();
                tracing::warn!(edge = %edge, attempt = attempts, error = %e, "edge attempt failed");
                let fatal = severity == Severity::Permanent;
                last_err = Some(e);
                if fatal {
                    break;
                }
                if attempt + 1 < retry_attempts {
                    let backoff = Duration::from_millis(initial_backoff_ms * 2u64.pow(attempt as u32));
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    let error = last_err.expect("loop always sets last_err before exiting without success");
    let severity = error.severity();
    tracing::error!(edge = %edge, attempts, error = %error, "result: failed");
    EdgeResult {
        edge,
        status: EdgeStatus::Failed,
        attempts,
        duration_ms: as_millis(started.elapsed()),
        error: Some(error.to_string()),
        severity: Some(SeverityLabel::from(severity)),
    }
}

/// Builds and issues the registry call for one edge (§4.E.2): `Add` and
/// `Move` copy-by-digest + set-tag, `Delete` removes the tag's manifest.
async fn dispatch_edge(
    edge: &PromotionEdge,
    source_client: &Client,
    dst_client: &Client,
    counter: &Arc<crate::ratelimit::RequestCounter>,
) -> Result<()> {
    match &edge.op {
        Op::Add | Op::Move { .. } => {
            counter.increment();
            let fetched = source_client.fetch_manifest(edge.image.as_str(), &edge.digest.to_string()).await?;
            counter.increment();
            dst_client
                .put_manifest(edge.image.as_str(), edge.tag.as_str(), &fetched.bytes, &fetched.media_type)
                .await
        }
        Op::Delete => {
            // Delete by tag, not digest: removes only this tag's reference,
            // leaving the manifest (and any sibling tag on the same
            // digest) in place, matching §4.E.2's "tag removal, blob
            // retained" rather than deleting the shared manifest outright.
            counter.increment();
            dst_client.delete_manifest(edge.image.as_str(), edge.tag.as_str()).await
        }
    }
}

#[cfg(test)]
mod tests;
