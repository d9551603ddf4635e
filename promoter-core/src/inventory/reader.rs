//! The OCI Distribution v2 inventory walk (component C): builds a
//! `MasterInventory` from a manifest's declared registries and image names.

use crate::auth::CredentialProvider;
use crate::client::{is_manifest_list, Client, ClientConfig};
use crate::error::{PromoError, Result, Severity};
use crate::inventory::model::{Inventory, MasterInventory, ParentLink, RegInvImage};
use crate::manifest::schema::Manifest;
use crate::model::{Digest, ImageName, Registry, RegistryContext, Tag};
use crate::ratelimit::RequestCounter;
use std::collections::BTreeSet;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

#[cfg(test)]
mod reader_tests;

/// Tuning knobs for one inventory read.
#[derive(Debug, Clone)]
pub struct ReaderOptions {
    /// Worker concurrency. Default `2 * core count` per §4.C.
    pub worker_count: usize,
    /// Retry attempts per HTTP request before a repo is marked unreachable.
    pub retry_attempts: u8,
    /// Fixed delay between retries (§4.C: "retries up to k times ... with a
    /// fixed backoff" — unlike the executor's exponential backoff, this
    /// delay does not grow with the attempt count).
    pub retry_backoff_ms: u64,
    /// If true, an unreachable repo is recorded and skipped instead of
    /// failing the whole read.
    pub allow_partial: bool,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            worker_count: 2 * std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4),
            retry_attempts: 8,
            retry_backoff_ms: 500,
            allow_partial: false,
        }
    }
}

/// Builds a `MasterInventory` by walking every registry a manifest declares,
/// crawling each of the manifest's image names (and any nested repositories
/// a registry reports as children) via the OCI Distribution v2 API.
pub struct InventoryReader<C: CredentialProvider> {
    credential_provider: Arc<C>,
}

impl<C: CredentialProvider + 'static> InventoryReader<C> {
    pub fn new(credential_provider: Arc<C>) -> Self {
        Self { credential_provider }
    }

    #[tracing::instrument(skip(self, manifest, counter, cancellation))]
    pub async fn read(
        &self,
        manifest: &Manifest,
        counter: &Arc<RequestCounter>,
        cancellation: &CancellationToken,
        options: &ReaderOptions,
    ) -> Result<MasterInventory> {
        let mut master = MasterInventory::new();
        let image_names: Vec<ImageName> = manifest.images.iter().map(|i| i.name.clone()).collect();

        for registry_ctx in &manifest.registries {
            if cancellation.is_cancelled() {
                return Err(PromoError::validation("inventory read cancelled"));
            }
            let inventory = self
                .read_registry(registry_ctx, &image_names, counter, cancellation, options)
                .await?;
            master.insert(registry_ctx.name.clone(), inventory);
        }

        Ok(master)
    }

    async fn read_registry(
        &self,
        registry_ctx: &RegistryContext,
        image_names: &[ImageName],
        counter: &Arc<RequestCounter>,
        cancellation: &CancellationToken,
        options: &ReaderOptions,
    ) -> Result<Inventory> {
        let credentials = self.credential_provider.resolve(registry_ctx)?;
        let client = Arc::new(Client::with_config(
            registry_ctx.name.as_str(),
            ClientConfig::default(),
            Some(credentials),
        )?);

        let mut join_set: JoinSet<Result<CrawlOutcome>> = JoinSet::new();
        let semaphore = Arc::new(tokio::sync::Semaphore::new(options.worker_count));

        for name in image_names {
            let client = Arc::clone(&client);
            let counter = Arc::clone(counter);
            let cancellation = cancellation.clone();
            let semaphore = Arc::clone(&semaphore);
            let retry_attempts = options.retry_attempts;
            let retry_backoff_ms = options.retry_backoff_ms;
            let allow_partial = options.allow_partial;
            let root = name.as_str().to_string();
            join_set.spawn(async move {
                crawl_subtree(
                    client,
                    root,
                    semaphore,
                    counter,
                    cancellation,
                    retry_attempts,
                    retry_backoff_ms,
                    allow_partial,
                )
                .await
            });
        }

        let mut inventory = Inventory::default();
        while let Some(joined) = join_set.join_next().await {
            let outcome = joined.map_err(|e| PromoError::network(format!("inventory worker panicked: {}", e)))??;
            merge_outcome(&mut inventory, outcome);
        }

        Ok(inventory)
    }
}

/// What one repository subtree's crawl produced.
struct CrawlOutcome {
    images: Vec<RegInvImage>,
    parent_digest: Vec<(Digest, ParentLink)>,
    digest_media_type: Vec<(Digest, String)>,
    digest_image_size: Vec<(Digest, u64)>,
    unreachable: Vec<String>,
}

fn merge_outcome(inventory: &mut Inventory, outcome: CrawlOutcome) {
    for image in outcome.images {
        inventory.images.insert(image.name.clone(), image);
    }
    inventory.parent_digest.extend(outcome.parent_digest);
    inventory.digest_media_type.extend(outcome.digest_media_type);
    inventory.digest_image_size.extend(outcome.digest_image_size);
    inventory.unreachable_repositories.extend(outcome.unreachable);
}

/// Depth-first walk of one root repository and its discovered children,
/// preserving registry ordering within the subtree (§4.C.1).
async fn crawl_subtree(
    client: Arc<Client>,
    root: String,
    semaphore: Arc<tokio::sync::Semaphore>,
    counter: Arc<RequestCounter>,
    cancellation: CancellationToken,
    retry_attempts: u8,
    retry_backoff_ms: u64,
    allow_partial: bool,
) -> Result<CrawlOutcome> {
    let mut outcome = CrawlOutcome {
        images: Vec::new(),
        parent_digest: Vec::new(),
        digest_media_type: Vec::new(),
        digest_image_size: Vec::new(),
        unreachable: Vec::new(),
    };

    let mut frontier = vec![root];
    while let Some(repo) = frontier.pop() {
        if cancellation.is_cancelled() {
            return Err(PromoError::validation("inventory crawl cancelled"));
        }

        let _permit = semaphore.acquire().await.map_err(|e| PromoError::network(e.to_string()))?;
        let page = match fetch_with_retry(&client, &repo, &counter, retry_attempts, retry_backoff_ms, &cancellation).await {
            Ok(page) => page,
            Err(e) if allow_partial => {
                tracing::warn!(repo = %repo, error = %e, "repository unreachable, skipping (partial mode)");
                outcome.unreachable.push(repo);
                continue;
            }
            Err(e) => return Err(e),
        };
        drop(_permit);

        let image_name = ImageName::new(repo.clone())?;
        let mut reg_inv = RegInvImage::new(image_name);

        for (digest_str, info) in &page.manifests {
            let digest = Digest::from_str(digest_str)?;
            outcome.digest_media_type.push((digest.clone(), info.media_type.clone()));
            outcome.digest_image_size.push((digest.clone(), info.image_size_bytes));

            let tags: BTreeSet<Tag> = info
                .tag
                .iter()
                .filter_map(|t| Tag::new(t.clone()).ok())
                .collect();
            // Every observed digest is recorded, tagged or not: manifest-list
            // children are rarely tagged themselves, and the parent-validity
            // check (§4.C.3) needs to see them to confirm they live under the
            // same image as their parent.
            reg_inv.dmap.insert(digest.clone(), tags);

            if is_manifest_list(&info.media_type) {
                counter.increment();
                if let Ok(fetched) = client.fetch_manifest(&repo, digest_str).await {
                    if let Ok(children) = fetched.children() {
                        for child in children {
                            if let Ok(child_digest) = Digest::from_str(&child.digest) {
                                outcome.parent_digest.push((
                                    child_digest,
                                    ParentLink {
                                        parent: digest.clone(),
                                        owner_image: reg_inv.name.clone(),
                                    },
                                ));
                            }
                        }
                    }
                }
            }
        }

        outcome.images.push(reg_inv);

        for child in page.child_repositories {
            frontier.push(format!("{}/{}", repo, child));
        }
    }

    Ok(outcome)
}

async fn fetch_with_retry(
    client: &Client,
    repo: &str,
    counter: &Arc<RequestCounter>,
    retry_attempts: u8,
    retry_backoff_ms: u64,
    cancellation: &CancellationToken,
) -> Result<crate::client::TagsPage> {
    let mut last_err = None;
    let retry_attempts = retry_attempts.max(1);
    for attempt in 0..retry_attempts {
        if cancellation.is_cancelled() {
            return Err(PromoError::validation("fetch cancelled"));
        }
        counter.increment();
        match client.fetch_all_tags(repo).await {
            Ok(page) => return Ok(page),
            Err(e) => {
                tracing::warn!(repo, attempt, error = %e, "tags/list request failed");
                if e.severity() == Severity::Permanent {
                    return Err(e);
                }
                last_err = Some(e);
                if attempt + 1 < retry_attempts {
                    tokio::time::sleep(Duration::from_millis(retry_backoff_ms)).await;
                }
            }
        }
    }
    Err(last_err.unwrap_or_else(|| PromoError::network(format!("repository {} unreachable", repo))))
}
