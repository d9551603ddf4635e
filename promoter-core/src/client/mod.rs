//! Async HTTP client for OCI Distribution v2 registry communication.
//!
//! Built on an async `reqwest::Client` rather than a blocking one: the
//! inventory reader's worker pool and the executor's per-destination
//! semaphores are naturally async constructs (tokio tasks, channels,
//! cancellation tokens), so the whole call chain down to the wire stays
//! async instead of bridging to blocking I/O partway down.

use crate::auth::{AuthChallenge, Credentials};
use crate::error::{PromoError, Result};
use reqwest::{Client as ReqwestClient, StatusCode};
use serde::Deserialize;
use sha2::{Digest as Sha2Digest, Sha256};
use std::time::Duration;


pub const MANIFEST_LIST_V2: &str = "application/vnd.docker.distribution.manifest.list.v2+json";
pub const OCI_IMAGE_INDEX_V1: &str = "application/vnd.oci.image.index.v1+json";
pub const OCI_IMAGE_MANIFEST_V1: &str = "application/vnd.oci.image.manifest.v1+json";
pub const DOCKER_MANIFEST_V2: &str = "application/vnd.docker.distribution.manifest.v2+json";

const ACCEPT_MANIFEST_TYPES: &str = "application/vnd.oci.image.manifest.v1+json, \
     application/vnd.oci.image.index.v1+json, \
     application/vnd.docker.distribution.manifest.v2+json, \
     application/vnd.docker.distribution.manifest.list.v2+json";

/// Returns `true` if `media_type` denotes a manifest list / image index —
/// i.e. the manifest has children that must be walked separately (§4.C.3).
pub fn is_manifest_list(media_type: &str) -> bool {
    media_type == MANIFEST_LIST_V2 || media_type == OCI_IMAGE_INDEX_V1
}

/// Per-digest metadata as returned by the tags-list endpoint's `manifest`
/// map extension (a GCR-family addition to the bare OCI Distribution v2
/// response) — this is how §4.C.2's `(digest, MediaType, tags[])` triples
/// and per-digest size are obtained without a separate manifest GET per tag.
#[derive(Debug, Clone, Deserialize)]
pub struct ManifestInfo {
    #[serde(rename = "imageSizeBytes", default, deserialize_with = "size_from_string")]
    pub image_size_bytes: u64,
    #[serde(rename = "mediaType")]
    pub media_type: String,
    #[serde(default)]
    pub tag: Vec<String>,
}

fn size_from_string<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    s.parse().map_err(serde::de::Error::custom)
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    name: String,
    tags: Vec<String>,
    /// Non-standard extension some registries (GCR-family) expose: nested
    /// repository names discovered under this one. The inventory reader
    /// enqueues these as further work items (§4.C.1).
    #[serde(default)]
    child: Vec<String>,
    /// Per-digest metadata, keyed by digest string (§4.C.2).
    #[serde(default)]
    manifest: std::collections::HashMap<String, ManifestInfo>,
}

/// One manifest-list entry: a child digest plus its media type.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ManifestListEntry {
    pub digest: String,
    #[serde(rename = "mediaType")]
    pub media_type: String,
}

#[derive(Debug, Deserialize)]
struct ManifestListBody {
    manifests: Vec<ManifestListEntry>,
}

/// A fetched manifest: raw bytes, its digest, media type, and declared size.
#[derive(Debug, Clone)]
pub struct FetchedManifest {
    pub bytes: Vec<u8>,
    pub digest: String,
    pub media_type: String,
}

impl FetchedManifest {
    /// If this manifest is a list/index, parses its children.
    pub fn children(&self) -> Result<Vec<ManifestListEntry>> {
        let body: ManifestListBody = serde_json::from_slice(&self.bytes)
            .map_err(|e| PromoError::validation(format!("malformed manifest list: {}", e)))?;
        Ok(body.manifests)
    }
}

/// Tags-list page: tags, per-digest manifest metadata, and any discovered
/// sub-repositories.
#[derive(Debug, Clone, Default)]
pub struct TagsPage {
    pub repository: String,
    pub tags: Vec<String>,
    pub child_repositories: Vec<String>,
    pub manifests: std::collections::HashMap<String, ManifestInfo>,
}

/// Configuration for the HTTP client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Per-request timeout in seconds. Default matches §5's "global timeout
    /// (default 10 min per request)", not the teacher's 30s default — a
    /// promotion run's registry calls are expected to be much larger objects
    /// than a typical `librex` CLI invocation.
    pub timeout_seconds: u64,
    pub max_idle_per_host: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 600,
            max_idle_per_host: 10,
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    pub fn with_max_idle_per_host(mut self, max: usize) -> Self {
        self.max_idle_per_host = max;
        self
    }
}

/// Async HTTP client for OCI registry operations.
#[derive(Debug, Clone)]
pub struct Client {
    http_client: ReqwestClient,
    registry_url: String,
    credentials: Option<Credentials>,
}

impl Client {
    pub fn new(registry_url: &str, credentials: Option<Credentials>) -> Result<Self> {
        Self::with_config(registry_url, ClientConfig::default(), credentials)
    }

    pub fn with_config(
        registry_url: &str,
        config: ClientConfig,
        credentials: Option<Credentials>,
    ) -> Result<Self> {
        let normalized_url = Self::normalize_url(registry_url)?;

        let http_client = ReqwestClient::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .pool_max_idle_per_host(config.max_idle_per_host)
            .build()
            .map_err(|e| PromoError::network_with_source("failed to create HTTP client", e))?;

        Ok(Self {
            http_client,
            registry_url: normalized_url,
            credentials,
        })
    }

    fn normalize_url(url: &str) -> Result<String> {
        let url = url.trim();
        if url.is_empty() {
            return Err(PromoError::validation("registry URL cannot be empty"));
        }
        let url = if !url.starts_with("http://") && !url.starts_with("https://") {
            format!("https://{}", url)
        } else {
            url.to_string()
        };
        Ok(url.trim_end_matches('/').to_string())
    }

    pub fn registry_url(&self) -> &str {
        &self.registry_url
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.credentials.as_ref().and_then(|c| c.to_header_value()) {
            Some(header) => builder.header(reqwest::header::AUTHORIZATION, header),
            None => builder,
        }
    }

    /// Fetches one page of tags for `repository`, following the registry's
    /// `Link` header if `follow_pagination` is set by the caller re-invoking
    /// with the returned next-page path.
    #[tracing::instrument(skip(self))]
    pub async fn fetch_tags_page(&self, repository: &str, page_path: Option<&str>) -> Result<(TagsPage, Option<String>)> {
        let url = match page_path {
            Some(path) => format!("{}{}", self.registry_url, path),
            None => format!("{}/v2/{}/tags/list", self.registry_url, repository),
        };

        let request = self.authorize(self.http_client.get(&url));
        let response = request
            .send()
            .await
            .map_err(|e| Self::translate_reqwest_error(e, &self.registry_url))?;

        let next_path = Self::extract_next_link(response.headers());
        let response = Self::check_response_status(response).await?;

        let body: TagsResponse = response
            .json()
            .await
            .map_err(|e| PromoError::validation(format!("failed to parse tags response: {}", e)))?;

        if body.name != repository {
            return Err(PromoError::validation(format!(
                "registry returned tags for '{}' but expected '{}'",
                body.name, repository
            )));
        }

        Ok((
            TagsPage {
                repository: body.name,
                tags: body.tags,
                child_repositories: body.child,
                manifests: body.manifest,
            },
            next_path,
        ))
    }

    /// Fetches every page of tags for `repository`, following pagination to completion.
    pub async fn fetch_all_tags(&self, repository: &str) -> Result<TagsPage> {
        let mut page_path = None;
        let mut page = TagsPage {
            repository: repository.to_string(),
            ..Default::default()
        };
        loop {
            let (fetched, next) = self.fetch_tags_page(repository, page_path.as_deref()).await?;
            page.tags.extend(fetched.tags);
            page.child_repositories.extend(fetched.child_repositories);
            page.manifests.extend(fetched.manifests);
            match next {
                Some(p) => page_path = Some(p),
                None => break,
            }
        }
        Ok(page)
    }

    /// Fetches a manifest by tag or digest, returning its bytes, digest
    /// (from the `Docker-Content-Digest` header, falling back to a computed
    /// sha256), and media type (from `Content-Type`).
    #[tracing::instrument(skip(self))]
    pub async fn fetch_manifest(&self, repository: &str, reference: &str) -> Result<FetchedManifest> {
        let url = format!("{}/v2/{}/manifests/{}", self.registry_url, repository, reference);

        let request = self
            .authorize(self.http_client.get(&url))
            .header(reqwest::header::ACCEPT, ACCEPT_MANIFEST_TYPES);

        let response = request
            .send()
            .await
            .map_err(|e| Self::translate_reqwest_error(e, &self.registry_url))?;

        let digest_from_header = response
            .headers()
            .get("Docker-Content-Digest")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let media_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(OCI_IMAGE_MANIFEST_V1)
            .to_string();

        let response = Self::check_response_status(response).await?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| PromoError::network_with_source("failed to read manifest response", e))?;

        let digest = match digest_from_header {
            Some(d) => d,
            None => {
                let mut hasher = Sha256::new();
                hasher.update(&bytes);
                format!("sha256:{:x}", hasher.finalize())
            }
        };

        Ok(FetchedManifest {
            bytes: bytes.to_vec(),
            digest,
            media_type,
        })
    }

    /// Issues a copy-by-digest + set-tag: PUTs `manifest_bytes` (already
    /// fetched from the source) to `repository:tag` at this client's
    /// registry. The registry assigns `reference` to point at the pushed
    /// content; no blob movement happens if the destination already holds
    /// the same digest (§4.E.2).
    #[tracing::instrument(skip(self, manifest_bytes))]
    pub async fn put_manifest(
        &self,
        repository: &str,
        reference: &str,
        manifest_bytes: &[u8],
        media_type: &str,
    ) -> Result<()> {
        let url = format!("{}/v2/{}/manifests/{}", self.registry_url, repository, reference);

        let request = self
            .authorize(self.http_client.put(&url))
            .header(reqwest::header::CONTENT_TYPE, media_type)
            .body(manifest_bytes.to_vec());

        let response = request
            .send()
            .await
            .map_err(|e| Self::translate_reqwest_error(e, &self.registry_url))?;

        Self::check_response_status(response).await?;
        Ok(())
    }

    /// Deletes a manifest reference — a tag or a digest, per the same
    /// `<reference>` path segment `put_manifest`/`fetch_manifest` use.
    /// Demotion (§4.E.2 "tag removal, blob retained") calls this with a
    /// *tag*: the registry drops that one tag association and leaves the
    /// underlying digest's manifest (and any other tag still pointing at
    /// it) untouched. Deleting by digest instead would remove the manifest
    /// outright, taking every tag that shares that digest down with it.
    #[tracing::instrument(skip(self))]
    pub async fn delete_manifest(&self, repository: &str, reference: &str) -> Result<()> {
        let url = format!("{}/v2/{}/manifests/{}", self.registry_url, repository, reference);

        let request = self.authorize(self.http_client.delete(&url));
        let response = request
            .send()
            .await
            .map_err(|e| Self::translate_reqwest_error(e, &self.registry_url))?;

        let status = response.status();
        if status == StatusCode::ACCEPTED || status == StatusCode::NO_CONTENT {
            return Ok(());
        }
        Self::check_response_status(response).await?;
        Ok(())
    }

    /// Parses a `WWW-Authenticate` challenge off a 401 response and resolves
    /// a bearer token against its realm, for registries that gate anonymous
    /// reads behind a token exchange.
    #[tracing::instrument(skip(self))]
    pub async fn resolve_bearer_token(&self, challenge_header: &str) -> Result<String> {
        let challenge = AuthChallenge::parse(challenge_header)?;

        let mut url = reqwest::Url::parse(&challenge.realm)
            .map_err(|e| PromoError::validation(format!("invalid auth realm URL: {}", e)))?;
        {
            let mut pairs = url.query_pairs_mut();
            if let Some(service) = &challenge.service {
                pairs.append_pair("service", service);
            }
            if let Some(scope) = &challenge.scope {
                pairs.append_pair("scope", scope);
            }
        }

        let request = self.authorize(self.http_client.get(url));
        let response = request
            .send()
            .await
            .map_err(|e| Self::translate_reqwest_error(e, &challenge.realm))?;
        let response = Self::check_response_status(response).await?;

        #[derive(Deserialize)]
        struct TokenResponse {
            #[serde(alias = "access_token")]
            token: String,
        }
        let parsed: TokenResponse = response
            .json()
            .await
            .map_err(|e| PromoError::validation(format!("malformed token response: {}", e)))?;
        Ok(parsed.token)
    }

    fn extract_next_link(headers: &reqwest::header::HeaderMap) -> Option<String> {
        let link_header = headers.get(reqwest::header::LINK)?;
        let link_str = link_header.to_str().ok()?;

        for link_part in link_str.split(',') {
            let link_part = link_part.trim();
            if link_part.contains("rel=\"next\"") || link_part.contains("rel='next'") {
                if let (Some(start), Some(end)) = (link_part.find('<'), link_part.find('>')) {
                    return Some(link_part[start + 1..end].to_string());
                }
            }
        }
        None
    }

    fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
        let retry_after = headers.get(reqwest::header::RETRY_AFTER)?;
        let retry_str = retry_after.to_str().ok()?;

        if let Ok(seconds) = retry_str.parse::<u64>() {
            return Some(seconds);
        }
        if let Ok(datetime) = httpdate::parse_http_date(retry_str) {
            let now = std::time::SystemTime::now();
            if datetime > now {
                if let Ok(duration) = datetime.duration_since(now) {
                    return Some(duration.as_secs());
                }
            } else {
                return Some(0);
            }
        }
        None
    }

    fn translate_reqwest_error(error: reqwest::Error, registry_url: &str) -> PromoError {
        if error.is_timeout() {
            PromoError::network(format!("request to {} timed out", registry_url))
        } else if error.is_connect() {
            PromoError::network_with_source(format!("failed to connect to registry at {}", registry_url), error)
        } else {
            PromoError::network_with_source(format!("network error communicating with {}", registry_url), error)
        }
    }

    /// Translates a non-success HTTP status into a classified `PromoError`,
    /// consuming `response` to read its body for the error message.
    async fn check_response_status(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let headers = response.headers().clone();
        let url = response.url().clone();
        let error_body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("(unable to read response body)"));

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(PromoError::network_permanent(format!(
                "authentication failed for {}: {}",
                url, error_body
            ))),
            StatusCode::NOT_FOUND => Err(PromoError::network_permanent(format!(
                "not found: {}",
                url
            ))),
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = Self::parse_retry_after(&headers);
                Err(PromoError::network(format!(
                    "rate limited by {} (retry after {:?}s)",
                    url, retry_after
                )))
            }
            StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT => Err(PromoError::network(format!(
                "server error from {}: {}",
                url, error_body
            ))),
            _ => Err(PromoError::network_permanent(format!(
                "HTTP {} from {}: {}",
                status.as_u16(),
                url,
                error_body
            ))),
        }
    }
}
