//! Error types for the promotion engine.
//!
//! Every error kind from the design's error handling section is represented
//! here, in the order callers are expected to observe them: parse and
//! semantic errors are raised before any network I/O, inventory errors during
//! the read phase, plan conflicts between read and execute, and edge errors
//! during execute.

use thiserror::Error;


/// Whether a failure can plausibly succeed on retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Network blip, 5xx, 429 — worth retrying.
    Transient,
    /// Auth failure, 4xx other than 429, malformed input — retrying won't help.
    Permanent,
}

/// Main error type for promotion-engine operations.
#[derive(Error, Debug)]
pub enum PromoError {
    /// Malformed YAML, missing fields, duplicate image names.
    #[error("failed to parse manifest at {path}: {message}")]
    ManifestParse { path: String, message: String },

    /// One of invariants §3.1-§3.6 violated.
    #[error("manifest at {path} violates invariant: {message}")]
    ManifestSemantic { path: String, message: String },

    /// Registry HTTP failure exceeding retries.
    #[error("inventory read failed for {registry}/{image}: {message} ({severity:?})")]
    InventoryRead {
        registry: String,
        image: String,
        message: String,
        severity: Severity,
    },

    /// Same `(destination, image, tag)` mapped to distinct digests across manifests.
    #[error(
        "plan conflict at {registry}/{image}:{tag}: {digest_a} and {digest_b} both claimed"
    )]
    PlanConflict {
        registry: String,
        image: String,
        tag: String,
        digest_a: String,
        digest_b: String,
    },

    /// Size, removal, or vulnerability pre-check rejected the run.
    #[error("pre-check '{check}' failed: {message}")]
    PreCheckFailure { check: String, message: String },

    /// Per-edge failure after the retry budget was exhausted.
    #[error("edge execution failed ({registry}/{image}:{tag}): {message} ({severity:?})")]
    EdgeExecute {
        registry: String,
        image: String,
        tag: String,
        message: String,
        severity: Severity,
    },

    /// Configuration could not be loaded or parsed.
    #[error("configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A registry request failed below the classification layer (DNS, TLS,
    /// timeouts, HTTP status translation). Carries its own severity so the
    /// inventory reader and executor can fold it into `InventoryRead`/
    /// `EdgeExecute` without re-deriving transient-vs-permanent from scratch.
    #[error("network error: {message} ({severity:?})")]
    Network {
        message: String,
        severity: Severity,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A value failed basic syntactic validation (bad digest, bad tag, ...).
    #[error("validation error: {message}")]
    Validation { message: String },
}

impl PromoError {
    pub fn manifest_parse(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ManifestParse {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn manifest_semantic(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ManifestSemantic {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            severity: Severity::Transient,
            source: None,
        }
    }

    pub fn network_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Network {
            message: message.into(),
            severity: Severity::Transient,
            source: Some(Box::new(source)),
        }
    }

    pub fn network_permanent(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            severity: Severity::Permanent,
            source: None,
        }
    }

    pub fn inventory_read(
        registry: impl Into<String>,
        image: impl Into<String>,
        message: impl Into<String>,
        severity: Severity,
    ) -> Self {
        Self::InventoryRead {
            registry: registry.into(),
            image: image.into(),
            message: message.into(),
            severity,
        }
    }

    pub fn plan_conflict(
        registry: impl Into<String>,
        image: impl Into<String>,
        tag: impl Into<String>,
        digest_a: impl Into<String>,
        digest_b: impl Into<String>,
    ) -> Self {
        Self::PlanConflict {
            registry: registry.into(),
            image: image.into(),
            tag: tag.into(),
            digest_a: digest_a.into(),
            digest_b: digest_b.into(),
        }
    }

    pub fn pre_check_failure(check: impl Into<String>, message: impl Into<String>) -> Self {
        Self::PreCheckFailure {
            check: check.into(),
            message: message.into(),
        }
    }

    pub fn edge_execute(
        registry: impl Into<String>,
        image: impl Into<String>,
        tag: impl Into<String>,
        message: impl Into<String>,
        severity: Severity,
    ) -> Self {
        Self::EdgeExecute {
            registry: registry.into(),
            image: image.into(),
            tag: tag.into(),
            message: message.into(),
            severity,
        }
    }

    pub fn config_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Classifies the error as `Transient` or `Permanent`, for the outer
    /// retry layer. Errors with no inherent classification default to
    /// `Permanent` (fail closed).
    pub fn severity(&self) -> Severity {
        match self {
            Self::InventoryRead { severity, .. }
            | Self::EdgeExecute { severity, .. }
            | Self::Network { severity, .. } => *severity,
            _ => Severity::Permanent,
        }
    }
}

/// Result type alias for promotion-engine operations.
pub type Result<T> = std::result::Result<T, PromoError>;
