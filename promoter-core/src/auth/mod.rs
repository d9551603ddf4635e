//! Authentication handling for OCI registries: anonymous, Basic, and
//! Bearer-token credentials, plus `WWW-Authenticate` challenge parsing.

use crate::error::{PromoError, Result};

#[cfg(test)]
mod tests;

/// Credentials for registry authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    /// No authentication required.
    Anonymous,
    /// HTTP Basic authentication.
    Basic { username: String, password: String },
    /// Bearer token authentication.
    Bearer { token: String },
}

impl Credentials {
    pub fn anonymous() -> Self {
        Self::Anonymous
    }

    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn bearer(token: impl Into<String>) -> Self {
        Self::Bearer {
            token: token.into(),
        }
    }

    /// Returns the `Authorization` header value for these credentials, or
    /// `None` for anonymous access.
    pub fn to_header_value(&self) -> Option<String> {
        match self {
            Self::Anonymous => None,
            Self::Basic { username, password } => {
                use base64::{Engine as _, engine::general_purpose};
                let credentials = format!("{}:{}", username, password);
                let encoded = general_purpose::STANDARD.encode(credentials);
                Some(format!("Basic {}", encoded))
            }
            Self::Bearer { token } => Some(format!("Bearer {}", token)),
        }
    }
}

/// Resolves credentials for a registry context. Credential *activation*
/// (talking to a secret manager, a service-account key file, an OS keyring)
/// is explicitly out of scope — this trait is the seam an external
/// collaborator implements; the engine only ever calls through it.
pub trait CredentialProvider: Send + Sync {
    fn resolve(&self, ctx: &crate::model::RegistryContext) -> Result<Credentials>;
}

/// A `CredentialProvider` that always returns anonymous credentials,
/// ignoring any `service_account_hint`. The correct default when no
/// external collaborator is wired in: public registries still work, and
/// an anonymous request against a gated one surfaces as an ordinary 401
/// rather than a silent misconfiguration.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnonymousCredentialProvider;

impl CredentialProvider for AnonymousCredentialProvider {
    fn resolve(&self, _ctx: &crate::model::RegistryContext) -> Result<Credentials> {
        Ok(Credentials::Anonymous)
    }
}

/// Information parsed from a `WWW-Authenticate` header, used to negotiate a
/// bearer token against the realm's token endpoint when a registry responds
/// 401 to an anonymous request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthChallenge {
    pub scheme: String,
    pub realm: String,
    pub service: Option<String>,
    pub scope: Option<String>,
}

impl AuthChallenge {
    /// Parses a `WWW-Authenticate` header value, e.g.:
    /// `Bearer realm="https://auth.example.com/token",service="registry.example.com",scope="repository:alpine:pull"`
    pub fn parse(header: &str) -> Result<Self> {
        let header = header.trim();

        let (scheme, params) = header
            .split_once(' ')
            .ok_or_else(|| PromoError::validation("invalid WWW-Authenticate header format"))?;

        let mut realm = None;
        let mut service = None;
        let mut scope = None;

        for param in params.split(',') {
            let param = param.trim();
            if let Some((key, value)) = param.split_once('=') {
                let key = key.trim();
                let value = value.trim().trim_matches('"');
                match key {
                    "realm" => realm = Some(value.to_string()),
                    "service" => service = Some(value.to_string()),
                    "scope" => scope = Some(value.to_string()),
                    _ => {}
                }
            }
        }

        let realm = realm.ok_or_else(|| {
            PromoError::validation("WWW-Authenticate header missing required 'realm' parameter")
        })?;

        Ok(Self {
            scheme: scheme.to_string(),
            realm,
            service,
            scope,
        })
    }
}
