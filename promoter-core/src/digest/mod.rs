//! Content digest validation, wrapping `oci_spec::image::Digest`.
//!
//! A `Digest` additionally tracks which algorithm produced it and exposes the
//! raw hex so callers (the inventory reader, blob verification) can work with
//! it without re-parsing the string form.

use crate::error::{PromoError, Result};
use oci_spec::image::Digest as OciDigest;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

#[cfg(test)]
mod tests;

/// Hex-length table for digest algorithms the validator accepts.
///
/// `sha256` is registered by default (64 hex chars); callers that need to
/// accept another algorithm (e.g. `sha512`) can register it once at startup.
fn algorithm_table() -> &'static std::sync::Mutex<HashMap<String, usize>> {
    static TABLE: OnceLock<std::sync::Mutex<HashMap<String, usize>>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut map = HashMap::new();
        map.insert("sha256".to_string(), 64);
        std::sync::Mutex::new(map)
    })
}

/// Registers an additional digest algorithm and its expected hex length.
pub fn register_algorithm(name: impl Into<String>, hex_len: usize) {
    algorithm_table()
        .lock()
        .expect("algorithm table poisoned")
        .insert(name.into(), hex_len);
}

/// A validated, content-addressed image digest (`sha256:<64 hex>` by default).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Digest {
    algorithm: String,
    hex: String,
}

impl Digest {
    /// Returns the algorithm portion (e.g. `"sha256"`).
    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    /// Returns the hex-encoded hash portion.
    pub fn hex(&self) -> &str {
        &self.hex
    }
}

impl FromStr for Digest {
    type Err = PromoError;

    fn from_str(s: &str) -> Result<Self> {
        // Validate against oci-spec first so we inherit its syntax rules,
        // then re-check against the registered algorithm table for the
        // stricter length requirement the design calls for.
        let oci_digest = OciDigest::from_str(s)
            .map_err(|e| PromoError::validation(format!("invalid digest '{}': {}", s, e)))?;

        let (algorithm, hex) = s
            .split_once(':')
            .ok_or_else(|| PromoError::validation(format!("digest '{}' missing algorithm", s)))?;

        let table = algorithm_table().lock().expect("algorithm table poisoned");
        match table.get(algorithm) {
            Some(&expected_len) => {
                if hex.len() != expected_len || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
                    return Err(PromoError::validation(format!(
                        "digest '{}' has malformed hex for algorithm '{}'",
                        s, algorithm
                    )));
                }
            }
            None => {
                return Err(PromoError::validation(format!(
                    "digest '{}' uses unregistered algorithm '{}'",
                    s, algorithm
                )));
            }
        }
        let _ = oci_digest;

        Ok(Digest {
            algorithm: algorithm.to_string(),
            hex: hex.to_string(),
        })
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.hex)
    }
}

impl serde::Serialize for Digest {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for Digest {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Digest::from_str(&s).map_err(serde::de::Error::custom)
    }
}
