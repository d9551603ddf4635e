//! Core value types: `Registry`, `ImageName`, `Tag`, and the `DMap` container.
//!
//! These are the leaves every other module builds on (component A in the
//! design). Each wraps a `String` with validation at the construction
//! boundary so downstream code never has to re-check tag/name syntax.

pub use crate::digest::Digest;
use crate::error::{PromoError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Implements validating `Serialize`/`Deserialize` for a newtype wrapping
/// `String`, routing deserialization through the type's `FromStr` (and
/// therefore its constructor's validation) instead of a bare transparent
/// pass-through. `Digest` has its own hand-written impl with extra fields;
/// this macro covers the three plain string newtypes below.
macro_rules! validating_string_newtype {
    ($ty:ident) => {
        impl Serialize for $ty {
            fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_str(&self.0)
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                $ty::new(s).map_err(serde::de::Error::custom)
            }
        }
    };
}

#[cfg(test)]
mod tests;

/// The reserved tag that may never appear in a manifest or be promoted.
pub const RESERVED_LATEST: &str = "latest";

/// A registry host plus optional path prefix, e.g. `us.example/prod`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Registry(String);

impl Registry {
    pub fn new(s: impl Into<String>) -> Result<Self> {
        let s = s.into();
        if s.trim().is_empty() {
            return Err(PromoError::validation("registry name cannot be empty"));
        }
        if s.chars().any(char::is_whitespace) {
            return Err(PromoError::validation(format!(
                "registry name '{}' contains whitespace",
                s
            )));
        }
        Ok(Registry(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Registry {
    type Err = PromoError;
    fn from_str(s: &str) -> Result<Self> {
        Registry::new(s)
    }
}

validating_string_newtype!(Registry);

/// The repository path of an image, relative to a registry, e.g. `kube-apiserver`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ImageName(String);

impl ImageName {
    pub fn new(s: impl Into<String>) -> Result<Self> {
        let s = s.into();
        if s.trim().is_empty() {
            return Err(PromoError::validation("image name cannot be empty"));
        }
        if s.chars().any(char::is_whitespace) {
            return Err(PromoError::validation(format!(
                "image name '{}' contains whitespace",
                s
            )));
        }
        Ok(ImageName(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ImageName {
    type Err = PromoError;
    fn from_str(s: &str) -> Result<Self> {
        ImageName::new(s)
    }
}

validating_string_newtype!(ImageName);

/// A free-form registry tag. The literal `latest` is always rejected.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tag(String);

impl Tag {
    pub fn new(s: impl Into<String>) -> Result<Self> {
        let s = s.into();
        if s.is_empty() {
            return Err(PromoError::validation("tag cannot be empty"));
        }
        if s.chars().any(char::is_whitespace) {
            return Err(PromoError::validation(format!(
                "tag '{}' contains whitespace",
                s
            )));
        }
        if s == RESERVED_LATEST {
            return Err(PromoError::validation(
                "the tag 'latest' is reserved and may never be promoted",
            ));
        }
        Ok(Tag(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Tag {
    type Err = PromoError;
    fn from_str(s: &str) -> Result<Self> {
        Tag::new(s)
    }
}

validating_string_newtype!(Tag);

/// A digest-to-tags map for one image: digests are unique keys, tags are sets
/// (duplicates collapse), and — enforced by callers, not representable by the
/// type alone — a given tag appears under at most one digest at a time.
pub type DMap = BTreeMap<Digest, BTreeSet<Tag>>;

/// Looks up which digest (if any) currently owns a tag within a `DMap`.
///
/// `DMap` doesn't index by tag, so this is a linear scan; call sites in the
/// planner and validator do this at most once per (image, tag) pair, which
/// keeps it well within budget for realistic manifest sizes.
pub fn digest_for_tag<'a>(dmap: &'a DMap, tag: &Tag) -> Option<&'a Digest> {
    dmap.iter()
        .find(|(_, tags)| tags.contains(tag))
        .map(|(digest, _)| digest)
}

/// One image's declared desired state: a name plus its digest-to-tags map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageEntry {
    pub name: ImageName,
    pub dmap: DMap,
}

/// A registry a manifest talks about: its identity, an opaque credential
/// hint resolved by an external collaborator, and whether it is the source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryContext {
    pub name: Registry,
    #[serde(rename = "service-account", default, skip_serializing_if = "Option::is_none")]
    pub service_account_hint: Option<String>,
    #[serde(rename = "src", default)]
    pub is_source: bool,
}
