//! The manifest model and validator (component B): declarative input,
//! invariants, the canonical writer, and the `Grow` operation.

pub mod diff;
pub mod grow;
pub mod schema;
pub mod thin;
pub mod validate;
pub mod writer;

pub use schema::{FatManifestFile, Manifest, ThinImagesFile, ThinRegistriesFile};

#[cfg(test)]
mod tests;
