//! Metadata reconciliation: manifest, variable template, readme

pub mod manifest;
pub mod readme;
pub mod variables;

pub use manifest::{LoadedManifest, MANIFEST_FILENAMES, ManifestMetadata};
pub use variables::merge_variable_template;
