//! Manifest file handling
//!
//! The manifest is an optional JSON file in the context-adjusted module
//! root that overrides auto-derived metadata. It is registry metadata, not
//! module source: once parsed it is deleted from the working tree so it
//! never lands in the distributable archives.
//!
//! The required-attribute policy is evaluated against the keys explicitly
//! present with non-null values, so `{"owner": null}` does not satisfy a
//! required `owner`.

use crate::core::error::ExtractError;
use crate::core::metadata::VariableTemplateEntry;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Recognized manifest filenames, in precedence order
pub const MANIFEST_FILENAMES: &[&str] = &["module-publisher.json", ".module-publisher.json"];

/// User-declared metadata overrides, read-only once parsed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManifestMetadata {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub variable_template: Vec<VariableTemplateEntry>,
    #[serde(default)]
    pub repo_clone_url_template: Option<String>,
    #[serde(default)]
    pub repo_base_url_template: Option<String>,
    #[serde(default)]
    pub repo_browse_url_template: Option<String>,
}

/// A manifest lookup result, found or not
#[derive(Debug, Clone)]
pub struct LoadedManifest {
    pub metadata: ManifestMetadata,
    path: Option<PathBuf>,
    present_keys: HashSet<String>,
}

impl LoadedManifest {
    /// The no-manifest case: empty metadata, nothing to delete
    pub fn absent() -> Self {
        Self {
            metadata: ManifestMetadata::default(),
            path: None,
            present_keys: HashSet::new(),
        }
    }

    pub fn was_found(&self) -> bool {
        self.path.is_some()
    }

    /// Enforce the required-attribute policy
    ///
    /// Runs before any storage write or catalog commit; an absent manifest
    /// fails the first required attribute.
    pub fn check_required_attributes(&self, required: &[String]) -> Result<(), ExtractError> {
        for attribute in required {
            if !self.present_keys.contains(attribute) {
                return Err(ExtractError::MetadataDoesNotContainRequiredAttribute {
                    attribute: attribute.clone(),
                });
            }
        }
        Ok(())
    }

    /// Delete the manifest file from the working tree
    pub fn remove_file(&self) -> Result<(), ExtractError> {
        if let Some(path) = &self.path {
            std::fs::remove_file(path).map_err(|e| ExtractError::Filesystem {
                message: format!("{}: {}", path.display(), e),
            })?;
            debug!("removed manifest {}", path.display());
        }
        Ok(())
    }
}

/// Look for a manifest in the context-adjusted root and parse it
///
/// Absence is valid; the first recognized filename wins.
pub fn load(context_root: &Path) -> Result<LoadedManifest, ExtractError> {
    for filename in MANIFEST_FILENAMES {
        let path = context_root.join(filename);
        if path.is_file() {
            info!("メタデータファイルを読み込みます: {}", path.display());
            let raw = std::fs::read(&path).map_err(|e| ExtractError::Filesystem {
                message: format!("{}: {}", path.display(), e),
            })?;
            return parse(&raw, path);
        }
    }
    Ok(LoadedManifest::absent())
}

fn parse(raw: &[u8], path: PathBuf) -> Result<LoadedManifest, ExtractError> {
    let value: serde_json::Value =
        serde_json::from_slice(raw).map_err(|e| ExtractError::InvalidMetadataFile {
            message: e.to_string(),
        })?;

    let object = value
        .as_object()
        .ok_or_else(|| ExtractError::InvalidMetadataFile {
            message: "JSONオブジェクトではありません".to_string(),
        })?;

    let present_keys = object
        .iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, _)| k.clone())
        .collect();

    let metadata: ManifestMetadata =
        serde_json::from_value(value.clone()).map_err(|e| ExtractError::InvalidMetadataFile {
            message: e.to_string(),
        })?;

    Ok(LoadedManifest {
        metadata,
        path: Some(path),
        present_keys,
    })
}
