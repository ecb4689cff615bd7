//! Core traits and types for the extraction pipeline
//!
//! This module defines the seams between the publisher and its collaborators:
//! the external analysis toolchain, the archive storage backend, and the
//! catalog store that versions are committed to.

use crate::core::error::ExtractError;
use crate::core::metadata::{
    ArchiveArtifact, ModuleCall, ModuleDocs, ModuleKey, ModuleVersionDraft, SecurityFinding,
    TerraformVersionFacts,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

// ============================================================================
// Analysis Toolchain
// ============================================================================

/// Combined output of the terraform binary for one module directory
///
/// Produced by a single init/graph/version pass so the module call data can
/// be read before the working directory is cleaned back up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerraformAnalysis {
    /// DOT-format resource graph
    #[serde(rename = "dependencyGraph")]
    pub dependency_graph: String,

    /// Output of terraform version -json
    #[serde(rename = "versionFacts")]
    pub version_facts: TerraformVersionFacts,

    /// Module calls recorded by terraform init
    #[serde(rename = "moduleCalls")]
    pub module_calls: Vec<ModuleCall>,
}

/// Main trait for the external analysis toolchain
///
/// Implementations run the documentation generator, the security scanner,
/// the cost estimator and the terraform binary against a single module
/// directory. Each method owns its own fatality semantics; a non-fatal tool
/// failure is reported as a successful empty result, a fatal one as Err.
///
/// # Examples
///
/// ```no_run
/// # use module_publisher::core::{AnalysisToolchain, TerraformAnalysis};
/// # use module_publisher::core::error::ExtractError;
/// # use module_publisher::core::metadata::{ModuleDocs, SecurityFinding};
/// # use async_trait::async_trait;
/// # use std::path::Path;
/// # struct MyToolchain;
/// # #[async_trait]
/// # impl AnalysisToolchain for MyToolchain {
/// async fn generate_docs(&self, module_dir: &Path) -> Result<ModuleDocs, ExtractError> {
///     // Run the documentation generator and parse its JSON output
///     Ok(ModuleDocs::default())
/// }
/// #   async fn scan_security(&self, _: &Path) -> Result<Vec<SecurityFinding>, ExtractError> { unimplemented!() }
/// #   async fn estimate_cost(&self, _: &Path) -> Result<Option<serde_json::Value>, ExtractError> { unimplemented!() }
/// #   async fn analyze_terraform(&self, _: &Path) -> Result<TerraformAnalysis, ExtractError> { unimplemented!() }
/// # }
/// ```
#[async_trait]
pub trait AnalysisToolchain: Send + Sync {
    /// Generate input/output/provider/resource documentation
    ///
    /// A tool failure here is fatal for the whole run.
    async fn generate_docs(&self, module_dir: &Path) -> Result<ModuleDocs, ExtractError>;

    /// Run the security scanner
    ///
    /// A scanner that cannot be started yields an empty finding list;
    /// output that cannot be interpreted is fatal.
    async fn scan_security(&self, module_dir: &Path)
    -> Result<Vec<SecurityFinding>, ExtractError>;

    /// Estimate the monthly cost of the module
    ///
    /// Returns the estimator's breakdown verbatim, or None when estimation
    /// is skipped (no API key configured) or the estimator fails.
    async fn estimate_cost(&self, module_dir: &Path)
    -> Result<Option<serde_json::Value>, ExtractError>;

    /// Initialize the module and collect graph, version and module call data
    ///
    /// The working directory is left as it was found; files created for the
    /// analysis are removed again afterwards.
    async fn analyze_terraform(&self, module_dir: &Path)
    -> Result<TerraformAnalysis, ExtractError>;
}

// ============================================================================
// File Storage
// ============================================================================

/// Storage backend for generated source archives
///
/// Directory arguments are registry-relative keys using forward slashes
/// (e.g. "modules/hashi/network/aws/1.2.0"), never filesystem paths.
#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Create a directory key, including missing parents
    async fn make_directory(&self, directory: &str) -> anyhow::Result<()>;

    /// Upload a local file under the given directory key
    async fn upload_file(
        &self,
        source: &Path,
        directory: &str,
        filename: &str,
    ) -> anyhow::Result<()>;
}

// ============================================================================
// Catalog Store
// ============================================================================

/// Fully reconciled module version as committed to the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionRecord {
    /// Module identity
    pub module: ModuleKey,

    /// Semver version string
    pub version: String,

    /// Publish approval flag; always false on insert
    pub published: bool,

    /// Reconciled metadata for the root and all child contexts
    pub draft: ModuleVersionDraft,

    /// Generated source archives
    pub artifacts: Vec<ArchiveArtifact>,
}

/// Store the pipeline commits finished versions to
///
/// `replace_version` is the single transactional unit of the pipeline: the
/// existing version row and its children are deleted and the new record
/// inserted as one atomic operation. Callers serialize invocations per
/// module key; concurrent commits for different keys are allowed.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Replace any existing row for this module version with the record
    ///
    /// Returns whether a previous row existed and had been published.
    async fn replace_version(&self, record: &VersionRecord) -> anyhow::Result<bool>;
}
