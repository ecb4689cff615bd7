//! Metadata model for extracted module versions
//!
//! This module defines the data shapes flowing through the pipeline:
//! - Tool-derived Terraform metadata (inputs, outputs, providers, resources)
//! - Security scan findings and their "failures" view
//! - Version facts and the module-call graph
//! - The per-context accumulation (ContextMetadata) and the terminal
//!   ExtractionResult handed back to the caller

use crate::core::state_machine::StateTransition;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Explicit fail status in scanner output (0 = unsatisfied check)
pub const SECURITY_STATUS_FAILED: i64 = 0;

/// Identity of a module provider within the registry
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModuleKey {
    pub namespace: String,
    pub module: String,
    pub provider: String,
}

impl ModuleKey {
    pub fn new(namespace: &str, module: &str, provider: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            module: module.to_string(),
            provider: provider.to_string(),
        }
    }

    /// Storage directory for a version's distributable archives
    pub fn storage_directory(&self, version: &semver::Version) -> String {
        format!(
            "modules/{}/{}/{}/{}",
            self.namespace, self.module, self.provider, version
        )
    }
}

impl std::fmt::Display for ModuleKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.namespace, self.module, self.provider)
    }
}

/// Input variable reported by the documentation generator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerraformInput {
    pub name: String,
    #[serde(rename = "type", default)]
    pub variable_type: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub default: Option<serde_json::Value>,
    #[serde(default)]
    pub required: bool,
}

/// Output value reported by the documentation generator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerraformOutput {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Provider dependency reported by the documentation generator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerraformProviderDependency {
    pub name: String,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

/// Managed/data resource reported by the documentation generator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerraformResource {
    #[serde(rename = "type", default)]
    pub resource_type: String,
    pub name: String,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Structured documentation for one context directory
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleDocs {
    #[serde(default)]
    pub inputs: Vec<TerraformInput>,
    #[serde(default)]
    pub outputs: Vec<TerraformOutput>,
    #[serde(default)]
    pub providers: Vec<TerraformProviderDependency>,
    #[serde(default)]
    pub resources: Vec<TerraformResource>,
}

/// Source location of a security finding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FindingLocation {
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub start_line: u64,
    #[serde(default)]
    pub end_line: u64,
}

/// One security scanner finding, stored verbatim for display.
///
/// Fields the pipeline reasons about are typed; everything else the scanner
/// emits is preserved in `extra` so the stored document stays faithful.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityFinding {
    #[serde(default)]
    pub rule_id: String,
    #[serde(default)]
    pub rule_description: String,
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub resource: Option<String>,
    #[serde(default)]
    pub location: Option<FindingLocation>,
    #[serde(default)]
    pub status: i64,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl SecurityFinding {
    /// True when the finding represents an unsatisfied check
    pub fn is_failure(&self) -> bool {
        self.status == SECURITY_STATUS_FAILED
    }
}

/// Terraform core/provider versions selected for a context directory
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TerraformVersionFacts {
    #[serde(default)]
    pub terraform_version: String,
    #[serde(default)]
    pub platform: String,
    #[serde(default)]
    pub provider_selections: HashMap<String, String>,
    #[serde(default)]
    pub terraform_outdated: bool,
}

/// One module call discovered within a context directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleCall {
    #[serde(rename = "Key", default)]
    pub key: String,
    #[serde(rename = "Source", default)]
    pub source: String,
    #[serde(rename = "Dir", default)]
    pub dir: Option<String>,
    #[serde(rename = "Version", default)]
    pub version: Option<String>,
}

/// One entry of the merged variable template shown to module consumers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableTemplateEntry {
    pub name: String,
    #[serde(rename = "type", default = "default_variable_type")]
    pub variable_type: String,
    #[serde(default)]
    pub quote_value: bool,
    #[serde(default = "default_required")]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_help: Option<String>,
}

fn default_variable_type() -> String {
    "text".to_string()
}

fn default_required() -> bool {
    true
}

/// Which context directory the extractor is working on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ModuleContext {
    Root,
    Submodule { path: String },
    Example { path: String },
}

impl ModuleContext {
    /// Relative path under the module root, None for the root itself
    pub fn relative_path(&self) -> Option<&str> {
        match self {
            Self::Root => None,
            Self::Submodule { path } | Self::Example { path } => Some(path),
        }
    }

    /// Cost estimation only runs against example directories
    pub fn cost_estimation_enabled(&self) -> bool {
        matches!(self, Self::Example { .. })
    }

    pub fn kind_label(&self) -> &'static str {
        match self {
            Self::Root => "root",
            Self::Submodule { .. } => "submodule",
            Self::Example { .. } => "example",
        }
    }
}

impl std::fmt::Display for ModuleContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.relative_path() {
            Some(path) => write!(f, "{} {}", self.kind_label(), path),
            None => write!(f, "root"),
        }
    }
}

/// Everything extracted from one context directory
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextMetadata {
    pub docs: ModuleDocs,
    pub security_findings: Vec<SecurityFinding>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_estimate: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dependency_graph: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_facts: Option<TerraformVersionFacts>,
    pub module_calls: Vec<ModuleCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub readme_content: Option<Vec<u8>>,
}

impl ContextMetadata {
    /// Findings whose status marks an unsatisfied check, scanner order kept
    pub fn security_failures(&self) -> Vec<&SecurityFinding> {
        self.security_findings
            .iter()
            .filter(|f| f.is_failure())
            .collect()
    }
}

/// Metadata for one submodule or example, keyed by relative path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildContext {
    pub path: String,
    pub metadata: ContextMetadata,
}

/// Distributable archive format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveFormat {
    TarGz,
    Zip,
}

impl ArchiveFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TarGz => "tar.gz",
            Self::Zip => "zip",
        }
    }

    /// Canonical artifact file name within a version's storage directory
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::TarGz => "source.tar.gz",
            Self::Zip => "source.zip",
        }
    }

    /// Resolve the archive format from a declared upload filename
    pub fn from_filename(filename: &str) -> Option<Self> {
        let lower = filename.to_lowercase();
        if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if lower.ends_with(".zip") {
            Some(Self::Zip)
        } else {
            None
        }
    }
}

/// One stored distributable archive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveArtifact {
    pub format: ArchiveFormat,
    #[serde(rename = "storagePath")]
    pub storage_path: String,
    pub sha256: String,
    #[serde(rename = "sizeBytes")]
    pub size_bytes: u64,
}

/// Working state of a single extraction run.
///
/// Owned by exactly one publisher invocation; dropped (with its scratch
/// directories) when that invocation ends, success or failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleVersionDraft {
    pub description: Option<String>,
    pub owner: Option<String>,
    pub variable_template: Vec<VariableTemplateEntry>,
    pub repo_clone_url_template: Option<String>,
    pub repo_base_url_template: Option<String>,
    pub repo_browse_url_template: Option<String>,
    pub root: ContextMetadata,
    pub submodules: Vec<ChildContext>,
    pub examples: Vec<ChildContext>,
}

/// Terminal result of a successful publish run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub module: ModuleKey,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(rename = "variableTemplate")]
    pub variable_template: Vec<VariableTemplateEntry>,
    pub root: ContextMetadata,
    pub submodules: Vec<ChildContext>,
    pub examples: Vec<ChildContext>,
    pub artifacts: Vec<ArchiveArtifact>,
    #[serde(rename = "previousVersionPublished")]
    pub previous_version_published: bool,
    #[serde(rename = "runId")]
    pub run_id: String,
    #[serde(rename = "durationMs")]
    pub duration_ms: u64,
    #[serde(rename = "stateHistory")]
    pub state_history: Vec<StateTransition>,
}
