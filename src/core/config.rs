//! Configuration structures and loading for module-publisher
//!
//! This module provides type-safe configuration management with serde support.
//! Settings come from three layers, lowest priority first: built-in defaults,
//! the project file (./.module-publisher.yaml), then environment variables.

use crate::core::error::ExtractError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tokio::fs;

/// Configuration file name
const CONFIG_FILENAME: &str = ".module-publisher.yaml";

/// Root configuration object
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtractorConfig {
    /// Manifest attributes that must be present and non-null before a
    /// version may be published (default: none)
    #[serde(default, rename = "requiredMetadataAttributes")]
    pub required_metadata_attributes: Vec<String>,

    /// Derive a description from the root README when the manifest does not
    /// provide one (default: true)
    #[serde(default = "default_true", rename = "autogenerateDescription")]
    pub autogenerate_description: bool,

    /// Maximum number of submodule/example extractions running concurrently
    /// (default: 3)
    #[serde(default = "default_worker_limit", rename = "workerLimit")]
    pub worker_limit: usize,

    /// Timeout in seconds for each external tool invocation (default: 300)
    #[serde(default = "default_tool_timeout_secs", rename = "toolTimeoutSecs")]
    pub tool_timeout_secs: u64,

    /// External tool executable names
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Source repository settings for git-based publishes (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository: Option<RepositoryConfig>,
}

/// External tool executable names
///
/// Overridable for pinned installations; each defaults to the plain command
/// name resolved via PATH.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolsConfig {
    /// terraform executable (default: "terraform")
    #[serde(default = "default_terraform")]
    pub terraform: String,

    /// terraform-docs executable (default: "terraform-docs")
    #[serde(default = "default_terraform_docs", rename = "terraformDocs")]
    pub terraform_docs: String,

    /// tfsec executable (default: "tfsec")
    #[serde(default = "default_tfsec")]
    pub tfsec: String,

    /// infracost executable (default: "infracost")
    #[serde(default = "default_infracost")]
    pub infracost: String,
}

/// Source repository configuration for one module provider
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RepositoryConfig {
    /// Clone URL template with {namespace}/{module}/{provider} placeholders.
    /// Takes priority over the git provider template when both are set.
    #[serde(skip_serializing_if = "Option::is_none", rename = "cloneUrlTemplate")]
    pub clone_url_template: Option<String>,

    /// Base URL template for display metadata (optional)
    #[serde(skip_serializing_if = "Option::is_none", rename = "baseUrlTemplate")]
    pub base_url_template: Option<String>,

    /// Browse URL template for display metadata (optional)
    #[serde(skip_serializing_if = "Option::is_none", rename = "browseUrlTemplate")]
    pub browse_url_template: Option<String>,

    /// Shared git provider supplying fallback URL templates (optional)
    #[serde(skip_serializing_if = "Option::is_none", rename = "gitProvider")]
    pub git_provider: Option<GitProviderConfig>,

    /// Git tag template; {version} is replaced with the semver string
    /// (default: "{version}")
    #[serde(default = "default_tag_format", rename = "tagFormat")]
    pub tag_format: String,

    /// Subdirectory of the repository holding the module root (optional)
    #[serde(skip_serializing_if = "Option::is_none", rename = "gitSubpath")]
    pub git_subpath: Option<String>,
}

/// Shared git provider configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GitProviderConfig {
    /// Provider display name (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Clone URL template with {namespace}/{module}/{provider} placeholders
    #[serde(rename = "cloneUrlTemplate")]
    pub clone_url_template: String,

    /// Base URL template (optional)
    #[serde(skip_serializing_if = "Option::is_none", rename = "baseUrlTemplate")]
    pub base_url_template: Option<String>,

    /// Browse URL template (optional)
    #[serde(skip_serializing_if = "Option::is_none", rename = "browseUrlTemplate")]
    pub browse_url_template: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_worker_limit() -> usize {
    3
}

fn default_tool_timeout_secs() -> u64 {
    300
}

fn default_terraform() -> String {
    "terraform".to_string()
}

fn default_terraform_docs() -> String {
    "terraform-docs".to_string()
}

fn default_tfsec() -> String {
    "tfsec".to_string()
}

fn default_infracost() -> String {
    "infracost".to_string()
}

fn default_tag_format() -> String {
    "{version}".to_string()
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            required_metadata_attributes: Vec::new(),
            autogenerate_description: true,
            worker_limit: default_worker_limit(),
            tool_timeout_secs: default_tool_timeout_secs(),
            tools: ToolsConfig::default(),
            repository: None,
        }
    }
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            clone_url_template: None,
            base_url_template: None,
            browse_url_template: None,
            git_provider: None,
            tag_format: default_tag_format(),
            git_subpath: None,
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            terraform: default_terraform(),
            terraform_docs: default_terraform_docs(),
            tfsec: default_tfsec(),
            infracost: default_infracost(),
        }
    }
}

/// Configuration validation result
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationResult {
    /// Is configuration valid?
    pub valid: bool,

    /// Validation errors
    pub errors: Vec<ConfigValidationError>,

    /// Validation warnings
    pub warnings: Vec<ConfigValidationWarning>,
}

/// Configuration validation error
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationError {
    /// Field path (e.g., "repository.tagFormat")
    pub field: String,

    /// Error message
    pub message: String,
}

/// Configuration validation warning
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationWarning {
    /// Field path
    pub field: String,

    /// Warning message
    pub message: String,
}

/// Configuration file loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with priority
    ///
    /// Priority (high to low):
    /// 1. Environment variables
    /// 2. Project config (./.module-publisher.yaml)
    /// 3. Default values
    pub async fn load(project_path: &Path) -> Result<ExtractorConfig, ExtractError> {
        let mut config = match Self::load_config_file(project_path).await? {
            Some(file_config) => file_config,
            None => ExtractorConfig::default(),
        };

        Self::apply_env(&mut config, &std::env::vars().collect());

        Ok(config)
    }

    /// Load configuration from the project YAML file, None when absent
    async fn load_config_file(project_path: &Path) -> Result<Option<ExtractorConfig>, ExtractError> {
        let config_path = project_path.join(CONFIG_FILENAME);

        if !config_path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&config_path)
            .await
            .map_err(|e| ExtractError::Config {
                message: format!("{}: {}", config_path.display(), e),
            })?;

        let config: ExtractorConfig =
            serde_yaml::from_str(&content).map_err(|e| ExtractError::Config {
                message: format!("{}: {}", config_path.display(), e),
            })?;

        Ok(Some(config))
    }

    /// Overlay environment variables onto a loaded configuration
    fn apply_env(config: &mut ExtractorConfig, env: &HashMap<String, String>) {
        if let Some(limit) = env
            .get("MODULE_PUBLISHER_WORKER_LIMIT")
            .and_then(|v| v.parse::<usize>().ok())
        {
            config.worker_limit = limit;
        }

        if let Some(timeout) = env
            .get("MODULE_PUBLISHER_TOOL_TIMEOUT_SECS")
            .and_then(|v| v.parse::<u64>().ok())
        {
            config.tool_timeout_secs = timeout;
        }
    }

    /// Validate configuration
    pub fn validate(config: &ExtractorConfig) -> ConfigValidationResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if config.worker_limit == 0 {
            errors.push(ConfigValidationError {
                field: "workerLimit".to_string(),
                message: "workerLimit must be at least 1".to_string(),
            });
        }

        if config.tool_timeout_secs == 0 {
            errors.push(ConfigValidationError {
                field: "toolTimeoutSecs".to_string(),
                message: "toolTimeoutSecs must be at least 1".to_string(),
            });
        }

        for (field, executable) in [
            ("tools.terraform", &config.tools.terraform),
            ("tools.terraformDocs", &config.tools.terraform_docs),
            ("tools.tfsec", &config.tools.tfsec),
            ("tools.infracost", &config.tools.infracost),
        ] {
            if executable.is_empty() {
                errors.push(ConfigValidationError {
                    field: field.to_string(),
                    message: "executable name must not be empty".to_string(),
                });
            }
        }

        if let Some(repository) = &config.repository {
            if !repository.tag_format.contains("{version}") {
                errors.push(ConfigValidationError {
                    field: "repository.tagFormat".to_string(),
                    message: format!(
                        "tag format \"{}\" does not contain the {{version}} placeholder",
                        repository.tag_format
                    ),
                });
            }

            if repository.clone_url_template.is_none() && repository.git_provider.is_none() {
                warnings.push(ConfigValidationWarning {
                    field: "repository".to_string(),
                    message: "neither cloneUrlTemplate nor gitProvider is set; \
                              git-based publishes will be rejected"
                        .to_string(),
                });
            }
        }

        ConfigValidationResult {
            valid: errors.is_empty(),
            errors,
            warnings,
        }
    }

    /// Format validation result as human-readable string
    pub fn format_validation_result(result: &ConfigValidationResult) -> String {
        let mut lines = Vec::new();

        if result.valid {
            lines.push("✅ Configuration validation succeeded".to_string());
        } else {
            lines.push("❌ Configuration has errors".to_string());
        }

        if !result.errors.is_empty() {
            lines.push("\n🔴 Errors:".to_string());
            for error in &result.errors {
                lines.push(format!("  - [{}] {}", error.field, error.message));
            }
        }

        if !result.warnings.is_empty() {
            lines.push("\n🟡 Warnings:".to_string());
            for warning in &result.warnings {
                lines.push(format!("  - [{}] {}", warning.field, warning.message));
            }
        }

        lines.join("\n")
    }
}
