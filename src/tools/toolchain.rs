//! CLI-backed analysis toolchain
//!
//! Binds the four external tools to the [`AnalysisToolchain`] seam. Every
//! invocation goes through the whitelist-validated executor with the
//! configured timeout; the working directory is the context directory
//! under analysis.

use crate::core::config::{ExtractorConfig, ToolsConfig};
use crate::core::error::ExtractError;
use crate::core::metadata::{ModuleDocs, SecurityFinding};
use crate::core::traits::{AnalysisToolchain, TerraformAnalysis};
use crate::security::{CostCredentials, SafeCommandExecutor};
use crate::tools::{infracost, terraform, terraform_docs, tfsec};
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

/// [`AnalysisToolchain`] implementation over the real external binaries
pub struct CliToolchain {
    tools: ToolsConfig,
    timeout: Duration,
    credentials: CostCredentials,
}

impl CliToolchain {
    pub fn new(tools: ToolsConfig, timeout: Duration, credentials: CostCredentials) -> Self {
        Self {
            tools,
            timeout,
            credentials,
        }
    }

    /// Build from loaded configuration plus separately sourced credentials
    pub fn from_config(config: &ExtractorConfig, credentials: CostCredentials) -> Self {
        Self::new(
            config.tools.clone(),
            Duration::from_secs(config.tool_timeout_secs),
            credentials,
        )
    }

    /// Executor rooted at the context directory under analysis
    fn executor_for(&self, module_dir: &Path) -> Result<SafeCommandExecutor, ExtractError> {
        let mut executor =
            SafeCommandExecutor::new(module_dir).map_err(|e| ExtractError::Filesystem {
                message: e.to_string(),
            })?;
        executor.set_timeout(self.timeout);
        Ok(executor)
    }
}

#[async_trait]
impl AnalysisToolchain for CliToolchain {
    async fn generate_docs(&self, module_dir: &Path) -> Result<ModuleDocs, ExtractError> {
        let executor = self.executor_for(module_dir)?;
        terraform_docs::generate_docs(&executor, &self.tools.terraform_docs).await
    }

    async fn scan_security(
        &self,
        module_dir: &Path,
    ) -> Result<Vec<SecurityFinding>, ExtractError> {
        let executor = self.executor_for(module_dir)?;
        tfsec::scan(&executor, &self.tools.tfsec).await
    }

    async fn estimate_cost(
        &self,
        module_dir: &Path,
    ) -> Result<Option<serde_json::Value>, ExtractError> {
        let executor = self.executor_for(module_dir)?;
        infracost::estimate(&executor, &self.tools.infracost, &self.credentials).await
    }

    async fn analyze_terraform(
        &self,
        module_dir: &Path,
    ) -> Result<TerraformAnalysis, ExtractError> {
        let executor = self.executor_for(module_dir)?;
        terraform::analyze(&executor, &self.tools.terraform, module_dir).await
    }
}
