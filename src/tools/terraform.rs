//! Terraform CLI integration
//!
//! Runs a scoped `terraform init` with the backend forced to local (so no
//! remote state store or credential is ever contacted), then captures the
//! dependency graph, the resolved core/provider versions, and the
//! module-call manifest the init leaves behind. Working files created for
//! the analysis are removed again afterwards so the archived tree contains
//! only module source.

use crate::core::error::ExtractError;
use crate::core::metadata::{ModuleCall, TerraformVersionFacts};
use crate::core::traits::TerraformAnalysis;
use crate::security::SafeCommandExecutor;
use log::{debug, warn};
use serde::Deserialize;
use std::path::Path;

/// Override file forcing a local backend during the scoped init
const BACKEND_OVERRIDE_FILENAME: &str = "backend_override.tf.json";

/// Provider/module cache directory created by `terraform init`
const DOT_TERRAFORM_DIR: &str = ".terraform";

/// Dependency lock file created by `terraform init`
const LOCK_FILENAME: &str = ".terraform.lock.hcl";

/// Module-call manifest written by `terraform init`
const MODULES_MANIFEST_PATH: &str = ".terraform/modules/modules.json";

/// Which working files existed before the analysis touched the directory
#[derive(Debug)]
struct WorkingFiles {
    override_existed: bool,
    dot_terraform_existed: bool,
    lock_existed: bool,
}

impl WorkingFiles {
    fn record(dir: &Path) -> Self {
        Self {
            override_existed: dir.join(BACKEND_OVERRIDE_FILENAME).exists(),
            dot_terraform_existed: dir.join(DOT_TERRAFORM_DIR).exists(),
            lock_existed: dir.join(LOCK_FILENAME).exists(),
        }
    }

    /// Remove everything the analysis created; pre-existing files stay
    fn cleanup(&self, dir: &Path) {
        if !self.override_existed
            && dir.join(BACKEND_OVERRIDE_FILENAME).exists()
            && let Err(e) = std::fs::remove_file(dir.join(BACKEND_OVERRIDE_FILENAME))
        {
            warn!("バックエンド上書きファイルを削除できません: {}", e);
        }
        if !self.dot_terraform_existed
            && dir.join(DOT_TERRAFORM_DIR).exists()
            && let Err(e) = std::fs::remove_dir_all(dir.join(DOT_TERRAFORM_DIR))
        {
            warn!(".terraform ディレクトリを削除できません: {}", e);
        }
        if !self.lock_existed
            && dir.join(LOCK_FILENAME).exists()
            && let Err(e) = std::fs::remove_file(dir.join(LOCK_FILENAME))
        {
            warn!("ロックファイルを削除できません: {}", e);
        }
    }
}

/// Manifest shape of `.terraform/modules/modules.json`
#[derive(Debug, Deserialize)]
struct ModulesManifest {
    #[serde(rename = "Modules", default)]
    modules: Vec<ModuleCall>,
}

/// Run init, graph, version resolution and module-call discovery in one pass
///
/// The directory is left as it was found: any override file, `.terraform`
/// directory or lock file created here is removed before returning.
pub async fn analyze(
    executor: &SafeCommandExecutor,
    executable: &str,
    dir: &Path,
) -> Result<TerraformAnalysis, ExtractError> {
    let working_files = WorkingFiles::record(dir);
    let result = run_analysis(executor, executable, dir, &working_files).await;
    working_files.cleanup(dir);
    result
}

async fn run_analysis(
    executor: &SafeCommandExecutor,
    executable: &str,
    dir: &Path,
    working_files: &WorkingFiles,
) -> Result<TerraformAnalysis, ExtractError> {
    if !working_files.override_existed {
        std::fs::write(dir.join(BACKEND_OVERRIDE_FILENAME), backend_override_content())
            .map_err(|e| ExtractError::Filesystem {
                message: format!("バックエンド上書きファイルを書き込めません: {}", e),
            })?;
    }

    run_step(executor, executable, &["init", "-input=false", "-no-color"], "init").await?;

    let graph_output =
        run_step(executor, executable, &["graph", "-no-color"], "graph").await?;
    let dependency_graph = String::from_utf8_lossy(&graph_output.stdout).into_owned();

    let version_output =
        run_step(executor, executable, &["version", "-json"], "version").await?;
    let version_facts: TerraformVersionFacts = serde_json::from_slice(&version_output.stdout)
        .map_err(|e| ExtractError::UnableToProcessTerraform {
            message: format!("terraform version の出力を解析できません: {}", e),
        })?;

    // Must be read before cleanup removes .terraform
    let module_calls = read_module_calls(dir)?;

    Ok(TerraformAnalysis {
        dependency_graph,
        version_facts,
        module_calls,
    })
}

async fn run_step(
    executor: &SafeCommandExecutor,
    executable: &str,
    args: &[&str],
    step: &str,
) -> Result<std::process::Output, ExtractError> {
    let output = executor.execute(executable, args).await.map_err(|e| {
        ExtractError::UnableToProcessTerraform {
            message: format!("terraform {} を実行できません: {}", step, e),
        }
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        debug!("terraform {} stderr: {}", step, stderr.trim());
        return Err(ExtractError::UnableToProcessTerraform {
            message: format!("terraform {} が失敗しました: {}", step, stderr.trim()),
        });
    }

    Ok(output)
}

/// Read module calls from the manifest the init left behind
///
/// A missing manifest after a successful init means the module makes no
/// calls; only the root entry (empty key) is filtered out.
fn read_module_calls(dir: &Path) -> Result<Vec<ModuleCall>, ExtractError> {
    let manifest_path = dir.join(MODULES_MANIFEST_PATH);
    if !manifest_path.exists() {
        return Ok(Vec::new());
    }

    let raw = std::fs::read(&manifest_path).map_err(|e| ExtractError::Filesystem {
        message: format!("{}: {}", manifest_path.display(), e),
    })?;
    parse_modules_manifest(&raw)
}

fn parse_modules_manifest(raw: &[u8]) -> Result<Vec<ModuleCall>, ExtractError> {
    let manifest: ModulesManifest =
        serde_json::from_slice(raw).map_err(|e| ExtractError::UnableToProcessTerraform {
            message: format!("モジュールマニフェストを解析できません: {}", e),
        })?;
    Ok(manifest
        .modules
        .into_iter()
        .filter(|call| !call.key.is_empty())
        .collect())
}

fn backend_override_content() -> String {
    serde_json::json!({
        "terraform": {
            "backend": {
                "local": {}
            }
        }
    })
    .to_string()
}
