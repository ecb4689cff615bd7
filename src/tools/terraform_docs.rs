//! Documentation generator integration
//!
//! Runs terraform-docs against a context directory and parses its JSON
//! output into the structured docs model. This tool is load-bearing: a
//! run that fails or produces unparseable output makes the module version
//! unpublishable.

use crate::core::error::ExtractError;
use crate::core::metadata::ModuleDocs;
use crate::security::SafeCommandExecutor;
use log::debug;

/// Generate structured documentation for the executor's working directory
pub async fn generate_docs(
    executor: &SafeCommandExecutor,
    executable: &str,
) -> Result<ModuleDocs, ExtractError> {
    let output = executor
        .execute(executable, &["json", "--show", "all", "."])
        .await
        .map_err(|e| ExtractError::UnableToProcessTerraform {
            message: format!("ドキュメント生成ツールを実行できません: {}", e),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        debug!("terraform-docs stderr: {}", stderr.trim());
        return Err(ExtractError::UnableToProcessTerraform {
            message: format!(
                "ドキュメント生成ツールが異常終了しました（exit={}）: {}",
                output
                    .status
                    .code()
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "signal".to_string()),
                stderr.trim()
            ),
        });
    }

    parse_docs_output(&output.stdout)
}

/// Parse generator JSON output into the docs model
fn parse_docs_output(raw: &[u8]) -> Result<ModuleDocs, ExtractError> {
    serde_json::from_slice(raw).map_err(|e| ExtractError::UnableToProcessTerraform {
        message: format!("ドキュメント生成ツールの出力を解析できません: {}", e),
    })
}
