//! Cost estimator integration
//!
//! Runs infracost against example directories when an API key is
//! configured. Cost data is supplementary: a missing key skips the tool
//! silently, and any process or output failure degrades to "no estimate"
//! instead of failing the extraction.

use crate::core::error::ExtractError;
use crate::security::{CostCredentials, SafeCommandExecutor, credentials::COST_API_KEY_VAR};
use log::{debug, warn};

/// Estimate costs for the executor's working directory
///
/// Returns the estimator's JSON breakdown verbatim, or None when the tool
/// was skipped or failed.
pub async fn estimate(
    executor: &SafeCommandExecutor,
    executable: &str,
    credentials: &CostCredentials,
) -> Result<Option<serde_json::Value>, ExtractError> {
    let Some(api_key) = credentials.expose_api_key() else {
        debug!("コスト見積もりAPIキーが未設定のためスキップします");
        return Ok(None);
    };

    let output = match executor
        .execute_with_env(
            executable,
            &["breakdown", "--path", ".", "--format", "json"],
            &[(COST_API_KEY_VAR, api_key)],
        )
        .await
    {
        Ok(output) => output,
        Err(e) => {
            warn!("コスト見積もりツールを起動できません（スキップします）: {}", e);
            return Ok(None);
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        warn!(
            "コスト見積もりツールが異常終了しました（スキップします）: {}",
            stderr.trim()
        );
        return Ok(None);
    }

    Ok(parse_estimate(&output.stdout))
}

/// Parse estimator output, degrading to None on anything unparseable
fn parse_estimate(raw: &[u8]) -> Option<serde_json::Value> {
    match serde_json::from_slice(raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("コスト見積もり結果を解析できません（破棄します）: {}", e);
            None
        }
    }
}
