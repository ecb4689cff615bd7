//! Security scanner integration
//!
//! Runs tfsec against a context directory. Findings are stored verbatim for
//! display; the scanner failing to start is tolerated (empty finding list),
//! but output that cannot be interpreted after a successful run is fatal.

use crate::core::error::ExtractError;
use crate::core::metadata::SecurityFinding;
use crate::security::SafeCommandExecutor;
use log::warn;
use serde::Deserialize;

/// Scanner top-level output. `results` is null, not `[]`, for a clean scan.
#[derive(Debug, Deserialize)]
struct ScanOutput {
    #[serde(default)]
    results: Option<Vec<SecurityFinding>>,
}

/// Scan the executor's working directory for security findings
pub async fn scan(
    executor: &SafeCommandExecutor,
    executable: &str,
) -> Result<Vec<SecurityFinding>, ExtractError> {
    let output = match executor
        .execute(
            executable,
            &[".", "--format", "json", "--soft-fail", "--include-passed"],
        )
        .await
    {
        Ok(output) => output,
        Err(e) => {
            warn!("セキュリティスキャナーを起動できません（スキップします）: {}", e);
            return Ok(Vec::new());
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        warn!(
            "セキュリティスキャナーが異常終了しました（スキップします）: {}",
            stderr.trim()
        );
        return Ok(Vec::new());
    }

    parse_scan_output(&output.stdout)
}

/// Parse scanner JSON output into the findings list
fn parse_scan_output(raw: &[u8]) -> Result<Vec<SecurityFinding>, ExtractError> {
    let parsed: ScanOutput =
        serde_json::from_slice(raw).map_err(|e| ExtractError::InvalidSecurityScanResult {
            message: e.to_string(),
        })?;
    Ok(parsed.results.unwrap_or_default())
}
