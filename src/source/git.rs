//! Git source acquisition
//!
//! Clones exactly one tag of a module repository into a scratch directory.
//! Host keys are trusted on first use (accept-new), not blindly accepted.

use crate::core::config::RepositoryConfig;
use crate::core::error::ExtractError;
use crate::core::metadata::ModuleKey;
use crate::security::SafeCommandExecutor;
use crate::source::templates::{render_tag, resolve_clone_url};
use aho_corasick::AhoCorasick;
use lazy_static::lazy_static;
use log::{debug, info};
use std::path::Path;
use std::time::Duration;

/// SSH options applied to every clone
const GIT_SSH_COMMAND: &str = "ssh -o StrictHostKeyChecking=accept-new";

lazy_static! {
    /// Marker git prints in front of its terminal diagnostics
    static ref FATAL_MARKER: AhoCorasick = AhoCorasick::new(["fatal:"]).unwrap();
}

/// Clones one tagged version of a module repository
pub struct GitAcquirer {
    executor: SafeCommandExecutor,
}

impl GitAcquirer {
    /// Create an acquirer whose clones run relative to `working_dir`
    pub fn new<P: AsRef<Path>>(working_dir: P, timeout: Duration) -> Result<Self, ExtractError> {
        let mut executor =
            SafeCommandExecutor::new(working_dir).map_err(|e| ExtractError::Filesystem {
                message: e.to_string(),
            })?;
        executor.set_timeout(timeout);

        Ok(Self { executor })
    }

    /// Clone the tag matching `version` into `dest`
    ///
    /// Single attempt; retrying on transient failures is the caller's call.
    /// On failure `dest` may contain a partial clone, removed with the rest
    /// of the scratch directory by the owning scope.
    pub async fn clone_version(
        &self,
        repository: &RepositoryConfig,
        key: &ModuleKey,
        version: &semver::Version,
        dest: &Path,
    ) -> Result<(), ExtractError> {
        let tag = render_tag(&repository.tag_format, version)?;
        let clone_url = resolve_clone_url(repository, key)?;

        info!("{}: クローン中 tag={} url={}", key, tag, clone_url);

        let dest_str = dest.to_string_lossy();
        let output = self
            .executor
            .execute_with_env(
                "git",
                &[
                    "clone",
                    "--single-branch",
                    "--branch",
                    &tag,
                    &clone_url,
                    &dest_str,
                ],
                &[("GIT_SSH_COMMAND", GIT_SSH_COMMAND)],
            )
            .await
            .map_err(|e| ExtractError::GitClone {
                message: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!("git clone stderr: {}", stderr);
            return Err(ExtractError::GitClone {
                message: classify_clone_failure(&stderr),
            });
        }

        Ok(())
    }
}

/// Pick the most useful diagnostic out of a failed clone's stderr
///
/// git writes its terminal diagnostic as a `fatal: ...` line; that line is
/// carried to the user verbatim. Anything else collapses to a generic
/// message, the raw stderr stays in the debug log only.
fn classify_clone_failure(stderr: &str) -> String {
    for line in stderr.lines() {
        if let Some(found) = FATAL_MARKER.find(line) {
            return line[found.start()..].trim().to_string();
        }
    }

    "gitが異常終了しました（詳細はログを確認してください）".to_string()
}
