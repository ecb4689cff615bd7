//! Local filesystem storage backend
//!
//! Stores uploaded artifacts under a base directory, mirroring the
//! registry-relative keys as subdirectories. Swap in an object-store
//! backed implementation by providing another [`FileStorage`] impl.

use crate::core::traits::FileStorage;
use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use std::path::{Path, PathBuf};

/// [`FileStorage`] over a plain directory tree
#[derive(Debug, Clone)]
pub struct LocalFileStorage {
    base_dir: PathBuf,
}

impl LocalFileStorage {
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    /// Absolute path for a registry-relative key
    ///
    /// `.` and `..` segments are rejected; every key must address a path
    /// under the base directory.
    fn resolve(&self, key: &str) -> Result<PathBuf> {
        let mut path = self.base_dir.clone();
        for part in key.split('/').filter(|p| !p.is_empty()) {
            if part == "." || part == ".." {
                anyhow::bail!("ストレージキーに相対パス要素は使えません: {}", key);
            }
            path.push(part);
        }
        Ok(path)
    }
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    async fn make_directory(&self, directory: &str) -> Result<()> {
        let path = self.resolve(directory)?;
        tokio::fs::create_dir_all(&path)
            .await
            .with_context(|| format!("ディレクトリを作成できません: {}", path.display()))?;
        debug!("storage directory ready: {}", path.display());
        Ok(())
    }

    async fn upload_file(&self, local_path: &Path, directory: &str, filename: &str) -> Result<()> {
        let destination = self.resolve(&format!("{}/{}", directory, filename))?;
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("ディレクトリを作成できません: {}", parent.display()))?;
        }

        tokio::fs::copy(local_path, &destination)
            .await
            .with_context(|| {
                format!(
                    "ファイルを保存できません: {} -> {}",
                    local_path.display(),
                    destination.display()
                )
            })?;
        debug!(
            "stored {} as {}",
            local_path.display(),
            destination.display()
        );
        Ok(())
    }
}
