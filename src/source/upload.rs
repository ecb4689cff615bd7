//! Uploaded archive acceptance
//!
//! The declared filename decides the media type before a single byte is
//! inspected; anything that does not resolve to a supported archive format
//! is rejected up front.

use crate::core::error::ExtractError;
use crate::core::metadata::ArchiveFormat;
use std::path::{Path, PathBuf};
use tokio::fs;

/// An uploaded module archive, held in memory until staged to scratch
#[derive(Debug, Clone)]
pub struct UploadedArchive {
    filename: String,
    data: Vec<u8>,
}

impl UploadedArchive {
    pub fn new(filename: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            data,
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Resolve the archive format from the declared filename
    pub fn format(&self) -> Result<ArchiveFormat, ExtractError> {
        ArchiveFormat::from_filename(&self.filename).ok_or_else(|| ExtractError::UnknownFiletype {
            filename: self.filename.clone(),
        })
    }

    /// Stage the payload into `dir` and return the written path
    ///
    /// Only the final path component of the declared filename is used, so a
    /// name like "../evil.zip" cannot place the file outside `dir`.
    pub async fn stage(&self, dir: &Path) -> Result<PathBuf, ExtractError> {
        // Validates the media type before any filesystem write
        let format = self.format()?;

        let basename = Path::new(&self.filename)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("upload.{}", format.as_str()));

        let staged_path = dir.join(basename);
        fs::write(&staged_path, &self.data)
            .await
            .map_err(|e| ExtractError::Filesystem {
                message: format!("{}: {}", staged_path.display(), e),
            })?;

        Ok(staged_path)
    }
}
