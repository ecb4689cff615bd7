//! Safe archive unpacking with path traversal protection
//!
//! Every entry's destination is resolved and validated before a single byte
//! is written; an entry that would land outside the destination root fails
//! the whole unpack ("zip-slip" defense). Entry permissions are not trusted:
//! files are written with default modes, symlink and hardlink entries are
//! skipped.

use crate::core::error::ExtractError;
use crate::core::metadata::ArchiveFormat;
use flate2::read::GzDecoder;
use log::warn;
use std::fs::File;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Unpacks uploaded module archives into a scratch directory
pub struct SafeUnpacker;

impl SafeUnpacker {
    /// Unpack `archive_path` into `dest_root`
    ///
    /// `dest_root` must already exist. Validation is per-entry, immediately
    /// before each write; on failure, entries already validated may have
    /// been written under `dest_root`, never outside it.
    pub fn unpack(
        archive_path: &Path,
        format: ArchiveFormat,
        dest_root: &Path,
    ) -> Result<(), ExtractError> {
        match format {
            ArchiveFormat::TarGz => Self::unpack_tar_gz(archive_path, dest_root),
            ArchiveFormat::Zip => Self::unpack_zip(archive_path, dest_root),
        }
    }

    fn unpack_tar_gz(archive_path: &Path, dest_root: &Path) -> Result<(), ExtractError> {
        let file = File::open(archive_path).map_err(|e| ExtractError::Filesystem {
            message: format!("{}: {}", archive_path.display(), e),
        })?;
        let mut archive = tar::Archive::new(GzDecoder::new(file));

        let entries = archive.entries().map_err(unreadable)?;
        for entry_result in entries {
            let mut entry = entry_result.map_err(unreadable)?;
            let entry_path = entry.path().map_err(unreadable)?.into_owned();
            let entry_type = entry.header().entry_type();

            if entry_type.is_symlink() || entry_type.is_hard_link() {
                warn!("skipping link entry in archive: {}", entry_path.display());
                continue;
            }

            let dest_path = resolve_entry_destination(dest_root, &entry_path)?;

            if entry_type.is_dir() {
                create_dir(&dest_path)?;
                continue;
            }
            if !entry_type.is_file() {
                warn!(
                    "skipping unsupported entry type in archive: {}",
                    entry_path.display()
                );
                continue;
            }

            write_entry(&mut entry, &dest_path, dest_root, &entry_path)?;
        }

        Ok(())
    }

    fn unpack_zip(archive_path: &Path, dest_root: &Path) -> Result<(), ExtractError> {
        let file = File::open(archive_path).map_err(|e| ExtractError::Filesystem {
            message: format!("{}: {}", archive_path.display(), e),
        })?;
        let mut archive = zip::ZipArchive::new(file).map_err(unreadable)?;

        for index in 0..archive.len() {
            let mut entry = archive.by_index(index).map_err(unreadable)?;
            let entry_path = PathBuf::from(entry.name());

            // S_IFLNK in the external attributes marks a symlink entry
            let is_symlink = entry
                .unix_mode()
                .is_some_and(|mode| mode & 0o170000 == 0o120000);
            if is_symlink {
                warn!("skipping link entry in archive: {}", entry_path.display());
                continue;
            }

            let dest_path = resolve_entry_destination(dest_root, &entry_path)?;

            if entry.is_dir() {
                create_dir(&dest_path)?;
                continue;
            }

            write_entry(&mut entry, &dest_path, dest_root, &entry_path)?;
        }

        Ok(())
    }
}

/// Resolve an entry's destination under the root, rejecting escapes
///
/// Absolute entries and any `..` component fail before resolution; `.`
/// components are dropped. The check is lexical, so it holds before any
/// filesystem state exists.
pub fn resolve_entry_destination(
    dest_root: &Path,
    entry_path: &Path,
) -> Result<PathBuf, ExtractError> {
    let mut relative = PathBuf::new();

    for component in entry_path.components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(ExtractError::PathIsNotWithinBaseDirectory {
                    path: entry_path.display().to_string(),
                });
            }
        }
    }

    Ok(dest_root.join(relative))
}

/// Write one validated entry, re-checking ancestry through the real tree
///
/// The canonical parent must still be under the canonical root at write
/// time; this holds even if an earlier entry managed to plant a directory
/// that resolves elsewhere.
fn write_entry<R: io::Read>(
    reader: &mut R,
    dest_path: &Path,
    dest_root: &Path,
    entry_path: &Path,
) -> Result<(), ExtractError> {
    if let Some(parent) = dest_path.parent() {
        create_dir(parent)?;

        let canonical_parent = parent.canonicalize().map_err(|e| ExtractError::Filesystem {
            message: format!("{}: {}", parent.display(), e),
        })?;
        let canonical_root = dest_root
            .canonicalize()
            .map_err(|e| ExtractError::Filesystem {
                message: format!("{}: {}", dest_root.display(), e),
            })?;

        if !canonical_parent.starts_with(&canonical_root) {
            return Err(ExtractError::PathIsNotWithinBaseDirectory {
                path: entry_path.display().to_string(),
            });
        }
    }

    let mut out = File::create(dest_path).map_err(|e| ExtractError::Filesystem {
        message: format!("{}: {}", dest_path.display(), e),
    })?;
    io::copy(reader, &mut out).map_err(unreadable)?;

    Ok(())
}

fn create_dir(path: &Path) -> Result<(), ExtractError> {
    std::fs::create_dir_all(path).map_err(|e| ExtractError::Filesystem {
        message: format!("{}: {}", path.display(), e),
    })
}

fn unreadable<E: std::fmt::Display>(error: E) -> ExtractError {
    ExtractError::UnreadableArchive {
        message: error.to_string(),
    }
}
