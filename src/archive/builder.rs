//! Distributable archive generation
//!
//! Builds the tar.gz and zip artifacts for a processed module tree. Both
//! formats contain the identical logical file set: every file and directory
//! under the root except `.git` subtrees, relative paths and bytes preserved
//! exactly. Entry metadata (mtime, owner, mode) is pinned to fixed values
//! and the walk order is sorted, so rebuilding the same tree yields
//! byte-identical archives.

use crate::core::error::ExtractError;
use crate::core::metadata::ArchiveFormat;
use flate2::Compression;
use flate2::write::GzEncoder;
use log::warn;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;

/// One archive written to the local staging directory
#[derive(Debug, Clone)]
pub struct BuiltArchive {
    pub format: ArchiveFormat,
    pub local_path: PathBuf,
    pub sha256: String,
    pub size_bytes: u64,
}

/// An entry scheduled for archiving, relative to the source root
struct ArchiveEntry {
    relative: PathBuf,
    source: PathBuf,
    is_dir: bool,
}

/// Builds both distributable archives for a module version
pub struct ArchiveBuilder;

impl ArchiveBuilder {
    /// Archive `source_root` into `staging_dir` in both formats
    ///
    /// The caller hands the staged files to storage afterwards; nothing here
    /// touches the storage backend.
    pub fn build(source_root: &Path, staging_dir: &Path) -> Result<Vec<BuiltArchive>, ExtractError> {
        let entries = collect_entries(source_root)?;

        let tar_gz_path = staging_dir.join(ArchiveFormat::TarGz.file_name());
        build_tar_gz(&entries, &tar_gz_path)?;

        let zip_path = staging_dir.join(ArchiveFormat::Zip.file_name());
        build_zip(&entries, &zip_path)?;

        Ok(vec![
            describe(ArchiveFormat::TarGz, tar_gz_path)?,
            describe(ArchiveFormat::Zip, zip_path)?,
        ])
    }
}

/// Collect the sorted entry list, excluding `.git` subtrees at any depth
fn collect_entries(source_root: &Path) -> Result<Vec<ArchiveEntry>, ExtractError> {
    let mut entries = Vec::new();

    let walker = WalkDir::new(source_root)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.file_name() != ".git");

    for item in walker {
        let item = item.map_err(|e| ExtractError::Filesystem {
            message: e.to_string(),
        })?;

        let file_type = item.file_type();
        if file_type.is_symlink() {
            warn!("skipping symlink while archiving: {}", item.path().display());
            continue;
        }

        let relative = item
            .path()
            .strip_prefix(source_root)
            .map_err(|e| ExtractError::Filesystem {
                message: e.to_string(),
            })?
            .to_path_buf();

        entries.push(ArchiveEntry {
            relative,
            source: item.path().to_path_buf(),
            is_dir: file_type.is_dir(),
        });
    }

    Ok(entries)
}

fn build_tar_gz(entries: &[ArchiveEntry], output_path: &Path) -> Result<(), ExtractError> {
    let output = File::create(output_path).map_err(|e| filesystem(output_path, e))?;
    let encoder = GzEncoder::new(output, Compression::default());
    let mut builder = tar::Builder::new(encoder);

    for entry in entries {
        let mut header = tar::Header::new_gnu();
        header.set_mtime(0);
        header.set_uid(0);
        header.set_gid(0);

        if entry.is_dir {
            header.set_entry_type(tar::EntryType::Directory);
            header.set_size(0);
            header.set_mode(0o755);
            builder
                .append_data(&mut header, &entry.relative, io::empty())
                .map_err(|e| filesystem(&entry.source, e))?;
        } else {
            let file = File::open(&entry.source).map_err(|e| filesystem(&entry.source, e))?;
            let size = file
                .metadata()
                .map_err(|e| filesystem(&entry.source, e))?
                .len();
            header.set_entry_type(tar::EntryType::Regular);
            header.set_size(size);
            header.set_mode(0o644);
            builder
                .append_data(&mut header, &entry.relative, file)
                .map_err(|e| filesystem(&entry.source, e))?;
        }
    }

    let encoder = builder
        .into_inner()
        .map_err(|e| filesystem(output_path, e))?;
    encoder.finish().map_err(|e| filesystem(output_path, e))?;

    Ok(())
}

fn build_zip(entries: &[ArchiveEntry], output_path: &Path) -> Result<(), ExtractError> {
    let output = File::create(output_path).map_err(|e| filesystem(output_path, e))?;
    let mut writer = zip::ZipWriter::new(output);

    // Fixed timestamp (1980-01-01) and modes keep the output reproducible
    let file_options = SimpleFileOptions::default()
        .last_modified_time(zip::DateTime::default())
        .unix_permissions(0o644);
    let dir_options = SimpleFileOptions::default()
        .last_modified_time(zip::DateTime::default())
        .unix_permissions(0o755);

    for entry in entries {
        let name = entry.relative.to_string_lossy().replace('\\', "/");

        if entry.is_dir {
            writer
                .add_directory(&name, dir_options)
                .map_err(|e| filesystem(&entry.source, e))?;
        } else {
            writer
                .start_file(&name, file_options)
                .map_err(|e| filesystem(&entry.source, e))?;
            let mut file = File::open(&entry.source).map_err(|e| filesystem(&entry.source, e))?;
            io::copy(&mut file, &mut writer).map_err(|e| filesystem(&entry.source, e))?;
        }
    }

    writer.finish().map_err(|e| filesystem(output_path, e))?;

    Ok(())
}

fn describe(format: ArchiveFormat, local_path: PathBuf) -> Result<BuiltArchive, ExtractError> {
    let sha256 = compute_sha256(&local_path)?;
    let size_bytes = std::fs::metadata(&local_path)
        .map_err(|e| filesystem(&local_path, e))?
        .len();

    Ok(BuiltArchive {
        format,
        local_path,
        sha256,
        size_bytes,
    })
}

/// Compute the SHA-256 digest of a file as lowercase hex
pub fn compute_sha256(path: &Path) -> Result<String, ExtractError> {
    let mut file = File::open(path).map_err(|e| filesystem(path, e))?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    loop {
        let bytes_read = file.read(&mut buffer).map_err(|e| filesystem(path, e))?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

fn filesystem<E: std::fmt::Display>(path: &Path, error: E) -> ExtractError {
    ExtractError::Filesystem {
        message: format!("{}: {}", path.display(), error),
    }
}
