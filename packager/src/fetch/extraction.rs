//! Archive extraction for fetched source trees.
//!
//! Zip and tar archives (plain, gzip or zstd compressed) are unpacked with
//! path traversal protection. Only regular files are reported; directories
//! are created as needed and other entry types are skipped.

use camino::Utf8PathBuf;
use log::warn;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Component, Path};

/// Archive formats recognised by file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    /// `.zip`
    Zip,
    /// `.tar`
    Tar,
    /// `.tar.gz` or `.tgz`
    TarGz,
    /// `.tar.zst` or `.tzst`
    TarZst,
}

impl ArchiveFormat {
    /// Detect the format from a file name, or `None` if it is not an archive.
    ///
    /// # Examples
    ///
    /// ```
    /// use lightning_packager::fetch::extraction::ArchiveFormat;
    ///
    /// assert_eq!(ArchiveFormat::from_name("master.zip"), Some(ArchiveFormat::Zip));
    /// assert_eq!(ArchiveFormat::from_name("v1.tgz"), Some(ArchiveFormat::TarGz));
    /// assert_eq!(ArchiveFormat::from_name("README.md"), None);
    /// ```
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".zip") {
            Some(Self::Zip)
        } else if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if lower.ends_with(".tar.zst") || lower.ends_with(".tzst") {
            Some(Self::TarZst)
        } else if lower.ends_with(".tar") {
            Some(Self::Tar)
        } else {
            None
        }
    }
}

/// Errors arising from archive extraction.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    /// I/O error while writing extracted files.
    #[error("extraction I/O error: {0}")]
    Io(#[from] io::Error),

    /// A path in the archive attempts to traverse outside the destination.
    #[error("path traversal detected: {path}")]
    PathTraversal {
        /// The offending path from the archive entry.
        path: String,
    },

    /// The archive contains no files.
    #[error("archive contains no files")]
    EmptyArchive,

    /// The archive could not be decoded.
    #[error("corrupt archive: {reason}")]
    Corrupt {
        /// Description of the decoding failure.
        reason: String,
    },

    /// An entry name is not valid UTF-8.
    #[error("archive entry has a non UTF-8 name: {path}")]
    NonUtf8 {
        /// Lossy rendering of the entry name.
        path: String,
    },
}

/// Extract `archive` into `dest_dir`, returning the relative paths of the
/// regular files written, in archive order.
///
/// # Errors
///
/// Returns [`ExtractionError::Corrupt`] if the archive cannot be decoded,
/// [`ExtractionError::PathTraversal`] if an entry would escape `dest_dir`,
/// [`ExtractionError::EmptyArchive`] if it holds no files, and
/// [`ExtractionError::Io`] on write failures.
pub fn extract(
    archive: &Path,
    format: ArchiveFormat,
    dest_dir: &Path,
) -> Result<Vec<Utf8PathBuf>, ExtractionError> {
    fs::create_dir_all(dest_dir)?;
    let file = File::open(archive)?;
    let extracted = match format {
        ArchiveFormat::Zip => extract_zip(file, dest_dir)?,
        ArchiveFormat::Tar => extract_tar(file, dest_dir)?,
        ArchiveFormat::TarGz => extract_tar(flate2::read::GzDecoder::new(file), dest_dir)?,
        ArchiveFormat::TarZst => {
            let decoder = zstd::Decoder::new(file).map_err(corrupt)?;
            extract_tar(decoder, dest_dir)?
        }
    };

    if extracted.is_empty() {
        return Err(ExtractionError::EmptyArchive);
    }
    Ok(extracted)
}

fn extract_zip(file: File, dest_dir: &Path) -> Result<Vec<Utf8PathBuf>, ExtractionError> {
    let mut archive = zip::ZipArchive::new(file).map_err(corrupt)?;
    let mut extracted = Vec::new();

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(corrupt)?;
        let name = entry.name().to_owned();
        validate_entry_path(Path::new(&name))?;
        let relative = entry
            .enclosed_name()
            .ok_or_else(|| ExtractionError::PathTraversal { path: name.clone() })?;
        let relative = utf8(relative)?;
        let dest_path = dest_dir.join(&relative);

        if entry.is_dir() {
            fs::create_dir_all(&dest_path)?;
            continue;
        }
        if entry.is_symlink() {
            warn!("skipping symbolic link {relative} in archive");
            continue;
        }

        if let Some(parent) = dest_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&dest_path)?;
        io::copy(&mut entry, &mut out).map_err(read_error)?;
        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&dest_path, fs::Permissions::from_mode(mode & 0o777))?;
        }
        extracted.push(relative);
    }
    Ok(extracted)
}

fn extract_tar(reader: impl Read, dest_dir: &Path) -> Result<Vec<Utf8PathBuf>, ExtractionError> {
    let mut archive = tar::Archive::new(reader);
    let mut extracted = Vec::new();

    for entry_result in archive.entries().map_err(corrupt)? {
        let mut entry = entry_result.map_err(corrupt)?;
        let entry_path = entry.path().map_err(corrupt)?.into_owned();
        validate_entry_path(&entry_path)?;
        let relative = utf8(entry_path)?;
        let dest_path = dest_dir.join(&relative);

        let kind = entry.header().entry_type();
        if kind.is_dir() {
            fs::create_dir_all(&dest_path)?;
            continue;
        }
        if !kind.is_file() {
            warn!("skipping {kind:?} entry {relative} in archive");
            continue;
        }

        if let Some(parent) = dest_path.parent() {
            fs::create_dir_all(parent)?;
        }
        entry.unpack(&dest_path).map_err(read_error)?;
        extracted.push(relative);
    }
    Ok(extracted)
}

/// Validate that an entry path does not escape the destination
/// directory via `..` components or absolute paths.
fn validate_entry_path(path: &Path) -> Result<(), ExtractionError> {
    let escapes = path.is_absolute()
        || path
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)));
    if escapes {
        return Err(ExtractionError::PathTraversal {
            path: path.display().to_string(),
        });
    }
    Ok(())
}

fn utf8(path: std::path::PathBuf) -> Result<Utf8PathBuf, ExtractionError> {
    Utf8PathBuf::try_from(path).map_err(|e| ExtractionError::NonUtf8 {
        path: e.as_path().display().to_string(),
    })
}

/// Decoding failures surface as `InvalidData` or a truncated stream.
fn read_error(err: io::Error) -> ExtractionError {
    match err.kind() {
        io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof => corrupt(err),
        _ => ExtractionError::Io(err),
    }
}

fn corrupt(err: impl std::fmt::Display) -> ExtractionError {
    ExtractionError::Corrupt {
        reason: err.to_string(),
    }
}
