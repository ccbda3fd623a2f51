//! Export of local recipe sources into the work layout.

use super::FetchError;
use camino::{Utf8Path, Utf8PathBuf};
use log::debug;
use std::fs;
use walkdir::WalkDir;

/// Directory names never exported.
const SKIPPED_DIRS: &[&str] = &[".git", ".hg", ".svn", "target"];

/// Copy the regular files below `from` into `to`, preserving structure.
///
/// Version control directories, `target/` and anything under `exclude`
/// (typically the work directory when it lives inside the source tree) are
/// skipped, as is `to` itself. Paths are compared after canonicalisation, so
/// `to` may be given relative to the working directory. `to` is created if
/// missing. Returns the copied paths relative to `to`.
///
/// # Errors
///
/// Returns [`FetchError::MissingLocalSource`] if `from` is not a directory,
/// or [`FetchError::Io`] if a file cannot be read or written.
pub fn export_sources(
    from: &Utf8Path,
    to: &Utf8Path,
    exclude: Option<&Utf8Path>,
) -> Result<Vec<Utf8PathBuf>, FetchError> {
    if !from.is_dir() {
        return Err(FetchError::MissingLocalSource {
            path: from.to_owned(),
        });
    }

    // Walked entries are only comparable with canonical `to` and `exclude`.
    fs::create_dir_all(to)?;
    let from = from.canonicalize_utf8()?;
    let to = to.canonicalize_utf8()?;
    let exclude = match exclude {
        Some(dir) if dir.exists() => Some(dir.canonicalize_utf8()?),
        _ => None,
    };

    let mut copied = Vec::new();
    let walker = WalkDir::new(&from)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            let skipped_name = entry.depth() > 0
                && entry.file_type().is_dir()
                && entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| SKIPPED_DIRS.contains(&name));
            let excluded = exclude
                .as_ref()
                .is_some_and(|dir| entry.path().starts_with(dir));
            !skipped_name && !excluded && !entry.path().starts_with(&to)
        });

    for entry in walker {
        let entry = entry.map_err(|e| FetchError::Io(e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(&from) else {
            continue;
        };
        let relative = Utf8PathBuf::try_from(relative.to_path_buf())
            .map_err(|e| FetchError::NonUtf8Path(e.into_path_buf()))?;
        let dest = to.join(&relative);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(entry.path(), &dest)?;
        copied.push(relative);
    }

    debug!("exported {} file(s) from {from} to {to}", copied.len());
    Ok(copied)
}
