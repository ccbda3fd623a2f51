//! The source stage: retrieve and unpack a source archive.
//!
//! [`Fetcher::fetch`] downloads a URL into a staging directory next to the
//! destination, extracts it there, and only moves the result into place once
//! every entry has been written. A failed fetch leaves no partial tree.
//!
//! # Sub-modules
//!
//! - [`download`] - HTTP and `file://` retrieval behind the [`Downloader`] trait.
//! - [`extraction`] - Zip and tar extraction with traversal protection.
//! - [`export`] - Copying local recipe sources.

pub mod download;
pub mod export;
pub mod extraction;

pub use download::{DownloadError, Downloader, UrlDownloader};
pub use export::export_sources;
pub use extraction::{ArchiveFormat, ExtractionError};

use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, info};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Errors arising from the source stage.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The resource could not be retrieved.
    #[error("{0}")]
    Download(#[from] DownloadError),

    /// The downloaded archive could not be extracted.
    #[error("failed to extract {url}: {source}")]
    Extraction {
        /// The URL the archive came from.
        url: String,
        /// The extraction failure.
        #[source]
        source: ExtractionError,
    },

    /// The URL does not name a file.
    #[error("cannot derive a file name from {url}")]
    InvalidUrl {
        /// The rejected URL.
        url: String,
    },

    /// A recipe's local source directory does not exist.
    #[error("local source directory {path} does not exist")]
    MissingLocalSource {
        /// The missing directory.
        path: Utf8PathBuf,
    },

    /// A source path is not valid UTF-8.
    #[error("source contains a non UTF-8 path: {0}")]
    NonUtf8Path(PathBuf),

    /// Staging or moving the extracted tree failed.
    #[error("I/O error while fetching: {0}")]
    Io(#[from] std::io::Error),
}

/// A source tree produced by a successful fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedSourceTree {
    root: Utf8PathBuf,
    content_root: Utf8PathBuf,
    files: Vec<Utf8PathBuf>,
}

impl ExtractedSourceTree {
    /// Describe a tree rooted at `root` containing `files` (relative paths).
    #[must_use]
    pub fn new(root: Utf8PathBuf, files: Vec<Utf8PathBuf>) -> Self {
        let content_root = content_root_of(&root);
        Self {
            root,
            content_root,
            files,
        }
    }

    /// Directory the tree was extracted into.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// The directory holding the sources proper.
    ///
    /// Archives such as GitHub's `archive/<ref>.zip` wrap everything in a
    /// single `<repo>-<ref>/` directory; this returns that directory when it
    /// is the only entry, and [`ExtractedSourceTree::root`] otherwise.
    #[must_use]
    pub fn content_root(&self) -> &Utf8Path {
        &self.content_root
    }

    /// Regular files in the tree, relative to [`ExtractedSourceTree::root`].
    #[must_use]
    pub fn files(&self) -> &[Utf8PathBuf] {
        &self.files
    }

    /// Number of regular files in the tree.
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.files.len()
    }
}

/// Retrieves sources through an injected [`Downloader`].
pub struct Fetcher<'a> {
    downloader: &'a dyn Downloader,
}

impl<'a> Fetcher<'a> {
    /// Create a fetcher using `downloader`.
    #[must_use]
    pub fn new(downloader: &'a dyn Downloader) -> Self {
        Self { downloader }
    }

    /// Fetch `url` and unpack it into `destination`.
    ///
    /// Archives are detected by file name and extracted with relative paths
    /// preserved. Any other resource is stored under its file name. A single
    /// attempt is made.
    ///
    /// # Errors
    ///
    /// Returns a [`FetchError`] if the resource cannot be retrieved or
    /// extracted. In that case nothing is left in `destination`, and a
    /// destination created by this call is removed again.
    pub fn fetch(
        &self,
        url: &str,
        destination: &Utf8Path,
    ) -> Result<ExtractedSourceTree, FetchError> {
        let created = !destination.exists();
        let result = self.fetch_into(url, destination);
        if result.is_err() && created && destination.exists() {
            if let Err(e) = fs::remove_dir_all(destination) {
                debug!("could not remove {destination} after failed fetch: {e}");
            }
        }
        result
    }

    fn fetch_into(
        &self,
        url: &str,
        destination: &Utf8Path,
    ) -> Result<ExtractedSourceTree, FetchError> {
        let file_name = download::file_name_from_url(url).ok_or_else(|| FetchError::InvalidUrl {
            url: url.to_owned(),
        })?;
        let parent = match destination.parent() {
            Some(parent) if !parent.as_str().is_empty() => parent,
            _ => Utf8Path::new("."),
        };
        fs::create_dir_all(parent)?;

        let staging = tempfile::Builder::new()
            .prefix(".fetch-")
            .tempdir_in(parent)?;
        let archive_path = staging.path().join(file_name);
        let tree_dir = staging.path().join("tree");

        info!("fetching {url}");
        self.downloader.download(url, &archive_path)?;

        let files = match ArchiveFormat::from_name(file_name) {
            Some(format) => extraction::extract(&archive_path, format, &tree_dir).map_err(
                |source| FetchError::Extraction {
                    url: url.to_owned(),
                    source,
                },
            )?,
            None => {
                debug!("{file_name} is not an archive; storing it as is");
                fs::create_dir_all(&tree_dir)?;
                fs::rename(&archive_path, tree_dir.join(file_name))?;
                vec![Utf8PathBuf::from(file_name)]
            }
        };

        move_into_place(&tree_dir, destination, &staging.path().join("replaced"))?;
        info!("extracted {} file(s) into {destination}", files.len());
        Ok(ExtractedSourceTree::new(destination.to_owned(), files))
    }
}

/// Move the staged tree to `destination`, merging into an existing directory.
///
/// Top-level entries of `destination` that the staged tree replaces are
/// moved into `backup` first. If any move fails they are put back, so
/// `destination` ends up either fully updated or as it was.
fn move_into_place(staged: &Path, destination: &Utf8Path, backup: &Path) -> io::Result<()> {
    if !destination.exists() {
        return fs::rename(staged, destination);
    }
    let mut names = fs::read_dir(staged)?
        .map(|entry| entry.map(|e| e.file_name()))
        .collect::<io::Result<Vec<_>>>()?;
    names.sort();
    fs::create_dir_all(backup)?;

    let destination = destination.as_std_path();
    let mut replaced = Vec::new();
    let mut placed = Vec::new();
    let result: io::Result<()> = names.iter().try_for_each(|name| {
        let target = destination.join(name);
        if target.symlink_metadata().is_ok() {
            fs::rename(&target, backup.join(name))?;
            replaced.push(name);
        }
        fs::rename(staged.join(name), &target)?;
        placed.push(name);
        Ok(())
    });

    if let Err(err) = &result {
        debug!("restoring {} after failed move: {err}", destination.display());
        for name in placed {
            if let Err(e) = remove_path(&destination.join(name)) {
                debug!("could not remove {}: {e}", name.to_string_lossy());
            }
        }
        for name in replaced {
            if let Err(e) = fs::rename(backup.join(name), destination.join(name)) {
                debug!("could not restore {}: {e}", name.to_string_lossy());
            }
        }
    }
    result
}

fn remove_path(path: &Path) -> io::Result<()> {
    if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

/// The directory holding the sources proper below `root`.
///
/// This is the only entry of `root` when that entry is a directory, and
/// `root` itself otherwise.
#[must_use]
pub fn content_root_of(root: &Utf8Path) -> Utf8PathBuf {
    single_top_level_dir(root).unwrap_or_else(|| root.to_owned())
}

fn single_top_level_dir(root: &Utf8Path) -> Option<Utf8PathBuf> {
    let mut entries = root.read_dir_utf8().ok()?;
    let first = entries.next()?.ok()?;
    if entries.next().is_some() || !first.path().is_dir() {
        return None;
    }
    Some(first.path().to_owned())
}
