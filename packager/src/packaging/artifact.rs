//! Files produced by the package stage.

use camino::{Utf8Path, Utf8PathBuf};
use std::collections::BTreeSet;
use std::fmt;

/// A file placed into the package layout.
///
/// Artifacts are identified by their destination path relative to the
/// package root; ordering and equality consider that path first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Artifact {
    path: Utf8PathBuf,
    source: Utf8PathBuf,
}

impl Artifact {
    /// Record a copy from `source` to `path` (relative to the package root).
    #[must_use]
    pub fn new(path: Utf8PathBuf, source: Utf8PathBuf) -> Self {
        Self { path, source }
    }

    /// Destination relative to the package root, e.g. `include/foo.h`.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// The build output file the artifact was copied from.
    #[must_use]
    pub fn source(&self) -> &Utf8Path {
        &self.source
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path)
    }
}

/// The artifacts produced by one packaging run, ordered by destination.
pub type ArtifactSet = BTreeSet<Artifact>;
