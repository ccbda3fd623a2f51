//! Error types for the lightning packager.
//!
//! Each pipeline stage owns a semantic error enum ([`FetchError`],
//! [`BuildError`], [`PackageError`]); configuration problems surface as
//! [`OptionError`] or [`RecipeError`]. [`PackagerError`] wraps all of them so
//! that the CLI can report any failure through a single type.

use crate::builder::BuildError;
use crate::fetch::FetchError;
use crate::options::OptionError;
use crate::packaging::PackageError;
use crate::recipe::RecipeError;
use crate::settings::SettingsError;
use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors that can abort a packaging run.
#[derive(Debug, Error)]
pub enum PackagerError {
    /// The source could not be downloaded or extracted.
    #[error("source stage failed: {0}")]
    Fetch(#[from] FetchError),

    /// The external build tool failed.
    #[error("build stage failed: {0}")]
    Build(#[from] BuildError),

    /// Copy rules could not be applied to the build output.
    #[error("package stage failed: {0}")]
    Package(#[from] PackageError),

    /// A build option override was rejected.
    #[error(transparent)]
    Option(#[from] OptionError),

    /// The recipe could not be loaded.
    #[error(transparent)]
    Recipe(#[from] RecipeError),

    /// Environment-supplied settings were invalid.
    #[error(transparent)]
    Settings(#[from] SettingsError),

    /// A stage needs output from an earlier stage that is not present.
    #[error("{stage} requires {path}; run the earlier stages first")]
    MissingStageInput {
        /// The stage that was requested.
        stage: &'static str,
        /// The directory that should have been produced earlier.
        path: Utf8PathBuf,
    },

    /// The work directory could not be determined or prepared.
    #[error("work directory unavailable: {reason}")]
    WorkDir {
        /// Description of the failure.
        reason: String,
    },

    /// An I/O operation failed outside a specific stage.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to write output.
    #[error("failed to write output")]
    WriteFailed {
        /// The underlying error that caused the write to fail.
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias using [`PackagerError`].
pub type Result<T> = std::result::Result<T, PackagerError>;
