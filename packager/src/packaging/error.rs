//! Error types for the package stage.

use super::rule::RuleLabel;
use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors arising while applying copy rules.
#[derive(Debug, Error)]
pub enum PackageError {
    /// A mandatory rule matched no files.
    #[error("mandatory rule {rule} matched no files")]
    NoMatches {
        /// The rule that matched nothing.
        rule: RuleLabel,
    },

    /// A glob pattern could not be compiled.
    #[error("invalid pattern `{pattern}`: {reason}")]
    InvalidPattern {
        /// The offending pattern.
        pattern: String,
        /// Description of the syntax error.
        reason: String,
    },

    /// The build output directory does not exist.
    #[error("build output directory {path} does not exist")]
    MissingOutput {
        /// The missing directory.
        path: Utf8PathBuf,
    },

    /// Walking the build output failed.
    #[error("failed to scan {path}: {reason}")]
    Scan {
        /// Directory being scanned.
        path: Utf8PathBuf,
        /// Description of the failure.
        reason: String,
    },

    /// A build output path is not valid UTF-8.
    #[error("build output contains a non UTF-8 path: {0}")]
    NonUtf8Path(std::path::PathBuf),

    /// Copying a matched file failed.
    #[error("failed to copy {from} to {to}")]
    Copy {
        /// Source file.
        from: Utf8PathBuf,
        /// Destination file.
        to: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// JSON serialisation of the manifest failed.
    #[error("manifest serialisation error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Any other I/O failure.
    #[error("I/O error during packaging: {0}")]
    Io(#[from] std::io::Error),
}
