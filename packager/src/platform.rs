//! Target platform identifiers and library naming lookups.
//!
//! Library file patterns depend on the target operating system. Rather than
//! branching inside individual copy rules, the packager resolves a
//! [`LibraryKind`] through [`Platform::library_pattern`], which keeps the
//! rule table declarative.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Operating systems the packager knows how to lay out libraries for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Linux distributions.
    Linux,
    /// Apple macOS.
    Macos,
    /// Microsoft Windows.
    Windows,
    /// FreeBSD.
    Freebsd,
}

/// The flavour of library a copy rule selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LibraryKind {
    /// Dynamically linked libraries.
    Shared,
    /// Static archives.
    Static,
}

/// Error returned when a platform identifier is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown platform \"{value}\"; expected one of: {expected}")]
pub struct UnknownPlatform {
    /// The rejected identifier.
    pub value: String,
    /// Comma-separated list of accepted identifiers.
    pub expected: String,
}

const ALL: &[Platform] = &[
    Platform::Linux,
    Platform::Macos,
    Platform::Windows,
    Platform::Freebsd,
];

impl Platform {
    /// Return the platform this binary was compiled for.
    ///
    /// Unrecognised Unix-like hosts fall back to [`Platform::Linux`], whose
    /// library conventions they share.
    #[must_use]
    pub const fn host() -> Self {
        #[cfg(target_os = "macos")]
        {
            Self::Macos
        }
        #[cfg(target_os = "windows")]
        {
            Self::Windows
        }
        #[cfg(target_os = "freebsd")]
        {
            Self::Freebsd
        }
        #[cfg(not(any(target_os = "macos", target_os = "windows", target_os = "freebsd")))]
        {
            Self::Linux
        }
    }

    /// Return the canonical lowercase identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Linux => "linux",
            Self::Macos => "macos",
            Self::Windows => "windows",
            Self::Freebsd => "freebsd",
        }
    }

    /// Return the glob pattern matching libraries of `kind` on this platform.
    ///
    /// Shared-library patterns end in a wildcard on Unix-like systems so that
    /// versioned names such as `liblightning.so.1.2` are picked up too.
    ///
    /// # Examples
    ///
    /// ```
    /// use lightning_packager::platform::{LibraryKind, Platform};
    ///
    /// assert_eq!(Platform::Linux.library_pattern(LibraryKind::Shared), "*.so*");
    /// assert_eq!(Platform::Macos.library_pattern(LibraryKind::Shared), "*.dylib*");
    /// assert_eq!(Platform::Windows.library_pattern(LibraryKind::Static), "*.lib");
    /// ```
    #[must_use]
    pub const fn library_pattern(self, kind: LibraryKind) -> &'static str {
        match (self, kind) {
            (Self::Linux | Self::Freebsd, LibraryKind::Shared) => "*.so*",
            (Self::Macos, LibraryKind::Shared) => "*.dylib*",
            (Self::Windows, LibraryKind::Shared) => "*.dll",
            (Self::Linux | Self::Freebsd | Self::Macos, LibraryKind::Static) => "*.a",
            (Self::Windows, LibraryKind::Static) => "*.lib",
        }
    }
}

impl FromStr for Platform {
    type Err = UnknownPlatform;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linux" => Ok(Self::Linux),
            "macos" | "darwin" | "osx" => Ok(Self::Macos),
            "windows" | "win32" => Ok(Self::Windows),
            "freebsd" => Ok(Self::Freebsd),
            _ => Err(UnknownPlatform {
                value: s.to_owned(),
                expected: ALL
                    .iter()
                    .map(|p| p.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            }),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for LibraryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shared => f.write_str("shared"),
            Self::Static => f.write_str("static"),
        }
    }
}
