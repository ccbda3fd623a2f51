//! Environment-supplied build settings.
//!
//! Platform, architecture, build type, and compiler are not declared by a
//! recipe; they describe the environment the package is built for. Values
//! are read from `LIGHTNING_PACKAGER_*` variables and fall back to the host.

use crate::platform::{Platform, UnknownPlatform};
use serde::Serialize;
use thiserror::Error;

/// Environment variable overriding the target operating system.
pub const OS_VAR: &str = "LIGHTNING_PACKAGER_OS";
/// Environment variable overriding the target architecture.
pub const ARCH_VAR: &str = "LIGHTNING_PACKAGER_ARCH";
/// Environment variable overriding the CMake build type.
pub const BUILD_TYPE_VAR: &str = "LIGHTNING_PACKAGER_BUILD_TYPE";
/// Environment variable naming the compiler, recorded in the manifest only.
pub const COMPILER_VAR: &str = "LIGHTNING_PACKAGER_COMPILER";

const DEFAULT_BUILD_TYPE: &str = "Release";

/// Errors arising from invalid environment settings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingsError {
    /// The platform variable holds an unknown identifier.
    #[error("invalid LIGHTNING_PACKAGER_OS: {0}")]
    Platform(#[from] UnknownPlatform),

    /// A settings variable was set to an empty string.
    #[error("{var} is set but empty")]
    Empty {
        /// Name of the offending variable.
        var: &'static str,
    },
}

/// Build settings for a single invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Settings {
    /// Target operating system.
    pub os: Platform,
    /// Target architecture, e.g. `x86_64`.
    pub arch: String,
    /// CMake build type, e.g. `Release`.
    pub build_type: String,
    /// Compiler identifier, when the environment provides one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compiler: Option<String>,
}

impl Settings {
    /// Settings describing the host with a release build.
    #[must_use]
    pub fn host() -> Self {
        Self {
            os: Platform::host(),
            arch: std::env::consts::ARCH.to_owned(),
            build_type: DEFAULT_BUILD_TYPE.to_owned(),
            compiler: None,
        }
    }

    /// Read settings from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError`] if a variable is set but empty, or if the
    /// platform identifier is not recognised.
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read settings through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// See [`Settings::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SettingsError> {
        let host = Self::host();
        let read = |var: &'static str| -> Result<Option<String>, SettingsError> {
            match lookup(var) {
                Some(value) if value.trim().is_empty() => Err(SettingsError::Empty { var }),
                Some(value) => Ok(Some(value.trim().to_owned())),
                None => Ok(None),
            }
        };

        let os = match read(OS_VAR)? {
            Some(value) => value.parse::<Platform>()?,
            None => host.os,
        };

        Ok(Self {
            os,
            arch: read(ARCH_VAR)?.unwrap_or(host.arch),
            build_type: read(BUILD_TYPE_VAR)?.unwrap_or(host.build_type),
            compiler: read(COMPILER_VAR)?,
        })
    }

    /// Replace the target platform, e.g. from a `--platform` flag.
    #[must_use]
    pub fn with_platform(self, os: Platform) -> Self {
        Self { os, ..self }
    }
}
