//! Package manifest emission.
//!
//! After the copy rules have run, a `manifest.json` is written at the package
//! root recording the package identity, the settings and options it was built
//! with, the pass-through requirements, and a SHA-256 digest of every
//! artifact. The manifest itself is not an artifact.

use super::artifact::ArtifactSet;
use super::error::PackageError;
use crate::descriptor::PackageDescriptor;
use crate::options::BuildOptions;
use crate::settings::Settings;
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Read;

/// File name of the manifest inside the package root.
pub const MANIFEST_FILE: &str = "manifest.json";

/// One artifact entry in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Path relative to the package root.
    pub path: String,
    /// Size in bytes.
    pub size: u64,
    /// Lowercase hex SHA-256 digest of the file contents.
    pub sha256: String,
}

/// Contents of `manifest.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageManifest<'a> {
    /// Package identity and requirements.
    pub package: &'a PackageDescriptor,
    /// Environment the package targets.
    pub settings: &'a Settings,
    /// Effective option values.
    pub options: &'a BuildOptions,
    /// Artifacts in destination order.
    pub artifacts: Vec<ManifestEntry>,
}

impl<'a> PackageManifest<'a> {
    /// Describe `artifacts`, hashing each file under `package_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`PackageError::Io`] if an artifact cannot be read.
    pub fn describe(
        package: &'a PackageDescriptor,
        settings: &'a Settings,
        options: &'a BuildOptions,
        package_dir: &Utf8Path,
        artifacts: &ArtifactSet,
    ) -> Result<Self, PackageError> {
        let artifacts = artifacts
            .iter()
            .map(|artifact| -> Result<ManifestEntry, PackageError> {
                let full_path = package_dir.join(artifact.path());
                Ok(ManifestEntry {
                    path: artifact.path().as_str().replace('\\', "/"),
                    size: fs::metadata(&full_path)?.len(),
                    sha256: compute_sha256(&full_path)?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            package,
            settings,
            options,
            artifacts,
        })
    }

    /// Write the manifest as pretty-printed JSON into `package_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`PackageError::Serialization`] or [`PackageError::Io`].
    pub fn write(&self, package_dir: &Utf8Path) -> Result<Utf8PathBuf, PackageError> {
        let path = package_dir.join(MANIFEST_FILE);
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&path, json)?;
        Ok(path)
    }
}

/// Compute the lowercase hex SHA-256 digest of a file.
///
/// # Errors
///
/// Returns an I/O error if the file cannot be read.
pub fn compute_sha256(path: &Utf8Path) -> std::io::Result<String> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(buffer.get(..bytes_read).unwrap_or_default());
    }
    Ok(format!("{:x}", hasher.finalize()))
}
