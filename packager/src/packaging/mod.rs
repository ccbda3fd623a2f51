//! The package stage: apply copy rules to the build output.
//!
//! [`Packager`] evaluates an ordered rule table against a build output tree
//! and copies the matches into the package layout (`include/`, `lib/`, ...).
//! Matching is planned in full before any file is copied, so a package
//! directory nested inside the build output is never re-scanned.
//!
//! # Sub-modules
//!
//! - [`artifact`] - Produced files and the artifact set.
//! - [`error`] - [`PackageError`].
//! - [`manifest`] - `manifest.json` emission with SHA-256 digests.
//! - [`rule`] - Copy rule declarations and activation conditions.

pub mod artifact;
pub mod error;
pub mod manifest;
pub mod rule;

pub use artifact::{Artifact, ArtifactSet};
pub use error::PackageError;
pub use rule::{Condition, CopyRule, RuleLabel, Selector};

use crate::options::BuildOptions;
use crate::platform::Platform;
use camino::{Utf8Path, Utf8PathBuf};
use glob::Pattern;
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::fs;
use walkdir::WalkDir;

/// A single planned copy from the build output into the package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedCopy {
    /// Absolute source file.
    pub from: Utf8PathBuf,
    /// Destination relative to the package root.
    pub to: Utf8PathBuf,
}

/// Copies build output into a package directory according to copy rules.
#[derive(Debug, Clone)]
pub struct Packager {
    package_dir: Utf8PathBuf,
    platform: Platform,
}

impl Packager {
    /// Create a packager writing into `package_dir` for `platform`.
    #[must_use]
    pub fn new(package_dir: Utf8PathBuf, platform: Platform) -> Self {
        Self {
            package_dir,
            platform,
        }
    }

    /// Return the package root.
    #[must_use]
    pub fn package_dir(&self) -> &Utf8Path {
        &self.package_dir
    }

    /// Resolve every active rule against `build_output_dir` without copying.
    ///
    /// When several matches resolve to the same destination the last one
    /// wins, whether they come from the same rule or from different rules.
    ///
    /// # Errors
    ///
    /// Returns [`PackageError::MissingOutput`] if the build output does not
    /// exist, [`PackageError::NoMatches`] if a mandatory rule matches
    /// nothing, and [`PackageError::Scan`] if the tree cannot be walked.
    pub fn plan(
        &self,
        build_output_dir: &Utf8Path,
        rules: &[CopyRule],
        options: &BuildOptions,
    ) -> Result<Vec<PlannedCopy>, PackageError> {
        if !build_output_dir.is_dir() {
            return Err(PackageError::MissingOutput {
                path: build_output_dir.to_owned(),
            });
        }

        let mut planned: BTreeMap<Utf8PathBuf, Utf8PathBuf> = BTreeMap::new();
        for rule in rules {
            if !rule.is_active(options) {
                debug!("skipping inactive rule {}", rule.label());
                continue;
            }

            let matches = self.matches(build_output_dir, rule)?;
            if matches.is_empty() {
                if rule.mandatory {
                    return Err(PackageError::NoMatches { rule: rule.label() });
                }
                debug!("optional rule {} matched nothing", rule.label());
                continue;
            }

            for (from, relative) in matches {
                let to = destination_for(rule, &relative);
                if let Some(previous) = planned.insert(to.clone(), from.clone()) {
                    warn!("{to}: {from} replaces {previous}");
                }
            }
        }

        Ok(planned
            .into_iter()
            .map(|(to, from)| PlannedCopy { from, to })
            .collect())
    }

    /// Apply `rules` to `build_output_dir` and return the produced artifacts.
    ///
    /// Running this twice against an unchanged build output yields the same
    /// artifact set.
    ///
    /// # Errors
    ///
    /// Returns any error from [`Packager::plan`], or [`PackageError::Copy`]
    /// when a file cannot be copied.
    pub fn package(
        &self,
        build_output_dir: &Utf8Path,
        rules: &[CopyRule],
        options: &BuildOptions,
    ) -> Result<ArtifactSet, PackageError> {
        let plan = self.plan(build_output_dir, rules, options)?;
        fs::create_dir_all(&self.package_dir)?;

        let mut artifacts = ArtifactSet::new();
        for PlannedCopy { from, to } in plan {
            let dest = self.package_dir.join(&to);
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(&from, &dest).map_err(|source| PackageError::Copy {
                from: from.clone(),
                to: dest.clone(),
                source,
            })?;
            debug!("copied {from} -> {dest}");
            artifacts.insert(Artifact::new(to, from));
        }

        info!(
            "packaged {} artifact(s) into {}",
            artifacts.len(),
            self.package_dir
        );
        Ok(artifacts)
    }

    /// Collect `(absolute, relative)` paths of files matching `rule`.
    fn matches(
        &self,
        build_output_dir: &Utf8Path,
        rule: &CopyRule,
    ) -> Result<Vec<(Utf8PathBuf, Utf8PathBuf)>, PackageError> {
        let pattern_text = rule.selector.pattern_for(self.platform);
        let pattern = Pattern::new(pattern_text).map_err(|e| PackageError::InvalidPattern {
            pattern: pattern_text.to_owned(),
            reason: e.to_string(),
        })?;

        let root = match &rule.source {
            Some(dir) => build_output_dir.join(dir),
            None => build_output_dir.to_owned(),
        };
        if !root.is_dir() {
            return Ok(Vec::new());
        }

        let mut found = Vec::new();
        let walker = WalkDir::new(&root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !entry.path().starts_with(&self.package_dir));
        for entry in walker {
            let entry = entry.map_err(|e| PackageError::Scan {
                path: root.clone(),
                reason: e.to_string(),
            })?;
            // Symlinked libraries (libfoo.so -> libfoo.so.1) count as files.
            if !entry.path().is_file() {
                continue;
            }
            let path = Utf8PathBuf::try_from(entry.into_path())
                .map_err(|e| PackageError::NonUtf8Path(e.into_path_buf()))?;
            let Ok(relative) = path.strip_prefix(&root).map(Utf8Path::to_path_buf) else {
                continue;
            };
            if pattern.matches(&slash_path(&relative)) {
                found.push((path, relative));
            }
        }
        Ok(found)
    }
}

/// Destination of `relative` under the rule's destination directory.
fn destination_for(rule: &CopyRule, relative: &Utf8Path) -> Utf8PathBuf {
    if rule.keep_path {
        rule.destination.join(relative)
    } else {
        match relative.file_name() {
            Some(name) => rule.destination.join(name),
            None => rule.destination.join(relative),
        }
    }
}

/// Render a relative path with `/` separators for glob matching.
fn slash_path(path: &Utf8Path) -> String {
    path.components()
        .map(|c| c.as_str())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
