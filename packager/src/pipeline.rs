//! Stage orchestration over a per-package work directory.
//!
//! A [`Pipeline`] exposes the lifecycle hooks `source`, `build`, `package`
//! and `package_info`, plus [`Pipeline::run`] which executes them in order.
//! Each hook reads and writes a fixed [`WorkLayout`], so the hooks can also be
//! invoked one at a time from separate processes.

use crate::builder::{BuildDriver, BuildResult, CMakeConfig, CMakeDriver, PassthroughDriver};
use crate::error::{PackagerError, Result};
use crate::executor::CommandExecutor;
use crate::fetch::{self, Downloader, ExtractedSourceTree, Fetcher};
use crate::options::BuildOptions;
use crate::output::{success_message, write_stderr_line};
use crate::packaging::manifest::PackageManifest;
use crate::packaging::{ArtifactSet, Packager};
use crate::recipe::{DriverKind, Recipe, SourceLocation};
use crate::settings::Settings;
use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, info};
use serde::Serialize;
use std::fs;
use std::io::Write;

/// Application name used for the per-user cache directory.
const APPLICATION: &str = "lightning-packager";

/// Directories used by one package under its work root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkLayout {
    root: Utf8PathBuf,
}

impl WorkLayout {
    /// Lay out the work directory below `root`.
    #[must_use]
    pub fn new(root: Utf8PathBuf) -> Self {
        Self { root }
    }

    /// The per-user cache directory joined with `slug`.
    ///
    /// # Errors
    ///
    /// Returns [`PackagerError::WorkDir`] if no home directory is known or the
    /// cache path is not valid UTF-8.
    pub fn default_root(slug: &str) -> Result<Utf8PathBuf> {
        let dirs = directories_next::ProjectDirs::from("", "", APPLICATION).ok_or_else(|| {
            PackagerError::WorkDir {
                reason: "could not determine the user cache directory".to_owned(),
            }
        })?;
        let cache = Utf8PathBuf::try_from(dirs.cache_dir().to_path_buf()).map_err(|e| {
            PackagerError::WorkDir {
                reason: format!("cache directory is not valid UTF-8: {e}"),
            }
        })?;
        Ok(cache.join(slug))
    }

    /// The work root.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Fetched or exported sources.
    #[must_use]
    pub fn source(&self) -> Utf8PathBuf {
        self.root.join("source")
    }

    /// Build system binary directory.
    #[must_use]
    pub fn build(&self) -> Utf8PathBuf {
        self.root.join("build")
    }

    /// Install prefix handed to the build system.
    #[must_use]
    pub fn install(&self) -> Utf8PathBuf {
        self.root.join("install")
    }

    /// Final package layout.
    #[must_use]
    pub fn package(&self) -> Utf8PathBuf {
        self.root.join("package")
    }
}

/// Metadata published to consumers of the package.
///
/// Recipes do not populate it, so every list is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PackageInfo {
    /// Libraries consumers should link.
    pub libs: Vec<String>,
    /// Preprocessor definitions consumers should set.
    pub defines: Vec<String>,
}

impl PackageInfo {
    /// Whether no metadata is published.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.libs.is_empty() && self.defines.is_empty()
    }
}

/// Result of the package hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageReport {
    /// The package root.
    pub package_dir: Utf8PathBuf,
    /// Files copied into the package.
    pub artifacts: ArtifactSet,
    /// Location of `manifest.json`.
    pub manifest: Utf8PathBuf,
}

/// Everything produced by [`Pipeline::run`].
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    /// The source tree.
    pub source: ExtractedSourceTree,
    /// The build result.
    pub build: BuildResult,
    /// The package.
    pub package: PackageReport,
    /// Consumer-facing metadata.
    pub package_info: PackageInfo,
}

/// Inputs shared by every hook.
pub struct PipelineContext<'a> {
    /// The recipe being run.
    pub recipe: &'a Recipe,
    /// Effective settings.
    pub settings: &'a Settings,
    /// Effective options.
    pub options: &'a BuildOptions,
    /// Work directory layout.
    pub layout: &'a WorkLayout,
    /// Number of parallel build jobs.
    pub jobs: Option<usize>,
    /// Suppress progress output.
    pub quiet: bool,
}

/// Runs the recipe's hooks with injected collaborators.
pub struct Pipeline<'a> {
    context: PipelineContext<'a>,
    downloader: &'a dyn Downloader,
    executor: &'a dyn CommandExecutor,
}

impl<'a> Pipeline<'a> {
    /// Create a pipeline fetching through `downloader` and running build
    /// tools through `executor`.
    #[must_use]
    pub fn new(
        context: PipelineContext<'a>,
        downloader: &'a dyn Downloader,
        executor: &'a dyn CommandExecutor,
    ) -> Self {
        Self {
            context,
            downloader,
            executor,
        }
    }

    /// Fetch the recipe's archive, or export its local sources, into a
    /// freshly cleared source folder.
    ///
    /// # Errors
    ///
    /// Returns [`PackagerError::Fetch`] if the sources cannot be obtained.
    pub fn source(&self, stderr: &mut dyn Write) -> Result<ExtractedSourceTree> {
        let layout = self.context.layout;
        let destination = layout.source();
        remove_dir_if_present(&destination)?;

        let tree = match &self.context.recipe.source {
            SourceLocation::Url(_) => {
                let url = self.context.recipe.source_url().unwrap_or_default();
                self.progress(stderr, format!("Fetching {url}..."));
                Fetcher::new(self.downloader).fetch(&url, &destination)?
            }
            SourceLocation::Local(dir) => {
                self.progress(stderr, format!("Exporting sources from {dir}..."));
                let files = fetch::export_sources(dir, &destination, Some(layout.root()))?;
                ExtractedSourceTree::new(destination, files)
            }
        };
        info!("source tree holds {} file(s)", tree.file_count());
        Ok(tree)
    }

    /// Build the sources with the recipe's driver.
    ///
    /// # Errors
    ///
    /// Returns [`PackagerError::MissingStageInput`] if `source` has not run,
    /// or [`PackagerError::Build`] if the build fails.
    pub fn build(&self, stderr: &mut dyn Write) -> Result<BuildResult> {
        let source_root = self.source_root("build")?;
        let driver = self.driver();
        self.progress(
            stderr,
            format!("Building {source_root} with {}...", driver.name()),
        );
        let result = driver.build(
            &source_root,
            self.context.options,
            &self.context.layout.install(),
        )?;
        debug!("build output in {}", result.output_dir);
        Ok(result)
    }

    /// Apply the copy rules to the build output and write the manifest.
    ///
    /// # Errors
    ///
    /// Returns [`PackagerError::MissingStageInput`] if there is no build
    /// output, or [`PackagerError::Package`] if a rule fails.
    pub fn package(&self, stderr: &mut dyn Write) -> Result<PackageReport> {
        let output_dir = self.build_output_dir()?;
        let package_dir = self.context.layout.package();
        self.progress(stderr, format!("Packaging into {package_dir}..."));
        remove_dir_if_present(&package_dir)?;

        let packager = Packager::new(package_dir.clone(), self.context.settings.os);
        let artifacts = packager.package(
            &output_dir,
            &self.context.recipe.rules,
            self.context.options,
        )?;
        let manifest = PackageManifest::describe(
            &self.context.recipe.descriptor,
            self.context.settings,
            self.context.options,
            &package_dir,
            &artifacts,
        )
        .and_then(|manifest| manifest.write(&package_dir))?;

        self.progress(stderr, success_message(artifacts.len(), &package_dir));
        Ok(PackageReport {
            package_dir,
            artifacts,
            manifest,
        })
    }

    /// Consumer-facing metadata; recipes publish none.
    #[must_use]
    pub fn package_info(&self) -> PackageInfo {
        PackageInfo::default()
    }

    /// Run `source`, `build`, `package` and `package_info` in order,
    /// stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Returns the error of the first failing hook.
    pub fn run(&self, stderr: &mut dyn Write) -> Result<PipelineOutcome> {
        let source = self.source(stderr)?;
        let build = self.build(stderr)?;
        let package = self.package(stderr)?;
        Ok(PipelineOutcome {
            source,
            build,
            package,
            package_info: self.package_info(),
        })
    }

    fn driver(&self) -> Box<dyn BuildDriver + 'a> {
        match self.context.recipe.driver {
            DriverKind::Cmake => {
                let mut config = CMakeConfig::new(
                    self.context.layout.build(),
                    &self.context.settings.build_type,
                )
                .with_defines_from(&self.context.recipe.options);
                config.jobs = self.context.jobs;
                config.generator.clone_from(&self.context.recipe.generator);
                Box::new(CMakeDriver::new(self.executor, config))
            }
            DriverKind::Passthrough => Box::new(PassthroughDriver),
        }
    }

    /// The source directory proper, which must already exist.
    fn source_root(&self, stage: &'static str) -> Result<Utf8PathBuf> {
        let source = self.context.layout.source();
        if !source.is_dir() {
            return Err(PackagerError::MissingStageInput { stage, path: source });
        }
        Ok(fetch::content_root_of(&source))
    }

    /// Where the package hook looks for files.
    fn build_output_dir(&self) -> Result<Utf8PathBuf> {
        match self.context.recipe.driver {
            DriverKind::Passthrough => self.source_root("package"),
            DriverKind::Cmake => {
                let install = self.context.layout.install();
                if install.is_dir() {
                    Ok(install)
                } else {
                    Err(PackagerError::MissingStageInput {
                        stage: "package",
                        path: install,
                    })
                }
            }
        }
    }

    fn progress(&self, stderr: &mut dyn Write, message: impl std::fmt::Display) {
        if !self.context.quiet {
            write_stderr_line(stderr, message);
        }
    }
}

fn remove_dir_if_present(dir: &Utf8Path) -> Result<()> {
    if dir.exists() {
        debug!("clearing {dir}");
        fs::remove_dir_all(dir)?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
