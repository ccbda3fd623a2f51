//! The build stage: drive an external build system.
//!
//! [`CMakeDriver`] configures and installs a CMake project through a
//! [`CommandExecutor`]. [`PassthroughDriver`] is used by recipes whose
//! sources need no compilation; its output is the source tree itself.

use crate::executor::CommandExecutor;
use crate::options::{BuildOptions, OptionDecl, OptionValue};
use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, info};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::process::Output;
use thiserror::Error;

/// Phase of an external build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStep {
    /// Project configuration (`cmake -S ... -B ...`).
    Configure,
    /// Compilation and installation (`cmake --build ... --target install`).
    Build,
}

impl fmt::Display for BuildStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Configure => "configure",
            Self::Build => "build",
        })
    }
}

/// Errors arising from the build stage.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The build tool could not be started.
    #[error("failed to run {tool} for the {step} step: {source}")]
    Spawn {
        /// The tool that was invoked.
        tool: String,
        /// The step being run.
        step: BuildStep,
        /// The spawn failure.
        #[source]
        source: std::io::Error,
    },

    /// The build tool exited unsuccessfully.
    #[error("{step} step failed ({})\n{output}", describe_exit(.exit_code))]
    ToolFailed {
        /// The step that failed.
        step: BuildStep,
        /// Exit code, absent when the tool was killed by a signal.
        exit_code: Option<i32>,
        /// Captured stdout followed by stderr, verbatim.
        output: String,
    },

    /// The source directory to build does not exist.
    #[error("source directory {path} does not exist")]
    MissingSource {
        /// The missing directory.
        path: Utf8PathBuf,
    },

    /// A build or install directory could not be prepared.
    #[error("failed to prepare {path}: {source}")]
    Prepare {
        /// The directory being prepared.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

fn describe_exit(code: &Option<i32>) -> String {
    code.map_or_else(
        || "terminated by signal".to_owned(),
        |code| format!("exit code {code}"),
    )
}

/// Outcome of a successful build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildResult {
    /// Directory holding the files the package stage should scan.
    pub output_dir: Utf8PathBuf,
    /// Combined tool output of every step.
    pub log: String,
}

/// A build system able to turn a source tree into install artifacts.
pub trait BuildDriver {
    /// Build `source_dir` with `options`, installing into `install_prefix`.
    ///
    /// # Errors
    ///
    /// Returns a [`BuildError`] when the tool cannot be run or fails.
    fn build(
        &self,
        source_dir: &Utf8Path,
        options: &BuildOptions,
        install_prefix: &Utf8Path,
    ) -> Result<BuildResult, BuildError>;

    /// Short name for progress messages.
    fn name(&self) -> &'static str;
}

/// Runs nothing; the build output is the source directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughDriver;

impl BuildDriver for PassthroughDriver {
    fn build(
        &self,
        source_dir: &Utf8Path,
        _options: &BuildOptions,
        _install_prefix: &Utf8Path,
    ) -> Result<BuildResult, BuildError> {
        if !source_dir.is_dir() {
            return Err(BuildError::MissingSource {
                path: source_dir.to_owned(),
            });
        }
        debug!("no build step; packaging {source_dir} directly");
        Ok(BuildResult {
            output_dir: source_dir.to_owned(),
            log: String::new(),
        })
    }

    fn name(&self) -> &'static str {
        "none"
    }
}

/// Configuration for [`CMakeDriver`].
#[derive(Debug, Clone)]
pub struct CMakeConfig {
    /// Binary directory; removed before every configure.
    pub build_dir: Utf8PathBuf,
    /// Value of `CMAKE_BUILD_TYPE` and `--config`.
    pub build_type: String,
    /// Parallel job count (None for the generator default).
    pub jobs: Option<usize>,
    /// Generator passed with `-G`.
    pub generator: Option<String>,
    /// Option name to CMake cache variable.
    pub defines: BTreeMap<String, String>,
}

impl CMakeConfig {
    /// Configuration building in `build_dir` with no option defines.
    #[must_use]
    pub fn new(build_dir: Utf8PathBuf, build_type: &str) -> Self {
        Self {
            build_dir,
            build_type: build_type.to_owned(),
            jobs: None,
            generator: None,
            defines: BTreeMap::new(),
        }
    }

    /// Map every declared option that names a `define`.
    #[must_use]
    pub fn with_defines_from(mut self, decls: &[OptionDecl]) -> Self {
        self.defines.extend(decls.iter().filter_map(|decl| {
            decl.define()
                .map(|define| (decl.name().to_owned(), define.to_owned()))
        }));
        self
    }
}

/// CMake driver: configure, then build the `install` target.
pub struct CMakeDriver<'a> {
    executor: &'a dyn CommandExecutor,
    config: CMakeConfig,
}

impl<'a> CMakeDriver<'a> {
    /// Name of the CMake executable.
    pub const TOOL: &'static str = "cmake";

    /// Create a driver running commands through `executor`.
    #[must_use]
    pub fn new(executor: &'a dyn CommandExecutor, config: CMakeConfig) -> Self {
        Self { executor, config }
    }

    /// Arguments of the configure step.
    #[must_use]
    pub fn configure_args(
        &self,
        source_dir: &Utf8Path,
        options: &BuildOptions,
        install_prefix: &Utf8Path,
    ) -> Vec<String> {
        let mut args = vec![
            "-S".to_owned(),
            source_dir.to_string(),
            "-B".to_owned(),
            self.config.build_dir.to_string(),
            format!("-DCMAKE_INSTALL_PREFIX={install_prefix}"),
            format!("-DCMAKE_BUILD_TYPE={}", self.config.build_type),
        ];
        for (name, value) in options.iter() {
            if let Some(variable) = self.config.defines.get(name) {
                args.push(format!("-D{variable}={}", cmake_value(value)));
            }
        }
        if let Some(generator) = &self.config.generator {
            args.extend(["-G".to_owned(), generator.clone()]);
        }
        args
    }

    /// Arguments of the build-and-install step.
    #[must_use]
    pub fn build_args(&self) -> Vec<String> {
        let mut args = vec![
            "--build".to_owned(),
            self.config.build_dir.to_string(),
            "--target".to_owned(),
            "install".to_owned(),
            "--config".to_owned(),
            self.config.build_type.clone(),
        ];
        if let Some(jobs) = self.config.jobs {
            args.extend(["--parallel".to_owned(), jobs.to_string()]);
        }
        args
    }

    fn run_step(&self, step: BuildStep, args: &[String]) -> Result<String, BuildError> {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        info!("{step}: {} {}", Self::TOOL, args.join(" "));
        let output = self
            .executor
            .run(Self::TOOL, &args)
            .map_err(|source| BuildError::Spawn {
                tool: Self::TOOL.to_owned(),
                step,
                source,
            })?;
        let log = combined_output(&output);
        if !output.status.success() {
            return Err(BuildError::ToolFailed {
                step,
                exit_code: output.status.code(),
                output: log,
            });
        }
        debug!("{step} output:\n{log}");
        Ok(log)
    }
}

impl BuildDriver for CMakeDriver<'_> {
    fn build(
        &self,
        source_dir: &Utf8Path,
        options: &BuildOptions,
        install_prefix: &Utf8Path,
    ) -> Result<BuildResult, BuildError> {
        if !source_dir.is_dir() {
            return Err(BuildError::MissingSource {
                path: source_dir.to_owned(),
            });
        }
        reset_dir(&self.config.build_dir)?;
        reset_dir(install_prefix)?;

        let mut log = self.run_step(
            BuildStep::Configure,
            &self.configure_args(source_dir, options, install_prefix),
        )?;
        log.push_str(&self.run_step(BuildStep::Build, &self.build_args())?);

        Ok(BuildResult {
            output_dir: install_prefix.to_owned(),
            log,
        })
    }

    fn name(&self) -> &'static str {
        Self::TOOL
    }
}

/// Remove and recreate `dir` so every build starts clean.
fn reset_dir(dir: &Utf8Path) -> Result<(), BuildError> {
    let prepare = |source| BuildError::Prepare {
        path: dir.to_owned(),
        source,
    };
    if dir.exists() {
        fs::remove_dir_all(dir).map_err(prepare)?;
    }
    fs::create_dir_all(dir).map_err(prepare)
}

fn cmake_value(value: &OptionValue) -> String {
    match value {
        OptionValue::Bool(true) => "ON".to_owned(),
        OptionValue::Bool(false) => "OFF".to_owned(),
        OptionValue::Text(text) => text.clone(),
    }
}

fn combined_output(output: &Output) -> String {
    let mut log = String::from_utf8_lossy(&output.stdout).into_owned();
    log.push_str(&String::from_utf8_lossy(&output.stderr));
    log
}
