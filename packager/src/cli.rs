//! CLI argument definitions for the lightning packager.
//!
//! This module defines the command-line interface using clap. It is separated
//! from the main entrypoint to keep the binary small and focused on
//! orchestration.

use crate::options::OptionOverride;
use crate::platform::Platform;
use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};

/// Fetch, build, and package lightningcpp.
#[derive(Parser, Debug)]
#[command(name = "lightning-packager")]
#[command(version, about)]
#[command(long_about = concat!(
    "Fetch, build, and package lightningcpp.\n\n",
    "The packager runs a recipe through three stages: the source archive is ",
    "downloaded and extracted, the sources are built with CMake into an install ",
    "prefix, and copy rules gather headers into include/ and libraries into lib/.\n\n",
    "Without --recipe the built-in lightningcpp recipe is used. Each stage can be ",
    "run on its own; later stages reuse the work directory left by earlier ones.",
))]
#[command(after_help = concat!(
    "OPTIONS OF THE BUILT-IN RECIPE:\n",
    "  shared=<true|false>          Build shared instead of static libraries\n",
    "  build_tests=<true|false>     Build the test suite\n",
    "  build_samples=<true|false>   Build the samples\n\n",
    "ENVIRONMENT:\n",
    "  LIGHTNING_PACKAGER_OS, LIGHTNING_PACKAGER_ARCH, LIGHTNING_PACKAGER_BUILD_TYPE\n",
    "  and LIGHTNING_PACKAGER_COMPILER override the detected settings.\n",
    "  RUST_LOG controls log output.\n\n",
    "EXAMPLES:\n",
    "  Package the static library:\n",
    "    $ lightning-packager\n\n",
    "  Package shared libraries:\n",
    "    $ lightning-packager create -o shared=true\n\n",
    "  Re-run only the packaging stage:\n",
    "    $ lightning-packager package\n\n",
    "  Show a recipe as JSON:\n",
    "    $ lightning-packager inspect --json --recipe ./lightning.toml\n\n",
    "  Preview without fetching or building:\n",
    "    $ lightning-packager --dry-run",
))]
pub struct Cli {
    /// Subcommand to execute (defaults to `create`).
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Arguments shared by every subcommand.
    #[command(flatten)]
    pub common: CommonArgs,
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run every stage: source, build, package.
    Create,

    /// Fetch or export the sources into the work directory.
    Source,

    /// Build previously fetched sources.
    Build,

    /// Apply the copy rules to previous build output.
    Package,

    /// Describe the recipe without running it.
    Inspect(InspectArgs),
}

/// Arguments for the inspect command.
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct InspectArgs {
    /// Output in JSON format for scripting.
    #[arg(long)]
    pub json: bool,
}

/// Arguments accepted by every subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct CommonArgs {
    /// Recipe file [default: built-in lightningcpp recipe].
    #[arg(short, long, value_name = "FILE", global = true)]
    pub recipe: Option<Utf8PathBuf>,

    /// Override a build option (can be repeated).
    #[arg(short = 'o', long = "option", value_name = "NAME=VALUE", global = true)]
    pub options: Vec<OptionOverride>,

    /// Target platform [default: from LIGHTNING_PACKAGER_OS or the host].
    #[arg(long, value_name = "ID", global = true)]
    pub platform: Option<Platform>,

    /// Work directory [default: per-user cache directory].
    #[arg(short, long, value_name = "DIR", global = true)]
    pub work_dir: Option<Utf8PathBuf>,

    /// Number of parallel build jobs.
    #[arg(short, long, value_name = "N", global = true)]
    pub jobs: Option<usize>,

    /// Show configuration and exit without running any stage.
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Increase log verbosity (repeatable: -v, -vv, -vvv).
    #[arg(
        short,
        long = "verbose",
        action = clap::ArgAction::Count,
        conflicts_with = "quiet",
        global = true
    )]
    pub verbosity: u8,

    /// Suppress progress output (errors still shown).
    #[arg(short, long, conflicts_with = "verbosity", global = true)]
    pub quiet: bool,
}

impl Cli {
    /// The subcommand to run, with no subcommand meaning `create`.
    ///
    /// # Examples
    ///
    /// ```
    /// use clap::Parser;
    /// use lightning_packager::cli::{Cli, Command};
    ///
    /// let cli = Cli::parse_from(["lightning-packager"]);
    /// assert_eq!(cli.effective_command(), Command::Create);
    /// ```
    #[must_use]
    pub fn effective_command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Create)
    }
}

impl CommonArgs {
    /// The default `log` level filter for the chosen verbosity.
    ///
    /// `RUST_LOG` still takes precedence when set.
    #[must_use]
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbosity {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
