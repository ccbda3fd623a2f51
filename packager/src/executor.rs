//! External command execution.
//!
//! Build drivers never spawn processes directly; they go through
//! [`CommandExecutor`] so tests can replay canned outputs.

use log::debug;
use std::io;
use std::process::{Command, Output};

/// Abstraction for running external commands.
pub trait CommandExecutor {
    /// Runs a command with arguments and returns the captured output.
    ///
    /// # Errors
    ///
    /// Returns any I/O errors encountered while spawning or running the command.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use lightning_packager::executor::{CommandExecutor, SystemCommandExecutor};
    ///
    /// let executor = SystemCommandExecutor;
    /// let output = executor.run("cmake", &["--version"])?;
    /// assert!(output.status.success());
    /// # Ok::<(), std::io::Error>(())
    /// ```
    fn run(&self, cmd: &str, args: &[&str]) -> io::Result<Output>;
}

/// Executes commands on the host system, capturing stdout and stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandExecutor;

impl CommandExecutor for SystemCommandExecutor {
    fn run(&self, cmd: &str, args: &[&str]) -> io::Result<Output> {
        debug!("running {cmd} {}", args.join(" "));
        Command::new(cmd).args(args).output()
    }
}
