//! Shared test utilities for the packager crate.

use crate::executor::CommandExecutor;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::path::PathBuf;
use std::process::{ExitStatus, Output};

/// Creates an `ExitStatus` from an exit code (Unix implementation).
#[cfg(unix)]
#[must_use]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;

    ExitStatus::from_raw(code << 8)
}

/// Creates an `ExitStatus` from an exit code (Windows implementation).
#[cfg(windows)]
#[must_use]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;

    ExitStatus::from_raw(code.cast_unsigned())
}

/// Creates a successful command `Output` with empty stdout and stderr.
#[must_use]
pub fn success_output() -> Output {
    Output {
        status: exit_status(0),
        stdout: Vec::new(),
        stderr: Vec::new(),
    }
}

/// Creates a failed command `Output` with the given exit code and streams.
#[must_use]
pub fn failure_output(code: i32, stdout: &str, stderr: &str) -> Output {
    Output {
        status: exit_status(code),
        stdout: stdout.as_bytes().to_vec(),
        stderr: stderr.as_bytes().to_vec(),
    }
}

/// Represents an expected command invocation for testing.
#[derive(Debug)]
pub struct ExpectedCall {
    /// The command to execute (e.g., "cmake").
    pub cmd: String,
    /// The arguments to pass to the command.
    pub args: Vec<String>,
    /// The result to return when this command is invoked.
    pub result: io::Result<Output>,
    /// Files written when the call is replayed, standing in for tool output.
    pub creates: Vec<(PathBuf, String)>,
}

impl ExpectedCall {
    /// Expect `cmd` with `args`, answering with `result`.
    pub fn new<I, S>(cmd: &str, args: I, result: io::Result<Output>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            cmd: cmd.to_owned(),
            args: args.into_iter().map(Into::into).collect(),
            result,
            creates: Vec::new(),
        }
    }

    /// Write `contents` to `path` when the call is replayed.
    #[must_use]
    pub fn creating(mut self, path: impl Into<PathBuf>, contents: &str) -> Self {
        self.creates.push((path.into(), contents.to_owned()));
        self
    }
}

/// A stub implementation of `CommandExecutor` for testing.
///
/// Records expected command invocations and returns predefined results,
/// allowing tests to verify command execution without side effects.
#[derive(Debug)]
pub struct StubExecutor {
    expected: RefCell<VecDeque<ExpectedCall>>,
}

impl StubExecutor {
    /// Creates a new `StubExecutor` with the given expected calls.
    #[must_use]
    pub fn new(expected: Vec<ExpectedCall>) -> Self {
        Self {
            expected: RefCell::new(expected.into()),
        }
    }

    /// Asserts that all expected command invocations have been consumed.
    ///
    /// # Panics
    ///
    /// Panics if there are remaining expected calls that were not invoked.
    pub fn assert_finished(&self) {
        assert!(
            self.expected.borrow().is_empty(),
            "expected no further command invocations"
        );
    }
}

impl CommandExecutor for StubExecutor {
    fn run(&self, cmd: &str, args: &[&str]) -> io::Result<Output> {
        let call = self
            .expected
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| panic!("unexpected command invocation: {cmd} {args:?}"));

        assert_eq!(call.cmd, cmd);
        assert_eq!(call.args, args);

        for (path, contents) in &call.creates {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, contents)?;
        }
        call.result
    }
}
