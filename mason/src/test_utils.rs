//! Shared test utilities for the mason crate.
//!
//! [`StubExecutor`] replays a scripted sequence of [`ExpectedCall`]s. Each
//! call can also simulate the files the real tool would leave behind, so a
//! pipeline run against the stub sees the same on-disk state it would after
//! a real `git clone` or `gox` invocation.

use crate::error::{MasonError, Result};
use crate::exec::{CommandExecutor, CommandSpec};
use camino::Utf8PathBuf;
use std::cell::RefCell;
use std::collections::VecDeque;
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

/// Creates a command `Output` with the given exit code and streams.
#[must_use]
pub fn output_with(code: i32, stdout: &str, stderr: &str) -> Output {
    Output {
        status: exit_status(code),
        stdout: stdout.as_bytes().to_vec(),
        stderr: stderr.as_bytes().to_vec(),
    }
}

/// Creates a successful command `Output` with empty stdout and stderr.
#[must_use]
pub fn success_output() -> Output {
    output_with(0, "", "")
}

/// Creates a failed command `Output` with the given stderr message.
#[must_use]
pub fn failure_output(stderr: &str) -> Output {
    output_with(1, "", stderr)
}

/// Represents an expected command invocation for testing.
#[derive(Debug)]
pub struct ExpectedCall {
    /// The program expected (e.g., "git").
    pub program: String,
    /// The exact arguments expected.
    pub args: Vec<String>,
    /// Accept any arguments (for paths a test cannot know up front).
    pub any_args: bool,
    /// Overlay entries that must be present with these values.
    pub env: Vec<(String, String)>,
    /// Expected working directory, when the test cares.
    pub cwd: Option<Utf8PathBuf>,
    /// Files created when the call reports success.
    pub creates: Vec<Utf8PathBuf>,
    /// The result to return when this command is invoked.
    pub result: Result<Output>,
}

impl ExpectedCall {
    /// Expect `program` with exactly `args`, succeeding with empty output.
    #[must_use]
    pub fn new<I, S>(program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_owned(),
            args: args.into_iter().map(Into::into).collect(),
            any_args: false,
            env: Vec::new(),
            cwd: None,
            creates: Vec::new(),
            result: Ok(success_output()),
        }
    }

    /// Expect `program` with whatever arguments it is given.
    #[must_use]
    pub fn any_args(program: &str) -> Self {
        Self {
            any_args: true,
            ..Self::new(program, Vec::<String>::new())
        }
    }

    /// Require an overlay entry.
    #[must_use]
    pub fn with_env(mut self, key: &str, value: impl Into<String>) -> Self {
        self.env.push((key.to_owned(), value.into()));
        self
    }

    /// Require the working directory.
    #[must_use]
    pub fn in_dir(mut self, dir: impl Into<Utf8PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Create `path` (and its parents) when the call succeeds.
    #[must_use]
    pub fn creating(mut self, path: impl Into<Utf8PathBuf>) -> Self {
        self.creates.push(path.into());
        self
    }

    /// Return `result` instead of a plain success.
    #[must_use]
    pub fn returning(mut self, result: Result<Output>) -> Self {
        self.result = result;
        self
    }
}

/// A stub implementation of `CommandExecutor` for testing.
///
/// Records every invocation and returns predefined results, allowing tests
/// to verify command sequences without spawning processes. A call that does
/// not match the next expectation yields [`MasonError::StubMismatch`].
#[derive(Debug)]
pub struct StubExecutor {
    expected: RefCell<VecDeque<ExpectedCall>>,
    calls: RefCell<Vec<CommandSpec>>,
}

impl StubExecutor {
    /// Creates a new `StubExecutor` with the given expected calls.
    #[must_use]
    pub fn new(expected: Vec<ExpectedCall>) -> Self {
        Self {
            expected: RefCell::new(expected.into()),
            calls: RefCell::new(Vec::new()),
        }
    }

    /// Every invocation received so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.borrow().clone()
    }

    /// Asserts that all expected command invocations have been consumed.
    ///
    /// # Panics
    ///
    /// Panics if there are remaining expected calls that were not invoked.
    pub fn assert_finished(&self) {
        let remaining = self.expected.borrow();
        assert!(
            remaining.is_empty(),
            "expected no further command invocations, {} remaining: {:?}",
            remaining.len(),
            remaining.iter().map(|c| &c.program).collect::<Vec<_>>()
        );
    }
}

fn mismatch(message: String) -> MasonError {
    MasonError::StubMismatch { message }
}

fn check_call(call: &ExpectedCall, command: &CommandSpec) -> Result<()> {
    if call.program != command.program || (!call.any_args && call.args != command.args) {
        return Err(mismatch(format!(
            "expected `{} {}`, got `{command}`",
            call.program,
            call.args.join(" ")
        )));
    }
    for (key, value) in &call.env {
        if command.env.get(key) != Some(value) {
            return Err(mismatch(format!(
                "`{command}` expected {key}={value} in overlay, got {:?}",
                command.env.get(key)
            )));
        }
    }
    if let Some(dir) = &call.cwd
        && command.cwd.as_ref() != Some(dir)
    {
        return Err(mismatch(format!(
            "`{command}` expected to run in {dir}, got {:?}",
            command.cwd
        )));
    }
    Ok(())
}

fn create_files(paths: &[Utf8PathBuf]) -> Result<()> {
    for path in paths {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|source| MasonError::file_io("create", parent, source))?;
        }
        std::fs::write(path, b"stub artefact")
            .map_err(|source| MasonError::file_io("write", path, source))?;
    }
    Ok(())
}

impl CommandExecutor for StubExecutor {
    fn run(&self, command: &CommandSpec) -> Result<Output> {
        self.calls.borrow_mut().push(command.clone());
        let call = self
            .expected
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| mismatch(format!("unexpected command invocation `{command}`")))?;

        check_call(&call, command)?;

        let output = call.result?;
        if output.status.success() {
            create_files(&call.creates)?;
        }
        Ok(output)
    }
}
