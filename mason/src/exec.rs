//! External command execution.
//!
//! Every external collaborator (git, go, gox, gpg) is driven through the
//! [`CommandExecutor`] trait. A [`CommandSpec`] carries the program, its
//! arguments, an environment overlay and a working directory; the overlay is
//! applied to the child only, so the ambient process environment is never
//! mutated.

use crate::error::{MasonError, Result};
use camino::{Utf8Path, Utf8PathBuf};
use log::debug;
use std::collections::BTreeMap;
use std::fmt;
use std::process::{Command, Output};

/// Environment variables layered over the inherited environment of a child.
///
/// A `BTreeMap` keeps the overlay ordered so logged command lines are stable.
pub type EnvOverlay = BTreeMap<String, String>;

/// A fully specified external invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandSpec {
    /// Program name or path.
    pub program: String,
    /// Arguments passed verbatim, without shell interpretation.
    pub args: Vec<String>,
    /// Environment overlay applied on top of the inherited environment.
    pub env: EnvOverlay,
    /// Working directory for the child, or the caller's when `None`.
    pub cwd: Option<Utf8PathBuf>,
}

impl CommandSpec {
    /// Start a specification for `program` with no arguments.
    ///
    /// # Examples
    ///
    /// ```
    /// use mason::exec::CommandSpec;
    ///
    /// let spec = CommandSpec::new("go")
    ///     .args(["test", "-v", "./..."])
    ///     .env("GOPATH", "/tmp/ws/go");
    /// assert_eq!(spec.to_string(), "go test -v ./...");
    /// assert_eq!(spec.env.get("GOPATH").map(String::as_str), Some("/tmp/ws/go"));
    /// ```
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    /// Append a single argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set one overlay variable, replacing any previous value.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Merge an overlay; later values win.
    #[must_use]
    pub fn envs(mut self, overlay: &EnvOverlay) -> Self {
        self.env
            .extend(overlay.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    /// Run the command in `dir`.
    #[must_use]
    pub fn current_dir(mut self, dir: &Utf8Path) -> Self {
        self.cwd = Some(dir.to_owned());
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Abstraction for running external commands.
pub trait CommandExecutor {
    /// Runs a command and returns its captured output.
    ///
    /// A non-zero exit is *not* an error at this level; callers decide what
    /// an unsuccessful status means for them.
    ///
    /// # Errors
    ///
    /// Returns [`MasonError::Launch`] if the program cannot be spawned.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use mason::exec::{CommandExecutor, CommandSpec, SystemCommandExecutor};
    ///
    /// let executor = SystemCommandExecutor;
    /// let output = executor.run(&CommandSpec::new("git").arg("--version"))?;
    /// assert!(output.status.success());
    /// # Ok::<(), mason::error::MasonError>(())
    /// ```
    fn run(&self, command: &CommandSpec) -> Result<Output>;
}

/// Executes commands on the host system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandExecutor;

impl CommandExecutor for SystemCommandExecutor {
    fn run(&self, command: &CommandSpec) -> Result<Output> {
        debug!("running {command}");
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args).envs(&command.env);
        if let Some(dir) = &command.cwd {
            cmd.current_dir(dir.as_std_path());
        }
        cmd.output().map_err(|source| MasonError::Launch {
            program: command.program.clone(),
            source,
        })
    }
}

/// Runs `command` and converts an unsuccessful exit into
/// [`MasonError::Subprocess`] carrying the combined output.
///
/// # Errors
///
/// Returns an error if the program cannot be launched or exits non-zero.
pub fn run_checked(executor: &dyn CommandExecutor, command: &CommandSpec) -> Result<Output> {
    let output = executor.run(command)?;
    if output.status.success() {
        Ok(output)
    } else {
        Err(MasonError::Subprocess {
            command: command.to_string(),
            status: output.status,
            output: combined_output(&output),
        })
    }
}

/// Joins stdout and stderr of a finished command, trimmed.
///
/// Stdout comes first; the streams are captured separately so their
/// interleaving is not preserved.
#[must_use]
pub fn combined_output(output: &Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    match (stdout.trim(), stderr.trim()) {
        ("", err) => err.to_owned(),
        (out, "") => out.to_owned(),
        (out, err) => format!("{out}\n{err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{exit_status, failure_output, output_with};
    use rstest::rstest;

    #[test]
    fn builder_collects_args_env_and_dir() {
        let spec = CommandSpec::new("gox")
            .arg("-cgo")
            .args(["-osarch=linux/amd64", "./..."])
            .env("GOPATH", "/ws/go")
            .current_dir(Utf8Path::new("/ws/go/src/acme/widget"));

        assert_eq!(spec.program, "gox");
        assert_eq!(spec.args, vec!["-cgo", "-osarch=linux/amd64", "./..."]);
        assert_eq!(spec.env.get("GOPATH").map(String::as_str), Some("/ws/go"));
        assert_eq!(spec.cwd.as_deref(), Some(Utf8Path::new("/ws/go/src/acme/widget")));
    }

    #[test]
    fn envs_overrides_existing_keys() {
        let mut overlay = EnvOverlay::new();
        overlay.insert("CGO_ENABLED".to_owned(), "1".to_owned());
        let spec = CommandSpec::new("gox")
            .env("CGO_ENABLED", "0")
            .envs(&overlay);
        assert_eq!(spec.env.get("CGO_ENABLED").map(String::as_str), Some("1"));
    }

    #[rstest]
    #[case::stdout_only("built\n", "", "built")]
    #[case::stderr_only("", "warning: x\n", "warning: x")]
    #[case::both("ok", "warn", "ok\nwarn")]
    #[case::neither("", "", "")]
    fn combined_output_joins_streams(
        #[case] stdout: &str,
        #[case] stderr: &str,
        #[case] expected: &str,
    ) {
        let output = output_with(0, stdout, stderr);
        assert_eq!(combined_output(&output), expected);
    }

    #[test]
    fn run_checked_maps_failure_to_subprocess_error() {
        struct Failing;
        impl CommandExecutor for Failing {
            fn run(&self, _command: &CommandSpec) -> Result<Output> {
                Ok(failure_output("no Go files"))
            }
        }

        let err = run_checked(&Failing, &CommandSpec::new("go").arg("test"))
            .expect_err("non-zero exit should fail");
        match err {
            MasonError::Subprocess {
                command,
                status,
                output,
            } => {
                assert_eq!(command, "go test");
                assert_eq!(status, exit_status(1));
                assert_eq!(output, "no Go files");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn system_executor_applies_overlay_without_touching_process_env() {
        let spec = CommandSpec::new("sh")
            .args(["-c", "printf %s \"$MASON_OVERLAY_PROBE\""])
            .env("MASON_OVERLAY_PROBE", "overlay-value");

        let output = SystemCommandExecutor.run(&spec).expect("sh should run");

        assert!(output.status.success());
        assert_eq!(String::from_utf8_lossy(&output.stdout), "overlay-value");
        assert!(std::env::var_os("MASON_OVERLAY_PROBE").is_none());
    }

    #[cfg(unix)]
    #[test]
    fn system_executor_honours_working_directory() {
        let temp = tempfile::TempDir::new().expect("failed to create temp dir");
        let dir = Utf8PathBuf::try_from(temp.path().to_owned()).expect("non-UTF8 temp path");
        let expected = std::fs::canonicalize(&dir).expect("canonicalize temp dir");

        let output = SystemCommandExecutor
            .run(&CommandSpec::new("pwd").current_dir(&dir))
            .expect("pwd should run");

        let reported = String::from_utf8_lossy(&output.stdout).trim().to_owned();
        let reported = std::fs::canonicalize(reported).expect("canonicalize pwd output");
        assert_eq!(reported, expected);
    }

    #[test]
    fn system_executor_reports_launch_failure() {
        let err = SystemCommandExecutor
            .run(&CommandSpec::new("mason-definitely-not-a-real-program"))
            .expect_err("missing program should fail to launch");
        assert!(matches!(err, MasonError::Launch { program, .. } if program == "mason-definitely-not-a-real-program"));
    }
}
