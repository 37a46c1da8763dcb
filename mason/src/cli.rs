//! CLI argument definitions for mason.
//!
//! This module defines the command-line interface using clap. It is separated
//! from the main entrypoint to keep the binary small and focused on
//! orchestration.

use crate::git::DEFAULT_BRANCH;
use crate::metadata::METADATA_FILE_NAME;
use crate::pipeline::StageFlags;
use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};

/// Test, cross-compile, sign and publish a Go package described by
/// `metadata.json`.
#[derive(Parser, Debug, Clone)]
#[command(name = "mason")]
#[command(version, about)]
#[command(long_about = concat!(
    "Test, cross-compile, sign and publish a Go package.\n\n",
    "mason reads metadata.json from the current directory, checks the package out ",
    "into an isolated GOPATH, runs its tests and then builds every target listed ",
    "under buildInfo.targets. Binaries and rendered extras land in the output ",
    "directory; signatures are written next to each binary as <binary>.asc.\n\n",
    "The signing identity comes from signing.email in metadata.json unless ",
    "~/.mason.toml sets user.email.",
))]
#[command(after_help = concat!(
    "EXAMPLES:\n",
    "  Run the package's tests in a clean GOPATH:\n",
    "    $ mason test\n\n",
    "  Build every target from the release branch:\n",
    "    $ mason build -b release\n\n",
    "  Build and sign, keeping the workspace for inspection:\n",
    "    $ mason sign -w /tmp/mason-ws\n\n",
    "  Everything except publishing:\n",
    "    $ mason run --no-publish\n",
))]
pub struct Cli {
    /// Stage to run.
    #[command(subcommand)]
    pub command: Command,

    /// Options shared by every subcommand.
    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Options shared by every subcommand.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct GlobalArgs {
    /// Show tool output and debug logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Branch to check out.
    #[arg(short, long, global = true, default_value = DEFAULT_BRANCH, value_name = "BRANCH")]
    pub branch: String,

    /// Persistent workspace directory [default: a temporary directory].
    #[arg(short, long, global = true, value_name = "DIR")]
    pub workdir: Option<Utf8PathBuf>,

    /// Package descriptor.
    #[arg(long, global = true, default_value = METADATA_FILE_NAME, value_name = "PATH")]
    pub metadata: Utf8PathBuf,

    /// Where binaries and extras are written [default: current directory].
    #[arg(long, global = true, value_name = "DIR")]
    pub output_dir: Option<Utf8PathBuf>,
}

impl Default for GlobalArgs {
    fn default() -> Self {
        Self {
            verbose: false,
            branch: DEFAULT_BRANCH.to_owned(),
            workdir: None,
            metadata: Utf8PathBuf::from(METADATA_FILE_NAME),
            output_dir: None,
        }
    }
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Check out the package and run its tests.
    Test,

    /// Test, then cross-compile every target.
    Build,

    /// Test, build, then sign and verify every binary.
    Sign,

    /// Test, build, sign, then upload artifacts.
    Publish,

    /// Every stage, with optional opt-outs.
    Run(RunArgs),
}

/// Arguments for the run command.
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct RunArgs {
    /// Skip signing.
    #[arg(long)]
    pub no_sign: bool,

    /// Skip publishing.
    #[arg(long)]
    pub no_publish: bool,
}

impl Command {
    /// Which optional stages this command enables.
    ///
    /// # Examples
    ///
    /// ```
    /// use mason::cli::{Command, RunArgs};
    ///
    /// let flags = Command::Run(RunArgs { no_sign: false, no_publish: true }).stage_flags();
    /// assert!(flags.build && flags.sign && !flags.publish);
    /// ```
    #[must_use]
    pub fn stage_flags(&self) -> StageFlags {
        match self {
            Self::Test => StageFlags::default(),
            Self::Build => StageFlags {
                build: true,
                ..StageFlags::default()
            },
            Self::Sign => StageFlags {
                build: true,
                sign: true,
                publish: false,
            },
            Self::Publish => StageFlags {
                build: true,
                sign: true,
                publish: true,
            },
            Self::Run(args) => StageFlags {
                build: true,
                sign: !args.no_sign,
                publish: !args.no_publish,
            },
        }
    }
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
