//! mason CLI entrypoint.
//!
//! Runs the release pipeline for the package described by `metadata.json`
//! and reports the outcome on stderr.

use camino::Utf8PathBuf;
use clap::Parser;
use mason::cli::Cli;
use mason::dirs::SystemBaseDirs;
use mason::error::MasonError;
use mason::exec::SystemCommandExecutor;
use mason::output::{failure_message, success_message, write_stderr_line};
use mason::pipeline::{PipelineFailure, PipelineResult, RunContext, run_from_metadata};
use mason::publish::HttpUploader;
use mason::user_config::load_user_config;
use std::io::Write;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    init_logging(cli.global.verbose);
    let mut stderr = std::io::stderr();
    let run_result = run(&cli);
    let exit_code = exit_code_for_run_result(run_result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

/// Install the stderr log subscriber; `RUST_LOG` overrides the default level.
fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    if tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .is_err()
    {
        // A subscriber is already installed; keep it.
    }
}

fn run(cli: &Cli) -> Result<PipelineResult, PipelineFailure> {
    let user_config = load_user_config(&SystemBaseDirs).map_err(PipelineFailure::at_init)?;
    let output_dir = match &cli.global.output_dir {
        Some(dir) => dir.clone(),
        None => current_dir_utf8().map_err(PipelineFailure::at_init)?,
    };

    let executor = SystemCommandExecutor;
    let uploader = HttpUploader;
    let ctx = RunContext {
        executor: &executor,
        uploader: &uploader,
        branch: cli.global.branch.clone(),
        workdir: cli.global.workdir.clone(),
        output_dir,
        user_config,
        verbose: cli.global.verbose,
    };

    run_from_metadata(&ctx, &cli.global.metadata, cli.command.stage_flags())
}

fn current_dir_utf8() -> Result<Utf8PathBuf, MasonError> {
    let cwd = std::env::current_dir()?;
    Utf8PathBuf::try_from(cwd)
        .map_err(|e| MasonError::config(format!("current directory is not valid UTF-8: {e}")))
}

fn exit_code_for_run_result(
    result: Result<PipelineResult, PipelineFailure>,
    stderr: &mut dyn Write,
) -> i32 {
    match result {
        Ok(result) => {
            write_stderr_line(stderr, success_message(&result));
            0
        }
        Err(failure) => {
            write_stderr_line(stderr, failure_message(&failure));
            1
        }
    }
}
