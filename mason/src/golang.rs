//! Go toolchain stages that run inside the checkout.

use crate::error::Result;
use crate::exec::{CommandExecutor, CommandSpec, EnvOverlay, run_checked};
use camino::Utf8Path;
use log::{debug, info, warn};

/// Go module manifest whose presence enables dependency sync.
const GO_MOD: &str = "go.mod";

/// Emit captured tool output at `info` when verbose, `debug` otherwise.
pub(crate) fn log_output(verbose: bool, label: &str, text: &str) {
    if text.is_empty() {
        return;
    }
    if verbose {
        info!("{label} output:\n{text}");
    } else {
        debug!("{label} output:\n{text}");
    }
}

/// Download module dependencies with `go mod download`.
///
/// Returns `false` (and spawns nothing) when the checkout has no `go.mod`.
///
/// # Errors
///
/// Returns an error if `go` cannot be launched or exits unsuccessfully.
pub fn sync_dependencies(
    executor: &dyn CommandExecutor,
    checkout: &Utf8Path,
    overlay: &EnvOverlay,
    verbose: bool,
) -> Result<bool> {
    if !checkout.join(GO_MOD).is_file() {
        warn!("no {GO_MOD} in {checkout}; skipping dependency sync");
        return Ok(false);
    }
    let spec = CommandSpec::new("go")
        .args(["mod", "download"])
        .envs(overlay)
        .current_dir(checkout);
    let output = run_checked(executor, &spec)?;
    log_output(verbose, "go mod download", &crate::exec::combined_output(&output));
    Ok(true)
}

/// Run the package's tests with `go test -v ./...`.
///
/// # Errors
///
/// Returns [`crate::error::MasonError::Subprocess`] with the test output if
/// any test fails.
pub fn run_tests(
    executor: &dyn CommandExecutor,
    checkout: &Utf8Path,
    overlay: &EnvOverlay,
    verbose: bool,
) -> Result<()> {
    info!("running tests in {checkout}");
    let spec = CommandSpec::new("go")
        .args(["test", "-v", "./..."])
        .envs(overlay)
        .current_dir(checkout);
    let output = run_checked(executor, &spec)?;
    log_output(verbose, "go test", &crate::exec::combined_output(&output));
    Ok(())
}
