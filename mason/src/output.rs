//! User-facing messages written to stderr.

use crate::pipeline::{PipelineFailure, PipelineResult};
use std::error::Error;
use std::fmt::Display;
use std::io::Write;

/// Write one line to `stderr`, ignoring write failures.
pub fn write_stderr_line(stderr: &mut dyn Write, message: impl Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Best-effort logging; ignore write failures.
    }
}

/// Render `err` and each of its sources, one per line, indented after the
/// first.
///
/// # Examples
///
/// ```
/// use mason::error::MasonError;
/// use mason::output::format_error_chain;
///
/// let err = MasonError::file_io(
///     "read",
///     "metadata.json",
///     std::io::Error::other("permission denied"),
/// );
/// assert_eq!(
///     format_error_chain(&err),
///     "failed to read metadata.json\n  caused by: permission denied"
/// );
/// ```
#[must_use]
pub fn format_error_chain(err: &dyn Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str("\n  caused by: ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Summary printed after a successful run.
#[must_use]
pub fn success_message(result: &PipelineResult) -> String {
    let mut lines = vec![format!("{} {} released", result.package, result.version)];
    lines.extend(result.binaries.iter().map(|b| format!("  binary:    {b}")));
    lines.extend(result.signatures.iter().map(|s| format!("  signature: {s}")));
    lines.extend(result.extras.iter().map(|e| format!("  extra:     {e}")));
    lines.extend(result.published.iter().map(|u| format!("  published: {u}")));
    lines.join("\n")
}

/// Report printed after a failed run.
#[must_use]
pub fn failure_message(failure: &PipelineFailure) -> String {
    let mut message = format!("error: {}", format_error_chain(failure));
    if failure.never_started() {
        message.push_str("\npipeline did not start");
    } else if !failure.result.binaries.is_empty() {
        message.push_str("\nartifacts produced before the failure were left in place:");
        for binary in &failure.result.binaries {
            message.push_str(&format!("\n  {binary}"));
        }
    }
    message
}
