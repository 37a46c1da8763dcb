//! Error types for the mason release pipeline.
//!
//! This module defines semantic error variants for every stage of a run. Each
//! variant carries enough context (paths, program names, captured output) for
//! the top-level caller to print an actionable message without re-running
//! anything.

use camino::Utf8PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

/// Errors that can occur while loading configuration or running a stage.
#[derive(Debug, Error)]
pub enum MasonError {
    /// A descriptor or user configuration value is invalid.
    #[error("invalid configuration: {reason}")]
    Config {
        /// Description of the invalid value.
        reason: String,
    },

    /// A configuration file is not well-formed structured text.
    #[error("failed to parse {path}: {reason}")]
    Parse {
        /// Path of the file that failed to parse.
        path: Utf8PathBuf,
        /// Description of the parse error.
        reason: String,
    },

    /// A required descriptor field is absent or empty.
    #[error("{path} is missing required field `{field}`")]
    MissingField {
        /// Path of the descriptor.
        path: Utf8PathBuf,
        /// Name of the missing field as it appears in the file.
        field: &'static str,
    },

    /// No signing identity could be resolved from the descriptor or the
    /// per-user configuration.
    #[error(
        "cannot sign without a signing identity; set `signing.email` in metadata.json \
         or `user.email` in ~/.mason.toml"
    )]
    Resolution,

    /// An external program could not be launched.
    #[error("failed to launch {program}")]
    Launch {
        /// The program that failed to start.
        program: String,
        /// The underlying spawn error.
        #[source]
        source: std::io::Error,
    },

    /// An external program exited unsuccessfully.
    #[error("{command} failed ({status}): {output}")]
    Subprocess {
        /// The rendered command line.
        command: String,
        /// Exit status reported by the program.
        status: ExitStatus,
        /// Combined captured output of the program.
        output: String,
    },

    /// A file operation on a template, artifact or binary failed.
    #[error("failed to {operation} {path}")]
    FileIo {
        /// The operation being attempted (read, write, rename, ...).
        operation: &'static str,
        /// The path involved.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The cross compiler reported success but an expected binary is absent.
    #[error("cross compiler reported success but {binary} was not produced")]
    PartialBuild {
        /// The binary that was expected on disk.
        binary: Utf8PathBuf,
    },

    /// A freshly produced signature did not verify.
    #[error("signature verification failed for {binary}")]
    SignatureRejected {
        /// The binary whose signature was rejected.
        binary: Utf8PathBuf,
    },

    /// Uploading an artifact to the publishing repository failed.
    #[error("failed to publish {file}: {reason}")]
    Publish {
        /// The local file being published.
        file: Utf8PathBuf,
        /// Description of the failure.
        reason: String,
    },

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Test stub received an unexpected or mismatched command invocation.
    #[cfg(any(test, feature = "test-support"))]
    #[error("stub mismatch: {message}")]
    StubMismatch {
        /// Description of what was expected versus what was received.
        message: String,
    },
}

impl MasonError {
    /// Build a [`MasonError::FileIo`] for the given operation and path.
    pub fn file_io(
        operation: &'static str,
        path: impl Into<Utf8PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::FileIo {
            operation,
            path: path.into(),
            source,
        }
    }

    /// Build a [`MasonError::Config`] from any displayable reason.
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }
}

/// Result type alias using [`MasonError`].
pub type Result<T> = std::result::Result<T, MasonError>;
