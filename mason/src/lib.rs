//! mason release pipeline library.
//!
//! This crate checks a Go package out into an isolated `GOPATH`, runs its
//! tests, cross-compiles a matrix of binaries, renders auxiliary files,
//! signs and verifies the binaries, and optionally publishes everything. It
//! is used by the `mason` CLI binary and can be driven programmatically for
//! testing.
//!
//! # Modules
//!
//! - [`builder`] - Cross-compilation of the build matrix
//! - [`cli`] - Command-line argument definitions
//! - [`dirs`] - Directory resolution abstraction for the home directory
//! - [`error`] - Semantic error types
//! - [`exec`] - External command execution with environment overlays
//! - [`extras`] - Template rendering for auxiliary artifacts
//! - [`git`] - Source checkout
//! - [`golang`] - Dependency sync and test stages
//! - [`metadata`] - Package descriptor loading and validation
//! - [`output`] - User-facing stderr messages
//! - [`pipeline`] - Stage orchestration
//! - [`publish`] - Artifact upload with checksums
//! - [`signing`] - Signature production and verification
//! - [`stager`] - Moving binaries into the output directory
//! - [`user_config`] - Per-operator configuration
//! - [`workspace`] - Workspace lifecycle and the isolated `GOPATH`

pub mod builder;
pub mod cli;
pub mod dirs;
pub mod error;
pub mod exec;
pub mod extras;
pub mod git;
pub mod golang;
pub mod metadata;
pub mod output;
pub mod pipeline;
pub mod publish;
pub mod signing;
pub mod stager;
pub mod user_config;
pub mod workspace;

#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
