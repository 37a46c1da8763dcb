//! Release pipeline orchestration.
//!
//! A run moves through a fixed sequence of stages:
//!
//! ```text
//! Init -> Checkout -> DependencySync -> Test -> Build -> Sign -> Publish -> Done
//! ```
//!
//! Checkout, dependency sync and test always run; build, sign and publish are
//! enabled by [`StageFlags`]. The first failing stage ends the run. The
//! [`PipelineResult`] accumulated so far is returned inside the
//! [`PipelineFailure`] so callers can see what was produced before the error.

use crate::builder::{BuildConfig, Builder};
use crate::error::{MasonError, Result};
use crate::exec::CommandExecutor;
use crate::extras::render_extras;
use crate::git::{checkout, ssh_url_for_package};
use crate::golang::{run_tests, sync_dependencies};
use crate::metadata::{self, PackageDescriptor};
use crate::publish::{Uploader, publish_artifacts};
use crate::signing::{Signer, SigningProfile};
use crate::stager::Stager;
use crate::user_config::UserConfig;
use crate::workspace::Workspace;
use camino::{Utf8Path, Utf8PathBuf};
use log::{info, warn};
use std::fmt;

/// Pipeline states, in execution order, plus the terminal `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Stage {
    /// Loading configuration and acquiring the workspace.
    #[default]
    Init,
    /// Cloning the package and switching branch.
    Checkout,
    /// Downloading module dependencies.
    DependencySync,
    /// Running the package's tests.
    Test,
    /// Cross-compiling, staging and rendering extras.
    Build,
    /// Signing and verifying binaries.
    Sign,
    /// Uploading artifacts.
    Publish,
    /// Every enabled stage succeeded.
    Done,
    /// A stage failed.
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::Checkout => "checkout",
            Self::DependencySync => "dependency sync",
            Self::Test => "test",
            Self::Build => "build",
            Self::Sign => "sign",
            Self::Publish => "publish",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Which optional stages run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StageFlags {
    /// Cross-compile, stage binaries and render extras.
    pub build: bool,
    /// Sign and verify the built binaries.
    pub sign: bool,
    /// Upload artifacts.
    pub publish: bool,
}

/// Everything a run needs besides the descriptor.
pub struct RunContext<'a> {
    /// Runs external programs.
    pub executor: &'a dyn CommandExecutor,
    /// Uploads published artifacts.
    pub uploader: &'a dyn Uploader,
    /// Branch to check out.
    pub branch: String,
    /// Persistent workspace, or `None` for a temporary one.
    pub workdir: Option<Utf8PathBuf>,
    /// Where binaries and extras end up.
    pub output_dir: Utf8PathBuf,
    /// Operator signing overrides.
    pub user_config: UserConfig,
    /// Log tool output at `info` instead of `debug`.
    pub verbose: bool,
}

/// What a run produced. Partially populated when a stage fails.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineResult {
    /// Final state of the run: [`Stage::Done`] or [`Stage::Failed`].
    pub state: Stage,
    /// Workspace root.
    pub workdir: Utf8PathBuf,
    /// Isolated `GOPATH`.
    pub gopath: Utf8PathBuf,
    /// Package identifier.
    pub package: String,
    /// Package version.
    pub version: String,
    /// SSH locator the package was cloned from.
    pub git_path: String,
    /// Staged binaries.
    pub binaries: Vec<Utf8PathBuf>,
    /// Rendered extra artifacts.
    pub extras: Vec<Utf8PathBuf>,
    /// Detached signatures.
    pub signatures: Vec<Utf8PathBuf>,
    /// Uploaded URLs.
    pub published: Vec<String>,
}

/// A failed run: the stage, what was produced, and the cause.
#[derive(Debug, thiserror::Error)]
#[error("{stage} stage failed")]
pub struct PipelineFailure {
    /// Stage that failed.
    pub stage: Stage,
    /// Results gathered before the failure.
    pub result: Box<PipelineResult>,
    /// The underlying error.
    #[source]
    pub source: MasonError,
}

impl PipelineFailure {
    /// A failure before any workspace existed.
    #[must_use]
    pub fn at_init(source: MasonError) -> Self {
        Self {
            stage: Stage::Init,
            result: Box::new(PipelineResult {
                state: Stage::Failed,
                ..PipelineResult::default()
            }),
            source,
        }
    }

    /// Whether the run failed before the pipeline started.
    #[must_use]
    pub fn never_started(&self) -> bool {
        self.stage == Stage::Init
    }
}

struct StageError {
    stage: Stage,
    source: MasonError,
}

fn at(stage: Stage) -> impl FnOnce(MasonError) -> StageError {
    move |source| StageError { stage, source }
}

/// Load the descriptor at `metadata_path` and run the pipeline.
///
/// # Errors
///
/// A descriptor that cannot be loaded is an [`Stage::Init`] failure;
/// otherwise see [`run_pipeline`].
pub fn run_from_metadata(
    ctx: &RunContext<'_>,
    metadata_path: &Utf8Path,
    flags: StageFlags,
) -> std::result::Result<PipelineResult, PipelineFailure> {
    let descriptor = metadata::load(metadata_path).map_err(PipelineFailure::at_init)?;
    run_pipeline(ctx, &descriptor, flags)
}

/// Run every stage for `descriptor`.
///
/// The workspace is released whether or not the run succeeds; a release
/// failure is logged and does not change the outcome.
///
/// # Errors
///
/// Returns a [`PipelineFailure`] naming the first stage that failed.
pub fn run_pipeline(
    ctx: &RunContext<'_>,
    descriptor: &PackageDescriptor,
    flags: StageFlags,
) -> std::result::Result<PipelineResult, PipelineFailure> {
    let git_path = ssh_url_for_package(&descriptor.package).map_err(PipelineFailure::at_init)?;
    let workspace =
        Workspace::acquire(ctx.workdir.as_deref()).map_err(PipelineFailure::at_init)?;

    let mut result = PipelineResult {
        state: Stage::Init,
        workdir: workspace.root().to_owned(),
        gopath: workspace.gopath().to_owned(),
        package: descriptor.package.clone(),
        version: descriptor.version.clone(),
        git_path,
        ..PipelineResult::default()
    };

    let outcome = run_stages(ctx, descriptor, flags, &workspace, &mut result);

    let root = workspace.root().to_owned();
    if let Err(err) = workspace.release() {
        warn!("failed to remove workspace {root}: {err}");
    }

    match outcome {
        Ok(()) => {
            result.state = Stage::Done;
            info!("{} {} done", result.package, result.version);
            Ok(result)
        }
        Err(StageError { stage, source }) => {
            result.state = Stage::Failed;
            Err(PipelineFailure {
                stage,
                result: Box::new(result),
                source,
            })
        }
    }
}

fn run_stages(
    ctx: &RunContext<'_>,
    descriptor: &PackageDescriptor,
    flags: StageFlags,
    workspace: &Workspace,
    result: &mut PipelineResult,
) -> std::result::Result<(), StageError> {
    let overlay = workspace.env_overlay();

    info!("stage: {}", Stage::Checkout);
    let checkout_dir = checkout(ctx.executor, workspace, &descriptor.package, &ctx.branch)
        .map_err(at(Stage::Checkout))?;

    info!("stage: {}", Stage::DependencySync);
    sync_dependencies(ctx.executor, &checkout_dir, &overlay, ctx.verbose)
        .map_err(at(Stage::DependencySync))?;

    info!("stage: {}", Stage::Test);
    run_tests(ctx.executor, &checkout_dir, &overlay, ctx.verbose).map_err(at(Stage::Test))?;

    if flags.build {
        info!("stage: {}", Stage::Build);
        let config = BuildConfig {
            checkout: checkout_dir.clone(),
            gopath: workspace.gopath().to_owned(),
            env: overlay.clone(),
            verbose: ctx.verbose,
        };
        build_stage(ctx, descriptor, config, result).map_err(at(Stage::Build))?;
    } else {
        info!("build disabled");
    }

    if flags.sign {
        info!("stage: {}", Stage::Sign);
        sign_stage(ctx, descriptor, workspace, result).map_err(at(Stage::Sign))?;
    }

    if flags.publish {
        info!("stage: {}", Stage::Publish);
        let files: Vec<&Utf8Path> = result
            .binaries
            .iter()
            .chain(&result.signatures)
            .chain(&result.extras)
            .map(Utf8PathBuf::as_path)
            .collect();
        let published =
            publish_artifacts(ctx.uploader, descriptor, &files).map_err(at(Stage::Publish))?;
        result.published = published;
    }

    Ok(())
}

fn build_stage(
    ctx: &RunContext<'_>,
    descriptor: &PackageDescriptor,
    config: BuildConfig,
    result: &mut PipelineResult,
) -> Result<()> {
    let checkout_dir = config.checkout.clone();
    let built = Builder::new(ctx.executor, config).compile(descriptor)?;

    let stager = Stager::new(ctx.output_dir.clone());
    stager.prepare()?;
    for binary in &built {
        let staged = stager.stage(binary)?;
        result.binaries.push(staged);
    }

    result.extras = render_extras(descriptor, &checkout_dir, stager.output_dir())?;
    Ok(())
}

fn sign_stage(
    ctx: &RunContext<'_>,
    descriptor: &PackageDescriptor,
    workspace: &Workspace,
    result: &mut PipelineResult,
) -> Result<()> {
    let profile = SigningProfile::resolve(&descriptor.signing, &ctx.user_config);
    let identity = profile.identity()?;
    let signer = Signer::new(ctx.executor, profile.program(), descriptor.trust_store())
        .with_env(workspace.env_overlay());

    for binary in &result.binaries {
        let signature = signer.sign(binary, identity)?;
        result.signatures.push(signature);
        if !signer.verify(binary)? {
            return Err(MasonError::SignatureRejected {
                binary: binary.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
