//! Cross-compilation of the build matrix.
//!
//! Each [`BuildTarget`] becomes one `gox` invocation in the checkout with an
//! environment overlay of `GOPATH`, the target's flags and, for cgo targets,
//! `CGO_ENABLED=1`. Targets run in declaration order and the first failure
//! stops the matrix.

use crate::error::{MasonError, Result};
use crate::exec::{CommandExecutor, CommandSpec, EnvOverlay, combined_output, run_checked};
use crate::golang::log_output;
use crate::metadata::{BuildTarget, PackageDescriptor};
use camino::{Utf8Path, Utf8PathBuf};
use log::info;

/// Module path the cross compiler is installed from.
pub const CROSS_COMPILER_MODULE: &str = "github.com/mitchellh/gox@latest";

/// Executable name of the cross compiler inside `<gopath>/bin`.
pub const CROSS_COMPILER: &str = "gox";

/// Configuration for a build.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Checked-out package directory; compilers run here.
    pub checkout: Utf8PathBuf,
    /// The workspace `GOPATH`.
    pub gopath: Utf8PathBuf,
    /// Overlay shared by every invocation (at least `GOPATH`).
    pub env: EnvOverlay,
    /// Log compiler output at `info` instead of `debug`.
    pub verbose: bool,
}

/// Runs the cross compiler over a descriptor's target list.
pub struct Builder<'a> {
    executor: &'a dyn CommandExecutor,
    config: BuildConfig,
}

impl<'a> Builder<'a> {
    /// Create a builder.
    #[must_use]
    pub fn new(executor: &'a dyn CommandExecutor, config: BuildConfig) -> Self {
        Self { executor, config }
    }

    fn bin_dir(&self) -> Utf8PathBuf {
        self.config.gopath.join("bin")
    }

    /// Path of the cross compiler inside the workspace.
    #[must_use]
    pub fn cross_compiler_path(&self) -> Utf8PathBuf {
        self.bin_dir().join(CROSS_COMPILER)
    }

    /// Install the cross compiler unless it is already present.
    ///
    /// `GOBIN` is pinned to `<gopath>/bin` so the tool lands where
    /// [`Builder::cross_compiler_path`] looks for it.
    ///
    /// # Errors
    ///
    /// Returns an error if `go install` fails.
    pub fn ensure_cross_compiler(&self) -> Result<Utf8PathBuf> {
        let gox = self.cross_compiler_path();
        if gox.is_file() {
            return Ok(gox);
        }
        info!("installing {CROSS_COMPILER_MODULE}");
        let spec = CommandSpec::new("go")
            .args(["install", CROSS_COMPILER_MODULE])
            .envs(&self.config.env)
            .env("GOBIN", self.bin_dir().as_str())
            .current_dir(&self.config.gopath);
        run_checked(self.executor, &spec)?;
        Ok(gox)
    }

    /// The overlay used for `target`.
    #[must_use]
    pub fn target_env(&self, target: &BuildTarget) -> EnvOverlay {
        let mut env = self.config.env.clone();
        env.extend(target.flags.iter().map(|(k, v)| (k.clone(), v.clone())));
        if target.cgo {
            env.insert("CGO_ENABLED".to_owned(), "1".to_owned());
        }
        env
    }

    /// Compile a single target.
    ///
    /// # Errors
    ///
    /// Returns [`MasonError::Subprocess`] with the compiler output on failure.
    pub fn build_target(&self, gox: &Utf8Path, target: &BuildTarget) -> Result<()> {
        info!("building {}", target.name);
        let mut spec = CommandSpec::new(gox.as_str());
        if target.cgo {
            spec = spec.arg("-cgo");
        }
        let spec = spec
            .arg(format!("-osarch={}", target.name))
            .arg("./...")
            .envs(&self.target_env(target))
            .current_dir(&self.config.checkout);
        let output = run_checked(self.executor, &spec)?;
        log_output(self.config.verbose, &target.name, &combined_output(&output));
        Ok(())
    }

    /// Build every target and return the produced binaries in the checkout.
    ///
    /// # Errors
    ///
    /// Returns the first compiler failure, or [`MasonError::PartialBuild`]
    /// naming the first expected binary that is missing after all targets
    /// reported success.
    pub fn compile(&self, descriptor: &PackageDescriptor) -> Result<Vec<Utf8PathBuf>> {
        let targets = &descriptor.build_info.targets;
        if targets.is_empty() {
            info!("no build targets declared");
            return Ok(Vec::new());
        }

        let gox = self.ensure_cross_compiler()?;
        for target in targets {
            self.build_target(&gox, target)?;
        }

        targets
            .iter()
            .map(|target| {
                let binary = self.config.checkout.join(descriptor.binary_name(target));
                if binary.is_file() {
                    Ok(binary)
                } else {
                    Err(MasonError::PartialBuild { binary })
                }
            })
            .collect()
    }
}

#[cfg(test)]
#[path = "builder_tests.rs"]
mod tests;
