//! Workspace lifecycle and the isolated Go environment.
//!
//! A [`Workspace`] is the single scratch area for a run. It holds the
//! isolated `GOPATH` that every subprocess sees and answers the path
//! questions other stages ask (where the checkout lives, where tools are
//! installed).

use crate::error::{MasonError, Result};
use crate::exec::EnvOverlay;
use camino::{Utf8Path, Utf8PathBuf};
use log::debug;
use std::fs;
use tempfile::TempDir;

/// Prefix of self-allocated workspace directories.
pub const WORKSPACE_PREFIX: &str = "mason";

/// Name of the isolated environment root beneath the workspace.
const GOPATH_DIR: &str = "go";

/// An isolated working directory and its `GOPATH`.
#[derive(Debug)]
pub struct Workspace {
    root: Utf8PathBuf,
    gopath: Utf8PathBuf,
    temp: Option<TempDir>,
}

impl Workspace {
    /// Acquire a workspace.
    ///
    /// With no explicit path (or an empty one) a uniquely named temporary
    /// directory is allocated and removed again by [`Workspace::release`].
    /// An explicit path is used verbatim, created if missing, and left in
    /// place when the run ends.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory cannot be created or the temporary
    /// directory path is not valid UTF-8.
    ///
    /// # Examples
    ///
    /// ```
    /// use mason::workspace::Workspace;
    ///
    /// let workspace = Workspace::acquire(None)?;
    /// let root = workspace.root().to_owned();
    /// assert!(workspace.gopath().join("src").is_dir());
    /// workspace.release()?;
    /// assert!(!root.exists());
    /// # Ok::<(), mason::error::MasonError>(())
    /// ```
    pub fn acquire(explicit: Option<&Utf8Path>) -> Result<Self> {
        let (root, temp) = match explicit.filter(|path| !path.as_str().is_empty()) {
            Some(path) => {
                fs::create_dir_all(path)
                    .map_err(|source| MasonError::file_io("create", path, source))?;
                (absolute_root(path)?, None)
            }
            None => {
                let temp = tempfile::Builder::new()
                    .prefix(WORKSPACE_PREFIX)
                    .tempdir()?;
                let root = Utf8PathBuf::try_from(temp.path().to_owned()).map_err(|e| {
                    MasonError::config(format!("temporary directory is not valid UTF-8: {e}"))
                })?;
                (root, Some(temp))
            }
        };

        let gopath = root.join(GOPATH_DIR);
        for sub in ["src", "bin", "pkg"] {
            let dir = gopath.join(sub);
            fs::create_dir_all(&dir).map_err(|source| MasonError::file_io("create", dir, source))?;
        }
        debug!("workspace at {root} (GOPATH={gopath})");

        Ok(Self { root, gopath, temp })
    }

    /// The workspace root.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// The isolated `GOPATH`.
    #[must_use]
    pub fn gopath(&self) -> &Utf8Path {
        &self.gopath
    }

    /// Where installed Go tools land.
    #[must_use]
    pub fn bin_dir(&self) -> Utf8PathBuf {
        self.gopath.join("bin")
    }

    /// Checkout directory of `package`, i.e. `<gopath>/src/<package>`.
    #[must_use]
    pub fn checkout_dir(&self, package: &str) -> Utf8PathBuf {
        self.gopath.join("src").join(package)
    }

    /// Environment overlay applied to every subprocess of the run.
    ///
    /// `GOBIN` is pinned as well so an operator's own setting cannot send
    /// installed tools outside the workspace.
    #[must_use]
    pub fn env_overlay(&self) -> EnvOverlay {
        EnvOverlay::from([
            ("GOPATH".to_owned(), self.gopath.to_string()),
            ("GOBIN".to_owned(), self.bin_dir().to_string()),
        ])
    }

    /// Whether the workspace was allocated by [`Workspace::acquire`] and
    /// will be removed on release.
    #[must_use]
    pub fn is_ephemeral(&self) -> bool {
        self.temp.is_some()
    }

    /// End the workspace's lifetime, removing the tree if self-allocated.
    ///
    /// # Errors
    ///
    /// Returns an error if the temporary tree cannot be removed.
    pub fn release(self) -> Result<()> {
        match self.temp {
            Some(temp) => {
                debug!("removing workspace {}", self.root);
                temp.close()
                    .map_err(|source| MasonError::file_io("remove", self.root, source))
            }
            None => Ok(()),
        }
    }
}

/// Anchor a caller-supplied root at the current directory.
///
/// Subprocesses run in other directories, so `GOPATH` and tool paths must
/// not be relative.
fn absolute_root(path: &Utf8Path) -> Result<Utf8PathBuf> {
    let absolute = std::path::absolute(path)
        .map_err(|source| MasonError::file_io("resolve", path, source))?;
    Utf8PathBuf::try_from(absolute)
        .map_err(|e| MasonError::config(format!("workspace path is not valid UTF-8: {e}")))
}
