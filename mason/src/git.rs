//! Source checkout.
//!
//! Packages are cloned over SSH into the workspace's `GOPATH` and switched
//! to the requested branch. The package identifier doubles as the VCS
//! locator: its first path segment is the host and the rest is the
//! repository path.

use crate::error::{MasonError, Result};
use crate::exec::{CommandExecutor, CommandSpec, run_checked};
use crate::workspace::Workspace;
use camino::Utf8PathBuf;
use log::{debug, info};

/// Branch checked out when none is requested.
pub const DEFAULT_BRANCH: &str = "master";

/// Derive the SSH clone URL of `package`.
///
/// # Errors
///
/// Returns [`MasonError::Config`] when the identifier has fewer than two
/// non-empty path segments.
///
/// # Examples
///
/// ```
/// use mason::git::ssh_url_for_package;
///
/// assert_eq!(
///     ssh_url_for_package("github.com/acme/widget")?,
///     "git@github.com:acme/widget.git"
/// );
/// assert_eq!(ssh_url_for_package("acme/widget")?, "git@acme:widget.git");
/// # Ok::<(), mason::error::MasonError>(())
/// ```
pub fn ssh_url_for_package(package: &str) -> Result<String> {
    let invalid = || {
        MasonError::config(format!(
            "package `{package}` is not of the form host/path"
        ))
    };
    let (host, path) = package.trim_matches('/').split_once('/').ok_or_else(invalid)?;
    if host.is_empty() || path.split('/').any(str::is_empty) {
        return Err(invalid());
    }
    Ok(format!("git@{host}:{path}.git"))
}

/// Clone `package` into the workspace and check out `branch`.
///
/// An existing checkout (a directory already holding `.git`, as left by a
/// persistent workspace) is reused and only the branch switch runs.
///
/// # Errors
///
/// Returns an error if the URL cannot be derived, the parent directory
/// cannot be created, or either git command fails.
pub fn checkout(
    executor: &dyn CommandExecutor,
    workspace: &Workspace,
    package: &str,
    branch: &str,
) -> Result<Utf8PathBuf> {
    let url = ssh_url_for_package(package)?;
    let dir = workspace.checkout_dir(package);
    let overlay = workspace.env_overlay();

    if dir.join(".git").exists() {
        info!("reusing checkout at {dir}");
    } else {
        if let Some(parent) = dir.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|source| MasonError::file_io("create", parent, source))?;
        }
        info!("cloning {url} into {dir}");
        let clone = CommandSpec::new("git")
            .args(["clone", url.as_str(), dir.as_str()])
            .envs(&overlay);
        run_checked(executor, &clone)?;
    }

    debug!("checking out {branch}");
    let switch = CommandSpec::new("git")
        .args(["checkout", branch])
        .envs(&overlay)
        .current_dir(&dir);
    run_checked(executor, &switch)?;

    Ok(dir)
}
