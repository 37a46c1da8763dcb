//! Directory resolution abstraction.
//!
//! The per-user configuration lives under the home directory. Resolving it
//! through a trait lets tests point the loader at a scratch directory.

use std::path::PathBuf;

/// Platform directories mason needs to know about.
#[cfg_attr(test, mockall::automock)]
pub trait BaseDirs {
    /// The current user's home directory, if one can be determined.
    fn home_dir(&self) -> Option<PathBuf>;
}

/// [`BaseDirs`] backed by the platform conventions of `directories-next`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBaseDirs;

impl BaseDirs for SystemBaseDirs {
    fn home_dir(&self) -> Option<PathBuf> {
        directories_next::BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf())
    }
}
