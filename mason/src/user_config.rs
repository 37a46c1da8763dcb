//! Per-operator configuration (`~/.mason.toml`).
//!
//! The file is optional. Its non-empty values override the signing defaults
//! declared by a package descriptor:
//!
//! ```toml
//! [user]
//! email = "release@acme.test"
//!
//! [signing]
//! program = "gpg2"
//! ```

use crate::dirs::BaseDirs;
use crate::error::{MasonError, Result};
use camino::{Utf8Path, Utf8PathBuf};
use log::debug;
use serde::Deserialize;

/// File name of the per-user configuration, relative to the home directory.
pub const USER_CONFIG_FILE_NAME: &str = ".mason.toml";

/// Signing overrides supplied by the operator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserConfig {
    identity: Option<String>,
    program: Option<String>,
}

impl UserConfig {
    /// Build a configuration directly, mostly for callers that already know
    /// their overrides.
    #[must_use]
    pub fn new(identity: Option<String>, program: Option<String>) -> Self {
        Self { identity, program }
    }

    /// Identity override, if set and non-empty.
    #[must_use]
    pub fn identity(&self) -> Option<&str> {
        non_empty(self.identity.as_deref())
    }

    /// Signing program override, if set and non-empty.
    #[must_use]
    pub fn program(&self) -> Option<&str> {
        non_empty(self.program.as_deref())
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[derive(Debug, Default, Deserialize)]
struct UserConfigFile {
    #[serde(default)]
    user: UserSection,
    #[serde(default)]
    signing: SigningSection,
}

#[derive(Debug, Default, Deserialize)]
struct UserSection {
    email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SigningSection {
    program: Option<String>,
}

/// Path of the per-user configuration, if a home directory is known.
///
/// # Errors
///
/// Returns [`MasonError::Config`] if the home directory is not valid UTF-8.
pub fn user_config_path(dirs: &dyn BaseDirs) -> Result<Option<Utf8PathBuf>> {
    let Some(home) = dirs.home_dir() else {
        return Ok(None);
    };
    let home = Utf8PathBuf::try_from(home)
        .map_err(|e| MasonError::config(format!("home directory is not valid UTF-8: {e}")))?;
    Ok(Some(home.join(USER_CONFIG_FILE_NAME)))
}

/// Load `~/.mason.toml`.
///
/// A missing home directory or a missing file yields an empty
/// configuration.
///
/// # Errors
///
/// Returns [`MasonError::Parse`] for a malformed file and
/// [`MasonError::FileIo`] if an existing file cannot be read.
pub fn load_user_config(dirs: &dyn BaseDirs) -> Result<UserConfig> {
    match user_config_path(dirs)? {
        Some(path) if path.is_file() => load_user_config_from(&path),
        Some(path) => {
            debug!("no user configuration at {path}");
            Ok(UserConfig::default())
        }
        None => {
            debug!("no home directory; skipping user configuration");
            Ok(UserConfig::default())
        }
    }
}

/// Load a user configuration file from an explicit path.
///
/// # Errors
///
/// See [`load_user_config`].
pub fn load_user_config_from(path: &Utf8Path) -> Result<UserConfig> {
    let contents =
        std::fs::read_to_string(path).map_err(|source| MasonError::file_io("read", path, source))?;
    let file: UserConfigFile = toml::from_str(&contents).map_err(|e| MasonError::Parse {
        path: path.to_owned(),
        reason: e.to_string(),
    })?;
    Ok(UserConfig {
        identity: file.user.email,
        program: file.signing.program,
    })
}
