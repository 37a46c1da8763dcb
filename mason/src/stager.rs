//! Moves built binaries into the caller's output directory.

use crate::error::{MasonError, Result};
use camino::{Utf8Path, Utf8PathBuf};
use log::debug;
use std::fs;
use std::io::ErrorKind;

/// Stages files into an output directory.
#[derive(Debug, Clone)]
pub struct Stager {
    output_dir: Utf8PathBuf,
}

impl Stager {
    /// Create a stager targeting `output_dir`.
    #[must_use]
    pub fn new(output_dir: Utf8PathBuf) -> Self {
        Self { output_dir }
    }

    /// The output directory.
    #[must_use]
    pub fn output_dir(&self) -> &Utf8Path {
        &self.output_dir
    }

    /// Ensure the output directory exists and is writable.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or written to.
    pub fn prepare(&self) -> Result<()> {
        fs::create_dir_all(&self.output_dir)
            .map_err(|source| MasonError::file_io("create", &self.output_dir, source))?;

        // Uniquely named and removed on drop; never clobbers a user's file.
        let probe = tempfile::Builder::new()
            .prefix(".mason-write-")
            .tempfile_in(&self.output_dir)
            .map_err(|source| MasonError::file_io("write to", &self.output_dir, source))?;
        debug!("output directory {} is writable", self.output_dir);
        drop(probe);
        Ok(())
    }

    /// Move `source` into the output directory, keeping its file name.
    ///
    /// A rename is attempted first; when it would cross filesystems the file
    /// is copied and the original removed.
    ///
    /// # Errors
    ///
    /// Returns [`MasonError::FileIo`] if the move fails.
    pub fn stage(&self, source: &Utf8Path) -> Result<Utf8PathBuf> {
        let file_name = source.file_name().ok_or_else(|| {
            MasonError::config(format!("cannot stage {source}: no file name"))
        })?;
        let dest = self.output_dir.join(file_name);
        if dest == source {
            return Ok(dest);
        }
        debug!("staging {source} -> {dest}");

        match fs::rename(source, &dest) {
            Ok(()) => Ok(dest),
            Err(e) if e.kind() == ErrorKind::CrossesDevices => {
                fs::copy(source, &dest)
                    .map_err(|err| MasonError::file_io("copy", source, err))?;
                fs::remove_file(source)
                    .map_err(|err| MasonError::file_io("remove", source, err))?;
                Ok(dest)
            }
            Err(e) => Err(MasonError::file_io("move", source, e)),
        }
    }
}
