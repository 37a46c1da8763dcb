//! Test support utilities for mason behavioural tests.
//!
//! Provides UTF-8 scratch directories, a scripted stand-in for the signing
//! program, and an uploader that records instead of sending.

use camino::{Utf8Path, Utf8PathBuf};
use mason::publish::{UploadError, Uploader};
use std::cell::RefCell;
use tempfile::TempDir;

/// A temporary directory with a UTF-8 path.
pub struct Scratch {
    _temp: TempDir,
    pub path: Utf8PathBuf,
}

/// Creates a fresh [`Scratch`] directory.
pub fn scratch() -> Scratch {
    let temp = TempDir::new().expect("failed to create temp dir");
    let path = Utf8PathBuf::try_from(temp.path().to_owned()).expect("non-UTF8 temp path");
    Scratch { _temp: temp, path }
}

/// Shell script standing in for `gpg`.
///
/// Signing writes `<file>.asc` holding the identity and the keyring in use
/// (`default` without `--keyring`). Verification succeeds only when the
/// keyring recorded in the signature matches the one supplied.
#[cfg(unix)]
const FAKE_SIGNER: &str = r#"#!/bin/sh
keyring=default
while [ $# -gt 0 ]; do
  case "$1" in
    --keyring) keyring="$2"; shift 2 ;;
    --trustdb) shift 2 ;;
    --no-default-keyring) shift ;;
    -bau)
      printf '%s\n%s\n' "$2" "$keyring" > "$3.asc"
      exit 0 ;;
    --verify)
      [ "$(tail -n 1 "$2")" = "$keyring" ]
      exit $? ;;
    *) echo "unexpected argument: $1" >&2; exit 2 ;;
  esac
done
exit 2
"#;

/// Writes the fake signer into `dir` and returns its path.
#[cfg(unix)]
pub fn write_fake_signer(dir: &Utf8Path) -> Utf8PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("fake-gpg");
    std::fs::write(&path, FAKE_SIGNER).expect("failed to write fake signer");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("failed to mark fake signer executable");
    path
}

/// Uploader that records every request and always succeeds.
#[derive(Default)]
pub struct RecordingUploader {
    pub uploads: RefCell<Vec<(String, Vec<u8>)>>,
}

impl Uploader for RecordingUploader {
    fn upload(&self, url: &str, body: &[u8]) -> Result<(), UploadError> {
        self.uploads
            .borrow_mut()
            .push((url.to_owned(), body.to_vec()));
        Ok(())
    }
}
