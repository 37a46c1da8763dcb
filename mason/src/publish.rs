//! Artifact publishing.
//!
//! Every artifact is uploaded with HTTP `PUT` to
//! `<repository>/<package>/<version>/<file name>`, followed by a
//! `<file name>.sha256` companion in `sha256sum` format.

use crate::error::{MasonError, Result};
use crate::metadata::PackageDescriptor;
use camino::Utf8Path;
use log::info;
use sha2::{Digest, Sha256};
use std::sync::OnceLock;
use std::time::Duration;

/// Suffix of checksum companions.
pub const CHECKSUM_SUFFIX: &str = ".sha256";

/// Network timeout for a single upload.
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(120);

/// Errors arising from an upload.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// The server answered with a non-success status.
    #[error("{url} returned HTTP {status}")]
    Status {
        /// The URL that was requested.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The request could not be completed.
    #[error("upload to {url} failed: {reason}")]
    Transport {
        /// The URL that was requested.
        url: String,
        /// A human-readable description of the failure.
        reason: String,
    },
}

/// Uploads a request body to a URL.
///
/// Abstracted so tests can record uploads without network access.
#[cfg_attr(test, mockall::automock)]
pub trait Uploader {
    /// `PUT` `body` at `url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server rejects it.
    fn upload(&self, url: &str, body: &[u8]) -> std::result::Result<(), UploadError>;
}

/// [`Uploader`] backed by a shared `ureq` agent.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpUploader;

impl Uploader for HttpUploader {
    fn upload(&self, url: &str, body: &[u8]) -> std::result::Result<(), UploadError> {
        http_agent()
            .put(url)
            .header("Content-Type", "application/octet-stream")
            .send(body)
            .map_err(|e| map_ureq_error(url, &e))?;
        Ok(())
    }
}

fn http_agent() -> &'static ureq::Agent {
    static AGENT: OnceLock<ureq::Agent> = OnceLock::new();
    AGENT.get_or_init(|| {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(UPLOAD_TIMEOUT))
            .build();
        ureq::Agent::new_with_config(config)
    })
}

fn map_ureq_error(url: &str, err: &ureq::Error) -> UploadError {
    match err {
        ureq::Error::StatusCode(status) => UploadError::Status {
            url: url.to_owned(),
            status: *status,
        },
        other => UploadError::Transport {
            url: url.to_owned(),
            reason: other.to_string(),
        },
    }
}

/// Destination URL of `file_name` for a package release.
///
/// # Examples
///
/// ```
/// use mason::publish::artifact_url;
///
/// assert_eq!(
///     artifact_url("https://repo.acme.test/", "acme/widget", "1.0.0", "widget_linux_amd64"),
///     "https://repo.acme.test/acme/widget/1.0.0/widget_linux_amd64"
/// );
/// ```
#[must_use]
pub fn artifact_url(repository: &str, package: &str, version: &str, file_name: &str) -> String {
    format!(
        "{}/{}/{}/{file_name}",
        repository.trim_end_matches('/'),
        package.trim_matches('/'),
        version
    )
}

/// Lowercase hex SHA-256 digest of `bytes`.
///
/// # Examples
///
/// ```
/// use mason::publish::sha256_hex;
///
/// assert_eq!(
///     sha256_hex(b"abc"),
///     "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
/// );
/// ```
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Publish `files` for `descriptor`, returning the uploaded URLs in order.
///
/// # Errors
///
/// Returns [`MasonError::Config`] when no repository is configured and
/// [`MasonError::Publish`] for the first upload that fails.
pub fn publish_artifacts(
    uploader: &dyn Uploader,
    descriptor: &PackageDescriptor,
    files: &[&Utf8Path],
) -> Result<Vec<String>> {
    let repository = descriptor
        .publishing
        .repository
        .as_deref()
        .map(str::trim)
        .filter(|repo| !repo.is_empty())
        .ok_or_else(|| {
            MasonError::config("publishing requires `publishing.repository` in the descriptor")
        })?;

    let mut published = Vec::with_capacity(files.len() * 2);
    for file in files {
        let file_name = file.file_name().ok_or_else(|| MasonError::Publish {
            file: file.to_path_buf(),
            reason: "path has no file name".to_owned(),
        })?;
        let body = std::fs::read(file).map_err(|source| MasonError::file_io("read", *file, source))?;
        let checksum = format!("{}  {file_name}\n", sha256_hex(&body));

        let url = artifact_url(repository, &descriptor.package, &descriptor.version, file_name);
        let checksum_url = format!("{url}{CHECKSUM_SUFFIX}");
        info!("publishing {file} to {url}");
        for (target, payload) in [(&url, body.as_slice()), (&checksum_url, checksum.as_bytes())] {
            uploader
                .upload(target, payload)
                .map_err(|e| MasonError::Publish {
                    file: file.to_path_buf(),
                    reason: e.to_string(),
                })?;
        }
        published.push(url);
        published.push(checksum_url);
    }
    Ok(published)
}
