//! Package descriptor loading and validation.
//!
//! The descriptor (`metadata.json`) declares what to check out, which
//! platforms to build, which auxiliary files to render, and how to sign and
//! publish the results. It is read once per run and never mutated.

use crate::error::{MasonError, Result};
use crate::signing::TrustStore;
use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fixed file name of the package descriptor.
pub const METADATA_FILE_NAME: &str = "metadata.json";

/// Signing program used when the descriptor names none.
pub const DEFAULT_SIGNING_PROGRAM: &str = "gpg";

/// The declarative description of a package release.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageDescriptor {
    /// Package identifier, e.g. `github.com/acme/widget`.
    #[serde(default)]
    pub package: String,
    /// Release version.
    #[serde(default)]
    pub version: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Build matrix and auxiliary artifacts.
    #[serde(default)]
    pub build_info: BuildInfo,
    /// Signing defaults for this package.
    #[serde(default)]
    pub signing: SigningPolicy,
    /// Where artifacts are published.
    #[serde(default)]
    pub publishing: PublishingInfo,
    /// Pipeline options such as the trust store.
    #[serde(default)]
    pub options: PipelineOptions,
}

/// Build matrix and auxiliary artifacts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildInfo {
    /// Target platforms, built in order.
    #[serde(default)]
    pub targets: Vec<BuildTarget>,
    /// Files rendered from templates in the checkout.
    #[serde(default)]
    pub extras: Vec<ExtraArtifact>,
}

/// One platform of the build matrix.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildTarget {
    /// Platform identifier in `os/arch` form.
    pub name: String,
    /// Enable native-code interop for this target.
    #[serde(default)]
    pub cgo: bool,
    /// Extra environment variables for the compiler.
    #[serde(default)]
    pub flags: BTreeMap<String, String>,
}

impl BuildTarget {
    /// Split the name into `(os, arch)`, if well formed.
    #[must_use]
    pub fn os_arch(&self) -> Option<(&str, &str)> {
        let (os, arch) = self.name.split_once('/')?;
        if os.is_empty() || arch.is_empty() || arch.contains('/') {
            return None;
        }
        Some((os, arch))
    }
}

/// An auxiliary file rendered from a template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtraArtifact {
    /// Template path relative to the checkout.
    pub template: Utf8PathBuf,
    /// Output file name.
    pub file_name: String,
    /// Write with mode `0o755` instead of `0o644`.
    #[serde(default)]
    pub executable: bool,
}

/// Signing defaults declared by the package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningPolicy {
    /// Signing program; empty means [`DEFAULT_SIGNING_PROGRAM`].
    #[serde(default)]
    pub program: String,
    /// Signing identity.
    #[serde(default, rename = "email")]
    pub identity: String,
}

/// Publishing destination.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishingInfo {
    /// Base URL artifacts are uploaded under.
    #[serde(default)]
    pub repository: Option<String>,
}

/// Typed pipeline options.
///
/// Keys other than `keyring` and `trustdb` are kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineOptions {
    /// Keyring used for signing and verification.
    #[serde(default)]
    pub keyring: Option<Utf8PathBuf>,
    /// Trust database paired with `keyring`.
    #[serde(default)]
    pub trustdb: Option<Utf8PathBuf>,
    /// Unrecognised options, preserved verbatim.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl PipelineOptions {
    /// The trust store, when both halves are configured.
    #[must_use]
    pub fn trust_store(&self) -> Option<TrustStore> {
        match (&self.keyring, &self.trustdb) {
            (Some(keyring), Some(trustdb)) => Some(TrustStore {
                keyring: keyring.clone(),
                trustdb: trustdb.clone(),
            }),
            _ => None,
        }
    }
}

impl PackageDescriptor {
    /// Last path segment of the package, used as the binary name prefix.
    #[must_use]
    pub fn binary_prefix(&self) -> &str {
        self.package
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or(&self.package)
    }

    /// File name the cross compiler produces for `target`:
    /// `<prefix>_<os>_<arch>`.
    #[must_use]
    pub fn binary_name(&self, target: &BuildTarget) -> String {
        format!("{}_{}", self.binary_prefix(), target.name.replace('/', "_"))
    }

    /// The trust store declared in the options, if any.
    #[must_use]
    pub fn trust_store(&self) -> Option<TrustStore> {
        self.options.trust_store()
    }
}

/// Load and validate the descriptor at `path`.
///
/// # Errors
///
/// Returns [`MasonError::FileIo`] if the file cannot be read,
/// [`MasonError::Parse`] if it is not well-formed JSON,
/// [`MasonError::MissingField`] if the package identifier is absent or
/// empty, and [`MasonError::Config`] for invalid targets or options.
pub fn load(path: &Utf8Path) -> Result<PackageDescriptor> {
    let contents =
        std::fs::read_to_string(path).map_err(|source| MasonError::file_io("read", path, source))?;
    parse_descriptor(&contents, path)
}

/// Parse and validate descriptor text; `origin` is used in error messages.
///
/// # Errors
///
/// See [`load`].
///
/// # Examples
///
/// ```
/// use camino::Utf8Path;
/// use mason::metadata::parse_descriptor;
///
/// let json = r#"{
///     "package": "acme/widget",
///     "version": "1.0.0",
///     "buildInfo": { "targets": [{ "name": "linux/amd64" }] }
/// }"#;
/// let descriptor = parse_descriptor(json, Utf8Path::new("metadata.json"))?;
/// assert_eq!(descriptor.binary_name(&descriptor.build_info.targets[0]), "widget_linux_amd64");
/// # Ok::<(), mason::error::MasonError>(())
/// ```
pub fn parse_descriptor(contents: &str, origin: &Utf8Path) -> Result<PackageDescriptor> {
    let mut descriptor: PackageDescriptor =
        serde_json::from_str(contents).map_err(|e| MasonError::Parse {
            path: origin.to_owned(),
            reason: e.to_string(),
        })?;
    descriptor.package = descriptor.package.trim().to_owned();
    validate(&descriptor, origin)?;
    Ok(descriptor)
}

fn validate(descriptor: &PackageDescriptor, origin: &Utf8Path) -> Result<()> {
    if descriptor.package.is_empty() {
        return Err(MasonError::MissingField {
            path: origin.to_owned(),
            field: "package",
        });
    }

    if let Some(target) = descriptor
        .build_info
        .targets
        .iter()
        .find(|target| target.os_arch().is_none())
    {
        return Err(MasonError::config(format!(
            "build target `{}` is not of the form os/arch",
            target.name
        )));
    }

    if let Some(extra) = descriptor
        .build_info
        .extras
        .iter()
        .find(|extra| !is_plain_file_name(&extra.file_name))
    {
        return Err(MasonError::config(format!(
            "extra artifact file name `{}` must be a single file name",
            extra.file_name
        )));
    }

    let options = &descriptor.options;
    if options.keyring.is_some() != options.trustdb.is_some() {
        return Err(MasonError::config(
            "options.keyring and options.trustdb must be supplied together",
        ));
    }

    Ok(())
}

/// Extras are written into the output directory, so their names may not
/// carry separators or `..`.
pub(crate) fn is_plain_file_name(name: &str) -> bool {
    let mut components = Utf8Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Utf8Component::Normal(_)), None)
    ) && !name.contains(['/', '\\'])
}
