//! Auxiliary artifacts rendered from templates in the checkout.
//!
//! Templates may reference `{{.Package}}`, `{{.Version}}` and
//! `{{.Description}}`; whitespace inside the braces is tolerated. Any other
//! `{{ ... }}` sequence is copied through untouched.

use crate::error::{MasonError, Result};
use crate::metadata::{ExtraArtifact, PackageDescriptor, is_plain_file_name};
use camino::{Utf8Path, Utf8PathBuf};
use log::debug;

/// Mode of executable extras.
pub const EXECUTABLE_MODE: u32 = 0o755;

/// Mode of non-executable extras.
pub const REGULAR_MODE: u32 = 0o644;

fn field_value<'a>(descriptor: &'a PackageDescriptor, field: &str) -> Option<&'a str> {
    match field {
        ".Package" => Some(&descriptor.package),
        ".Version" => Some(&descriptor.version),
        ".Description" => Some(&descriptor.description),
        _ => None,
    }
}

/// Substitute descriptor fields into `template`.
///
/// # Examples
///
/// ```
/// use mason::extras::render_template;
/// use mason::metadata::PackageDescriptor;
///
/// let descriptor = PackageDescriptor {
///     package: "acme/widget".into(),
///     version: "1.2.0".into(),
///     ..PackageDescriptor::default()
/// };
/// assert_eq!(
///     render_template("{{.Package}}@{{ .Version }} {{.Other}}", &descriptor),
///     "acme/widget@1.2.0 {{.Other}}"
/// );
/// ```
#[must_use]
pub fn render_template(template: &str, descriptor: &PackageDescriptor) -> String {
    let mut rendered = String::with_capacity(template.len());
    let mut rest = template;
    while let Some((before, after_open)) = rest.split_once("{{") {
        rendered.push_str(before);
        let Some((inner, after_close)) = after_open.split_once("}}") else {
            rendered.push_str("{{");
            rest = after_open;
            break;
        };
        match field_value(descriptor, inner.trim()) {
            Some(value) => rendered.push_str(value),
            None => {
                rendered.push_str("{{");
                rendered.push_str(inner);
                rendered.push_str("}}");
            }
        }
        rest = after_close;
    }
    rendered.push_str(rest);
    rendered
}

/// Render every extra declared by `descriptor` into `output_dir`.
///
/// Templates are read relative to `checkout`. Returns the written paths in
/// declaration order; the first failure stops rendering.
///
/// # Errors
///
/// Returns [`MasonError::FileIo`] if a template cannot be read or an output
/// cannot be written.
pub fn render_extras(
    descriptor: &PackageDescriptor,
    checkout: &Utf8Path,
    output_dir: &Utf8Path,
) -> Result<Vec<Utf8PathBuf>> {
    descriptor
        .build_info
        .extras
        .iter()
        .map(|extra| render_extra(descriptor, extra, checkout, output_dir))
        .collect()
}

fn render_extra(
    descriptor: &PackageDescriptor,
    extra: &ExtraArtifact,
    checkout: &Utf8Path,
    output_dir: &Utf8Path,
) -> Result<Utf8PathBuf> {
    let template_path = checkout.join(&extra.template);
    let template = std::fs::read_to_string(&template_path)
        .map_err(|source| MasonError::file_io("read", &template_path, source))?;
    if !is_plain_file_name(&extra.file_name) {
        return Err(MasonError::config(format!(
            "extra artifact file name `{}` must be a single file name",
            extra.file_name
        )));
    }
    let dest = output_dir.join(&extra.file_name);
    let mode = if extra.executable {
        EXECUTABLE_MODE
    } else {
        REGULAR_MODE
    };
    debug!("rendering {template_path} -> {dest} ({mode:o})");
    write_with_mode(&dest, &render_template(&template, descriptor), mode)?;
    Ok(dest)
}

fn write_with_mode(path: &Utf8Path, content: &str, mode: u32) -> Result<()> {
    std::fs::write(path, content).map_err(|source| MasonError::file_io("write", path, source))?;
    set_mode(path, mode)
}

#[cfg(unix)]
fn set_mode(path: &Utf8Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .map_err(|source| MasonError::file_io("set permissions on", path, source))
}

#[cfg(not(unix))]
fn set_mode(_path: &Utf8Path, _mode: u32) -> Result<()> {
    Ok(())
}
