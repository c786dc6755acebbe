//! Whole-file persistence of the network manifest.
//!
//! The manifest is a JSON array of [`NetworkDescriptor`] objects, indented
//! with two spaces. It is always read and written in one piece.

use std::fs;
use std::io::Write;

use camino::Utf8Path;
use tempfile::Builder;

use crate::domain::NetworkDescriptor;
use crate::error::MirrorError;

pub const DEFAULT_MANIFEST_PATH: &str = "networks.json";

/// Serializes `descriptors` and replaces whatever is at `path`.
///
/// The content goes to a temp file in the same directory first and is renamed
/// into place, so readers see either the old manifest or the new one.
pub fn write(path: &Utf8Path, descriptors: &[NetworkDescriptor]) -> Result<(), MirrorError> {
    let write_err = |message: String| MirrorError::ManifestWrite {
        path: path.to_owned(),
        message,
    };

    let parent = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    fs::create_dir_all(parent.as_std_path()).map_err(|err| write_err(err.to_string()))?;

    let mut content =
        serde_json::to_vec_pretty(descriptors).map_err(|err| write_err(err.to_string()))?;
    content.push(b'\n');

    let mut temp = Builder::new()
        .prefix(".networks")
        .suffix(".json.tmp")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| write_err(err.to_string()))?;
    temp.write_all(&content)
        .map_err(|err| write_err(err.to_string()))?;
    temp.as_file()
        .sync_all()
        .map_err(|err| write_err(err.to_string()))?;
    temp.persist(path.as_std_path())
        .map_err(|err| write_err(err.to_string()))?;

    tracing::debug!(path = %path, entries = descriptors.len(), "manifest written");
    Ok(())
}

pub fn read(path: &Utf8Path) -> Result<Vec<NetworkDescriptor>, MirrorError> {
    let content = fs::read_to_string(path.as_std_path()).map_err(|err| {
        MirrorError::ManifestRead {
            path: path.to_owned(),
            message: err.to_string(),
        }
    })?;
    let descriptors: Vec<NetworkDescriptor> =
        serde_json::from_str(&content).map_err(|err| MirrorError::ManifestParse {
            path: path.to_owned(),
            message: err.to_string(),
        })?;
    tracing::debug!(path = %path, entries = descriptors.len(), "manifest read");
    Ok(descriptors)
}
