//! Caller-supplied path resolution applied after a successful load.
//!
//! A resolver inspects the fetched data and returns the relative subpath the
//! caller is interested in, or rejects the layout with
//! [`Error::InvalidPackageStructure`]. A rejection never removes fetched
//! data; a retry with a different resolver is served from the cache.

use std::path::{Component, Path};

use crate::{Error, LoadedDataMeta, Result};

/// Function selecting a subpath of interest within fetched data.
pub type PathResolver = dyn Fn(&LoadedDataMeta) -> Result<String> + Send + Sync;

/// Build a resolver that requires `dir` to exist as a directory in the
/// root of the fetched data, and selects it.
///
/// # Example
///
/// ```ignore
/// let meta = registry
///     .load_with("github://corvis/esphome-packages", &require_dir("packages"))
///     .await?;
/// ```
#[must_use]
pub fn require_dir(dir: impl Into<String>) -> impl Fn(&LoadedDataMeta) -> Result<String> + Send + Sync {
    let dir = dir.into();
    move |meta: &LoadedDataMeta| {
        if meta.path.join(&dir).is_dir() {
            Ok(dir.clone())
        } else {
            Err(structure_error(
                meta,
                format!("Folder \"{dir}\" must be present in directory root"),
            ))
        }
    }
}

/// Convenience for resolvers: an [`Error::InvalidPackageStructure`] for `meta`.
#[must_use]
pub fn structure_error(meta: &LoadedDataMeta, details: impl Into<String>) -> Error {
    Error::invalid_structure(meta.locator.raw(), &meta.path, Some(details.into()))
}

/// Run `resolver` against `meta` and store the returned subpath.
pub(crate) fn apply(meta: LoadedDataMeta, resolver: &PathResolver) -> Result<LoadedDataMeta> {
    let subpath = resolver(&meta)?;
    validate_subpath(&meta, &subpath)?;
    Ok(meta.with_subpath(subpath))
}

/// Reject subpaths that are absolute or climb out of the fetched data.
fn validate_subpath(meta: &LoadedDataMeta, subpath: &str) -> Result<()> {
    let escapes = Path::new(subpath)
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)));
    if escapes {
        return Err(structure_error(
            meta,
            format!("resolved subpath \"{subpath}\" must stay within the fetched data"),
        ));
    }
    Ok(())
}
