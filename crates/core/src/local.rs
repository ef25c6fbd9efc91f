//! Loader for resources that already live on the local filesystem.
//!
//! `local:///abs/path` and `local://relative/path` resolve to the path
//! itself. Nothing is copied or cached; the loader only checks that the path
//! exists and reports whether it is a file or a directory.

use async_trait::async_trait;
use tracing::{debug, info};

use crate::{Error, FetchContext, LoadedDataMeta, Loader, ResourceLocator, Result};

/// Scheme served by [`LocalLoader`].
pub const LOCAL_SCHEME: &str = "local";

/// Loader for local files and directories.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalLoader;

impl LocalLoader {
    /// Create a new local loader.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Loader for LocalLoader {
    fn name(&self) -> &'static str {
        "local"
    }

    fn description(&self) -> &'static str {
        "Use a file or directory from the local filesystem"
    }

    async fn fetch(
        &self,
        locator: &ResourceLocator,
        _ctx: &FetchContext<'_>,
    ) -> Result<LoadedDataMeta> {
        let raw_path = locator.payload();
        if raw_path.is_empty() {
            return Err(Error::malformed(locator.raw(), "local locator has no path"));
        }

        info!(%locator, "Loading local resource");

        let metadata = match tokio::fs::metadata(raw_path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::not_found(
                    locator.raw(),
                    format!("path \"{raw_path}\" doesn't exist"),
                ));
            }
            Err(e) => return Err(Error::io(e, raw_path, "metadata").with_locator(locator.raw())),
        };

        if !metadata.is_file() && !metadata.is_dir() {
            return Err(Error::not_found(
                locator.raw(),
                format!("path \"{raw_path}\" must be either a file or a directory"),
            ));
        }

        let path = tokio::fs::canonicalize(raw_path)
            .await
            .map_err(|e| Error::io(e, raw_path, "canonicalize").with_locator(locator.raw()))?;
        debug!(path = %path.display(), is_file = metadata.is_file(), "Resolved local path");

        let located = locator.clone().with_field("path", raw_path);
        Ok(LoadedDataMeta::new(located, path).with_is_file(metadata.is_file()))
    }
}
