//! Archive URL loader for clirack.
//!
//! Serves `https://` and `http://` locators. Zip, tar.gz and tar downloads
//! are unpacked into a directory; anything else is stored as a single file.
//!
//! A URL by itself says nothing about whether its content changed, so
//! unpinned locators are downloaded on every load. Appending
//! `#sha256=<hex>` marks the content as immutable: the download is verified
//! against the digest and later loads are served from the cache.
//!
//! ```text
//! https://example.com/templates-1.4.tar.gz
//! https://example.com/templates-1.4.tar.gz#sha256=9f86d081...
//! ```

mod source;

pub use source::{SHA256_FRAGMENT, UrlSource};

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, StatusCode, Url};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, info};

use clirack_core::{
    ArchiveKind, Error, FetchContext, LoadedDataMeta, Loader, LoaderRegistry, ResourceLocator,
    Result, Staging, unpack,
};

/// Schemes served by [`UrlLoader`].
pub const URL_SCHEMES: [&str; 2] = ["https", "http"];

const USER_AGENT: &str = concat!("clirack/", env!("CARGO_PKG_VERSION"));

/// Register one shared [`UrlLoader`] for `https://` and `http://`.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be built or the registry
/// rejects a scheme.
pub fn register(registry: &mut LoaderRegistry) -> Result<()> {
    let loader: Arc<dyn Loader> = Arc::new(UrlLoader::new()?);
    for scheme in URL_SCHEMES {
        registry.register_arc(scheme, Arc::clone(&loader))?;
    }
    Ok(())
}

/// Loader for archives and files behind plain URLs.
#[derive(Debug, Clone)]
pub struct UrlLoader {
    client: Client,
}

impl UrlLoader {
    /// Create a loader with its own HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the HTTP client cannot be built.
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::configuration(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }

    async fn download(&self, url: &Url, locator: &str) -> Result<Bytes> {
        debug!(%url, "Downloading");
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| Error::remote_unavailable_from(locator, "download request failed", e))?;

        let status = response.status();
        if !status.is_success() {
            let message = format!("download failed: server answered {status}");
            return Err(match status {
                StatusCode::NOT_FOUND | StatusCode::GONE => Error::not_found(locator, message),
                _ => Error::remote_unavailable(locator, message),
            });
        }

        response
            .bytes()
            .await
            .map_err(|e| Error::remote_unavailable_from(locator, "failed to read download", e))
    }
}

#[async_trait]
impl Loader for UrlLoader {
    fn name(&self) -> &'static str {
        "url"
    }

    fn description(&self) -> &'static str {
        "Download a file or archive over HTTP(S), pinned with #sha256=<hex>"
    }

    async fn fetch(
        &self,
        locator: &ResourceLocator,
        ctx: &FetchContext<'_>,
    ) -> Result<LoadedDataMeta> {
        let raw = locator.raw();
        let source = UrlSource::parse(locator)?;
        let located = source.annotate(locator);
        let dest = ctx.resource_dir(&source.dir_name());

        let dir_lock = ctx.lock_dir(&dest);
        let _writing = dir_lock.acquire().await;

        if let Some(pinned) = &source.pinned_sha256
            && !ctx.force_reload
            && let Some(entry) = ctx.cache.lookup(raw).await?
            && &entry.resolved_ref == pinned
            && entry.path.starts_with(&dest)
            && entry.is_materialized()
        {
            debug!(path = %entry.path.display(), "Pinned content already present");
            let is_file = entry.path.is_file();
            return Ok(LoadedDataMeta::new(located, entry.path)
                .with_resolved_ref(pinned)
                .with_from_cache(true)
                .with_is_file(is_file)
                .with_fetched_at(entry.fetched_at));
        }

        info!(url = %source.url, "Downloading resource");
        let data = ctx
            .remote_call(raw, || self.download(&source.url, raw))
            .await?;

        let actual = format!("{:x}", Sha256::digest(&data));
        if let Some(expected) = &source.pinned_sha256
            && expected != &actual
        {
            return Err(Error::ChecksumMismatch {
                locator: raw.to_string(),
                expected: expected.clone(),
                actual,
            });
        }

        let staging = Staging::new(&dest)?;
        let kind = ArchiveKind::detect(&source.file_name, &data);
        match kind {
            Some(kind) => unpack(kind, &data, staging.path(), false, raw)?,
            None => {
                let file = staging.path().join(&source.file_name);
                std::fs::write(&file, &data).map_err(|e| Error::io(e, &file, "write"))?;
            }
        }
        let dir = staging.commit()?;

        let (path, is_file) = match kind {
            Some(_) => (dir, false),
            None => (dir.join(&source.file_name), true),
        };
        let entry = ctx.cache.record(raw, &path, &actual).await?;

        info!(path = %path.display(), is_file, "Resource materialized");
        Ok(LoadedDataMeta::new(located, path)
            .with_resolved_ref(actual)
            .with_is_file(is_file)
            .with_fetched_at(entry.fetched_at))
    }
}
