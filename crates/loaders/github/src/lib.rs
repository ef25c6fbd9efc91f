//! GitHub repository loader for clirack.
//!
//! Serves `github://owner/repo[@ref][/subpath]` locators. A load resolves
//! the ref to a commit SHA with one lightweight API call and downloads the
//! repository only when that SHA differs from what the cache index recorded:
//!
//! 1. Decode the locator and compute `{owner}-{repo}-{hash8}` under the
//!    target directory
//! 2. Resolve the ref (default branch when absent) to a commit SHA
//! 3. Take the directory's write lock, then serve from cache when the
//!    recorded SHA matches and the directory is still populated
//! 4. Otherwise download the zipball, unpack it into a staging directory,
//!    swap it into place and record the new SHA
//!
//! # Example
//!
//! ```ignore
//! let mut registry = LoaderRegistry::with_builtin_loaders(LoaderConfig::from_env()?);
//! clirack_loader_github::register(&mut registry)?;
//! let meta = registry.load("github://corvis/esphome-packages@v1.2.0").await?;
//! ```

mod api;
mod host;
mod repo;

pub use api::{API_URL_ENV, DEFAULT_API_URL, GitHubApi, TOKEN_ENV_VARS};
pub use host::RepositoryHost;
pub use repo::GitHubRepo;

use async_trait::async_trait;
use clirack_core::{
    ArchiveKind, FetchContext, LoadedDataMeta, Loader, LoaderRegistry, ResourceLocator, Result,
    Staging, unpack,
};
use tracing::{debug, info};

/// Scheme served by [`GitHubLoader`].
pub const GITHUB_SCHEME: &str = "github";

/// Register a [`GitHubLoader`] configured from the environment for
/// `github://`.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be built or the registry
/// rejects the scheme.
pub fn register(registry: &mut LoaderRegistry) -> Result<()> {
    registry.register(GITHUB_SCHEME, GitHubLoader::from_env()?)
}

/// Loader for GitHub repositories.
pub struct GitHubLoader<H = GitHubApi> {
    host: H,
}

impl GitHubLoader<GitHubApi> {
    /// Loader talking to the API configured in the environment.
    ///
    /// # Errors
    ///
    /// See [`GitHubApi::from_env`].
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(GitHubApi::from_env()?))
    }
}

impl<H: RepositoryHost> GitHubLoader<H> {
    /// Loader using the given repository host.
    #[must_use]
    pub fn new(host: H) -> Self {
        Self { host }
    }

    /// The repository host.
    #[must_use]
    pub fn host(&self) -> &H {
        &self.host
    }
}

impl<H> std::fmt::Debug for GitHubLoader<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubLoader").finish_non_exhaustive()
    }
}

#[async_trait]
impl<H: RepositoryHost> Loader for GitHubLoader<H> {
    fn name(&self) -> &'static str {
        "github"
    }

    fn description(&self) -> &'static str {
        "Fetch a GitHub repository at a branch, tag or commit"
    }

    async fn fetch(
        &self,
        locator: &ResourceLocator,
        ctx: &FetchContext<'_>,
    ) -> Result<LoadedDataMeta> {
        let raw = locator.raw();
        let repo = GitHubRepo::parse(locator)?;
        let located = repo.annotate(locator);
        let dest = ctx.resource_dir(&repo.dir_name());

        let sha = ctx
            .remote_call(raw, || self.host.resolve_ref(&repo, raw))
            .await?;
        debug!(repo = %repo.full_name(), reference = repo.reference_or_head(), %sha, "Resolved ref");

        let dir_lock = ctx.lock_dir(&dest);
        let _writing = dir_lock.acquire().await;

        if ctx.force_reload {
            debug!("Force reload requested, skipping freshness check");
        } else if let Some(entry) = ctx.cache.lookup(raw).await? {
            if entry.resolved_ref == sha && entry.path == dest && entry.is_materialized() {
                debug!(path = %dest.display(), "Repository is up to date");
                return Ok(with_subpath(
                    LoadedDataMeta::new(located, dest)
                        .with_resolved_ref(sha)
                        .with_from_cache(true)
                        .with_fetched_at(entry.fetched_at),
                    &repo,
                ));
            }
            debug!(cached = %entry.resolved_ref, upstream = %sha, "Cached copy is stale");
        }

        info!(repo = %repo.full_name(), %sha, "Downloading repository");
        let archive = ctx
            .remote_call(raw, || self.host.download_archive(&repo, &sha, raw))
            .await?;

        let staging = Staging::new(&dest)?;
        unpack(ArchiveKind::Zip, &archive, staging.path(), true, raw)?;
        let path = staging.commit()?;
        let entry = ctx.cache.record(raw, &path, &sha).await?;

        info!(path = %path.display(), "Repository materialized");
        Ok(with_subpath(
            LoadedDataMeta::new(located, path)
                .with_resolved_ref(sha)
                .with_fetched_at(entry.fetched_at),
            &repo,
        ))
    }
}

fn with_subpath(meta: LoadedDataMeta, repo: &GitHubRepo) -> LoadedDataMeta {
    match &repo.subpath {
        Some(subpath) => meta.with_subpath(subpath),
        None => meta,
    }
}
