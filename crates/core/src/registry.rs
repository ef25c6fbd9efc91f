//! Loader registry.
//!
//! The registry maps locator schemes to [`Loader`] implementations and is the
//! single entry point for loading: it parses the locator, dispatches on the
//! scheme, serializes concurrent loads of the same locator and applies the
//! caller's [`PathResolver`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::cache::CacheIndex;
use crate::config::{DuplicatePolicy, LoaderConfig};
use crate::local::{LOCAL_SCHEME, LocalLoader};
use crate::lock::LockTable;
use crate::resolver::{self, PathResolver};
use crate::{Error, FetchContext, LoadedDataMeta, Loader, ResourceLocator, Result};

/// Registry of loaders keyed by scheme.
///
/// Hosts build one registry, register the loaders they need and pass it by
/// reference to whatever loads resources. Distinct registries (for example
/// one per test) share nothing except the directories they point at.
pub struct LoaderRegistry {
    /// Loaders indexed by lowercase scheme.
    loaders: HashMap<String, Arc<dyn Loader>>,
    config: LoaderConfig,
    /// Index for the absolute target directory.
    cache: CacheIndex,
    /// Locator strings currently being loaded.
    in_flight: LockTable,
    /// Directories currently being written by a loader.
    writers: LockTable,
}

impl LoaderRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new(config: LoaderConfig) -> Self {
        let cache = CacheIndex::new(absolutize(&config.target_dir));
        Self {
            loaders: HashMap::new(),
            config,
            cache,
            in_flight: LockTable::new(),
            writers: LockTable::new(),
        }
    }

    /// Create a registry with the loaders that need no network stack
    /// (`local://`).
    #[must_use]
    pub fn with_builtin_loaders(config: LoaderConfig) -> Self {
        let mut registry = Self::new(config);
        registry
            .loaders
            .insert(LOCAL_SCHEME.to_string(), Arc::new(LocalLoader::new()));
        registry
    }

    /// Register a loader for `scheme`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateScheme`] when the scheme is taken and the
    /// configured policy is [`DuplicatePolicy::Reject`], or
    /// [`Error::Configuration`] when the scheme is not a valid locator scheme.
    pub fn register<L: Loader + 'static>(&mut self, scheme: &str, loader: L) -> Result<()> {
        self.register_arc(scheme, Arc::new(loader))
    }

    /// Register a shared loader for `scheme`.
    ///
    /// Useful when one loader instance serves several schemes.
    ///
    /// # Errors
    ///
    /// See [`register`](Self::register).
    pub fn register_arc(&mut self, scheme: &str, loader: Arc<dyn Loader>) -> Result<()> {
        let scheme = normalize_scheme(scheme)?;

        if self.loaders.contains_key(&scheme) {
            match self.config.duplicate_policy {
                DuplicatePolicy::Reject => return Err(Error::DuplicateScheme { scheme }),
                DuplicatePolicy::Replace => {
                    debug!(%scheme, loader = loader.name(), "Replacing registered loader");
                }
            }
        }

        self.loaders.insert(scheme, loader);
        Ok(())
    }

    /// Get the loader registered for a scheme.
    #[must_use]
    pub fn get(&self, scheme: &str) -> Option<&Arc<dyn Loader>> {
        self.loaders.get(&scheme.to_ascii_lowercase())
    }

    /// Registered schemes, sorted.
    #[must_use]
    pub fn schemes(&self) -> Vec<&str> {
        let mut schemes: Vec<&str> = self.loaders.keys().map(String::as_str).collect();
        schemes.sort_unstable();
        schemes
    }

    /// Iterate over `(scheme, loader)` pairs, sorted by scheme.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn Loader>)> {
        let mut pairs: Vec<_> = self
            .loaders
            .iter()
            .map(|(scheme, loader)| (scheme.as_str(), loader))
            .collect();
        pairs.sort_unstable_by_key(|(scheme, _)| *scheme);
        pairs.into_iter()
    }

    /// Number of registered schemes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.loaders.len()
    }

    /// Check if no loader is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.loaders.is_empty()
    }

    /// Current configuration.
    #[must_use]
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Absolute directory resources are materialized under.
    #[must_use]
    pub fn target_dir(&self) -> &Path {
        self.cache.root()
    }

    /// Change the target directory for subsequent loads.
    ///
    /// Relative paths are resolved against the current working directory now,
    /// so later changes of the working directory do not move the cache.
    pub fn set_target_dir(&mut self, target_dir: impl Into<PathBuf>) {
        self.config.target_dir = target_dir.into();
        self.cache = CacheIndex::new(absolutize(&self.config.target_dir));
        debug!(target_dir = %self.cache.root().display(), "Target directory changed");
    }

    /// Freshness index of the current target directory.
    #[must_use]
    pub fn cache(&self) -> &CacheIndex {
        &self.cache
    }

    /// Load a resource.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedLocator`] or [`Error::UnsupportedScheme`]
    /// before any I/O happens, otherwise whatever the scheme's loader reports.
    pub async fn load(&self, locator: &str) -> Result<LoadedDataMeta> {
        self.load_inner(locator, None).await
    }

    /// Load a resource and select a subpath of it with `resolver`.
    ///
    /// # Errors
    ///
    /// As [`load`](Self::load), plus [`Error::InvalidPackageStructure`] when
    /// the resolver rejects the fetched data. The data stays on disk and in
    /// the cache index in that case.
    pub async fn load_with(&self, locator: &str, resolver: &PathResolver) -> Result<LoadedDataMeta> {
        self.load_inner(locator, Some(resolver)).await
    }

    #[instrument(name = "load", skip(self, resolver), fields(scheme = tracing::field::Empty))]
    async fn load_inner(
        &self,
        raw: &str,
        resolver: Option<&PathResolver>,
    ) -> Result<LoadedDataMeta> {
        let locator = ResourceLocator::parse(raw)?;
        tracing::Span::current().record("scheme", locator.scheme());

        let loader = self
            .loaders
            .get(locator.scheme())
            .ok_or_else(|| Error::UnsupportedScheme {
                locator: raw.to_string(),
                scheme: locator.scheme().to_string(),
            })?;

        info!(loader = loader.name(), "Loading resource");

        let meta = {
            let locator_lock = self.in_flight.key(raw);
            let _loading = locator_lock.acquire().await;
            let ctx = FetchContext {
                target_dir: self.cache.root(),
                cache: &self.cache,
                timeout: self.config.timeout,
                retry: &self.config.retry,
                force_reload: self.config.force_reload,
                writers: &self.writers,
            };
            loader.fetch(&locator, &ctx).await
        };

        let meta = meta.map_err(|e| e.with_locator(raw))?;
        info!(
            path = %meta.path.display(),
            from_cache = meta.from_cache,
            resolved_ref = meta.resolved_ref.as_deref().unwrap_or("-"),
            "Resource ready"
        );

        match resolver {
            Some(resolver) => resolver::apply(meta, resolver),
            None => Ok(meta),
        }
    }
}

impl Default for LoaderRegistry {
    fn default() -> Self {
        Self::with_builtin_loaders(LoaderConfig::default())
    }
}

impl std::fmt::Debug for LoaderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoaderRegistry")
            .field("schemes", &self.schemes())
            .field("target_dir", &self.cache.root())
            .field("duplicate_policy", &self.config.duplicate_policy)
            .finish_non_exhaustive()
    }
}

fn normalize_scheme(scheme: &str) -> Result<String> {
    let valid = !scheme.is_empty()
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    if valid {
        Ok(scheme.to_ascii_lowercase())
    } else {
        Err(Error::configuration(format!(
            "'{scheme}' is not a valid locator scheme"
        )))
    }
}

fn absolutize(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
