//! Integration tests for loading through the registry.
//!
//! Uses the built-in local loader plus a snapshot loader that copies a source
//! directory through the same staging and cache index machinery the network
//! loaders use.

use async_trait::async_trait;
use clirack_core::{
    Error, FetchContext, LoadedDataMeta, Loader, LoaderConfig, LoaderRegistry, ResourceLocator,
    Result, Staging, hash_suffix, require_dir,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

/// `snapshot://<dir>` copies `<dir>` when its `VERSION` file changes.
#[derive(Default)]
struct SnapshotLoader {
    copies: AtomicUsize,
}

#[async_trait]
impl Loader for SnapshotLoader {
    fn name(&self) -> &'static str {
        "snapshot"
    }

    fn description(&self) -> &'static str {
        "Copy a local directory, refreshing when its VERSION changes"
    }

    async fn fetch(
        &self,
        locator: &ResourceLocator,
        ctx: &FetchContext<'_>,
    ) -> Result<LoadedDataMeta> {
        let source = PathBuf::from(locator.payload());
        let version = std::fs::read_to_string(source.join("VERSION"))
            .map_err(|_| Error::not_found(locator.raw(), "no VERSION file"))?;
        let version = version.trim().to_string();
        let dest = ctx.resource_dir(&format!("snapshot-{}", hash_suffix(locator.payload())));

        if !ctx.force_reload
            && let Some(entry) = ctx.cache.lookup(locator.raw()).await?
            && entry.resolved_ref == version
            && entry.is_materialized()
        {
            return Ok(LoadedDataMeta::new(locator.clone(), entry.path)
                .with_resolved_ref(version)
                .with_from_cache(true)
                .with_fetched_at(entry.fetched_at));
        }

        let staging = Staging::new(&dest)?;
        copy_dir(&source, staging.path());
        self.copies.fetch_add(1, Ordering::SeqCst);
        let path = staging.commit()?;
        let entry = ctx.cache.record(locator.raw(), &path, &version).await?;

        Ok(LoadedDataMeta::new(locator.clone(), path)
            .with_resolved_ref(version)
            .with_fetched_at(entry.fetched_at))
    }
}

fn copy_dir(from: &Path, to: &Path) {
    for entry in std::fs::read_dir(from).unwrap() {
        let entry = entry.unwrap();
        let target = to.join(entry.file_name());
        if entry.file_type().unwrap().is_dir() {
            std::fs::create_dir_all(&target).unwrap();
            copy_dir(&entry.path(), &target);
        } else {
            std::fs::copy(entry.path(), target).unwrap();
        }
    }
}

fn registry(target: &TempDir) -> (LoaderRegistry, Arc<SnapshotLoader>) {
    let loader = Arc::new(SnapshotLoader::default());
    let mut registry = LoaderRegistry::with_builtin_loaders(
        LoaderConfig::new().with_target_dir(target.path().join("external")),
    );
    registry
        .register_arc("snapshot", Arc::clone(&loader) as Arc<dyn Loader>)
        .unwrap();
    (registry, loader)
}

#[tokio::test]
async fn test_local_load_with_resolver() {
    let source = TempDir::new().unwrap();
    let target = TempDir::new().unwrap();
    std::fs::create_dir(source.path().join("components")).unwrap();
    let (registry, _) = registry(&target);

    let raw = format!("local://{}", source.path().display());
    let meta = registry
        .load_with(&raw, &require_dir("components"))
        .await
        .unwrap();

    assert_eq!(meta.target_path(), source.path().canonicalize().unwrap().join("components"));
    assert!(!target.path().join("external").exists());
}

#[tokio::test]
async fn test_local_missing_is_not_found_and_writes_nothing() {
    let target = TempDir::new().unwrap();
    let (registry, _) = registry(&target);

    let err = registry.load("local:///tmp/missing-clirack-path").await.unwrap_err();
    assert!(matches!(err, Error::ResourceNotFound { .. }));
    assert_eq!(err.locator(), Some("local:///tmp/missing-clirack-path"));
    assert!(!target.path().join("external").exists());
}

#[tokio::test]
async fn test_second_load_is_served_from_cache() {
    let source = TempDir::new().unwrap();
    let target = TempDir::new().unwrap();
    std::fs::write(source.path().join("VERSION"), "1").unwrap();
    std::fs::write(source.path().join("a.yaml"), "a: 1").unwrap();
    let (registry, loader) = registry(&target);
    let raw = format!("snapshot://{}", source.path().display());

    let first = registry.load(&raw).await.unwrap();
    let second = registry.load(&raw).await.unwrap();

    assert!(!first.from_cache);
    assert!(second.from_cache);
    assert_eq!(first.path, second.path);
    assert_eq!(loader.copies.load(Ordering::SeqCst), 1);

    let entries = registry.cache().entries().await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].locator, raw);
}

#[tokio::test]
async fn test_changed_version_replaces_content() {
    let source = TempDir::new().unwrap();
    let target = TempDir::new().unwrap();
    std::fs::write(source.path().join("VERSION"), "1").unwrap();
    std::fs::write(source.path().join("old.yaml"), "x").unwrap();
    let (registry, loader) = registry(&target);
    let raw = format!("snapshot://{}", source.path().display());

    let first = registry.load(&raw).await.unwrap();
    assert!(first.path.join("old.yaml").is_file());

    std::fs::remove_file(source.path().join("old.yaml")).unwrap();
    std::fs::write(source.path().join("new.yaml"), "y").unwrap();
    std::fs::write(source.path().join("VERSION"), "2").unwrap();

    let second = registry.load(&raw).await.unwrap();
    assert!(!second.from_cache);
    assert_eq!(second.resolved_ref.as_deref(), Some("2"));
    assert!(second.path.join("new.yaml").is_file());
    assert!(!second.path.join("old.yaml").exists());
    assert_eq!(loader.copies.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_force_reload_skips_freshness_check() {
    let source = TempDir::new().unwrap();
    let target = TempDir::new().unwrap();
    std::fs::write(source.path().join("VERSION"), "1").unwrap();

    let loader = Arc::new(SnapshotLoader::default());
    let mut registry = LoaderRegistry::new(
        LoaderConfig::new()
            .with_target_dir(target.path())
            .with_force_reload(true),
    );
    registry
        .register_arc("snapshot", Arc::clone(&loader) as Arc<dyn Loader>)
        .unwrap();
    let raw = format!("snapshot://{}", source.path().display());

    registry.load(&raw).await.unwrap();
    let again = registry.load(&raw).await.unwrap();

    assert!(!again.from_cache);
    assert_eq!(loader.copies.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_resolver_retry_does_not_refetch() {
    let source = TempDir::new().unwrap();
    let target = TempDir::new().unwrap();
    std::fs::write(source.path().join("VERSION"), "1").unwrap();
    std::fs::create_dir(source.path().join("components")).unwrap();
    let (registry, loader) = registry(&target);
    let raw = format!("snapshot://{}", source.path().display());

    let err = registry
        .load_with(&raw, &require_dir("packages"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidPackageStructure { .. }));

    let meta = registry
        .load_with(&raw, &require_dir("components"))
        .await
        .unwrap();
    assert!(meta.from_cache);
    assert_eq!(meta.subpath.as_deref(), Some("components"));
    assert_eq!(loader.copies.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_registries_share_index_on_disk() {
    let source = TempDir::new().unwrap();
    let target = TempDir::new().unwrap();
    std::fs::write(source.path().join("VERSION"), "1").unwrap();
    let raw = format!("snapshot://{}", source.path().display());

    let (first, _) = registry(&target);
    first.load(&raw).await.unwrap();

    let (second, loader) = registry(&target);
    let meta = second.load(&raw).await.unwrap();
    assert!(meta.from_cache);
    assert_eq!(loader.copies.load(Ordering::SeqCst), 0);
}
