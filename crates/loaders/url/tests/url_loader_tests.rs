//! Download, verification and caching behavior of the URL loader.

use clirack_core::{Error, LoaderConfig, LoaderRegistry, RetryConfig};
use flate2::Compression;
use flate2::write::GzEncoder;
use sha2::{Digest, Sha256};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn tar_gz(files: &[(&str, &[u8])]) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (name, content) in files {
        let mut header = tar::Header::new_gnu();
        header.set_path(name).unwrap();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append(&header, *content).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

fn sha256(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

fn registry(target: &TempDir) -> LoaderRegistry {
    let mut registry = LoaderRegistry::with_builtin_loaders(
        LoaderConfig::new()
            .with_target_dir(target.path())
            .with_retry(RetryConfig::none()),
    );
    clirack_loader_url::register(&mut registry).unwrap();
    registry
}

async fn serve(server: &MockServer, at: &str, body: Vec<u8>, times: u64) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
        .expect(times)
        .mount(server)
        .await;
}

#[test]
fn test_register_serves_both_schemes() {
    let target = TempDir::new().unwrap();
    let registry = registry(&target);
    assert_eq!(registry.schemes(), vec!["http", "https", "local"]);
    assert_eq!(registry.get("https").unwrap().name(), "url");
}

#[tokio::test]
async fn test_tarball_is_unpacked() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/templates.tar.gz",
        tar_gz(&[("components/a.yaml", b"a: 1"), ("README.md", b"hi")]),
        1,
    )
    .await;

    let target = TempDir::new().unwrap();
    let meta = registry(&target)
        .load(&format!("{}/templates.tar.gz", server.uri()))
        .await
        .unwrap();

    assert!(!meta.is_file);
    assert!(!meta.from_cache);
    assert!(meta.path.join("components/a.yaml").is_file());
    assert!(meta.path.starts_with(target.path()));
}

#[tokio::test]
async fn test_unpinned_url_is_downloaded_every_time() {
    let server = MockServer::start().await;
    serve(&server, "/data.tar.gz", tar_gz(&[("x.txt", b"x")]), 2).await;

    let target = TempDir::new().unwrap();
    let registry = registry(&target);
    let locator = format!("{}/data.tar.gz", server.uri());

    let first = registry.load(&locator).await.unwrap();
    let second = registry.load(&locator).await.unwrap();
    assert!(!second.from_cache);
    assert_eq!(first.path, second.path);
}

#[tokio::test]
async fn test_pinned_url_is_served_from_cache() {
    let server = MockServer::start().await;
    let body = tar_gz(&[("x.txt", b"x")]);
    let digest = sha256(&body);
    serve(&server, "/data.tar.gz", body, 1).await;

    let target = TempDir::new().unwrap();
    let registry = registry(&target);
    let locator = format!("{}/data.tar.gz#sha256={digest}", server.uri());

    let first = registry.load(&locator).await.unwrap();
    assert!(!first.from_cache);
    assert_eq!(first.resolved_ref.as_deref(), Some(digest.as_str()));

    let second = registry.load(&locator).await.unwrap();
    assert!(second.from_cache);
    assert!(second.path.join("x.txt").is_file());
}

#[tokio::test]
async fn test_checksum_mismatch_commits_nothing() {
    let server = MockServer::start().await;
    serve(&server, "/data.tar.gz", tar_gz(&[("x.txt", b"x")]), 1).await;

    let target = TempDir::new().unwrap();
    let registry = registry(&target);
    let wrong = "0".repeat(64);
    let locator = format!("{}/data.tar.gz#sha256={wrong}", server.uri());

    let err = registry.load(&locator).await.unwrap_err();
    assert!(matches!(
        err,
        Error::ChecksumMismatch { ref expected, .. } if *expected == wrong
    ));
    assert!(registry.cache().lookup(&locator).await.unwrap().is_none());
    let created: Vec<_> = std::fs::read_dir(target.path()).map_or_else(
        |_| Vec::new(),
        |entries| entries.filter_map(|e| e.ok()).collect(),
    );
    assert!(created.is_empty());
}

#[tokio::test]
async fn test_plain_file_is_stored_as_file() {
    let server = MockServer::start().await;
    serve(&server, "/config/base.yaml", b"esphome: {}".to_vec(), 1).await;

    let target = TempDir::new().unwrap();
    let meta = registry(&target)
        .load(&format!("{}/config/base.yaml", server.uri()))
        .await
        .unwrap();

    assert!(meta.is_file);
    assert_eq!(meta.path.file_name().unwrap(), "base.yaml");
    assert_eq!(std::fs::read_to_string(&meta.path).unwrap(), "esphome: {}");
    assert_eq!(meta.resolved_ref, Some(sha256(b"esphome: {}")));
}

#[tokio::test]
async fn test_missing_url_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let target = TempDir::new().unwrap();
    let locator = format!("{}/gone.zip", server.uri());
    let err = registry(&target).load(&locator).await.unwrap_err();

    assert!(matches!(err, Error::ResourceNotFound { .. }));
    assert_eq!(err.locator(), Some(locator.as_str()));
}

#[tokio::test]
async fn test_server_error_is_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let target = TempDir::new().unwrap();
    let err = registry(&target)
        .load(&format!("{}/busy.zip", server.uri()))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::RemoteUnavailable { .. }));
}

#[tokio::test]
async fn test_unpinned_load_does_not_disturb_pinned_copy() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"version one".to_vec()))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    serve(&server, "/data.txt", b"version two".to_vec(), 1).await;

    let target = TempDir::new().unwrap();
    let registry = registry(&target);
    let plain = format!("{}/data.txt", server.uri());
    let pinned = format!("{plain}#sha256={}", sha256(b"version one"));

    let first = registry.load(&pinned).await.unwrap();
    assert_eq!(std::fs::read_to_string(&first.path).unwrap(), "version one");

    let unpinned = registry.load(&plain).await.unwrap();
    assert_eq!(std::fs::read_to_string(&unpinned.path).unwrap(), "version two");
    assert_ne!(unpinned.path.parent(), first.path.parent());

    let again = registry.load(&pinned).await.unwrap();
    assert!(again.from_cache);
    assert_eq!(again.path, first.path);
    assert_eq!(std::fs::read_to_string(&again.path).unwrap(), "version one");
}
