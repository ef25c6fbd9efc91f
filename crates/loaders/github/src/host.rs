//! The network side of the GitHub loader.

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

use clirack_core::Result;

use crate::GitHubRepo;

/// Where repositories are resolved and downloaded from.
///
/// [`GitHubApi`](crate::GitHubApi) talks to api.github.com or a GitHub
/// Enterprise instance; tests substitute an in-memory host.
#[async_trait]
pub trait RepositoryHost: Send + Sync {
    /// Resolve the repository's ref (or its default branch) to a commit SHA.
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` for unknown repositories or refs and
    /// `RemoteUnavailable` for transport, auth and rate-limit failures.
    async fn resolve_ref(&self, repo: &GitHubRepo, locator: &str) -> Result<String>;

    /// Download a zip archive of the repository at `sha`.
    ///
    /// # Errors
    ///
    /// As [`resolve_ref`](Self::resolve_ref).
    async fn download_archive(&self, repo: &GitHubRepo, sha: &str, locator: &str)
    -> Result<Bytes>;
}

#[async_trait]
impl<T: RepositoryHost + ?Sized> RepositoryHost for Arc<T> {
    async fn resolve_ref(&self, repo: &GitHubRepo, locator: &str) -> Result<String> {
        (**self).resolve_ref(repo, locator).await
    }

    async fn download_archive(
        &self,
        repo: &GitHubRepo,
        sha: &str,
        locator: &str,
    ) -> Result<Bytes> {
        (**self).download_archive(repo, sha, locator).await
    }
}
