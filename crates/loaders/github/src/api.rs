//! GitHub REST API client.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use tracing::debug;

use clirack_core::{Error, Result};

use crate::{GitHubRepo, RepositoryHost};

/// Public GitHub API root.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Environment variable overriding the API root (GitHub Enterprise).
pub const API_URL_ENV: &str = "GITHUB_API_URL";

/// Environment variables consulted for a token, in order.
pub const TOKEN_ENV_VARS: [&str; 2] = ["GITHUB_TOKEN", "GH_TOKEN"];

const USER_AGENT: &str = concat!("clirack/", env!("CARGO_PKG_VERSION"));
const SHA_MEDIA_TYPE: &str = "application/vnd.github.sha";

/// [`RepositoryHost`] backed by the GitHub REST API.
#[derive(Clone)]
pub struct GitHubApi {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl GitHubApi {
    /// Create a client for the API rooted at `base_url`, without a token.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the HTTP client cannot be built
    /// (TLS backend initialization failure).
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::configuration(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        })
    }

    /// Client configured from `GITHUB_API_URL` and `GITHUB_TOKEN`/`GH_TOKEN`.
    ///
    /// # Errors
    ///
    /// See [`new`](Self::new).
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var(API_URL_ENV)
            .ok()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let api = Self::new(base_url)?;
        Ok(match token_from_env() {
            Some(token) => api.with_token(token),
            None => api,
        })
    }

    /// Authenticate requests with a bearer token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// API root without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Whether requests carry a token.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    fn get(&self, url: &str) -> RequestBuilder {
        let request = self
            .client
            .get(url)
            .header("X-GitHub-Api-Version", "2022-11-28");
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder, locator: &str, what: &str) -> Result<Response> {
        let response = request.send().await.map_err(|e| {
            Error::remote_unavailable_from(locator, format!("{what} request failed"), e)
        })?;

        match status_error(response.status(), locator, what) {
            Some(err) => Err(err),
            None => Ok(response),
        }
    }
}

impl std::fmt::Debug for GitHubApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubApi")
            .field("base_url", &self.base_url)
            .field("authenticated", &self.is_authenticated())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl RepositoryHost for GitHubApi {
    async fn resolve_ref(&self, repo: &GitHubRepo, locator: &str) -> Result<String> {
        let url = format!(
            "{}/repos/{}/{}/commits/{}",
            self.base_url,
            repo.owner,
            repo.repo,
            repo.reference_or_head()
        );
        debug!(%url, "Resolving ref");

        let request = self.get(&url).header(reqwest::header::ACCEPT, SHA_MEDIA_TYPE);
        let response = self.send(request, locator, "ref resolution").await?;
        let body = response.text().await.map_err(|e| {
            Error::remote_unavailable_from(locator, "failed to read ref resolution response", e)
        })?;

        let sha = body.trim();
        if sha.is_empty() || !sha.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::remote_unavailable(
                locator,
                format!("unexpected ref resolution response for {}", repo.full_name()),
            ));
        }
        Ok(sha.to_ascii_lowercase())
    }

    async fn download_archive(
        &self,
        repo: &GitHubRepo,
        sha: &str,
        locator: &str,
    ) -> Result<Bytes> {
        let url = format!(
            "{}/repos/{}/{}/zipball/{}",
            self.base_url, repo.owner, repo.repo, sha
        );
        debug!(%url, "Downloading repository archive");

        let response = self.send(self.get(&url), locator, "archive download").await?;
        response.bytes().await.map_err(|e| {
            Error::remote_unavailable_from(locator, "failed to read repository archive", e)
        })
    }
}

/// First non-empty token among [`TOKEN_ENV_VARS`].
fn token_from_env() -> Option<String> {
    TOKEN_ENV_VARS
        .iter()
        .find_map(|key| std::env::var(key).ok().filter(|value| !value.trim().is_empty()))
}

/// Map a non-success status to a loader error.
///
/// 404 and 422 (unknown ref) mean the resource does not exist; everything
/// else (401, 403, 429, 5xx, ...) is treated as the remote being unavailable.
pub(crate) fn status_error(status: StatusCode, locator: &str, what: &str) -> Option<Error> {
    if status.is_success() {
        return None;
    }

    let message = format!("{what} failed: GitHub answered {status}");
    Some(match status {
        StatusCode::NOT_FOUND | StatusCode::UNPROCESSABLE_ENTITY => {
            Error::not_found(locator, message)
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => {
            Error::remote_unavailable(
                locator,
                format!("{message} (authentication or rate limit; set GITHUB_TOKEN)"),
            )
        }
        _ => Error::remote_unavailable(locator, message),
    })
}
