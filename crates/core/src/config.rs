//! Loader configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::retry::RetryConfig;
use crate::{Error, Result};

/// Default target directory, relative to the working directory.
pub const DEFAULT_TARGET_DIR: &str = "tmp/external";

/// Default deadline for a single network fetch.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Environment variable overriding the target directory.
pub const TARGET_DIR_ENV: &str = "CLIRACK_TARGET_DIR";

/// Environment variable overriding the fetch timeout, in seconds (`0` disables it).
pub const TIMEOUT_ENV: &str = "CLIRACK_TIMEOUT_SECS";

/// What to do when a scheme is registered twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    /// The last registration wins.
    #[default]
    Replace,
    /// Registration fails with [`Error::DuplicateScheme`].
    Reject,
}

/// Process-wide loader settings owned by a [`LoaderRegistry`](crate::LoaderRegistry).
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Root under which all resources are materialized.
    pub target_dir: PathBuf,
    /// Deadline for each network call; `None` waits indefinitely.
    pub timeout: Option<Duration>,
    /// Retry policy for transient remote failures.
    pub retry: RetryConfig,
    /// Duplicate registration policy.
    pub duplicate_policy: DuplicatePolicy,
    /// Skip freshness checks and always fetch.
    pub force_reload: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            target_dir: PathBuf::from(DEFAULT_TARGET_DIR),
            timeout: Some(DEFAULT_TIMEOUT),
            retry: RetryConfig::default(),
            duplicate_policy: DuplicatePolicy::default(),
            force_reload: false,
        }
    }
}

impl LoaderConfig {
    /// Create the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `CLIRACK_TARGET_DIR` and `CLIRACK_TIMEOUT_SECS`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] when the timeout is not a whole number.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var(TARGET_DIR_ENV)
            && !dir.trim().is_empty()
        {
            config.target_dir = PathBuf::from(dir);
        }

        if let Ok(raw) = std::env::var(TIMEOUT_ENV) {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                Error::configuration(format!("{TIMEOUT_ENV} must be a number of seconds, got '{raw}'"))
            })?;
            config.timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }

        Ok(config)
    }

    /// Set the target directory.
    #[must_use]
    pub fn with_target_dir(mut self, target_dir: impl Into<PathBuf>) -> Self {
        self.target_dir = target_dir.into();
        self
    }

    /// Set the network timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Set the duplicate registration policy.
    #[must_use]
    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }

    /// Set force reload.
    #[must_use]
    pub fn with_force_reload(mut self, force: bool) -> Self {
        self.force_reload = force;
        self
    }
}
