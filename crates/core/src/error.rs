//! Error types for loader operations

// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

use miette::Diagnostic;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Boxed transport error carried by remote failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error type for locator parsing, registration and loading.
///
/// Every variant that concerns a specific resource carries the locator
/// string it was raised for, see [`Error::locator`].
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// The locator string could not be parsed.
    #[error("Malformed locator '{locator}': {reason}")]
    #[diagnostic(
        code(clirack::loader::malformed_locator),
        help("Locators look like 'scheme://payload', e.g. 'github://owner/repo'")
    )]
    MalformedLocator {
        /// The offending locator string
        locator: String,
        /// Why parsing failed
        reason: String,
    },

    /// No loader is registered for the locator's scheme.
    #[error("Locator '{locator}' is not supported: no loader registered for scheme '{scheme}'")]
    #[diagnostic(code(clirack::loader::unsupported_scheme))]
    UnsupportedScheme {
        /// The offending locator string
        locator: String,
        /// The scheme that had no loader
        scheme: String,
    },

    /// The resource does not exist at its source.
    #[error("Resource '{locator}' not found: {message}")]
    #[diagnostic(code(clirack::loader::not_found))]
    ResourceNotFound {
        /// The offending locator string
        locator: String,
        /// What was missing
        message: String,
    },

    /// The remote source could not be reached (network, auth, rate limit).
    #[error("Remote source for '{locator}' is unavailable: {message}")]
    #[diagnostic(
        code(clirack::loader::remote_unavailable),
        help("Check network connectivity; set GITHUB_TOKEN to raise API rate limits")
    )]
    RemoteUnavailable {
        /// The offending locator string
        locator: String,
        /// Description of the failure
        message: String,
        /// Underlying transport error, if any
        #[source]
        source: Option<BoxError>,
    },

    /// A network fetch exceeded its deadline.
    #[error("Fetching '{locator}' timed out after {after:?}")]
    #[diagnostic(
        code(clirack::loader::timeout),
        help("Increase the timeout or retry later")
    )]
    Timeout {
        /// The offending locator string
        locator: String,
        /// Configured deadline
        after: Duration,
    },

    /// The fetched data does not have the layout the caller expects.
    #[error("Package '{locator}' has invalid structure (directory layout){}", details.as_ref().map_or(String::new(), |d| format!(": {d}")))]
    #[diagnostic(code(clirack::loader::invalid_package_structure))]
    InvalidPackageStructure {
        /// The offending locator string
        locator: String,
        /// Where the data was materialized
        path: PathBuf,
        /// What is wrong with the layout
        details: Option<String>,
        /// Suggested fix
        #[help]
        hint: Option<String>,
    },

    /// A loader is already registered for the scheme.
    #[error("A loader is already registered for scheme '{scheme}'")]
    #[diagnostic(
        code(clirack::loader::duplicate_scheme),
        help("Use DuplicatePolicy::Replace to let the last registration win")
    )]
    DuplicateScheme {
        /// The conflicting scheme
        scheme: String,
    },

    /// Downloaded content does not match the digest pinned in the locator.
    #[error("Checksum mismatch for '{locator}': expected {expected}, got {actual}")]
    #[diagnostic(code(clirack::loader::checksum_mismatch))]
    ChecksumMismatch {
        /// The offending locator string
        locator: String,
        /// Digest from the locator
        expected: String,
        /// Digest of the downloaded bytes
        actual: String,
    },

    /// A downloaded archive could not be unpacked.
    #[error("Unable to unpack '{locator}': {message}")]
    #[diagnostic(code(clirack::loader::archive))]
    Archive {
        /// The offending locator string
        locator: String,
        /// Description of the failure
        message: String,
    },

    /// I/O error with path context
    #[error("I/O {operation} failed{}", path.as_ref().map_or(String::new(), |p| format!(": {}", p.display())))]
    #[diagnostic(
        code(clirack::loader::io),
        help("Check file permissions and ensure the target directory is writable")
    )]
    Io {
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
        /// Path that caused the error, if available
        path: Option<Box<Path>>,
        /// Operation that failed (e.g., "read", "rename")
        operation: String,
        /// Locator being loaded when the error happened
        locator: Option<String>,
    },

    /// Configuration or validation error
    #[error("Loader configuration error: {message}")]
    #[diagnostic(code(clirack::loader::config))]
    Configuration {
        /// Error message describing the configuration issue
        message: String,
    },

    /// Serialization error
    #[error("Serialization error: {message}")]
    #[diagnostic(code(clirack::loader::serialization))]
    Serialization {
        /// Error message describing the serialization issue
        message: String,
        /// Locator being loaded when the error happened
        locator: Option<String>,
    },
}

impl Error {
    /// Create a malformed locator error
    #[must_use]
    pub fn malformed(locator: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedLocator {
            locator: locator.into(),
            reason: reason.into(),
        }
    }

    /// Create a not found error
    #[must_use]
    pub fn not_found(locator: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ResourceNotFound {
            locator: locator.into(),
            message: message.into(),
        }
    }

    /// Create a remote unavailable error without a transport source
    #[must_use]
    pub fn remote_unavailable(locator: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RemoteUnavailable {
            locator: locator.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Create a remote unavailable error wrapping a transport error
    #[must_use]
    pub fn remote_unavailable_from(
        locator: impl Into<String>,
        message: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Self::RemoteUnavailable {
            locator: locator.into(),
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Create a timeout error
    #[must_use]
    pub fn timeout(locator: impl Into<String>, after: Duration) -> Self {
        Self::Timeout {
            locator: locator.into(),
            after,
        }
    }

    /// Create an invalid package structure error
    #[must_use]
    pub fn invalid_structure(
        locator: impl Into<String>,
        path: impl Into<PathBuf>,
        details: Option<String>,
    ) -> Self {
        Self::InvalidPackageStructure {
            locator: locator.into(),
            path: path.into(),
            details,
            hint: None,
        }
    }

    /// Create an archive error
    #[must_use]
    pub fn archive(locator: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Archive {
            locator: locator.into(),
            message: message.into(),
        }
    }

    /// Create an I/O error with path context
    #[must_use]
    pub fn io(source: std::io::Error, path: impl AsRef<Path>, operation: impl Into<String>) -> Self {
        Self::Io {
            source,
            path: Some(path.as_ref().into()),
            operation: operation.into(),
            locator: None,
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration {
            message: msg.into(),
        }
    }

    /// Create a serialization error
    #[must_use]
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            locator: None,
        }
    }

    /// Attach a fix hint to an [`Error::InvalidPackageStructure`]; other
    /// variants are returned unchanged.
    #[must_use]
    pub fn with_hint(mut self, new_hint: impl Into<String>) -> Self {
        if let Self::InvalidPackageStructure { hint, .. } = &mut self {
            *hint = Some(new_hint.into());
        }
        self
    }

    /// Fill in the locator on variants that were raised without one.
    #[must_use]
    pub fn with_locator(mut self, raw: &str) -> Self {
        if let Self::Io { locator, .. } | Self::Serialization { locator, .. } = &mut self
            && locator.is_none()
        {
            *locator = Some(raw.to_string());
        }
        self
    }

    /// The locator string this error concerns, if any.
    #[must_use]
    pub fn locator(&self) -> Option<&str> {
        match self {
            Self::MalformedLocator { locator, .. }
            | Self::UnsupportedScheme { locator, .. }
            | Self::ResourceNotFound { locator, .. }
            | Self::RemoteUnavailable { locator, .. }
            | Self::Timeout { locator, .. }
            | Self::InvalidPackageStructure { locator, .. }
            | Self::ChecksumMismatch { locator, .. }
            | Self::Archive { locator, .. } => Some(locator),
            Self::Io { locator, .. } | Self::Serialization { locator, .. } => locator.as_deref(),
            Self::DuplicateScheme { .. } | Self::Configuration { .. } => None,
        }
    }

    /// Whether retrying the same operation may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RemoteUnavailable { .. })
    }
}

/// Result type for loader operations
pub type Result<T> = std::result::Result<T, Error>;
