//! Locator parsing.
//!
//! A locator is a scheme-qualified string naming an external resource:
//!
//! ```text
//! github://owner/repo@v1.2.0
//! local:///srv/templates
//! https://example.com/pkg.tar.gz#sha256=...
//! ```
//!
//! Parsing only splits the scheme from the payload. Each loader decomposes
//! the payload with its own grammar and may attach the pieces as named
//! fields via [`ResourceLocator::with_field`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::{Error, Result};

/// Separator between scheme and payload.
pub const SCHEME_SEPARATOR: &str = "://";

/// A parsed locator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceLocator {
    scheme: String,
    raw: String,
    payload: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    fields: BTreeMap<String, String>,
}

impl ResourceLocator {
    /// Parse a locator string.
    ///
    /// Splits on the first `://`. The scheme is lowercased; `raw` keeps the
    /// input verbatim.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedLocator`] when the separator is missing, the
    /// scheme is empty, or the scheme contains characters other than ASCII
    /// alphanumerics, `+`, `-` and `.`.
    pub fn parse(input: &str) -> Result<Self> {
        let Some((scheme, payload)) = input.split_once(SCHEME_SEPARATOR) else {
            return Err(Error::malformed(input, "missing '://' separator"));
        };

        if scheme.is_empty() {
            return Err(Error::malformed(input, "scheme is empty"));
        }

        if let Some(bad) = scheme
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')))
        {
            return Err(Error::malformed(
                input,
                format!("invalid character '{bad}' in scheme"),
            ));
        }

        Ok(Self {
            scheme: scheme.to_ascii_lowercase(),
            raw: input.to_string(),
            payload: payload.to_string(),
            fields: BTreeMap::new(),
        })
    }

    /// Lowercase scheme, e.g. `github`.
    #[must_use]
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// The locator exactly as given.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Everything after `://`.
    #[must_use]
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Loader-specific fields decoded from the payload.
    #[must_use]
    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    /// Look up a single decoded field.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Return a copy with an extra decoded field.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// `scheme://payload` using the normalized scheme.
    #[must_use]
    pub fn canonical(&self) -> String {
        format!("{}{}{}", self.scheme, SCHEME_SEPARATOR, self.payload)
    }
}

impl fmt::Display for ResourceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl std::str::FromStr for ResourceLocator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
