//! Decoding of archive URL locators.

use reqwest::Url;

use clirack_core::{Error, ResourceLocator, Result, hash_suffix, sanitize_component};

/// Fragment key pinning the expected content digest.
pub const SHA256_FRAGMENT: &str = "sha256=";

/// A download decoded from an `http(s)://` locator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlSource {
    /// URL to download, without the fragment
    pub url: Url,
    /// Last path segment, used to detect the archive kind and name files
    pub file_name: String,
    /// Expected SHA-256 (lowercase hex) when the locator pins the content
    pub pinned_sha256: Option<String>,
}

impl UrlSource {
    /// Decode a locator.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedLocator`] when the locator is not a valid
    /// URL, has no host, or carries a fragment that is not a well-formed
    /// `sha256=<64 hex digits>` marker.
    pub fn parse(locator: &ResourceLocator) -> Result<Self> {
        let raw = locator.raw();
        let mut url = Url::parse(raw).map_err(|e| Error::malformed(raw, e.to_string()))?;
        if url.host_str().is_none_or(str::is_empty) {
            return Err(Error::malformed(raw, "URL has no host"));
        }

        let pinned_sha256 = match url.fragment() {
            None | Some("") => None,
            Some(fragment) => {
                let digest = fragment.strip_prefix(SHA256_FRAGMENT).ok_or_else(|| {
                    Error::malformed(raw, "only '#sha256=<hex>' fragments are supported")
                })?;
                if digest.len() != 64 || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
                    return Err(Error::malformed(
                        raw,
                        "sha256 marker must be 64 hexadecimal digits",
                    ));
                }
                Some(digest.to_ascii_lowercase())
            }
        };
        url.set_fragment(None);

        let file_name = url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|segment| !segment.is_empty())
            .map_or_else(|| "download".to_string(), sanitize_component);

        Ok(Self {
            url,
            file_name,
            pinned_sha256,
        })
    }

    /// Directory name under the target directory: `{file_name}-{hash8}`,
    /// hashed over the URL without its fragment, plus the first 8 digits of
    /// the pinned digest when there is one.
    #[must_use]
    pub fn dir_name(&self) -> String {
        let name = format!("{}-{}", self.file_name, hash_suffix(self.url.as_str()));
        match &self.pinned_sha256 {
            Some(digest) => format!("{name}-{}", &digest[..8]),
            None => name,
        }
    }

    /// Copy of `locator` with the decoded pieces attached as fields.
    #[must_use]
    pub fn annotate(&self, locator: &ResourceLocator) -> ResourceLocator {
        let located = locator
            .clone()
            .with_field("url", self.url.as_str())
            .with_field("file_name", &self.file_name);
        match &self.pinned_sha256 {
            Some(digest) => located.with_field("sha256", digest),
            None => located,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIGEST: &str = "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08";

    fn parse(raw: &str) -> Result<UrlSource> {
        UrlSource::parse(&ResourceLocator::parse(raw).unwrap())
    }

    #[test]
    fn test_parse_plain_url() {
        let source = parse("https://example.com/releases/tool-1.0.tar.gz").unwrap();
        assert_eq!(source.file_name, "tool-1.0.tar.gz");
        assert_eq!(source.pinned_sha256, None);
        assert_eq!(
            source.url.as_str(),
            "https://example.com/releases/tool-1.0.tar.gz"
        );
    }

    #[test]
    fn test_parse_pinned_url() {
        let raw = format!("https://example.com/pkg.zip#sha256={}", DIGEST.to_uppercase());
        let source = parse(&raw).unwrap();
        assert_eq!(source.pinned_sha256.as_deref(), Some(DIGEST));
        assert_eq!(source.url.fragment(), None);
    }

    #[test]
    fn test_dir_name_separates_pinned_content() {
        let plain = parse("https://example.com/pkg.zip").unwrap();
        let pinned = parse(&format!("https://example.com/pkg.zip#sha256={DIGEST}")).unwrap();
        let other = parse(&format!("https://example.com/pkg.zip#sha256={}", "0".repeat(64))).unwrap();

        assert!(plain.dir_name().starts_with("pkg.zip-"));
        assert_eq!(pinned.dir_name(), format!("{}-9f86d081", plain.dir_name()));
        assert_ne!(pinned.dir_name(), other.dir_name());
    }

    #[test]
    fn test_url_without_path_uses_fallback_name() {
        let source = parse("https://example.com/").unwrap();
        assert_eq!(source.file_name, "download");
    }

    #[test]
    fn test_rejects_bad_fragments() {
        for raw in [
            "https://example.com/pkg.zip#md5=abc",
            "https://example.com/pkg.zip#sha256=abc",
            "https://example.com/pkg.zip#sha256=zz86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08",
        ] {
            assert!(
                matches!(parse(raw), Err(Error::MalformedLocator { .. })),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn test_rejects_unparseable_url() {
        assert!(matches!(
            parse("https://"),
            Err(Error::MalformedLocator { .. })
        ));
    }
}
