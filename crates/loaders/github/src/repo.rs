//! `github://` payload grammar.
//!
//! ```text
//! github://owner/repo
//! github://owner/repo@v1.2.0
//! github://owner/repo@main/packages/wifi
//! github://owner/repo/packages/wifi
//! ```
//!
//! The ref runs up to the next `/`, so refs that themselves contain a slash
//! (`feature/x`) cannot be expressed.

use std::path::{Component, Path};

use clirack_core::{Error, ResourceLocator, Result, hash_suffix};

/// A repository reference decoded from a `github://` locator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitHubRepo {
    /// Repository owner (user or organization)
    pub owner: String,
    /// Repository name
    pub repo: String,
    /// Branch, tag or commit; `None` means the default branch
    pub reference: Option<String>,
    /// Path inside the repository the locator points at
    pub subpath: Option<String>,
}

impl GitHubRepo {
    /// Decode the payload of a `github://` locator.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedLocator`] when the payload does not match
    /// `owner/repo[@ref][/subpath]`.
    pub fn parse(locator: &ResourceLocator) -> Result<Self> {
        let raw = locator.raw();
        let malformed = |reason: &str| Error::malformed(raw, reason);

        let (owner, rest) = locator
            .payload()
            .split_once('/')
            .ok_or_else(|| malformed("expected github://owner/repo[@ref][/subpath]"))?;

        if owner.is_empty() || !owner.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(malformed("owner must be non-empty and contain only letters, digits and '-'"));
        }

        let repo_end = rest.find(['@', '/']).unwrap_or(rest.len());
        let (repo, rest) = rest.split_at(repo_end);
        if repo.is_empty()
            || !repo
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        {
            return Err(malformed(
                "repository must be non-empty and contain only letters, digits, '.', '_' and '-'",
            ));
        }

        let (reference, rest) = match rest.strip_prefix('@') {
            Some(after) => {
                let (reference, rest) = after.split_at(after.find('/').unwrap_or(after.len()));
                if reference.is_empty() {
                    return Err(malformed("ref after '@' is empty"));
                }
                (Some(reference.to_string()), rest)
            }
            None => (None, rest),
        };

        let subpath = rest.trim_matches('/');
        let subpath = if subpath.is_empty() {
            None
        } else {
            let escapes = Path::new(subpath)
                .components()
                .any(|c| !matches!(c, Component::Normal(_)));
            if escapes {
                return Err(malformed("subpath must be relative and must not contain '..'"));
            }
            Some(subpath.to_string())
        };

        Ok(Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            reference,
            subpath,
        })
    }

    /// `owner/repo`
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    /// Ref to resolve against the API; the default branch when unset.
    #[must_use]
    pub fn reference_or_head(&self) -> &str {
        self.reference.as_deref().unwrap_or("HEAD")
    }

    /// Directory name under the target directory: `{owner}-{repo}-{hash8}`.
    ///
    /// The hash covers owner, repo, ref and subpath, so the name is stable
    /// across runs and distinct locators never share a directory.
    #[must_use]
    pub fn dir_name(&self) -> String {
        let mut key = format!(
            "{}/{}@{}",
            self.owner,
            self.repo,
            self.reference.as_deref().unwrap_or_default()
        );
        if let Some(subpath) = &self.subpath {
            key.push('/');
            key.push_str(subpath);
        }
        format!("{}-{}-{}", self.owner, self.repo, hash_suffix(&key))
    }

    /// Copy of `locator` with the decoded pieces attached as fields.
    #[must_use]
    pub fn annotate(&self, locator: &ResourceLocator) -> ResourceLocator {
        let mut located = locator
            .clone()
            .with_field("owner", &self.owner)
            .with_field("repo", &self.repo);
        if let Some(reference) = &self.reference {
            located = located.with_field("ref", reference);
        }
        if let Some(subpath) = &self.subpath {
            located = located.with_field("subpath", subpath);
        }
        located
    }
}
