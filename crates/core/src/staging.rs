//! Staged materialization with an atomic swap into place.
//!
//! Downloads are unpacked into a sibling staging directory
//! (`.<name>.staging-XXXX`). Only a complete staging directory is swapped
//! into the final location; a dropped [`Staging`] removes its contents, so an
//! interrupted or timed-out fetch never leaves a half-written directory where
//! the cache expects one.

use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

use crate::{Error, Result};

/// A staging directory destined for `dest`.
#[derive(Debug)]
pub struct Staging {
    dir: TempDir,
    dest: PathBuf,
}

impl Staging {
    /// Create a staging directory next to `dest`.
    pub fn new(dest: impl Into<PathBuf>) -> Result<Self> {
        let dest = dest.into();
        let parent = dest.parent().ok_or_else(|| {
            Error::io(
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "destination has no parent"),
                &dest,
                "create staging directory",
            )
        })?;
        std::fs::create_dir_all(parent).map_err(|e| Error::io(e, parent, "create_dir_all"))?;

        let dir = tempfile::Builder::new()
            .prefix(&format!(".{}.staging-", file_name(&dest)))
            .tempdir_in(parent)
            .map_err(|e| Error::io(e, parent, "create staging directory"))?;

        debug!(staging = %dir.path().display(), dest = %dest.display(), "Created staging directory");
        Ok(Self { dir, dest })
    }

    /// Where to write staged content.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Final destination.
    #[must_use]
    pub fn dest(&self) -> &Path {
        &self.dest
    }

    /// Replace `dest` with the staged content.
    ///
    /// The previous content is moved aside first and restored if the final
    /// rename fails.
    pub fn commit(self) -> Result<PathBuf> {
        let Self { dir, dest } = self;
        let backup = dest.with_file_name(format!(".{}.old", file_name(&dest)));

        if backup.exists() {
            std::fs::remove_dir_all(&backup).map_err(|e| Error::io(e, &backup, "remove_dir_all"))?;
        }

        let had_previous = dest.exists();
        if had_previous {
            std::fs::rename(&dest, &backup).map_err(|e| Error::io(e, &dest, "rename"))?;
        }

        let staged = dir.keep();
        if let Err(e) = std::fs::rename(&staged, &dest) {
            if had_previous && let Err(restore) = std::fs::rename(&backup, &dest) {
                warn!(error = %restore, dest = %dest.display(), "Failed to restore previous content");
            }
            let _ = std::fs::remove_dir_all(&staged);
            return Err(Error::io(e, &dest, "rename"));
        }

        if had_previous && let Err(e) = std::fs::remove_dir_all(&backup) {
            warn!(error = %e, backup = %backup.display(), "Failed to remove previous content");
        }

        debug!(dest = %dest.display(), "Committed staged content");
        Ok(dest)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| "resource".to_string(), |n| n.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_into_empty_location() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("pkg");

        let staging = Staging::new(&dest).unwrap();
        std::fs::write(staging.path().join("a.txt"), b"a").unwrap();
        let committed = staging.commit().unwrap();

        assert_eq!(committed, dest);
        assert!(dest.join("a.txt").is_file());
    }

    #[test]
    fn test_commit_replaces_previous_content_entirely() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("pkg");
        std::fs::create_dir_all(&dest).unwrap();
        std::fs::write(dest.join("stale.txt"), b"old").unwrap();

        let staging = Staging::new(&dest).unwrap();
        std::fs::write(staging.path().join("fresh.txt"), b"new").unwrap();
        staging.commit().unwrap();

        assert!(dest.join("fresh.txt").is_file());
        assert!(!dest.join("stale.txt").exists());
        assert!(!temp.path().join(".pkg.old").exists());
    }

    #[test]
    fn test_dropped_staging_leaves_previous_content() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("pkg");
        std::fs::create_dir_all(&dest).unwrap();
        std::fs::write(dest.join("keep.txt"), b"old").unwrap();

        {
            let staging = Staging::new(&dest).unwrap();
            std::fs::write(staging.path().join("partial.bin"), b"half").unwrap();
        }

        assert!(dest.join("keep.txt").is_file());
        assert!(!dest.join("partial.bin").exists());
        let leftovers: Vec<_> = std::fs::read_dir(temp.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains("staging"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
