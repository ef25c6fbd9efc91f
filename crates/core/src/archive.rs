//! Archive detection and unpacking for downloaded resources.
//!
//! Supports zip, gzip-compressed tar and plain tar. Entries whose paths are
//! absolute or contain `..` are skipped so an archive can never write outside
//! the destination directory.

use flate2::read::GzDecoder;
use std::io::{Cursor, Read};
use std::path::{Component, Path, PathBuf};
use tar::Archive;
use tracing::{debug, trace};

use crate::{Error, Result};

/// Recognized archive formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    /// `.zip`
    Zip,
    /// `.tar.gz` / `.tgz`
    TarGz,
    /// `.tar`
    Tar,
}

impl ArchiveKind {
    /// Detect the format from a file name, falling back to magic bytes.
    #[must_use]
    pub fn detect(name: &str, data: &[u8]) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".zip") {
            return Some(Self::Zip);
        }
        if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
            return Some(Self::TarGz);
        }
        if lower.ends_with(".tar") {
            return Some(Self::Tar);
        }

        if data.starts_with(b"PK\x03\x04") {
            Some(Self::Zip)
        } else if data.starts_with(&[0x1f, 0x8b]) {
            Some(Self::TarGz)
        } else if data.len() > 262 && &data[257..262] == b"ustar" {
            Some(Self::Tar)
        } else {
            None
        }
    }
}

/// Unpack `data` into `dest`.
///
/// With `strip_top_level` the first path component of every entry is
/// dropped (GitHub zipballs wrap everything in `owner-repo-sha/`).
pub fn unpack(
    kind: ArchiveKind,
    data: &[u8],
    dest: &Path,
    strip_top_level: bool,
    locator: &str,
) -> Result<()> {
    debug!(?kind, dest = %dest.display(), strip_top_level, "Unpacking archive");
    std::fs::create_dir_all(dest).map_err(|e| Error::io(e, dest, "create_dir_all"))?;

    match kind {
        ArchiveKind::Zip => unpack_zip(data, dest, strip_top_level, locator),
        ArchiveKind::TarGz => {
            unpack_tar(GzDecoder::new(Cursor::new(data)), dest, strip_top_level, locator)
        }
        ArchiveKind::Tar => unpack_tar(Cursor::new(data), dest, strip_top_level, locator),
    }
}

/// Turn an archive entry path into a safe relative output path.
fn relative_entry_path(path: &Path, strip_top_level: bool) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    let mut components = path.components().filter(|c| !matches!(c, Component::CurDir));
    if strip_top_level {
        components.next()?;
    }
    for component in components {
        match component {
            Component::Normal(part) => out.push(part),
            _ => return None,
        }
    }
    if out.as_os_str().is_empty() {
        None
    } else {
        Some(out)
    }
}

fn unpack_zip(data: &[u8], dest: &Path, strip_top_level: bool, locator: &str) -> Result<()> {
    let mut archive = zip::ZipArchive::new(Cursor::new(data))
        .map_err(|e| Error::archive(locator, format!("Failed to open zip: {e}")))?;

    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .map_err(|e| Error::archive(locator, format!("Failed to read zip entry: {e}")))?;

        let Some(rel) = file
            .enclosed_name()
            .and_then(|name| relative_entry_path(&name, strip_top_level))
        else {
            trace!(name = file.name(), "Skipping zip entry");
            continue;
        };
        let outpath = dest.join(rel);

        if file.is_dir() {
            std::fs::create_dir_all(&outpath)
                .map_err(|e| Error::io(e, &outpath, "create_dir_all"))?;
            continue;
        }

        if let Some(parent) = outpath.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::io(e, parent, "create_dir_all"))?;
        }
        let mut content = Vec::new();
        file.read_to_end(&mut content)
            .map_err(|e| Error::archive(locator, format!("Failed to read zip entry: {e}")))?;
        std::fs::write(&outpath, &content).map_err(|e| Error::io(e, &outpath, "write"))?;

        #[cfg(unix)]
        if let Some(mode) = file.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&outpath, std::fs::Permissions::from_mode(mode))
                .map_err(|e| Error::io(e, &outpath, "set_permissions"))?;
        }
    }

    Ok(())
}

fn unpack_tar<R: Read>(reader: R, dest: &Path, strip_top_level: bool, locator: &str) -> Result<()> {
    let mut archive = Archive::new(reader);
    let entries = archive
        .entries()
        .map_err(|e| Error::archive(locator, format!("Failed to read tar: {e}")))?;

    for entry in entries {
        let mut entry =
            entry.map_err(|e| Error::archive(locator, format!("Failed to read tar entry: {e}")))?;
        let entry_path = entry
            .path()
            .map_err(|e| Error::archive(locator, format!("Invalid path in tar: {e}")))?
            .into_owned();

        let Some(rel) = relative_entry_path(&entry_path, strip_top_level) else {
            trace!(path = %entry_path.display(), "Skipping tar entry");
            continue;
        };
        let outpath = dest.join(rel);
        if let Some(parent) = outpath.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::io(e, parent, "create_dir_all"))?;
        }
        entry
            .unpack(&outpath)
            .map_err(|e| Error::archive(locator, format!("Failed to extract tar entry: {e}")))?;
    }

    Ok(())
}
