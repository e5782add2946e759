//! Source archive extraction
//!
//! Release tarballs wrap their content in a single top-level directory
//! (`lame-3.100/`); it is stripped so the working copy is keyed by component
//! name only. [`ReleaseArchives`] pairs extraction with the downloader so
//! stages see a single archive collaborator.

use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use futures::future::BoxFuture;
use tar::Archive;
use tracing::debug;

use crate::core::host::ArchiveSource;
use crate::error::{ArchiveError, DownloadError};
use crate::infra::download::{file_digest, DownloadManager};

/// Release tarballs fetched over HTTP and unpacked with `tar`
#[derive(Debug, Clone, Default)]
pub struct ReleaseArchives {
    downloader: DownloadManager,
}

impl ReleaseArchives {
    pub fn new(downloader: DownloadManager) -> Self {
        Self { downloader }
    }
}

impl ArchiveSource for ReleaseArchives {
    fn fetch<'a>(&'a self, url: &'a str, dest: &'a Path) -> BoxFuture<'a, Result<u64, DownloadError>> {
        Box::pin(async move {
            let fetched = self.downloader.download(url, dest).await?;
            debug!("{url}: {} bytes, sha256 {}", fetched.bytes, fetched.sha256);
            Ok(fetched.bytes)
        })
    }

    fn digest(&self, path: &Path) -> Result<String, DownloadError> {
        file_digest(path)
    }

    fn unpack(&self, archive: &Path, dest: &Path) -> Result<(), ArchiveError> {
        unpack_archive(archive, dest)
    }
}

/// Unpack `archive_path` into `dest`, stripping the first path component
///
/// `dest` is created if missing. Supports `.tar.gz`, `.tgz` and `.tar`.
pub fn unpack_archive(archive_path: &Path, dest: &Path) -> Result<(), ArchiveError> {
    let name = archive_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();

    fs::create_dir_all(dest).map_err(|e| io_error(dest, &e))?;

    let file = File::open(archive_path).map_err(|e| io_error(archive_path, &e))?;
    if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        unpack_entries(Archive::new(GzDecoder::new(BufReader::new(file))), archive_path, dest)?;
    } else if name.ends_with(".tar") {
        unpack_entries(Archive::new(BufReader::new(file)), archive_path, dest)?;
    } else {
        return Err(ArchiveError::Unsupported(name.to_string()));
    }

    debug!("Unpacked {} to {}", archive_path.display(), dest.display());
    Ok(())
}

fn unpack_entries<R: io::Read>(
    mut archive: Archive<R>,
    archive_path: &Path,
    dest: &Path,
) -> Result<(), ArchiveError> {
    let entries = archive
        .entries()
        .map_err(|e| io_error(archive_path, &e))?;

    for entry in entries {
        let mut entry = entry.map_err(|e| io_error(archive_path, &e))?;
        let path = entry.path().map_err(|e| io_error(archive_path, &e))?;

        let stripped: PathBuf = path.components().skip(1).collect();
        if stripped.as_os_str().is_empty() {
            continue;
        }
        if stripped
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            debug!("Skipping unsafe archive entry {}", path.display());
            continue;
        }

        let dest_path = dest.join(&stripped);
        if let Some(parent) = dest_path.parent() {
            fs::create_dir_all(parent).map_err(|e| io_error(parent, &e))?;
        }
        entry
            .unpack(&dest_path)
            .map_err(|e| io_error(&dest_path, &e))?;
    }

    Ok(())
}

fn io_error(path: &Path, error: &io::Error) -> ArchiveError {
    ArchiveError::Io {
        path: path.to_path_buf(),
        error: error.to_string(),
    }
}
