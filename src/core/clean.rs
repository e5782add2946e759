//! Clean logic
//!
//! Removes install stamps so the next build re-runs configure, build and
//! install for every component. With `all`, the whole working-copy tree goes
//! too. Refuses while a run holds the lock.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use walkdir::WalkDir;

use crate::core::layout::WorkLayout;
use crate::error::{FilesystemError, LockError, PipelineError};
use crate::infra::run_lock::RunLock;

/// Result of clean operation
#[derive(Debug, Default, Serialize)]
pub struct CleanResult {
    /// Paths that were removed
    pub removed: Vec<PathBuf>,
    /// Bytes freed
    pub bytes_freed: u64,
}

/// Total size of regular files under `path`
pub fn dir_size(path: &Path) -> u64 {
    WalkDir::new(path)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.metadata().ok())
        .map(|metadata| metadata.len())
        .sum()
}

/// Clean the working-copy tree at `layout`
///
/// # Errors
///
/// * `LockError::Held` if a run is in progress
/// * `FilesystemError::RemoveDir` if removal fails
pub fn clean(layout: &WorkLayout, all: bool) -> Result<CleanResult, PipelineError> {
    let lock_path = layout.lock_path();
    if RunLock::is_held(&lock_path) {
        return Err(LockError::Held { path: lock_path }.into());
    }

    let target = if all {
        layout.root().to_path_buf()
    } else {
        layout.stamps_dir()
    };

    let mut result = CleanResult::default();
    if target.exists() {
        result.bytes_freed = dir_size(&target);
        fs::remove_dir_all(&target).map_err(|e| FilesystemError::RemoveDir {
            path: target.clone(),
            error: e.to_string(),
        })?;
        result.removed.push(target);
    }
    Ok(result)
}
