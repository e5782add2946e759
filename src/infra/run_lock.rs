//! Run lock
//!
//! A lock file at the working-copy root serializes runs. It is created with
//! `create_new`, so a second run fails instead of waiting, and removed when
//! the guard drops.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::LockError;

/// Held lock; released on drop
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    /// Take the lock at `path`
    pub fn acquire(path: &Path) -> Result<Self, LockError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| LockError::IoError {
                path: parent.to_path_buf(),
                error: e.to_string(),
            })?;
        }

        let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(LockError::Held {
                    path: path.to_path_buf(),
                });
            }
            Err(e) => {
                return Err(LockError::IoError {
                    path: path.to_path_buf(),
                    error: e.to_string(),
                });
            }
        };

        writeln!(file, "{}", std::process::id()).map_err(|e| LockError::IoError {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
        debug!("Acquired run lock {}", path.display());

        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    /// Whether some run currently holds the lock at `path`
    pub fn is_held(path: &Path) -> bool {
        path.exists()
    }

    /// Lock file path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("Failed to remove run lock {}: {e}", self.path.display());
        }
    }
}
