//! Working-copy tree layout
//!
//! ```text
//! <work_dir>/
//!   <component>/          working copy (git clone or unpacked archive)
//!   build/<component>/    out-of-tree build dir (cmake, meson)
//!   archives/             downloaded source archives
//!   stamps/               install stamps
//!   logs/                 toolchain output per component
//!   .ffstack.lock         held while a run is active
//! ```

use std::path::{Path, PathBuf};

use crate::config::defaults::{
    ARCHIVES_SUBDIR, BUILD_SUBDIR, LOCK_FILE_NAME, LOGS_SUBDIR, STAMPS_SUBDIR,
};

/// Paths under one working-copy root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkLayout {
    root: PathBuf,
}

impl WorkLayout {
    /// Layout rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The working-copy root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Working copy of `component`
    pub fn source_dir(&self, component: &str) -> PathBuf {
        self.root.join(component)
    }

    /// Out-of-tree build directory of `component`
    pub fn build_dir(&self, component: &str) -> PathBuf {
        self.root.join(BUILD_SUBDIR).join(component)
    }

    /// Directory holding downloaded archives
    pub fn archives_dir(&self) -> PathBuf {
        self.root.join(ARCHIVES_SUBDIR)
    }

    /// Downloaded archive `file_name`
    pub fn archive_path(&self, file_name: &str) -> PathBuf {
        self.archives_dir().join(file_name)
    }

    /// Directory holding install stamps
    pub fn stamps_dir(&self) -> PathBuf {
        self.root.join(STAMPS_SUBDIR)
    }

    /// Install stamp of `component`
    pub fn stamp_path(&self, component: &str) -> PathBuf {
        self.stamps_dir().join(format!("{component}.stamp"))
    }

    /// Directory holding toolchain logs
    pub fn logs_dir(&self) -> PathBuf {
        self.root.join(LOGS_SUBDIR)
    }

    /// Toolchain log of `component`
    pub fn log_path(&self, component: &str) -> PathBuf {
        self.logs_dir().join(format!("{component}.log"))
    }

    /// Run lock file
    pub fn lock_path(&self) -> PathBuf {
        self.root.join(LOCK_FILE_NAME)
    }
}
