//! Install stamps
//!
//! A stamp is written after a component's stage reaches `done` and records
//! what was installed: the source identity (tag or archive digest) and the
//! configure flags. A matching stamp lets a later run skip configure, build and
//! install for an up-to-date working copy.

use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stamp errors
#[derive(Error, Debug)]
pub enum StampError {
    /// Failed to read or write the stamp file
    #[error("IO error for stamp '{path}': {error}")]
    Io { path: String, error: String },

    /// Failed to encode the stamp
    #[error("Failed to encode stamp: {0}")]
    Encode(#[from] serde_json::Error),
}

/// What a completed stage installed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallStamp {
    /// Component name
    pub component: String,
    /// Tag for git sources, SHA-256 for archives
    pub source: String,
    /// Configure flags the component was built with
    pub flags: Vec<String>,
    /// Seconds since the Unix epoch
    #[serde(default)]
    pub installed_at: u64,
}

impl InstallStamp {
    /// Stamp for `component` built from `source` with `flags`
    pub fn new(component: &str, source: &str, flags: &[String]) -> Self {
        let installed_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        Self {
            component: component.to_string(),
            source: source.to_string(),
            flags: flags.to_vec(),
            installed_at,
        }
    }

    /// Load a stamp; a missing or unreadable stamp counts as absent
    pub fn load(path: &Path) -> Option<Self> {
        let content = fs::read_to_string(path).ok()?;
        match serde_json::from_str(&content) {
            Ok(stamp) => Some(stamp),
            Err(e) => {
                tracing::debug!("Ignoring malformed stamp {}: {e}", path.display());
                None
            }
        }
    }

    /// Write the stamp, creating its directory
    pub fn save(&self, path: &Path) -> Result<(), StampError> {
        let io_error = |e: std::io::Error| StampError::Io {
            path: path.display().to_string(),
            error: e.to_string(),
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_error)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).map_err(io_error)
    }

    /// Whether this stamp describes the same install as `source` + `flags`
    pub fn matches(&self, source: &str, flags: &[String]) -> bool {
        self.source == source && self.flags == flags
    }
}
