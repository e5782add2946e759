//! Platform-specific directory management
//!
//! Where the config file, working copies and the install prefix live when the
//! configuration does not say otherwise. XDG locations on Linux, the standard
//! Library locations on macOS.
//!
//! Environment variables can override default directories:
//! - `FFSTACK_CONFIG_DIR` - Override config directory
//! - `FFSTACK_DATA_DIR` - Override data directory

use std::env;
use std::path::{Path, PathBuf};

use crate::config::defaults::{APP_NAME, BUILD_SUBDIR, SOURCES_SUBDIR};

/// Environment variable names for directory overrides
pub const ENV_CONFIG_DIR: &str = "FFSTACK_CONFIG_DIR";
pub const ENV_DATA_DIR: &str = "FFSTACK_DATA_DIR";

/// Default locations for ffstack's files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FfstackDirs {
    config_dir: PathBuf,
    data_dir: PathBuf,
    home_dir: PathBuf,
}

impl FfstackDirs {
    /// Directories from the environment overrides, else platform defaults
    #[must_use]
    pub fn new() -> Self {
        let home_dir = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            config_dir: locate(ENV_CONFIG_DIR, dirs::config_dir(), &home_dir, &[".config"]),
            data_dir: locate(ENV_DATA_DIR, dirs::data_dir(), &home_dir, &[".local", "share"]),
            home_dir,
        }
    }

    /// Directories rooted at explicit paths
    #[must_use]
    pub fn with_roots(config_dir: PathBuf, data_dir: PathBuf, home_dir: PathBuf) -> Self {
        Self {
            config_dir,
            data_dir,
            home_dir,
        }
    }

    /// Config directory
    ///
    /// - Linux: `$XDG_CONFIG_HOME/ffstack` or `~/.config/ffstack`
    /// - macOS: `~/Library/Application Support/ffstack`
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Data directory
    ///
    /// - Linux: `$XDG_DATA_HOME/ffstack` or `~/.local/share/ffstack`
    /// - macOS: `~/Library/Application Support/ffstack`
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// `config.toml` in the config directory
    pub fn global_config_path(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    /// Default working-copy root
    pub fn default_work_dir(&self) -> PathBuf {
        self.data_dir.join(SOURCES_SUBDIR)
    }

    /// Default install prefix for libraries and headers
    pub fn default_prefix(&self) -> PathBuf {
        self.data_dir.join(BUILD_SUBDIR)
    }

    /// Default directory for installed executables
    pub fn default_bin_dir(&self) -> PathBuf {
        self.home_dir.join("bin")
    }
}

impl Default for FfstackDirs {
    fn default() -> Self {
        Self::new()
    }
}

/// `$var` if set, else `<platform>/ffstack`, else `<home>/<fallback..>/ffstack`
fn locate(var: &str, platform: Option<PathBuf>, home: &Path, fallback: &[&str]) -> PathBuf {
    if let Some(path) = env::var_os(var).filter(|p| !p.is_empty()) {
        return PathBuf::from(path);
    }
    platform.map_or_else(
        || fallback.iter().fold(home.to_path_buf(), |p, part| p.join(part)),
        |p| p,
    )
    .join(APP_NAME)
}
