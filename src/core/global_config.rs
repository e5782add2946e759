//! Global configuration management
//!
//! Reads settings from `config.toml` in the config directory (or an explicit
//! path) and merges them with command-line overrides. Precedence is
//! command line, then file, then built-in defaults.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::config::urls;
use crate::core::component::{ComponentTable, PackageManagerKind};
use crate::infra::dirs::FfstackDirs;

/// Global configuration error types
#[derive(Error, Debug)]
pub enum GlobalConfigError {
    /// Failed to read config file
    #[error("Failed to read config file '{path}': {error}")]
    ReadError { path: String, error: String },

    /// Failed to parse config file
    #[error("Failed to parse config file '{path}': {error}")]
    ParseError { path: String, error: String },

    /// A setting has an unusable value
    #[error("Invalid value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },
}

/// Contents of `config.toml`; every key is optional
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GlobalConfig {
    /// Working-copy root
    pub work_dir: Option<PathBuf>,
    /// Install prefix for libraries and headers
    pub prefix: Option<PathBuf>,
    /// Directory receiving executables
    pub bin_dir: Option<PathBuf>,
    /// Parallel jobs within a build step
    pub jobs: Option<usize>,
    /// Optional components never to acquire
    #[serde(default)]
    pub skip: Vec<String>,
    /// Never try the system package manager
    pub no_package_manager: Option<bool>,
    /// Force a package manager instead of detecting one
    pub package_manager: Option<PackageManagerKind>,
    /// Run package installs through sudo
    pub sudo: Option<bool>,
    /// Extra flags appended to the ffmpeg configure
    #[serde(default)]
    pub ffmpeg_extra_flags: Vec<String>,
    /// Base URL of the tag listing API
    pub github_api: Option<String>,
    /// Repository (`owner/name`) whose tags drive version resolution
    pub ffmpeg_repo: Option<String>,
}

/// Settings given on the command line
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// `--work-dir`
    pub work_dir: Option<PathBuf>,
    /// `--prefix`
    pub prefix: Option<PathBuf>,
    /// `--bin-dir`
    pub bin_dir: Option<PathBuf>,
    /// `--jobs`
    pub jobs: Option<usize>,
    /// `--skip`, added to the configured list
    pub skip: Vec<String>,
    /// `--no-package-manager`
    pub no_package_manager: bool,
}

/// Effective settings for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub work_dir: PathBuf,
    pub prefix: PathBuf,
    pub bin_dir: PathBuf,
    pub jobs: usize,
    pub skip: BTreeSet<String>,
    pub no_package_manager: bool,
    pub package_manager: Option<PackageManagerKind>,
    pub sudo: bool,
    pub ffmpeg_extra_flags: Vec<String>,
    pub github_api: String,
    pub ffmpeg_repo: String,
}

impl GlobalConfig {
    /// Load global configuration from the config directory
    ///
    /// If the config file doesn't exist, returns default configuration.
    /// If the config file exists but is invalid, returns an error.
    pub fn load(dirs: &FfstackDirs) -> Result<Self, GlobalConfigError> {
        Self::load_from_path(&dirs.global_config_path())
    }

    /// Load global configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, GlobalConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| GlobalConfigError::ReadError {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| GlobalConfigError::ParseError {
            path: path.display().to_string(),
            error: e.to_string(),
        })
    }

    /// Merge with command-line overrides and defaults
    ///
    /// Skipped component names are checked against `table`.
    pub fn resolve(
        &self,
        dirs: &FfstackDirs,
        overrides: &Overrides,
        table: &ComponentTable,
    ) -> Result<Settings, GlobalConfigError> {
        let jobs = overrides
            .jobs
            .or(self.jobs)
            .unwrap_or_else(num_cpus::get);
        if jobs == 0 {
            return Err(GlobalConfigError::InvalidValue {
                key: "jobs".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }

        let skip: BTreeSet<String> = self
            .skip
            .iter()
            .chain(overrides.skip.iter())
            .cloned()
            .collect();
        if let Some(unknown) = skip.iter().find(|name| table.get(name).is_none()) {
            let known: Vec<&str> = table.iter().map(|c| c.name.as_str()).collect();
            return Err(GlobalConfigError::InvalidValue {
                key: "skip".to_string(),
                reason: format!("unknown component '{unknown}' (known: {})", known.join(", ")),
            });
        }

        let ffmpeg_repo = self
            .ffmpeg_repo
            .clone()
            .unwrap_or_else(|| urls::FFMPEG_REPO.to_string());
        if ffmpeg_repo.split('/').filter(|part| !part.is_empty()).count() != 2 {
            return Err(GlobalConfigError::InvalidValue {
                key: "ffmpeg_repo".to_string(),
                reason: format!("'{ffmpeg_repo}' is not of the form owner/name"),
            });
        }

        Ok(Settings {
            work_dir: overrides
                .work_dir
                .clone()
                .or_else(|| self.work_dir.clone())
                .unwrap_or_else(|| dirs.default_work_dir()),
            prefix: overrides
                .prefix
                .clone()
                .or_else(|| self.prefix.clone())
                .unwrap_or_else(|| dirs.default_prefix()),
            bin_dir: overrides
                .bin_dir
                .clone()
                .or_else(|| self.bin_dir.clone())
                .unwrap_or_else(|| dirs.default_bin_dir()),
            jobs,
            skip,
            no_package_manager: overrides.no_package_manager
                || self.no_package_manager.unwrap_or(false),
            package_manager: self.package_manager,
            sudo: self.sudo.unwrap_or(true),
            ffmpeg_extra_flags: self.ffmpeg_extra_flags.clone(),
            github_api: self
                .github_api
                .clone()
                .unwrap_or_else(|| urls::GITHUB_API.to_string()),
            ffmpeg_repo,
        })
    }
}
