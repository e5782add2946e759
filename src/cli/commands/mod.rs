//! CLI command implementations
//!
//! Each command is implemented in its own submodule.

pub mod build;
pub mod clean;
pub mod doctor;
pub mod plan;
pub mod versions;

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Subcommand;

use crate::core::component::ComponentTable;
use crate::core::global_config::{GlobalConfig, Overrides, Settings};
use crate::error::PipelineError;
use crate::infra::dirs::FfstackDirs;

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the media stack and FFmpeg
    Build {
        /// FFmpeg release to build: empty for latest stable, a major number, or an exact tag
        #[arg(long = "ffmpeg-version", value_name = "QUERY")]
        ffmpeg_version: Option<String>,

        /// Number of parallel build jobs
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Rebuild components even when their install stamp is current
        #[arg(short, long)]
        force: bool,

        /// Never prompt; build the latest stable release unless a version is given
        #[arg(short, long)]
        yes: bool,

        /// Leave a component out (repeatable)
        #[arg(long, value_name = "NAME")]
        skip: Vec<String>,

        /// Build everything from source instead of installing packages
        #[arg(long)]
        no_package_manager: bool,

        /// Working-copy root for sources, archives, stamps and logs
        #[arg(long, value_name = "DIR")]
        work_dir: Option<PathBuf>,

        /// Install prefix for built libraries
        #[arg(long, value_name = "DIR")]
        prefix: Option<PathBuf>,

        /// Directory receiving built executables
        #[arg(long, value_name = "DIR")]
        bin_dir: Option<PathBuf>,
    },

    /// List FFmpeg release tags
    Versions {
        /// Show what this query would resolve to
        query: Option<String>,

        /// Include development and pre-release tags
        #[arg(short, long)]
        all: bool,
    },

    /// Show what a build would do, without installing or building anything
    Plan {
        /// FFmpeg release to plan for (resolved against the remote tag list)
        #[arg(long = "ffmpeg-version", value_name = "QUERY")]
        ffmpeg_version: Option<String>,

        /// Leave a component out (repeatable)
        #[arg(long, value_name = "NAME")]
        skip: Vec<String>,

        /// Plan as if no package manager were available
        #[arg(long)]
        no_package_manager: bool,
    },

    /// Check system dependencies
    Doctor,

    /// Remove install stamps so the next build starts over
    Clean {
        /// Also remove the whole working-copy tree
        #[arg(short, long)]
        all: bool,
    },
}

impl Commands {
    /// Execute the command
    pub async fn run(self, config: Option<&Path>) -> Result<()> {
        match self {
            Self::Build {
                ffmpeg_version,
                jobs,
                force,
                yes,
                skip,
                no_package_manager,
                work_dir,
                prefix,
                bin_dir,
            } => {
                let overrides = Overrides {
                    work_dir,
                    prefix,
                    bin_dir,
                    jobs,
                    skip,
                    no_package_manager,
                };
                let settings = load_settings(config, &overrides)?;
                build::execute(settings, ffmpeg_version, force, yes).await
            }
            Self::Versions { query, all } => {
                let settings = load_settings(config, &Overrides::default())?;
                versions::execute(settings, query.as_deref(), all).await
            }
            Self::Plan {
                ffmpeg_version,
                skip,
                no_package_manager,
            } => {
                let overrides = Overrides {
                    skip,
                    no_package_manager,
                    ..Overrides::default()
                };
                let settings = load_settings(config, &overrides)?;
                plan::execute(settings, ffmpeg_version.as_deref()).await
            }
            Self::Doctor => {
                let settings = load_settings(config, &Overrides::default())?;
                doctor::execute(&settings)
            }
            Self::Clean { all } => {
                let settings = load_settings(config, &Overrides::default())?;
                clean::execute(&settings, all)
            }
        }
    }
}

/// Load the configuration file and merge it with `overrides`
///
/// `config` replaces the default config file location.
pub fn load_settings(config: Option<&Path>, overrides: &Overrides) -> Result<Settings> {
    let dirs = FfstackDirs::new();
    let file = match config {
        Some(path) => GlobalConfig::load_from_path(path),
        None => GlobalConfig::load(&dirs),
    }
    .map_err(PipelineError::from)?;

    let settings = file
        .resolve(&dirs, overrides, &ComponentTable::builtin())
        .map_err(PipelineError::from)?;
    Ok(settings)
}
