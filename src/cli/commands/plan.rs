//! CLI command for `ffstack plan`
//!
//! Dry run of the build: how every component would be acquired and which
//! FFmpeg flags would result. Installs nothing and leaves the working-copy
//! tree alone.

use anyhow::Result;

use crate::cli::output::{create_spinner, print_plan};
use crate::core::build_env::BuildEnvironment;
use crate::core::global_config::Settings;
use crate::core::pipeline::{Host, Pipeline};
use crate::core::version::resolve_version;
use crate::error::PipelineError;
use crate::infra::archive::ReleaseArchives;
use crate::infra::download::DownloadManager;
use crate::infra::git::GitOperations;
use crate::infra::package_manager::SystemPackageManager;
use crate::infra::probe::{HostTools, PkgConfigProbe};
use crate::infra::toolchain::ShellToolchain;

/// Execute the plan command
pub async fn execute(settings: Settings, ffmpeg_version: Option<&str>) -> Result<()> {
    let package_manager =
        SystemPackageManager::configured_or_detected(settings.package_manager, settings.sudo);
    let prerequisites = HostTools::new();
    let source_control = GitOperations::new();
    let toolchain = ShellToolchain::new();
    let probe = PkgConfigProbe::new(&BuildEnvironment::new(
        settings.prefix.clone(),
        settings.bin_dir.clone(),
    ));
    let archives = ReleaseArchives::new(DownloadManager::new());
    let pipeline = Pipeline::new(
        settings,
        Host {
            package_manager: &package_manager,
            prerequisites: &prerequisites,
            source_control: &source_control,
            toolchain: &toolchain,
            probe: &probe,
            archives: &archives,
        },
    );

    let tag = match ffmpeg_version {
        Some(query) => {
            let spinner = create_spinner("Fetching FFmpeg release tags...");
            let candidates = pipeline.candidates().await;
            spinner.finish_and_clear();
            let resolved = resolve_version(&candidates?, query).map_err(PipelineError::from)?;
            Some(resolved.identifier().to_string())
        }
        None => None,
    };

    let plan = pipeline.plan(tag.as_deref()).map_err(PipelineError::from)?;
    print_plan(&plan)
}
