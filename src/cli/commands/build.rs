//! CLI command for `ffstack build`
//!
//! Resolves the FFmpeg release, then runs the full pipeline.

use anyhow::{Context, Result};
use tracing::debug;

use crate::cli::output::{create_spinner, is_json, print_info, print_report, print_warning, stage_progress};
use crate::cli::prompt::{self, VERSION_PROMPT};
use crate::core::build_env::BuildEnvironment;
use crate::core::global_config::Settings;
use crate::core::pipeline::{Host, Pipeline};
use crate::core::version::{resolve_version, VersionCandidate, VersionError};
use crate::error::PipelineError;
use crate::infra::archive::ReleaseArchives;
use crate::infra::download::DownloadManager;
use crate::infra::git::GitOperations;
use crate::infra::package_manager::SystemPackageManager;
use crate::infra::probe::{HostTools, PkgConfigProbe};
use crate::infra::toolchain::ShellToolchain;

/// Execute the build command
pub async fn execute(
    settings: Settings,
    ffmpeg_version: Option<String>,
    force: bool,
    yes: bool,
) -> Result<()> {
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

    let host = Host {
        package_manager: &package_manager,
        prerequisites: &prerequisites,
        source_control: &source_control,
        toolchain: &toolchain,
        probe: &probe,
        archives: &archives,
    };
    let pipeline = Pipeline::new(settings, host).with_force(force);

    let interactive = ffmpeg_version.is_none() && !yes && !is_json() && prompt::is_interactive();
    let release = choose_release(&pipeline, ffmpeg_version.as_deref(), interactive).await?;
    print_info(&format!("Building ffmpeg {}", release.identifier()));

    let report = pipeline
        .run(release.identifier(), Some(stage_progress()))
        .await?;
    print_report(&report)?;

    match report.error() {
        Some(err) => Err(PipelineError::from(err.clone()).into()),
        None => Ok(()),
    }
}

/// Fetch the tag list and pick the release to build
///
/// Interactive sessions ask until an answer resolves; otherwise `query`
/// (or latest stable) must resolve on the first try.
async fn choose_release(
    pipeline: &Pipeline<'_>,
    query: Option<&str>,
    interactive: bool,
) -> Result<VersionCandidate> {
    let spinner = create_spinner("Fetching FFmpeg release tags...");
    let candidates = pipeline.candidates().await;
    spinner.finish_and_clear();
    let candidates = candidates?;
    debug!("{} release tag(s) available", candidates.len());

    if !interactive {
        let resolved = resolve_version(&candidates, query.unwrap_or_default())
            .map_err(PipelineError::from)?;
        return Ok(resolved);
    }

    let mut last_error: Option<VersionError> = None;
    loop {
        let Some(answer) = prompt::ask(VERSION_PROMPT).context("Failed to read FFmpeg version")?
        else {
            // End of input: take the default unless an answer was already rejected
            return match last_error {
                Some(err) => Err(PipelineError::from(err).into()),
                None => Ok(resolve_version(&candidates, "").map_err(PipelineError::from)?),
            };
        };

        match resolve_version(&candidates, &answer) {
            Ok(resolved) => return Ok(resolved),
            Err(err) => {
                print_warning(&err.to_string());
                last_error = Some(err);
            }
        }
    }
}
