//! CLI command for `ffstack versions`
//!
//! Lists release tags of the FFmpeg repository, newest first.

use anyhow::Result;
use serde::Serialize;

use crate::cli::output::{create_spinner, is_json, is_quiet, print_detail, print_info, print_json, status};
use crate::core::global_config::Settings;
use crate::core::pipeline::release_candidates;
use crate::core::version::{resolve_version, sort_candidates, VersionCandidate};
use crate::error::PipelineError;

#[derive(Serialize)]
struct VersionsOutput<'a> {
    versions: &'a [VersionCandidate],
    #[serde(skip_serializing_if = "Option::is_none")]
    query: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    resolved: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Candidates to list: stable only unless `all`, newest first
pub fn listed(candidates: &[VersionCandidate], all: bool) -> Vec<VersionCandidate> {
    let mut listed: Vec<VersionCandidate> = candidates
        .iter()
        .filter(|c| all || c.is_stable())
        .cloned()
        .collect();
    sort_candidates(&mut listed);
    listed.dedup_by(|a, b| a.identifier() == b.identifier());
    listed.reverse();
    listed
}

/// Execute the versions command
pub async fn execute(settings: Settings, query: Option<&str>, all: bool) -> Result<()> {
    let spinner = create_spinner("Fetching FFmpeg release tags...");
    let candidates = release_candidates(&settings).await;
    spinner.finish_and_clear();
    let candidates = candidates?;

    let versions = listed(&candidates, all);
    let resolution = query.map(|q| resolve_version(&candidates, q));

    if is_json() {
        let error = match resolution {
            Some(Err(ref e)) => Some(e.to_string()),
            _ => None,
        };
        print_json(&VersionsOutput {
            versions: &versions,
            query,
            resolved: match resolution {
                Some(Ok(ref c)) => Some(c.identifier()),
                _ => None,
            },
            error,
        })?;
    } else if !is_quiet() {
        if versions.is_empty() {
            print_info("No releases found");
        }
        for candidate in &versions {
            if candidate.is_stable() {
                println!("  {}", candidate.identifier());
            } else {
                println!("  {} (pre-release)", candidate.identifier());
            }
        }
        if let Some(Ok(ref resolved)) = resolution {
            println!();
            println!(
                "{} '{}' resolves to {}",
                status::SUCCESS,
                query.unwrap_or_default(),
                resolved.identifier()
            );
            print_detail(&format!(
                "Build it with: ffstack build --ffmpeg-version {}",
                resolved.identifier()
            ));
        }
    }

    match resolution {
        Some(Err(err)) => Err(PipelineError::from(err).into()),
        _ => Ok(()),
    }
}
