//! Output formatting and progress indicators
//!
//! This module provides utilities for displaying spinners, status lines and
//! the end-of-run summary, in human or JSON form.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use crate::core::pipeline::{ComponentSummary, Plan, PipelineReport};
use crate::core::stage::{Acquired, StageCallback, StageState};
use crate::error::PipelineError;

static QUIET: AtomicBool = AtomicBool::new(false);
static JSON: AtomicBool = AtomicBool::new(false);

/// Global output settings taken from the command line
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputConfig {
    pub quiet: bool,
    pub json: bool,
    pub verbose: u8,
}

impl OutputConfig {
    /// Create output settings
    pub fn new(quiet: bool, json: bool, verbose: u8) -> Self {
        Self {
            quiet,
            json,
            verbose,
        }
    }

    /// Make these settings visible to every output helper
    pub fn apply_global(self) {
        QUIET.store(self.quiet, Ordering::Relaxed);
        JSON.store(self.json, Ordering::Relaxed);
    }

    /// Default tracing filter for these settings
    pub fn log_level(self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else {
            match self.verbose {
                0 => tracing::Level::WARN,
                1 => tracing::Level::INFO,
                _ => tracing::Level::DEBUG,
            }
        }
    }
}

/// Whether `--quiet` is active
pub fn is_quiet() -> bool {
    QUIET.load(Ordering::Relaxed)
}

/// Whether `--json` is active
pub fn is_json() -> bool {
    JSON.load(Ordering::Relaxed)
}

/// Whether human-readable progress should be drawn
fn shows_progress() -> bool {
    !is_quiet() && !is_json()
}

/// Create a spinner for operations with unknown duration
pub fn create_spinner(message: &str) -> ProgressBar {
    if !shows_progress() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner()
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
        .template("{spinner:.blue} {msg}")
    {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(80));
    pb
}

/// Stage observer driving one spinner per component
pub fn stage_progress() -> StageCallback {
    let current: Mutex<Option<ProgressBar>> = Mutex::new(None);
    Box::new(move |component, state| {
        let Ok(mut current) = current.lock() else {
            return;
        };
        match state {
            StageState::Fetching => {
                *current = Some(create_spinner(&format!("{component}: {state}")));
            }
            StageState::Done | StageState::Failed | StageState::Skipped => {
                if let Some(pb) = current.take() {
                    pb.finish_and_clear();
                }
            }
            _ => {
                if let Some(ref pb) = *current {
                    pb.set_message(format!("{component}: {state}"));
                }
            }
        }
    })
}

/// Status message prefixes
pub mod status {
    /// Success prefix (green checkmark)
    pub const SUCCESS: &str = "✓";

    /// Error prefix (red X)
    pub const ERROR: &str = "✗";

    /// Warning prefix (yellow triangle)
    pub const WARNING: &str = "⚠";

    /// Info prefix (blue circle)
    pub const INFO: &str = "ℹ";

    /// Skipped prefix
    pub const SKIPPED: &str = "-";
}

/// Print a success line
pub fn print_success(message: &str) {
    if shows_progress() {
        println!("{} {message}", status::SUCCESS);
    }
}

/// Print an informational line
pub fn print_info(message: &str) {
    if shows_progress() {
        println!("{} {message}", status::INFO);
    }
}

/// Print a warning line (stderr, kept under `--quiet`)
pub fn print_warning(message: &str) {
    if !is_json() {
        eprintln!("{} {message}", status::WARNING);
    }
}

/// Print an indented detail line
pub fn print_detail(message: &str) {
    if shows_progress() {
        println!("    {message}");
    }
}

/// Print `value` as pretty JSON on stdout
pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Report a fatal error on stderr
pub fn display_error(error: &anyhow::Error) {
    if is_json() {
        let code = error
            .downcast_ref::<PipelineError>()
            .map_or(crate::error::exit_code::OTHER, PipelineError::exit_code);
        let body = serde_json::json!({
            "status": "error",
            "exit_code": code,
            "error": format!("{error:#}"),
        });
        eprintln!("{body}");
        return;
    }

    eprintln!("{} {error}", status::ERROR);
    for cause in error.chain().skip(1) {
        eprintln!("    caused by: {cause}");
    }
}

/// Label for a component's stage in the summary
pub fn stage_label(component: &ComponentSummary) -> String {
    match component.state {
        StageState::Done if component.up_to_date => "up to date".to_string(),
        StageState::Done => match component.acquired {
            Some(Acquired::Fresh) => "built (fresh)".to_string(),
            Some(Acquired::Updated) => "built (updated)".to_string(),
            None => "built".to_string(),
        },
        StageState::Skipped => match component.package {
            Some(ref package) => format!("skipped (package {package})"),
            None => format!(
                "skipped ({})",
                component.reason.as_deref().unwrap_or("unavailable")
            ),
        },
        StageState::Failed => "failed".to_string(),
        StageState::Pending => "not attempted".to_string(),
        other => other.to_string(),
    }
}

fn component_prefix(component: &ComponentSummary) -> &'static str {
    match component.state {
        StageState::Done => status::SUCCESS,
        StageState::Failed => status::ERROR,
        StageState::Skipped if component.required => status::SUCCESS,
        StageState::Skipped if component.package.is_some() => status::SUCCESS,
        _ => status::SKIPPED,
    }
}

/// Print the end-of-run summary
pub fn print_report(report: &PipelineReport) -> anyhow::Result<()> {
    if is_json() {
        return print_json(report);
    }

    if shows_progress() {
        println!();
        println!("ffmpeg {}", report.ffmpeg_tag);
        for component in &report.components {
            println!(
                "  {} {:<8} {:<7} {}",
                component_prefix(component),
                component.name,
                component.acquisition.to_string(),
                stage_label(component)
            );
        }
        if !report.flags.is_empty() {
            println!();
            println!("Feature flags: {}", report.flags.join(" "));
        }
    }

    for warning in &report.warnings {
        print_warning(&format!("Degraded: {warning}"));
    }

    if report.is_success() {
        print_success("Build complete");
    }
    Ok(())
}

/// Print a dry-run plan
pub fn print_plan(plan: &Plan) -> anyhow::Result<()> {
    if is_json() {
        return print_json(plan);
    }
    if !shows_progress() {
        return Ok(());
    }

    match plan.ffmpeg_tag {
        Some(ref tag) => println!("ffmpeg {tag}"),
        None => println!("ffmpeg (version not resolved)"),
    }
    match plan.package_manager {
        Some(kind) => println!("Package manager: {kind}"),
        None => println!("Package manager: none"),
    }
    for component in &plan.components {
        let action = if component.builds {
            "build from source".to_string()
        } else if let Some(ref package) = component.package {
            format!("install package {package}")
        } else {
            format!(
                "skip ({})",
                component.reason.as_deref().unwrap_or("unavailable")
            )
        };
        println!("  {:<8} {action}", component.name);
    }
    println!();
    let mut flags = plan.flags.clone();
    flags.extend(plan.extra_flags.iter().cloned());
    println!("Feature flags: {}", flags.join(" "));
    for warning in &plan.warnings {
        print_warning(&format!("Degraded: {warning}"));
    }
    Ok(())
}
