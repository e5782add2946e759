//! CLI implementation for `ffstack clean`
//!
//! Removes install stamps, or the whole working-copy tree with `--all`.

use anyhow::Result;

use crate::cli::output::{is_json, print_detail, print_json, print_success};
use crate::core::clean::clean;
use crate::core::global_config::Settings;
use crate::core::layout::WorkLayout;

/// Execute the clean command
pub fn execute(settings: &Settings, all: bool) -> Result<()> {
    let layout = WorkLayout::new(settings.work_dir.clone());
    let result = clean(&layout, all)?;

    if is_json() {
        return print_json(&result);
    }

    if result.removed.is_empty() {
        print_success("Nothing to clean");
    } else {
        print_success(&format!(
            "Cleaned {} ({:.1} MiB freed)",
            if all { "working copies" } else { "install stamps" },
            bytes_to_mib(result.bytes_freed)
        ));
        for path in &result.removed {
            print_detail(&format!("Removed {}", path.display()));
        }
    }

    Ok(())
}

#[allow(clippy::cast_precision_loss)]
fn bytes_to_mib(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}
