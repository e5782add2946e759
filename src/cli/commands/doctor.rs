//! CLI command for `ffstack doctor`
//!
//! Reports which build tools are on PATH and which package manager would be
//! used. Fails only when a tool needed by a required component is missing.

use anyhow::{bail, Result};

use crate::cli::output::{is_json, is_quiet, print_detail, print_info, print_success, print_warning, status};
use crate::core::component::ComponentTable;
use crate::core::doctor::{run_doctor, Check, DoctorReport, Health};
use crate::core::global_config::Settings;
use crate::infra::package_manager::detect_kind;

/// Execute the doctor command
pub fn execute(settings: &Settings) -> Result<()> {
    let report = run_doctor(
        &ComponentTable::builtin(),
        settings.package_manager.or_else(detect_kind),
    );

    if is_json() {
        let body = serde_json::json!({
            "status": report.health(),
            "checks": report.checks,
            "package_manager": report.package_manager,
            "passed_count": report.passed_count(),
            "total_count": report.checks.len(),
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else if is_quiet() {
        for check in report.blocking() {
            eprintln!("{} Missing required: {}", status::ERROR, check.name);
        }
    } else {
        print_human(&report);
    }

    if report.health() == Health::Blocked {
        let missing: Vec<&str> = report.blocking().map(|c| c.name.as_str()).collect();
        bail!("Missing required build tools: {}", missing.join(", "));
    }
    Ok(())
}

fn print_human(report: &DoctorReport) {
    print_info("Checking build tools...");
    println!();
    report.checks.iter().for_each(print_check);
    println!();

    let summary = format!("{}/{} checks passed", report.passed_count(), report.checks.len());
    match report.health() {
        Health::Ready => print_success(&summary),
        Health::Degraded => print_warning(&format!(
            "{summary}; optional components without their tools use packages or are skipped"
        )),
        Health::Blocked => println!("{} {summary}", status::ERROR),
    }
}

fn print_check(check: &Check) {
    let optional = if check.required { "" } else { " [optional]" };
    match check.hint() {
        None => {
            let version = check.version().map(|v| format!(" ({v})")).unwrap_or_default();
            println!("  {} {}{version}{optional}", status::SUCCESS, check.name);
        }
        Some(hint) => {
            println!("  {} {}{optional}", status::ERROR, check.name);
            print_detail(hint);
        }
    }
}
