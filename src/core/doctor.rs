//! Host readiness checks
//!
//! One check per build tool named in the component table, plus the C compiler
//! and the package manager. A tool is required when a required component's
//! source build needs it; a missing optional tool only narrows which optional
//! components can be built from source.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::core::component::{ComponentTable, PackageManagerKind};

/// C compiler looked up in addition to the table's build tools
pub const C_COMPILER: &str = "cc";

/// What looking a tool up found
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Finding {
    Found { version: Option<String> },
    Missing { hint: String },
}

/// One line of the doctor report
#[derive(Debug, Clone, Serialize)]
pub struct Check {
    pub name: String,
    pub required: bool,
    /// Components whose source builds use this tool
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub needed_by: Vec<String>,
    #[serde(flatten)]
    pub finding: Finding,
}

impl Check {
    pub fn passed(&self) -> bool {
        matches!(self.finding, Finding::Found { .. })
    }

    pub fn version(&self) -> Option<&str> {
        match &self.finding {
            Finding::Found { version } => version.as_deref(),
            Finding::Missing { .. } => None,
        }
    }

    pub fn hint(&self) -> Option<&str> {
        match &self.finding {
            Finding::Found { .. } => None,
            Finding::Missing { hint } => Some(hint.as_str()),
        }
    }
}

/// Overall verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Health {
    /// Everything found
    Ready,
    /// Only optional tools missing
    Degraded,
    /// A required tool is missing
    Blocked,
}

#[derive(Debug, Default, Serialize)]
pub struct DoctorReport {
    pub checks: Vec<Check>,
    /// Package manager primary acquisition would use
    pub package_manager: Option<PackageManagerKind>,
}

impl DoctorReport {
    pub fn health(&self) -> Health {
        if self.blocking().next().is_some() {
            Health::Blocked
        } else if self.checks.iter().all(Check::passed) {
            Health::Ready
        } else {
            Health::Degraded
        }
    }

    pub fn passed_count(&self) -> usize {
        self.checks.iter().filter(|c| c.passed()).count()
    }

    /// Missing required tools
    pub fn blocking(&self) -> impl Iterator<Item = &Check> {
        self.checks.iter().filter(|c| c.required && !c.passed())
    }
}

/// `None` if `command` is not on PATH, else whatever version it reports
pub fn probe_command(command: &str) -> Option<Option<String>> {
    which::which(command).ok()?;
    let output = std::process::Command::new(command)
        .arg("--version")
        .output()
        .ok();
    Some(output.and_then(|out| {
        let mut text = String::from_utf8_lossy(&out.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&out.stderr));
        first_version(&text)
    }))
}

fn first_version(text: &str) -> Option<String> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    let pattern = PATTERN
        .get_or_init(|| Regex::new(r"v?(\d+\.\d+(?:\.\d+)?(?:-\w+)?)").ok())
        .as_ref()?;
    Some(pattern.captures(text)?.get(1)?.as_str().to_string())
}

/// Tool name to (needed by a required component, components using it)
fn tools_in(table: &ComponentTable) -> BTreeMap<&str, (bool, Vec<String>)> {
    let mut tools: BTreeMap<&str, (bool, Vec<String>)> = BTreeMap::new();
    for component in table.iter() {
        for tool in &component.secondary.prerequisites {
            let (required, users) = tools.entry(tool.as_str()).or_default();
            *required |= component.required;
            users.push(component.name.clone());
        }
    }
    tools
}

/// Check the table's build tools and the package manager using `lookup`
pub fn build_report<F>(
    table: &ComponentTable,
    package_manager: Option<PackageManagerKind>,
    lookup: F,
) -> DoctorReport
where
    F: Fn(&str) -> Option<Option<String>>,
{
    let examine = |tool: &str, hint: String| match lookup(tool) {
        Some(version) => Finding::Found { version },
        None => Finding::Missing { hint },
    };

    let mut checks = vec![Check {
        name: format!("C compiler ({C_COMPILER})"),
        required: true,
        needed_by: Vec::new(),
        finding: examine(
            C_COMPILER,
            "Install gcc or clang (e.g. build-essential on Debian/Ubuntu)".to_string(),
        ),
    }];

    for (tool, (required, needed_by)) in tools_in(table) {
        let hint = format!("Install {tool} to build {} from source", needed_by.join(", "));
        checks.push(Check {
            name: tool.to_string(),
            required,
            finding: examine(tool, hint),
            needed_by,
        });
    }

    checks.push(Check {
        name: match package_manager {
            Some(kind) => format!("Package manager ({kind})"),
            None => "Package manager".to_string(),
        },
        required: false,
        needed_by: Vec::new(),
        finding: match package_manager {
            Some(_) => Finding::Found { version: None },
            None => Finding::Missing {
                hint: "No apt, dnf, pacman or brew found; every component builds from source"
                    .to_string(),
            },
        },
    });

    DoctorReport {
        checks,
        package_manager,
    }
}

/// Check the real host
pub fn run_doctor(table: &ComponentTable, package_manager: Option<PackageManagerKind>) -> DoctorReport {
    build_report(table, package_manager, probe_command)
}
