//! System package manager
//!
//! Detects apt, dnf, pacman or Homebrew on PATH and installs single packages
//! non-interactively. Each install is one attempt; failure is reported, never
//! retried.

use std::process::{Command, Stdio};

use tracing::debug;

use crate::core::component::PackageManagerKind;
use crate::core::host::{PackageManager, PackageManagerError};

/// Package manager backed by the host's package tool
#[derive(Debug, Clone)]
pub struct SystemPackageManager {
    kind: Option<PackageManagerKind>,
    sudo: bool,
}

impl SystemPackageManager {
    /// Use `kind` explicitly
    pub fn new(kind: Option<PackageManagerKind>, sudo: bool) -> Self {
        Self { kind, sudo }
    }

    /// `kind` if configured, else the first known package manager on PATH
    pub fn configured_or_detected(kind: Option<PackageManagerKind>, sudo: bool) -> Self {
        Self::new(kind.or_else(detect_kind), sudo)
    }

    /// Full argv for installing `package`
    pub fn install_command(&self, package: &str) -> Option<Vec<String>> {
        let kind = self.kind?;
        let mut argv: Vec<String> = Vec::new();
        if self.sudo && kind != PackageManagerKind::Brew {
            argv.push("sudo".to_string());
            argv.push("-n".to_string());
        }
        argv.push(kind.program().to_string());
        let args: &[&str] = match kind {
            PackageManagerKind::Apt => &["install", "-y"],
            PackageManagerKind::Dnf => &["install", "-y"],
            PackageManagerKind::Pacman => &["-S", "--noconfirm", "--needed"],
            PackageManagerKind::Brew => &["install"],
        };
        argv.extend(args.iter().map(|a| (*a).to_string()));
        argv.push(package.to_string());
        Some(argv)
    }
}

/// First package manager from [`PackageManagerKind::all`] found on PATH
pub fn detect_kind() -> Option<PackageManagerKind> {
    PackageManagerKind::all()
        .iter()
        .copied()
        .find(|kind| which::which(kind.program()).is_ok())
}

impl PackageManager for SystemPackageManager {
    fn kind(&self) -> Option<PackageManagerKind> {
        self.kind
    }

    fn install(&self, package: &str) -> Result<(), PackageManagerError> {
        let Some(argv) = self.install_command(package) else {
            return Err(PackageManagerError::InstallFailed {
                package: package.to_string(),
                reason: "no package manager".to_string(),
            });
        };
        let (program, args) = argv.split_first().ok_or_else(|| PackageManagerError::Spawn {
            program: String::new(),
            error: "empty command".to_string(),
        })?;

        debug!("Running {}", argv.join(" "));
        let output = Command::new(program)
            .args(args)
            .env("DEBIAN_FRONTEND", "noninteractive")
            .env("HOMEBREW_NO_AUTO_UPDATE", "1")
            .stdin(Stdio::null())
            .output()
            .map_err(|e| PackageManagerError::Spawn {
                program: program.clone(),
                error: e.to_string(),
            })?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = stderr
                .lines()
                .rev()
                .find(|line| !line.trim().is_empty())
                .map_or_else(|| output.status.to_string(), |line| line.trim().to_string());
            Err(PackageManagerError::InstallFailed {
                package: package.to_string(),
                reason,
            })
        }
    }
}
