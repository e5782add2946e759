//! Host probes
//!
//! PATH lookup for build tools, and `pkg-config` queries against the install
//! prefix for composition-time feature checks.

use std::process::{Command, Stdio};

use tracing::debug;

use crate::core::build_env::BuildEnvironment;
use crate::core::host::{FeatureProbe, Prerequisites};

/// Tool lookup on PATH
#[derive(Debug, Clone, Default)]
pub struct HostTools;

impl HostTools {
    /// Create a new lookup
    pub fn new() -> Self {
        Self
    }
}

impl Prerequisites for HostTools {
    fn is_available(&self, tool: &str) -> bool {
        which::which(tool).is_ok()
    }
}

/// `pkg-config --exists` with the prefix on the search path
#[derive(Debug, Clone)]
pub struct PkgConfigProbe {
    search_path: String,
}

impl PkgConfigProbe {
    /// Probe libraries installed in `env`'s prefix, then the system ones
    pub fn new(env: &BuildEnvironment) -> Self {
        let mut search_path = env.pkg_config_path();
        if let Ok(existing) = std::env::var("PKG_CONFIG_PATH") {
            if !existing.is_empty() {
                search_path.push(':');
                search_path.push_str(&existing);
            }
        }
        Self { search_path }
    }

    /// Value passed as `PKG_CONFIG_PATH`
    pub fn search_path(&self) -> &str {
        &self.search_path
    }
}

impl FeatureProbe for PkgConfigProbe {
    fn probe(&self, module: &str) -> bool {
        let found = Command::new("pkg-config")
            .args(["--exists", module])
            .env("PKG_CONFIG_PATH", &self.search_path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false);
        debug!("pkg-config --exists {module}: {found}");
        found
    }
}
