//! Common test utilities and helpers
//!
//! Shared fakes, temporary working trees and fixtures for integration tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use flate2::write::GzEncoder;
use flate2::Compression;
use sha2::{Digest, Sha256};
use tempfile::TempDir;

use ffstack::core::component::PackageManagerKind;
use ffstack::core::global_config::Settings;
use ffstack::core::host::{
    BuildContext, FeatureProbe, PackageManager, PackageManagerError, Prerequisites, SourceControl,
    Toolchain, ToolchainError, UpdateOutcome,
};
use ffstack::core::stage::Substep;
use ffstack::error::GitError;

/// Temporary root holding the working copies, prefix, bin dir and config
pub struct TestProject {
    /// Temporary directory for the test run
    pub dir: TempDir,
}

impl TestProject {
    /// Create a new test root in a temporary directory
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Get the path to the test root
    pub fn path(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    /// Working-copy root
    pub fn work_dir(&self) -> PathBuf {
        self.path().join("work")
    }

    /// Install prefix
    pub fn prefix(&self) -> PathBuf {
        self.path().join("prefix")
    }

    /// Executable directory
    pub fn bin_dir(&self) -> PathBuf {
        self.path().join("bin")
    }

    /// Config directory (`FFSTACK_CONFIG_DIR`)
    pub fn config_dir(&self) -> PathBuf {
        self.path().join("config")
    }

    /// Data directory (`FFSTACK_DATA_DIR`)
    pub fn data_dir(&self) -> PathBuf {
        self.path().join("data")
    }

    /// Create a file relative to the test root
    pub fn create_file(&self, name: &str, content: &str) {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        fs::write(path, content).expect("Failed to write file");
    }

    /// Check if a file exists relative to the test root
    pub fn file_exists(&self, name: &str) -> bool {
        self.dir.path().join(name).exists()
    }

    /// Write `config/config.toml` with the given body plus the test's directories
    pub fn write_config(&self, body: &str) {
        let content = format!(
            "work_dir = {:?}\nprefix = {:?}\nbin_dir = {:?}\n{body}",
            self.work_dir().display().to_string(),
            self.prefix().display().to_string(),
            self.bin_dir().display().to_string(),
        );
        self.create_file("config/config.toml", &content);
    }

    /// Settings pointing every directory into the test root
    pub fn settings(&self, github_api: &str) -> Settings {
        Settings {
            work_dir: self.work_dir(),
            prefix: self.prefix(),
            bin_dir: self.bin_dir(),
            jobs: 2,
            skip: BTreeSet::new(),
            no_package_manager: false,
            package_manager: None,
            sudo: false,
            ffmpeg_extra_flags: Vec::new(),
            github_api: github_api.to_string(),
            ffmpeg_repo: "FFmpeg/FFmpeg".to_string(),
        }
    }
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}

/// Tag listing body in the GitHub API shape
pub fn tags_json(tags: &[&str]) -> serde_json::Value {
    serde_json::Value::Array(
        tags.iter()
            .map(|t| serde_json::json!({ "name": t, "commit": { "sha": "0" } }))
            .collect(),
    )
}

/// A `.tar.gz` with one top-level directory holding `files`
pub fn tarball(top: &str, files: &[(&str, &str)]) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (name, content) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o755);
        header.set_cksum();
        builder
            .append_data(&mut header, format!("{top}/{name}"), content.as_bytes())
            .expect("Failed to append tar entry");
    }
    let encoder = builder.into_inner().expect("Failed to finish tar");
    encoder.finish().expect("Failed to finish gzip")
}

/// Lowercase hex SHA-256 of `data`
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Package manager installing a fixed set of packages
pub struct FakePackageManager {
    pub kind: Option<PackageManagerKind>,
    provides: BTreeSet<String>,
    attempts: Mutex<Vec<String>>,
}

impl FakePackageManager {
    /// A host without any package manager
    pub fn none() -> Self {
        Self {
            kind: None,
            provides: BTreeSet::new(),
            attempts: Mutex::new(Vec::new()),
        }
    }

    /// An apt host providing `packages`
    pub fn apt(packages: &[&str]) -> Self {
        Self {
            kind: Some(PackageManagerKind::Apt),
            provides: packages.iter().map(|p| (*p).to_string()).collect(),
            attempts: Mutex::new(Vec::new()),
        }
    }

    /// Every install attempted, in order
    pub fn attempts(&self) -> Vec<String> {
        self.attempts.lock().unwrap().clone()
    }
}

impl PackageManager for FakePackageManager {
    fn kind(&self) -> Option<PackageManagerKind> {
        self.kind
    }

    fn install(&self, package: &str) -> Result<(), PackageManagerError> {
        self.attempts.lock().unwrap().push(package.to_string());
        if self.provides.contains(package) {
            Ok(())
        } else {
            Err(PackageManagerError::InstallFailed {
                package: package.to_string(),
                reason: "Unable to locate package".to_string(),
            })
        }
    }
}

/// Every host tool is present
pub struct AllTools;

impl Prerequisites for AllTools {
    fn is_available(&self, _tool: &str) -> bool {
        true
    }
}

/// Source control writing a marker file instead of cloning
#[derive(Default)]
pub struct FakeGit {
    pinned: Mutex<BTreeMap<PathBuf, String>>,
    clones: Mutex<Vec<String>>,
}

impl FakeGit {
    /// URLs cloned, in order
    pub fn clones(&self) -> Vec<String> {
        self.clones.lock().unwrap().clone()
    }
}

impl SourceControl for FakeGit {
    fn clone_at(&self, url: &str, tag: &str, dest: &Path) -> Result<String, GitError> {
        if dest.exists() {
            fs::remove_dir_all(dest).unwrap();
        }
        fs::create_dir_all(dest).unwrap();
        fs::write(dest.join("README"), tag).unwrap();
        self.clones.lock().unwrap().push(url.to_string());
        self.pinned
            .lock()
            .unwrap()
            .insert(dest.to_path_buf(), tag.to_string());
        Ok("0".repeat(40))
    }

    fn update(&self, dest: &Path, tag: &str) -> Result<UpdateOutcome, GitError> {
        let mut pinned = self.pinned.lock().unwrap();
        match pinned.get(dest) {
            Some(current) if current == tag => Ok(UpdateOutcome::Current),
            Some(_) => {
                fs::write(dest.join("README"), tag).unwrap();
                pinned.insert(dest.to_path_buf(), tag.to_string());
                Ok(UpdateOutcome::Moved)
            }
            None => Ok(UpdateOutcome::Unusable),
        }
    }
}

/// Toolchain recording every invocation, optionally failing one
#[derive(Default)]
pub struct RecordingToolchain {
    calls: Mutex<Vec<(String, Substep)>>,
    flags: Mutex<BTreeMap<String, Vec<String>>>,
    fail: Mutex<Option<(String, Substep)>>,
}

impl RecordingToolchain {
    /// Make `substep` of `component` fail
    pub fn fail_at(&self, component: &str, substep: Substep) {
        *self.fail.lock().unwrap() = Some((component.to_string(), substep));
    }

    /// Every `(component, substep)` run, in order
    pub fn calls(&self) -> Vec<(String, Substep)> {
        self.calls.lock().unwrap().clone()
    }

    /// Components configured, in order
    pub fn configured(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|(_, s)| *s == Substep::Configure)
            .map(|(c, _)| c)
            .collect()
    }

    /// Flags of the latest configure of `component`
    pub fn flags_for(&self, component: &str) -> Option<Vec<String>> {
        self.flags.lock().unwrap().get(component).cloned()
    }

    fn record(&self, ctx: &BuildContext, substep: Substep) -> Result<(), ToolchainError> {
        self.calls
            .lock()
            .unwrap()
            .push((ctx.component.clone(), substep));
        let failing = self.fail.lock().unwrap().as_ref()
            == Some(&(ctx.component.clone(), substep));
        if failing {
            let mut log = fs::File::create(&ctx.log_file).unwrap();
            writeln!(log, "error: simulated failure").unwrap();
            return Err(ToolchainError::CommandFailed {
                command: format!("{substep} {}", ctx.component),
                status: "exit status: 1".to_string(),
                log: ctx.log_file.display().to_string(),
            });
        }
        Ok(())
    }
}

impl Toolchain for RecordingToolchain {
    fn configure(&self, ctx: &BuildContext, flags: &[String]) -> Result<(), ToolchainError> {
        self.flags
            .lock()
            .unwrap()
            .insert(ctx.component.clone(), flags.to_vec());
        self.record(ctx, Substep::Configure)
    }

    fn build(&self, ctx: &BuildContext, _jobs: usize) -> Result<(), ToolchainError> {
        self.record(ctx, Substep::Build)
    }

    fn install(&self, ctx: &BuildContext) -> Result<(), ToolchainError> {
        self.record(ctx, Substep::Install)
    }
}

/// Probe reporting a fixed set of installed modules
pub struct StaticProbe(pub BTreeSet<String>);

impl StaticProbe {
    /// Only `modules` are installed
    pub fn with(modules: &[&str]) -> Self {
        Self(modules.iter().map(|m| (*m).to_string()).collect())
    }
}

impl FeatureProbe for StaticProbe {
    fn probe(&self, module: &str) -> bool {
        self.0.contains(module)
    }
}
