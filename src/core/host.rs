//! Collaborator contracts
//!
//! The orchestrator reaches the outside world (package manager, source
//! control, archive downloads, toolchain, pkg-config, PATH lookup) only
//! through these traits.
//! Concrete implementations live in [`crate::infra`]; tests inject fakes.

use std::path::{Path, PathBuf};

use futures::future::BoxFuture;
use thiserror::Error;

use crate::core::build_env::BuildEnvironment;
use crate::core::component::{BuildSystem, PackageManagerKind};
use crate::error::{ArchiveError, DownloadError, GitError};

/// Package manager failures (never fatal on their own)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PackageManagerError {
    /// The install command ran and reported failure
    #[error("'{package}' could not be installed: {reason}")]
    InstallFailed { package: String, reason: String },

    /// The install command could not be started
    #[error("Failed to run {program}: {error}")]
    Spawn { program: String, error: String },
}

/// Toolchain failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolchainError {
    /// A command exited unsuccessfully
    #[error("'{command}' failed with {status} (log: {log})")]
    CommandFailed {
        command: String,
        status: String,
        log: String,
    },

    /// A command could not be started
    #[error("Failed to run '{command}': {error}")]
    Spawn { command: String, error: String },

    /// Log file or build directory could not be prepared
    #[error("IO error for '{path}': {error}")]
    Io { path: PathBuf, error: String },
}

/// System package manager
pub trait PackageManager {
    /// Which package manager this is, `None` if the platform has none
    fn kind(&self) -> Option<PackageManagerKind>;

    /// Install one package; a single attempt, no retry
    fn install(&self, package: &str) -> Result<(), PackageManagerError>;
}

/// Host tool lookup used for source-build feasibility checks
pub trait Prerequisites {
    /// Whether `tool` can be executed on this host
    fn is_available(&self, tool: &str) -> bool;
}

/// Result of bringing an existing working copy up to date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Working copy is at the requested ref
    Current,
    /// Working copy was moved to the requested ref in place
    Moved,
    /// Working copy exists but cannot be moved to the requested ref in place
    Unusable,
}

/// Source control host
pub trait SourceControl {
    /// Clone `url` at `tag` into `dest`, returning the checked-out commit
    fn clone_at(&self, url: &str, tag: &str, dest: &Path) -> Result<String, GitError>;

    /// Bring the working copy at `dest` to `tag` in place
    fn update(&self, dest: &Path, tag: &str) -> Result<UpdateOutcome, GitError>;
}

/// Pinned source archives
pub trait ArchiveSource {
    /// Download `url` to `dest`, returning the number of bytes written
    ///
    /// On failure nothing is left at `dest`.
    fn fetch<'a>(&'a self, url: &'a str, dest: &'a Path) -> BoxFuture<'a, Result<u64, DownloadError>>;

    /// SHA-256 of the file at `path` as lowercase hex
    fn digest(&self, path: &Path) -> Result<String, DownloadError>;

    /// Unpack `archive` into `dest`, dropping the tarball's top-level directory
    fn unpack(&self, archive: &Path, dest: &Path) -> Result<(), ArchiveError>;
}

/// Everything a toolchain invocation needs to know about one component
#[derive(Debug, Clone)]
pub struct BuildContext {
    /// Component name
    pub component: String,
    /// Build system to drive
    pub system: BuildSystem,
    /// Directory holding the build files
    pub source_dir: PathBuf,
    /// Out-of-tree build directory (unused by autotools)
    pub build_dir: PathBuf,
    /// Log file receiving command output
    pub log_file: PathBuf,
    /// Whether executables go to the bin dir
    pub installs_binaries: bool,
    /// Environment for every command
    pub env: BuildEnvironment,
}

/// Compiler toolchain and build tool execution
pub trait Toolchain {
    /// Configure the component with `flags`
    fn configure(&self, ctx: &BuildContext, flags: &[String]) -> Result<(), ToolchainError>;

    /// Compile with `jobs` workers
    fn build(&self, ctx: &BuildContext, jobs: usize) -> Result<(), ToolchainError>;

    /// Install into the prefix
    fn install(&self, ctx: &BuildContext) -> Result<(), ToolchainError>;
}

/// Composition-time availability query
pub trait FeatureProbe {
    /// Whether the library `module` is installed and usable
    fn probe(&self, module: &str) -> bool;
}
