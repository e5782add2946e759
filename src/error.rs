//! Error types for ffstack
//!
//! Domain-specific error types using thiserror.

use std::path::PathBuf;
use thiserror::Error;

use crate::core::global_config::GlobalConfigError;
use crate::core::stage::Substep;
use crate::core::version::VersionError;
use crate::infra::tags::TagListError;

/// Process exit codes, one per fatal error kind
pub mod exit_code {
    /// Pipeline finished
    pub const SUCCESS: i32 = 0;
    /// Anything not covered below
    pub const OTHER: i32 = 1;
    /// A required component could not be resolved
    pub const DEPENDENCY_MISSING: i32 = 2;
    /// The version query matched nothing (or too much)
    pub const VERSION_NOT_FOUND: i32 = 3;
    /// A pinned artifact failed digest verification
    pub const INTEGRITY_MISMATCH: i32 = 4;
    /// A build stage sub-step failed
    pub const STAGE_FAILED: i32 = 5;
    /// The remote tag list could not be fetched
    pub const NETWORK: i32 = 6;
    /// Another run holds the working-copy lock
    pub const LOCKED: i32 = 7;
}

/// Dependency resolution errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// A required component has neither a working package nor a feasible source build
    #[error("Required component '{component}' is unavailable: {reason}")]
    RequiredDependencyMissing { component: String, reason: String },

    /// Component table is malformed
    #[error("Invalid component table: {message}")]
    InvalidTable { message: String },
}

/// Build stage errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StageError {
    /// A sub-step of a component's stage failed
    #[error("Stage '{component}' failed during {substep}: {reason}")]
    StageFailed {
        component: String,
        substep: Substep,
        reason: String,
    },

    /// Pinned artifact digest did not match
    #[error("Integrity check failed for '{component}' ({file}): expected {expected}, got {actual}")]
    IntegrityMismatch {
        component: String,
        file: String,
        expected: String,
        actual: String,
    },
}

impl StageError {
    /// Name of the component whose stage failed
    pub fn component(&self) -> &str {
        match self {
            Self::StageFailed { component, .. } | Self::IntegrityMismatch { component, .. } => {
                component
            }
        }
    }
}

/// Git operation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GitError {
    /// Failed to clone repository
    #[error("Failed to clone '{url}': {error}")]
    CloneFailed { url: String, error: String },

    /// Failed to checkout ref
    #[error("Failed to checkout ref '{reference}' in '{repo}': {error}")]
    CheckoutFailed {
        repo: String,
        reference: String,
        error: String,
    },

    /// IO error
    #[error("IO error for '{path}': {error}")]
    IoError { path: PathBuf, error: String },

    /// Invalid repository
    #[error("Invalid repository at '{path}': {error}")]
    InvalidRepository { path: PathBuf, error: String },
}

/// Archive extraction errors
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// Archive type is not handled
    #[error("Unsupported archive format: {0}")]
    Unsupported(String),

    /// IO error while reading or unpacking
    #[error("IO error for '{path}': {error}")]
    Io { path: PathBuf, error: String },
}

/// Download errors
#[derive(Error, Debug)]
pub enum DownloadError {
    /// Network error
    #[error("Network error downloading '{url}': {error}")]
    NetworkError { url: String, error: String },

    /// IO error
    #[error("IO error for '{path}': {error}")]
    IoError { path: PathBuf, error: String },

    /// Server answered with a non-success status
    #[error("'{url}' answered HTTP {status}")]
    HttpStatus { url: String, status: u16 },
}

impl DownloadError {
    /// Whether another attempt could succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::NetworkError { .. } => true,
            Self::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            Self::IoError { .. } => false,
        }
    }
}

/// Run lock errors
#[derive(Error, Debug)]
pub enum LockError {
    /// Another run is using the same working-copy root
    #[error("Another ffstack run holds the lock at '{path}'. Remove it if no run is active.")]
    Held { path: PathBuf },

    /// IO error
    #[error("IO error for '{path}': {error}")]
    IoError { path: PathBuf, error: String },
}

/// Filesystem errors
#[derive(Error, Debug)]
pub enum FilesystemError {
    /// Failed to create directory
    #[error("Failed to create directory '{path}': {error}")]
    CreateDir { path: PathBuf, error: String },

    /// Failed to remove directory
    #[error("Failed to remove directory '{path}': {error}")]
    RemoveDir { path: PathBuf, error: String },
}

/// Top-level pipeline error type
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Resolution error
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// Version resolution error
    #[error("Version resolution failed: {0}")]
    Version(#[from] VersionError),

    /// Stage error
    #[error(transparent)]
    Stage(#[from] StageError),

    /// Tag listing error
    #[error("Failed to list release tags: {0}")]
    Tags(#[from] TagListError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] GlobalConfigError),

    /// Run lock error
    #[error(transparent)]
    Lock(#[from] LockError),

    /// Filesystem error
    #[error("Filesystem error: {0}")]
    Filesystem(#[from] FilesystemError),
}

impl PipelineError {
    /// Exit code distinguishing the error kind
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Resolve(_) => exit_code::DEPENDENCY_MISSING,
            Self::Version(_) => exit_code::VERSION_NOT_FOUND,
            Self::Stage(StageError::IntegrityMismatch { .. }) => exit_code::INTEGRITY_MISMATCH,
            Self::Stage(StageError::StageFailed { .. }) => exit_code::STAGE_FAILED,
            Self::Tags(_) => exit_code::NETWORK,
            Self::Lock(LockError::Held { .. }) => exit_code::LOCKED,
            Self::Config(_) | Self::Lock(_) | Self::Filesystem(_) => exit_code::OTHER,
        }
    }
}
