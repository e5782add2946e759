//! Infrastructure layer
//!
//! Handles all I/O operations: network, filesystem, and external processes.
//! This module is the only place where side effects occur.

pub mod archive;
pub mod dirs;
pub mod download;
pub mod git;
pub mod package_manager;
pub mod probe;
pub mod run_lock;
pub mod tags;
pub mod toolchain;
