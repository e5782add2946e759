//! ffstack - build orchestrator for an FFmpeg media stack
//!
//! Installs an assembler and a set of codec libraries from the system package
//! manager where it can, builds the rest from pinned sources into a private
//! prefix, and finally builds FFmpeg with a feature set matching what is
//! actually available.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`cli`] - Command-line interface parsing and output formatting
//! - [`core`] - Orchestration logic (host collaborators behind the traits in `core::host`)
//! - [`infra`] - Infrastructure layer (network, filesystem, processes)
//! - [`config`] - Configuration and constants
//! - [`error`] - Error types and handling

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod infra;

#[cfg(test)]
pub mod test_utils;
