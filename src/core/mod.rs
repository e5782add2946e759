//! Core business logic module
//!
//! The orchestration logic. External systems are reached only through the
//! traits in [`host`]; their implementations belong in [`crate::infra`].
//!
//! # Submodules
//!
//! - [`component`] - The ordered dependency spec table
//! - [`fallback`] - Package-or-source resolution per component
//! - [`version`] - Framework release selection
//! - [`stage`] - Per-component build stages
//! - [`features`] - Framework feature flag composition
//! - [`pipeline`] - The full run
//! - [`build_env`] - Environment for toolchain commands
//! - [`layout`] - Working-copy tree paths
//! - [`stamp`] - Install stamps
//! - [`global_config`] - Configuration file and settings
//! - [`doctor`] - Host tool checks
//! - [`clean`] - Stamp and working-copy removal

pub mod build_env;
pub mod clean;
pub mod component;
pub mod doctor;
pub mod fallback;
pub mod features;
pub mod global_config;
pub mod host;
pub mod layout;
pub mod pipeline;
pub mod stage;
pub mod stamp;
pub mod version;
