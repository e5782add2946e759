//! Configuration constants
//!
//! Compile-time defaults and well-known URLs. Runtime configuration
//! (the TOML file) lives in [`crate::core::global_config`].

pub mod defaults;
pub mod urls;
