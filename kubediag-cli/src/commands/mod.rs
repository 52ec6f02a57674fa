//! CLI command implementations.
//!
//! - [`config`] - Configuration file management (path, show, init)
//! - [`run`] - Standalone agent over JSON manifests
//! - [`validate`] - Offline check of a processor result

pub mod config;
pub mod run;
pub mod validate;
