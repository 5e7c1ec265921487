//! # Rollbook application library
//!
//! The HTTP API, CLI, configuration and logging of the `rollbook` binary,
//! exposed as a library so integration tests can drive the router directly.

pub mod api;
pub mod cli;
pub mod config;
pub mod logging;
