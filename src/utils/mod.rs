//! Configuration and logging utilities.

/// Tracing subscriber setup.
pub mod logging;
/// TOML configuration (`deepsearch.toml`).
pub mod toml_config;
