//! Configuration loading
//!
//! Loads the server configuration from a TOML file or the embedded defaults
//! and applies command-line overrides on top.

pub mod loader;

pub use loader::{load_config, parse_config, LoadError, Overrides, EMBEDDED_CONFIG};
