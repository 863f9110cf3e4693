//! Configuration types
//!
//! Board-agnostic configuration structures. Loading (TOML file, embedded
//! defaults, command-line overrides) lives in the server; this module only
//! defines the shape, the defaults and validation.

pub mod types;

pub use types::*;
