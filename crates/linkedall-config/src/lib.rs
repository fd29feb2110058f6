//! # Linked-All Config
//!
//! Configuration management for the cache layer.
//! Supports layered configuration from files, prefixed environment variables,
//! the flat `REDIS_*` variables used across the platform, and runtime refresh.

mod loader;
mod settings;
mod validation;

pub use loader::*;
pub use settings::*;
pub use validation::*;
