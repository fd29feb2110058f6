//! # Linked-All Core
//!
//! Foundational types shared by every crate of the Linked-All cache layer:
//! the unified [`CacheError`], result aliases, and tracing initialisation.

pub mod error;
pub mod result;
pub mod telemetry;

pub use error::*;
pub use result::*;
pub use telemetry::*;

// Re-export shaku for dependency injection
pub use shaku::{module, HasComponent, Interface};
