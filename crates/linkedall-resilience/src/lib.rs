//! # Linked-All Resilience
//!
//! Retry and timeout primitives used by the key-value client.

pub mod retry;
pub mod timeout;

pub use retry::*;
pub use timeout::*;
