//! Caching strategies layered over a [`KeyValueStore`](crate::KeyValueStore).
//!
//! [`CacheAside`] is the read path and owns key construction and encoding.
//! [`WriteThrough`] and [`WriteBack`] are alternate write policies built on
//! top of it.

mod cache_aside;
mod codec;
mod options;
mod write_back;
mod write_through;

pub use cache_aside::{CacheAside, DEFAULT_TTL};
pub use options::CacheOptions;
pub use write_back::{FlushReport, WriteBack};
pub use write_through::WriteThrough;
