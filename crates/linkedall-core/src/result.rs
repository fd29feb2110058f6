//! Result type aliases for the cache layer.

use crate::CacheError;

/// A specialized `Result` type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// A boxed future returning a `CacheResult`.
pub type BoxFuture<'a, T> = std::pin::Pin<Box<dyn std::future::Future<Output = CacheResult<T>> + Send + 'a>>;
