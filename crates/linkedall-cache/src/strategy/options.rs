//! Per-call cache options.

use crate::keys::build_key;
use std::time::Duration;

/// Options accepted by every strategy operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheOptions {
    /// Time to live. `None` or zero uses the strategy default.
    pub ttl: Option<Duration>,
    /// Namespace joined to the key as `{prefix}:{key}`.
    pub prefix: Option<String>,
    /// JSON-encode values. When `false` values are stored as plain strings.
    pub serialize: bool,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            ttl: None,
            prefix: None,
            serialize: true,
        }
    }
}

impl CacheOptions {
    /// Default options: no prefix, default TTL, JSON encoding.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Options scoped to a namespace.
    #[must_use]
    pub fn prefixed(prefix: impl Into<String>) -> Self {
        Self::default().with_prefix(prefix)
    }

    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    #[must_use]
    pub fn with_ttl_secs(self, secs: u64) -> Self {
        self.with_ttl(Duration::from_secs(secs))
    }

    /// Store values as plain strings instead of JSON.
    #[must_use]
    pub fn raw(mut self) -> Self {
        self.serialize = false;
        self
    }

    /// The namespaced key sent to the store.
    #[must_use]
    pub fn full_key(&self, key: &str) -> String {
        build_key(key, self.prefix.as_deref())
    }

    /// Resolves the TTL in whole seconds, never below one.
    pub(crate) fn ttl_secs(&self, default: Duration) -> u64 {
        let ttl = self.ttl.filter(|ttl| !ttl.is_zero()).unwrap_or(default);
        ttl.as_secs().max(1)
    }

    pub(crate) fn namespace(&self) -> Option<&str> {
        self.prefix.as_deref()
    }
}
