//! Process-local key-value store.

use super::{ConnectionEvent, ConnectionEvents, KeyValueStore};
use async_trait::async_trait;
use linkedall_core::{CacheError, CacheResult};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;

/// Expired entries are swept once every this many writes.
const SWEEP_EVERY: u64 = 64;

#[derive(Debug)]
struct StoredValue {
    value: String,
    expires_at: Instant,
}

impl StoredValue {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// In-memory [`KeyValueStore`] with Redis-compatible semantics.
///
/// Expiry follows `tokio::time`, so a paused test clock controls it.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: Mutex<HashMap<String, StoredValue>>,
    ready: AtomicBool,
    closed: AtomicBool,
    writes: AtomicU64,
    events: ConnectionEvents,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.lock().values().filter(|v| v.is_live(now)).count()
    }

    /// Returns `true` when no live entry remains.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remaining time to live of a key.
    #[must_use]
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        self.entries
            .lock()
            .get(key)
            .filter(|v| v.is_live(now))
            .map(|v| v.expires_at - now)
    }

    /// Live keys, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let now = Instant::now();
        let mut keys: Vec<String> = self
            .entries
            .lock()
            .iter()
            .filter(|(_, v)| v.is_live(now))
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        keys
    }

    fn ensure_open(&self) -> CacheResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(CacheError::ConnectionClosed);
        }
        if !self.ready.swap(true, Ordering::SeqCst) {
            self.events.emit(ConnectionEvent::Ready);
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        self.ensure_open()?;
        let now = Instant::now();
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(stored) if stored.is_live(now) => Ok(Some(stored.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set_with_expiry(&self, key: &str, value: &str, ttl_secs: u64) -> CacheResult<()> {
        self.ensure_open()?;
        if ttl_secs == 0 {
            return Err(CacheError::command("SETEX", "invalid expire time"));
        }
        let now = Instant::now();
        let expires_at = now
            .checked_add(Duration::from_secs(ttl_secs))
            .ok_or_else(|| CacheError::command("SETEX", "invalid expire time"))?;

        let mut entries = self.entries.lock();
        if self.writes.fetch_add(1, Ordering::Relaxed) % SWEEP_EVERY == SWEEP_EVERY - 1 {
            entries.retain(|_, stored| stored.is_live(now));
        }
        entries.insert(
            key.to_string(),
            StoredValue {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> CacheResult<u64> {
        self.ensure_open()?;
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let deleted = keys
            .iter()
            .filter_map(|key| entries.remove(key))
            .filter(|stored| stored.is_live(now))
            .count();
        Ok(deleted as u64)
    }

    async fn delete_by_pattern(&self, pattern: &str) -> CacheResult<u64> {
        self.ensure_open()?;
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let matching: Vec<String> = entries
            .iter()
            .filter(|(key, stored)| stored.is_live(now) && glob_match(pattern, key))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &matching {
            entries.remove(key);
        }
        Ok(matching.len() as u64)
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        self.ensure_open()?;
        let now = Instant::now();
        Ok(self
            .entries
            .lock()
            .get(key)
            .is_some_and(|stored| stored.is_live(now)))
    }

    async fn ping(&self) -> bool {
        self.ensure_open().is_ok()
    }

    async fn close(&self) -> CacheResult<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.entries.lock().clear();
            self.events.emit(ConnectionEvent::Closed);
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.events.subscribe()
    }
}

/// Redis-style glob matching.
///
/// Supports `*`, `?`, character classes (`[abc]`, `[a-z]`, `[^x]`) and
/// `\` to escape the next character.
#[must_use]
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    let (mut p, mut t) = (0, 0);
    // Position of the last `*` and the text index it is currently absorbing up to.
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && pattern[p] == '*' {
            star = Some((p, t));
            p += 1;
            continue;
        }
        if p < pattern.len() {
            if let Some(next) = match_token(&pattern, p, text[t]) {
                p = next;
                t += 1;
                continue;
            }
        }
        match star {
            Some((star_p, star_t)) => {
                star = Some((star_p, star_t + 1));
                p = star_p + 1;
                t = star_t + 1;
            }
            None => return false,
        }
    }

    pattern[p..].iter().all(|&c| c == '*')
}

/// Matches the single-character token at `pattern[p]` against `c`,
/// returning the index of the following token on success.
fn match_token(pattern: &[char], p: usize, c: char) -> Option<usize> {
    match pattern[p] {
        '?' => Some(p + 1),
        '\\' if p + 1 < pattern.len() => (pattern[p + 1] == c).then_some(p + 2),
        '[' => match_class(pattern, p + 1, c),
        literal => (literal == c).then_some(p + 1),
    }
}

fn match_class(pattern: &[char], start: usize, c: char) -> Option<usize> {
    let mut i = start;
    let negate = pattern.get(i) == Some(&'^');
    if negate {
        i += 1;
    }

    let mut matched = false;
    while i < pattern.len() && pattern[i] != ']' {
        if pattern[i] == '\\' && i + 1 < pattern.len() {
            matched |= pattern[i + 1] == c;
            i += 2;
        } else if i + 2 < pattern.len() && pattern[i + 1] == '-' && pattern[i + 2] != ']' {
            let (low, high) = if pattern[i] <= pattern[i + 2] {
                (pattern[i], pattern[i + 2])
            } else {
                (pattern[i + 2], pattern[i])
            };
            matched |= (low..=high).contains(&c);
            i += 3;
        } else {
            matched |= pattern[i] == c;
            i += 1;
        }
    }

    // An unterminated class runs to the end of the pattern.
    let next = (i + 1).min(pattern.len());
    (matched != negate).then_some(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_star() {
        assert!(glob_match("a:*", "a:1"));
        assert!(glob_match("a:*", "a:"));
        assert!(!glob_match("a:*", "b:1"));
        assert!(glob_match("*:42", "product:42"));
        assert!(glob_match("*", ""));
        assert!(glob_match("a*b*c", "aXXbYYc"));
        assert!(!glob_match("a*b*c", "aXXbYY"));
    }

    #[test]
    fn test_glob_question_mark() {
        assert!(glob_match("user:?", "user:7"));
        assert!(!glob_match("user:?", "user:77"));
    }

    #[test]
    fn test_glob_classes() {
        assert!(glob_match("h[ae]llo", "hello"));
        assert!(glob_match("h[ae]llo", "hallo"));
        assert!(!glob_match("h[ae]llo", "hillo"));
        assert!(glob_match("h[^e]llo", "hallo"));
        assert!(!glob_match("h[^e]llo", "hello"));
        assert!(glob_match("id:[0-9]", "id:5"));
        assert!(!glob_match("id:[0-9]", "id:x"));
    }

    #[test]
    fn test_glob_escape() {
        assert!(glob_match("a\\*", "a*"));
        assert!(!glob_match("a\\*", "ab"));
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let store = InMemoryStore::new();
        store.set_with_expiry("k", "v", 10).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("v".to_string()));
        assert!(store.exists("k").await.unwrap());
        assert_eq!(store.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_zero_ttl_is_rejected() {
        let store = InMemoryStore::new();
        let result = store.set_with_expiry("k", "v", 0).await;
        assert!(matches!(result, Err(CacheError::Command { .. })));
    }

    #[tokio::test]
    async fn test_out_of_range_ttl_is_rejected() {
        let store = InMemoryStore::new();
        let result = store.set_with_expiry("k", "v", u64::MAX).await;
        assert!(matches!(result, Err(CacheError::Command { .. })));
        assert!(!store.exists("k").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_writes_sweep_expired_entries() {
        let store = InMemoryStore::new();
        store.set_with_expiry("stale", "v", 1).await.unwrap();
        tokio::time::advance(Duration::from_secs(2)).await;

        for i in 0..SWEEP_EVERY {
            store.set_with_expiry(&format!("fresh:{i}"), "v", 60).await.unwrap();
        }

        let entries = store.entries.lock();
        assert!(!entries.contains_key("stale"));
        assert_eq!(entries.len() as u64, SWEEP_EVERY);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire() {
        let store = InMemoryStore::new();
        store.set_with_expiry("k", "v", 60).await.unwrap();

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(store.exists("k").await.unwrap());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_delete_counts_existing_keys() {
        let store = InMemoryStore::new();
        store.set_with_expiry("a", "1", 10).await.unwrap();
        store.set_with_expiry("b", "2", 10).await.unwrap();

        let deleted = store
            .delete(&["a".to_string(), "b".to_string(), "c".to_string()])
            .await
            .unwrap();
        assert_eq!(deleted, 2);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_delete_by_pattern_without_matches() {
        let store = InMemoryStore::new();
        store.set_with_expiry("b:1", "z", 10).await.unwrap();
        assert_eq!(store.delete_by_pattern("a:*").await.unwrap(), 0);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_close_rejects_operations() {
        let store = InMemoryStore::new();
        let mut events = store.subscribe();

        store.close().await.unwrap();

        assert!(!store.ping().await);
        assert!(matches!(store.get("k").await, Err(CacheError::ConnectionClosed)));
        assert_eq!(events.recv().await.unwrap(), ConnectionEvent::Closed);
    }
}
