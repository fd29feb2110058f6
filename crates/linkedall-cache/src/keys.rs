//! Cache key construction.
//!
//! Keys are namespaced as `{prefix}:{key}` so a whole namespace can be
//! cleared with the pattern `{prefix}:*`.

/// Joins a logical key with an optional namespace prefix.
///
/// An absent or empty prefix leaves the key unmodified.
#[must_use]
pub fn build_key(key: &str, prefix: Option<&str>) -> String {
    match prefix {
        Some(prefix) if !prefix.is_empty() => format!("{}:{}", prefix, key),
        _ => key.to_string(),
    }
}

/// Glob pattern matching every key in a namespace.
#[must_use]
pub fn namespace_pattern(prefix: &str) -> String {
    format!("{}:*", prefix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_key_with_prefix() {
        assert_eq!(build_key("product:42", Some("marketplace")), "marketplace:product:42");
    }

    #[test]
    fn test_build_key_without_prefix() {
        assert_eq!(build_key("product:42", None), "product:42");
        assert_eq!(build_key("product:42", Some("")), "product:42");
    }

    #[test]
    fn test_namespace_pattern() {
        assert_eq!(namespace_pattern("users"), "users:*");
    }
}
