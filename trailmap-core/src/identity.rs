//! Identity types for trailmap partitions

use std::fmt;

/// Partition key of the event log: the user an event belongs to.
///
/// Every record carrying the same key lands in the same partition file, and
/// the extractor processes exactly one key's records at a time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserKey(String);

impl UserKey {
    /// Create a key from any string-like value.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Borrow the raw key.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the key, returning the raw string.
    pub fn into_inner(self) -> String {
        self.0
    }

    /// True when the key is empty or whitespace only.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for UserKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for UserKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_key_display_matches_raw() {
        let key = UserKey::new("user_42");
        assert_eq!(key.to_string(), "user_42");
        assert_eq!(key.as_str(), "user_42");
    }

    #[test]
    fn test_user_key_blank() {
        assert!(UserKey::new("  ").is_blank());
        assert!(UserKey::new("").is_blank());
        assert!(!UserKey::new("u").is_blank());
    }

    #[test]
    fn test_user_key_ordering_is_lexicographic() {
        let mut keys = vec![UserKey::from("user2"), UserKey::from("user10"), UserKey::from("user1")];
        keys.sort();
        let raw: Vec<&str> = keys.iter().map(UserKey::as_str).collect();
        assert_eq!(raw, vec!["user1", "user10", "user2"]);
    }
}
