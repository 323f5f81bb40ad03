//! Keyword normalization
//!
//! Every source map and every target row is joined on the same canonical key:
//! the raw cell text, trimmed and lowercased. Two raw strings that differ only in
//! case or surrounding whitespace name the same keyword.

use std::borrow::Borrow;
use std::fmt;

/// Canonical join key (lowercased, trimmed, never empty)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NormalizedKey(String);

impl NormalizedKey {
    /// Normalize raw text, returning `None` when nothing is left after trimming
    pub fn new(raw: &str) -> Option<Self> {
        let key = raw.trim().to_lowercase();
        if key.is_empty() {
            None
        } else {
            Some(Self(key))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NormalizedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for NormalizedKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for NormalizedKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Normalize a header or keyword cell (lowercase + trim). May return an empty string.
pub fn normalize_key(raw: &str) -> String {
    raw.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_case_and_whitespace_collapse() {
        let a = NormalizedKey::new("  Red Shoes ").unwrap();
        let b = NormalizedKey::new("red shoes").unwrap();
        let c = NormalizedKey::new("\tRED SHOES\n").unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(a.as_str(), "red shoes");
    }

    #[test]
    fn test_empty_is_not_a_key() {
        assert!(NormalizedKey::new("").is_none());
        assert!(NormalizedKey::new("   \t ").is_none());
    }

    #[test]
    fn test_inner_whitespace_preserved() {
        let key = NormalizedKey::new(" Blue  Denim ").unwrap();
        assert_eq!(key.as_str(), "blue  denim");
    }

    #[test]
    fn test_map_lookup_by_str() {
        let mut map = HashMap::new();
        map.insert(NormalizedKey::new("Shoes").unwrap(), 1);
        assert_eq!(map.get("shoes"), Some(&1));
    }

    #[test]
    fn test_unicode_lowercase() {
        assert_eq!(normalize_key(" ÉTÉ "), "été");
    }
}
