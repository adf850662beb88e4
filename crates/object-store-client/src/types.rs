//! Tag types and the exact-match tag query

use crate::error::{ObjectStoreError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Cleartext tags attached to a remote object. Keys are unique.
pub type Tags = BTreeMap<String, String>;

pub const MAX_TAGS: usize = 10;
pub const MAX_TAG_KEY_LEN: usize = 128;
pub const MAX_TAG_VALUE_LEN: usize = 256;

/// Check a tag set against the limits the remote tier enforces
pub fn validate_tags(tags: &Tags) -> Result<()> {
    if tags.len() > MAX_TAGS {
        return Err(ObjectStoreError::InvalidTags(format!(
            "{} tags given, at most {} allowed",
            tags.len(),
            MAX_TAGS
        )));
    }

    for (key, value) in tags {
        let key_len = key.chars().count();
        if key_len == 0 || key_len > MAX_TAG_KEY_LEN {
            return Err(ObjectStoreError::InvalidTags(format!(
                "tag key must be 1-{} characters, got {}",
                MAX_TAG_KEY_LEN, key_len
            )));
        }
        if value.chars().count() > MAX_TAG_VALUE_LEN {
            return Err(ObjectStoreError::InvalidTags(format!(
                "value for tag {:?} exceeds {} characters",
                key, MAX_TAG_VALUE_LEN
            )));
        }
    }

    Ok(())
}

/// Exact-match query on a single tag key/value pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagQuery {
    pub key: String,
    pub value: String,
}

impl TagQuery {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Whether `tags` contains exactly `key -> value`
    pub fn matches(&self, tags: &Tags) -> bool {
        tags.get(&self.key) == Some(&self.value)
    }

    /// Render as a store filter expression: `"<key>" = '<value>'`.
    ///
    /// Quote characters are doubled so untrusted input cannot close the
    /// literal and inject another clause.
    pub fn expression(&self) -> String {
        format!(
            "\"{}\" = '{}'",
            self.key.replace('"', "\"\""),
            self.value.replace('\'', "''")
        )
    }
}

impl fmt::Display for TagQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(pairs: &[(&str, &str)]) -> Tags {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_expression_plain() {
        let query = TagQuery::new("project", "apollo");
        assert_eq!(query.expression(), r#""project" = 'apollo'"#);
    }

    #[test]
    fn test_expression_escapes_quotes() {
        let query = TagQuery::new(r#"a"b"#, "x' OR '1'='1");
        assert_eq!(
            query.expression(),
            r#""a""b" = 'x'' OR ''1''=''1'"#
        );
    }

    #[test]
    fn test_matches_exact_value_only() {
        let query = TagQuery::new("env", "prod");
        assert!(query.matches(&tags(&[("env", "prod"), ("team", "core")])));
        assert!(!query.matches(&tags(&[("env", "production")])));
        assert!(!query.matches(&tags(&[("ENV", "prod")])));
        assert!(!query.matches(&Tags::new()));
    }

    #[test]
    fn test_validate_tags_accepts_reasonable_sets() {
        assert!(validate_tags(&Tags::new()).is_ok());
        assert!(validate_tags(&tags(&[("env", ""), ("team", "core")])).is_ok());
    }

    #[test]
    fn test_validate_tags_rejects_too_many() {
        let many: Tags = (0..=MAX_TAGS)
            .map(|i| (format!("k{}", i), "v".to_string()))
            .collect();
        assert!(matches!(
            validate_tags(&many),
            Err(ObjectStoreError::InvalidTags(_))
        ));
    }

    #[test]
    fn test_validate_tags_rejects_bad_lengths() {
        assert!(validate_tags(&tags(&[("", "v")])).is_err());

        let long_key = "k".repeat(MAX_TAG_KEY_LEN + 1);
        assert!(validate_tags(&tags(&[(long_key.as_str(), "v")])).is_err());

        let long_value = "v".repeat(MAX_TAG_VALUE_LEN + 1);
        assert!(validate_tags(&tags(&[("k", long_value.as_str())])).is_err());
    }
}
