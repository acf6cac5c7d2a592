//! Scalar metadata maps and exact-match filters over them.

use std::collections::BTreeMap;
use std::fmt;

use rusqlite::types::Value;
use serde::{Deserialize, Serialize};

/// A metadata value: string, bool or integer. Nothing else is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

/// Metadata attached to an entry. Ordered so serialized JSON is stable.
pub type Metadata = BTreeMap<String, MetadataValue>;

impl MetadataValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// The SQLite value `json_extract` yields for this scalar. JSON booleans
    /// come back as integers 0/1.
    pub(crate) fn to_sql_value(&self) -> Value {
        match self {
            Self::Bool(b) => Value::Integer(i64::from(*b)),
            Self::Int(i) => Value::Integer(*i),
            Self::Text(s) => Value::Text(s.clone()),
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<bool> for MetadataValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for MetadataValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u8> for MetadataValue {
    fn from(v: u8) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<&str> for MetadataValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// Exact-match conjunction over metadata keys. No ranges, no OR.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataFilter {
    conditions: Vec<(String, MetadataValue)>,
}

impl MetadataFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `key == value`. A repeated key replaces the earlier condition.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<MetadataValue>) {
        let key = key.into();
        let value = value.into();
        match self.conditions.iter_mut().find(|(k, _)| *k == key) {
            Some(existing) => existing.1 = value,
            None => self.conditions.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&MetadataValue> {
        self.conditions
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn conditions(&self) -> impl Iterator<Item = (&str, &MetadataValue)> {
        self.conditions.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// True when every condition holds. A missing key never matches.
    pub fn matches(&self, metadata: &Metadata) -> bool {
        self.conditions
            .iter()
            .all(|(k, v)| metadata.get(k) == Some(v))
    }
}

/// JSON path for a top-level metadata key, quoted so any key is addressable.
pub(crate) fn json_path(key: &str) -> String {
    format!("$.\"{}\"", key.replace('"', "\\\""))
}

/// `'$.key'` as an SQL literal when `key` is a plain identifier. Expression
/// indexes only match a literal path spelled exactly like the index.
pub(crate) fn literal_json_path(key: &str) -> Option<String> {
    let mut chars = key.chars();
    let first = chars.next()?;
    let plain = (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    plain.then(|| format!("'$.{key}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task_metadata() -> Metadata {
        let mut m = Metadata::new();
        m.insert("type".into(), "task".into());
        m.insert("completed".into(), false.into());
        m.insert("priority_code".into(), "ferrari".into());
        m
    }

    #[test]
    fn untagged_json_shape() {
        let json = serde_json::to_string(&task_metadata()).unwrap();
        assert_eq!(
            json,
            r#"{"completed":false,"priority_code":"ferrari","type":"task"}"#
        );

        let parsed: Metadata =
            serde_json::from_str(r#"{"mood_score":8,"type":"reflection"}"#).unwrap();
        assert_eq!(parsed["mood_score"], MetadataValue::Int(8));
        assert_eq!(parsed["type"].as_str(), Some("reflection"));
    }

    #[test]
    fn filter_matches_conjunction() {
        let meta = task_metadata();
        assert!(MetadataFilter::new().matches(&meta));
        assert!(MetadataFilter::new().with("type", "task").matches(&meta));
        assert!(MetadataFilter::new()
            .with("type", "task")
            .with("completed", false)
            .matches(&meta));
        assert!(!MetadataFilter::new()
            .with("type", "task")
            .with("priority_code", "tesla")
            .matches(&meta));
        assert!(!MetadataFilter::new().with("mood_score", 3u8).matches(&meta));
    }

    #[test]
    fn filter_is_type_strict() {
        let mut meta = Metadata::new();
        meta.insert("completed".into(), MetadataValue::Int(0));
        assert!(!MetadataFilter::new().with("completed", false).matches(&meta));
    }

    #[test]
    fn repeated_key_replaces() {
        let filter = MetadataFilter::new()
            .with("priority_code", "ferrari")
            .with("priority_code", "tesla");
        assert_eq!(filter.conditions().count(), 1);
        assert_eq!(filter.get("priority_code").and_then(|v| v.as_str()), Some("tesla"));
    }

    #[test]
    fn json_path_quotes_key() {
        assert_eq!(json_path("type"), "$.\"type\"");
    }

    #[test]
    fn literal_path_only_for_identifiers() {
        assert_eq!(literal_json_path("type").as_deref(), Some("'$.type'"));
        assert_eq!(
            literal_json_path("priority_code").as_deref(),
            Some("'$.priority_code'")
        );
        assert_eq!(literal_json_path("it's"), None);
        assert_eq!(literal_json_path("a.b"), None);
        assert_eq!(literal_json_path("9lives"), None);
        assert_eq!(literal_json_path(""), None);
    }
}
