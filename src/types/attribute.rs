use std::fmt;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// The kinds of value an attribute schema may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeKind {
    #[serde(alias = "string")]
    Text,
    Number,
    Date,
    Boolean,
    Url,
    Select,
}

impl AttributeKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Number => "number",
            Self::Date => "date",
            Self::Boolean => "boolean",
            Self::Url => "url",
            Self::Select => "select",
        }
    }

    /// Parses a kind name case-insensitively. `string` is accepted as the
    /// legacy spelling of `text`.
    pub fn parse(s: &str) -> Option<AttributeKind> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "string" => Some(Self::Text),
            "number" => Some(Self::Number),
            "date" => Some(Self::Date),
            "boolean" | "bool" => Some(Self::Boolean),
            "url" => Some(Self::Url),
            "select" => Some(Self::Select),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One typed field definition within a category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeSchema {
    pub name: String,
    pub kind: AttributeKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

impl AttributeSchema {
    /// Returns true if `name` refers to this attribute. Names compare
    /// case-insensitively.
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        fold_name(&self.name) == fold_name(name)
    }

    /// The value an attribute takes when an item has never supplied one.
    #[must_use]
    pub fn zero_value(&self) -> AttributeValue {
        match self.kind {
            AttributeKind::Text => AttributeValue::Text(String::new()),
            AttributeKind::Number => AttributeValue::Number(0.0),
            AttributeKind::Date => AttributeValue::Date(DateTime::<Utc>::default()),
            AttributeKind::Boolean => AttributeValue::Boolean(false),
            AttributeKind::Url => AttributeValue::Url(String::new()),
            AttributeKind::Select => {
                AttributeValue::Select(self.options.first().cloned().unwrap_or_default())
            }
        }
    }
}

/// Case folding used for every attribute-name comparison.
#[must_use]
pub fn fold_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// A normalized attribute value. The variant is the kind; the payload type is
/// fixed per kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum AttributeValue {
    Text(String),
    Number(f64),
    Date(DateTime<Utc>),
    Boolean(bool),
    Url(String),
    Select(String),
}

impl AttributeValue {
    #[must_use]
    pub const fn kind(&self) -> AttributeKind {
        match self {
            Self::Text(_) => AttributeKind::Text,
            Self::Number(_) => AttributeKind::Number,
            Self::Date(_) => AttributeKind::Date,
            Self::Boolean(_) => AttributeKind::Boolean,
            Self::Url(_) => AttributeKind::Url,
            Self::Select(_) => AttributeKind::Select,
        }
    }

    /// Returns true if this stored value still satisfies `schema`. Used when a
    /// category's schema changed after the value was written.
    #[must_use]
    pub fn conforms_to(&self, schema: &AttributeSchema) -> bool {
        match (self, schema.kind) {
            (Self::Select(choice), AttributeKind::Select) => schema.options.contains(choice),
            (value, kind) => value.kind() == kind,
        }
    }
}

/// A raw JSON payload as submitted by a client, before coercion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Null,
    Boolean(bool),
    Number(f64),
    Text(String),
    /// Arrays and objects. Never valid for any kind; kept so they surface as
    /// type violations instead of failing the whole request body.
    Other(serde_json::Value),
}

impl RawValue {
    /// The kind the payload itself looks like.
    #[must_use]
    pub fn shape(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Boolean(_) => "boolean",
            Self::Number(_) => "number",
            Self::Text(_) => "text",
            Self::Other(serde_json::Value::Array(_)) => "array",
            Self::Other(_) => "object",
        }
    }
}

/// An attribute value as submitted in a request: an optional reported kind
/// plus the raw payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmittedValue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub value: RawValue,
}

impl SubmittedValue {
    #[must_use]
    pub fn new(kind: AttributeKind, value: RawValue) -> Self {
        Self {
            kind: Some(kind.as_str().to_string()),
            value,
        }
    }
}

impl From<AttributeValue> for SubmittedValue {
    fn from(value: AttributeValue) -> Self {
        let kind = value.kind();
        let raw = match value {
            AttributeValue::Text(s) | AttributeValue::Url(s) | AttributeValue::Select(s) => {
                RawValue::Text(s)
            }
            AttributeValue::Number(n) => RawValue::Number(n),
            AttributeValue::Date(d) => RawValue::Text(d.to_rfc3339()),
            AttributeValue::Boolean(b) => RawValue::Boolean(b),
        };
        Self::new(kind, raw)
    }
}

/// Attribute name to value, in insertion order.
pub type AttributeMap<V = AttributeValue> = IndexMap<String, V>;

/// Case-insensitive lookup by attribute name.
#[must_use]
pub fn find_attribute<'a, V>(map: &'a AttributeMap<V>, name: &str) -> Option<&'a V> {
    let folded = fold_name(name);
    map.iter()
        .find(|(n, _)| fold_name(n) == folded)
        .map(|(_, v)| v)
}

/// Attributes exactly as a client submitted them.
pub type SubmittedAttributes = AttributeMap<SubmittedValue>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parse_accepts_legacy_string() {
        assert_eq!(AttributeKind::parse("string"), Some(AttributeKind::Text));
        assert_eq!(AttributeKind::parse("NUMBER"), Some(AttributeKind::Number));
        assert_eq!(AttributeKind::parse("colour"), None);
    }

    #[test]
    fn test_value_serializes_tagged() {
        let value = AttributeValue::Number(42.0);
        let json = serde_json::to_value(&value).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "number", "value": 42.0}));
    }

    #[test]
    fn test_map_preserves_order() {
        let json = r#"{"zeta": {"value": "a"}, "alpha": {"value": 1}}"#;
        let map: SubmittedAttributes = serde_json::from_str(json).unwrap();
        let keys: Vec<&str> = map.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["zeta", "alpha"]);

        let out = serde_json::to_string(&map).unwrap();
        assert!(out.find("zeta").unwrap() < out.find("alpha").unwrap());
    }

    #[test]
    fn test_raw_value_null() {
        let submitted: SubmittedValue = serde_json::from_str(r#"{"value": null}"#).unwrap();
        assert_eq!(submitted.value, RawValue::Null);
        assert!(submitted.kind.is_none());
    }

    #[test]
    fn test_select_conformance_tracks_options() {
        let schema = AttributeSchema {
            name: "format".to_string(),
            kind: AttributeKind::Select,
            required: false,
            options: vec!["hardcover".to_string()],
        };
        assert!(AttributeValue::Select("hardcover".to_string()).conforms_to(&schema));
        assert!(!AttributeValue::Select("ebook".to_string()).conforms_to(&schema));
        assert!(!AttributeValue::Text("hardcover".to_string()).conforms_to(&schema));
    }
}
