//! Validation of submitted attribute values against a category's schema.
//!
//! Validation never fails fast: every problem in a submission is collected so
//! the caller can report them together. On success the result is normalized
//! (canonical names, coerced payloads) and ordered like the schema.

mod coerce;

use std::fmt;

use serde::Serialize;

use crate::types::{AttributeMap, AttributeSchema, SubmittedAttributes};

/// Whether omitted required attributes count as violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    Create,
    /// Omitted attributes are left to the update merge.
    Update,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViolationCode {
    MissingRequiredAttribute,
    UnknownAttribute,
    DuplicateAttribute,
    InvalidAttributeType,
    InvalidOption,
}

impl ViolationCode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MissingRequiredAttribute => "MISSING_REQUIRED_ATTRIBUTE",
            Self::UnknownAttribute => "UNKNOWN_ATTRIBUTE",
            Self::DuplicateAttribute => "DUPLICATE_ATTRIBUTE",
            Self::InvalidAttributeType => "INVALID_ATTRIBUTE_TYPE",
            Self::InvalidOption => "INVALID_OPTION",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub code: ViolationCode,
    pub attribute: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Violation {
    fn new(code: ViolationCode, attribute: impl Into<String>) -> Self {
        Self {
            code,
            attribute: attribute.into(),
            detail: None,
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.as_str(), self.attribute)?;
        if let Some(detail) = &self.detail {
            write!(f, " ({detail})")?;
        }
        Ok(())
    }
}

/// Validates `submitted` against `schemas`.
///
/// Returns the normalized attributes in schema order, or every violation
/// found (deduplicated). Nothing is partially applied.
pub fn validate(
    schemas: &[AttributeSchema],
    submitted: &SubmittedAttributes,
    mode: ValidationMode,
) -> Result<AttributeMap, Vec<Violation>> {
    let mut violations = Vec::new();
    let mut seen = vec![false; schemas.len()];
    let mut normalized = vec![None; schemas.len()];

    for (key, value) in submitted.iter() {
        let Some(index) = schemas.iter().position(|s| s.matches(key)) else {
            record(&mut violations, Violation::new(ViolationCode::UnknownAttribute, key));
            continue;
        };

        let schema = &schemas[index];
        if seen[index] {
            record(
                &mut violations,
                Violation::new(ViolationCode::DuplicateAttribute, &schema.name),
            );
            continue;
        }
        seen[index] = true;

        match coerce::normalize(schema, value) {
            Ok(value) => normalized[index] = Some(value),
            Err(violation) => record(&mut violations, violation),
        }
    }

    if mode == ValidationMode::Create {
        for (schema, present) in schemas.iter().zip(&seen) {
            if schema.required && !present {
                record(
                    &mut violations,
                    Violation::new(ViolationCode::MissingRequiredAttribute, &schema.name),
                );
            }
        }
    }

    if !violations.is_empty() {
        return Err(violations);
    }

    Ok(schemas
        .iter()
        .zip(normalized)
        .filter_map(|(schema, value)| value.map(|v| (schema.name.clone(), v)))
        .collect())
}

fn record(violations: &mut Vec<Violation>, violation: Violation) {
    if !violations.contains(&violation) {
        violations.push(violation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AttributeKind, AttributeValue, RawValue, SubmittedValue};

    fn schema(name: &str, kind: AttributeKind, required: bool) -> AttributeSchema {
        AttributeSchema {
            name: name.to_string(),
            kind,
            required,
            options: Vec::new(),
        }
    }

    fn books() -> Vec<AttributeSchema> {
        vec![
            schema("isbn", AttributeKind::Text, true),
            schema("pages", AttributeKind::Number, false),
            schema("read", AttributeKind::Boolean, false),
            schema("published", AttributeKind::Date, false),
            schema("homepage", AttributeKind::Url, false),
            AttributeSchema {
                name: "format".to_string(),
                kind: AttributeKind::Select,
                required: false,
                options: vec!["hardcover".to_string(), "paperback".to_string()],
            },
        ]
    }

    fn submitted(entries: &[(&str, Option<&str>, RawValue)]) -> SubmittedAttributes {
        entries
            .iter()
            .map(|(name, kind, value)| {
                (
                    name.to_string(),
                    SubmittedValue {
                        kind: kind.map(str::to_string),
                        value: value.clone(),
                    },
                )
            })
            .collect()
    }

    fn text(s: &str) -> RawValue {
        RawValue::Text(s.to_string())
    }

    #[test]
    fn test_missing_required_on_create() {
        let result = validate(&books(), &SubmittedAttributes::new(), ValidationMode::Create);
        let violations = result.unwrap_err();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].to_string(), "MISSING_REQUIRED_ATTRIBUTE: isbn");
    }

    #[test]
    fn test_missing_required_ignored_on_update() {
        let input = submitted(&[("pages", Some("number"), RawValue::Number(10.0))]);
        let normalized = validate(&books(), &input, ValidationMode::Update).unwrap();
        assert_eq!(normalized.len(), 1);
        assert_eq!(normalized.get("pages"), Some(&AttributeValue::Number(10.0)));
    }

    #[test]
    fn test_collects_all_violations() {
        let input = submitted(&[
            ("color", Some("text"), text("red")),
            ("pages", Some("number"), text("many")),
            ("read", Some("text"), text("true")),
        ]);
        let violations = validate(&books(), &input, ValidationMode::Create).unwrap_err();
        let codes: Vec<ViolationCode> = violations.iter().map(|v| v.code).collect();

        assert_eq!(violations.len(), 4);
        assert!(codes.contains(&ViolationCode::UnknownAttribute));
        assert!(codes.contains(&ViolationCode::MissingRequiredAttribute));
        assert_eq!(
            codes
                .iter()
                .filter(|c| **c == ViolationCode::InvalidAttributeType)
                .count(),
            2
        );
        let messages: Vec<String> = violations.iter().map(ToString::to_string).collect();
        let expected = "INVALID_ATTRIBUTE_TYPE: pages (expected number, got text)";
        assert!(messages.iter().any(|m| m == expected));
    }

    #[test]
    fn test_array_and_object_payloads_are_type_violations() {
        let input: SubmittedAttributes = serde_json::from_str(
            r#"{
                "isbn": {"kind": "text", "value": ["a"]},
                "format": {"value": {"nested": true}},
                "color": {"value": "red"}
            }"#,
        )
        .unwrap();
        let messages: Vec<String> = validate(&books(), &input, ValidationMode::Create)
            .unwrap_err()
            .iter()
            .map(ToString::to_string)
            .collect();

        assert_eq!(
            messages,
            vec![
                "INVALID_ATTRIBUTE_TYPE: isbn (expected text, got array)",
                "INVALID_ATTRIBUTE_TYPE: format (expected select, got object)",
                "UNKNOWN_ATTRIBUTE: color",
            ]
        );
    }

    #[test]
    fn test_type_violation_names_kinds() {
        let input = submitted(&[
            ("isbn", Some("text"), text("123")),
            ("read", Some("text"), text("true")),
        ]);
        let violations = validate(&books(), &input, ValidationMode::Create).unwrap_err();
        assert_eq!(
            violations[0].to_string(),
            "INVALID_ATTRIBUTE_TYPE: read (expected boolean, got text)"
        );
    }

    #[test]
    fn test_coercion_from_strings() {
        let input = submitted(&[
            ("isbn", None, text("978-0")),
            ("pages", Some("number"), text("42")),
            ("read", Some("boolean"), text("TRUE")),
            ("published", None, text("2020-05-17")),
            ("homepage", Some("url"), text(" https://example.com/book ")),
        ]);
        let normalized = validate(&books(), &input, ValidationMode::Create).unwrap();

        assert_eq!(normalized.get("pages"), Some(&AttributeValue::Number(42.0)));
        assert_eq!(normalized.get("read"), Some(&AttributeValue::Boolean(true)));
        assert_eq!(
            normalized.get("homepage"),
            Some(&AttributeValue::Url("https://example.com/book".to_string()))
        );
        assert!(matches!(normalized.get("published"), Some(AttributeValue::Date(_))));
    }

    #[test]
    fn test_inferred_kind_still_coerces() {
        let input = submitted(&[("isbn", None, text("x")), ("pages", None, text("7"))]);
        let normalized = validate(&books(), &input, ValidationMode::Create).unwrap();
        assert_eq!(normalized.get("pages"), Some(&AttributeValue::Number(7.0)));
    }

    #[test]
    fn test_url_requires_http_scheme() {
        let input = submitted(&[
            ("isbn", None, text("x")),
            ("homepage", Some("url"), text("ftp://example.com")),
        ]);
        let violations = validate(&books(), &input, ValidationMode::Create).unwrap_err();
        assert_eq!(violations[0].code, ViolationCode::InvalidAttributeType);
    }

    #[test]
    fn test_case_insensitive_names_normalize_to_schema() {
        let input = submitted(&[("ISBN", Some("string"), text("abc"))]);
        let normalized = validate(&books(), &input, ValidationMode::Create).unwrap();
        let keys: Vec<&str> = normalized.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["isbn"]);
    }

    #[test]
    fn test_duplicate_case_variants() {
        let input = submitted(&[("isbn", None, text("a")), ("Isbn", None, text("b"))]);
        let violations = validate(&books(), &input, ValidationMode::Create).unwrap_err();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].code, ViolationCode::DuplicateAttribute);
    }

    #[test]
    fn test_select_membership() {
        let ok = submitted(&[
            ("isbn", None, text("x")),
            ("format", Some("text"), text("Hardcover")),
        ]);
        let normalized = validate(&books(), &ok, ValidationMode::Create).unwrap();
        assert_eq!(
            normalized.get("format"),
            Some(&AttributeValue::Select("hardcover".to_string()))
        );

        let bad = submitted(&[("isbn", None, text("x")), ("format", None, text("ebook"))]);
        let violations = validate(&books(), &bad, ValidationMode::Create).unwrap_err();
        assert_eq!(violations[0].code, ViolationCode::InvalidOption);
    }

    #[test]
    fn test_unknown_reported_kind() {
        let input = submitted(&[("isbn", Some("blob"), text("x"))]);
        let violations = validate(&books(), &input, ValidationMode::Create).unwrap_err();
        assert_eq!(violations[0].code, ViolationCode::InvalidAttributeType);
    }

    #[test]
    fn test_null_is_a_type_violation() {
        let input = submitted(&[("isbn", None, RawValue::Null)]);
        let violations = validate(&books(), &input, ValidationMode::Create).unwrap_err();
        assert_eq!(
            violations[0].to_string(),
            "INVALID_ATTRIBUTE_TYPE: isbn (expected text, got null)"
        );
    }

    #[test]
    fn test_output_follows_schema_order() {
        let input = submitted(&[
            ("format", None, text("paperback")),
            ("pages", None, RawValue::Number(3.0)),
            ("isbn", None, text("x")),
        ]);
        let normalized = validate(&books(), &input, ValidationMode::Create).unwrap();
        let keys: Vec<&str> = normalized.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["isbn", "pages", "format"]);
    }

    #[test]
    fn test_revalidating_normalized_is_idempotent() {
        let input = submitted(&[
            ("isbn", None, text("978")),
            ("pages", None, text("300")),
            ("read", None, text("false")),
            ("published", None, text("1999-12-31")),
            ("homepage", None, text("http://example.org")),
            ("format", None, text("PAPERBACK")),
        ]);
        let first = validate(&books(), &input, ValidationMode::Create).unwrap();

        let resubmitted: SubmittedAttributes = first
            .clone()
            .into_iter()
            .map(|(name, value)| (name, SubmittedValue::from(value)))
            .collect();
        let second = validate(&books(), &resubmitted, ValidationMode::Create).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_conformance_after_create() {
        let input = submitted(&[
            ("isbn", None, text("1")),
            ("read", None, RawValue::Boolean(true)),
        ]);
        let normalized = validate(&books(), &input, ValidationMode::Create).unwrap();
        let schemas = books();

        for key in normalized.keys() {
            assert!(schemas.iter().any(|s| s.name == *key));
        }
        for required in schemas.iter().filter(|s| s.required) {
            assert!(normalized.get(&required.name).is_some());
        }
    }
}
