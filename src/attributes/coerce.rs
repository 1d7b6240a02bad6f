use chrono::{DateTime, NaiveDate, Utc};

use crate::types::{AttributeKind, AttributeSchema, AttributeValue, RawValue, SubmittedValue};
use crate::validation::is_http_url;

use super::{Violation, ViolationCode};

/// Normalizes one submitted value against its schema.
pub(super) fn normalize(
    schema: &AttributeSchema,
    submitted: &SubmittedValue,
) -> Result<AttributeValue, Violation> {
    let reported = match &submitted.kind {
        Some(raw_kind) => match AttributeKind::parse(raw_kind) {
            Some(kind) => Some(kind),
            None => return Err(type_violation(schema, raw_kind)),
        },
        None => None,
    };

    if schema.kind == AttributeKind::Select {
        return select(schema, &submitted.value);
    }

    if let Some(kind) = reported {
        if kind != schema.kind {
            return Err(type_violation(schema, kind.as_str()));
        }
    }

    coerce(schema.kind, &submitted.value)
        .ok_or_else(|| type_violation(schema, submitted.value.shape()))
}

fn coerce(kind: AttributeKind, raw: &RawValue) -> Option<AttributeValue> {
    match (kind, raw) {
        (AttributeKind::Text, RawValue::Text(s)) => Some(AttributeValue::Text(s.clone())),
        (AttributeKind::Number, RawValue::Number(n)) if n.is_finite() => {
            Some(AttributeValue::Number(*n))
        }
        (AttributeKind::Number, RawValue::Text(s)) => parse_number(s).map(AttributeValue::Number),
        (AttributeKind::Boolean, RawValue::Boolean(b)) => Some(AttributeValue::Boolean(*b)),
        (AttributeKind::Boolean, RawValue::Text(s)) => parse_bool(s).map(AttributeValue::Boolean),
        (AttributeKind::Date, RawValue::Text(s)) => parse_date(s).map(AttributeValue::Date),
        (AttributeKind::Url, RawValue::Text(s)) if is_http_url(s.trim()) => {
            Some(AttributeValue::Url(s.trim().to_string()))
        }
        _ => None,
    }
}

fn select(schema: &AttributeSchema, raw: &RawValue) -> Result<AttributeValue, Violation> {
    let choice = match raw {
        RawValue::Text(s) => s.trim().to_string(),
        RawValue::Number(n) => format_number(*n),
        RawValue::Boolean(b) => b.to_string(),
        RawValue::Null | RawValue::Other(_) => return Err(type_violation(schema, raw.shape())),
    };

    schema
        .options
        .iter()
        .find(|option| option.eq_ignore_ascii_case(&choice))
        .map(|option| AttributeValue::Select(option.clone()))
        .ok_or_else(|| Violation {
            code: ViolationCode::InvalidOption,
            attribute: schema.name.clone(),
            detail: Some(format!(
                "'{choice}' is not one of: {}",
                schema.options.join(", ")
            )),
        })
}

fn type_violation(schema: &AttributeSchema, actual: &str) -> Violation {
    Violation {
        code: ViolationCode::InvalidAttributeType,
        attribute: schema.name.clone(),
        detail: Some(format!("expected {}, got {actual}", schema.kind)),
    }
}

/// Only plain decimal strings coerce; "NaN", "inf" and the empty string do not.
fn parse_number(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() || !trimmed.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
}

fn parse_bool(s: &str) -> Option<bool> {
    let trimmed = s.trim();
    if trimmed.eq_ignore_ascii_case("true") {
        Some(true)
    } else if trimmed.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    let trimmed = s.trim();
    DateTime::parse_from_rfc3339(trimmed)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|ndt| ndt.and_utc())
        })
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}
