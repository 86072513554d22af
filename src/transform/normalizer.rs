//! Normalizer transformer
//!
//! Coerces raw model items into typed row records. Only fields active for
//! the transaction type survive; every value is converted to its declared
//! type.

use crate::etl::Transformer;
use crate::extraction::RawItem;
use crate::record::{FieldValue, RowRecord};
use crate::schema::{FieldCatalog, FieldSpec, FieldType, SchemaRegistry};
use eyre::Result;
use regex::Regex;
use serde_json::Value;
use std::sync::{Arc, LazyLock};

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

/// Tokens read as `true` for boolean fields
const AFFIRMATIVE: &[&str] = &[
    "y", "yes", "t", "true", "1", "on", "x", "checked", "✓", "✔",
];

/// Trim and collapse internal whitespace
pub fn collapse_whitespace(s: &str) -> String {
    WHITESPACE.replace_all(s.trim(), " ").into_owned()
}

/// Parse a human-formatted number
///
/// Currency symbols, unit letters and thousands separators are ignored. When
/// both `.` and `,` occur the later one is the decimal mark; a lone `,` is a
/// decimal mark unless exactly three digits follow it; a lone `.` is a
/// decimal mark unless it occurs more than once. A mark directly before the
/// first digit with no other mark after it makes a fraction (`$.50` is 0.5).
/// Parentheses or a leading minus make the number negative.
pub fn parse_decimal(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    let negative =
        trimmed.starts_with('-') || (trimmed.starts_with('(') && trimmed.ends_with(')'));

    let first_digit = trimmed.find(|c: char| c.is_ascii_digit())?;
    let leading_mark = trimmed[..first_digit].ends_with(['.', ',']);

    let kept: String = trimmed[first_digit..]
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();
    let kept = kept.trim_end_matches(['.', ',']);

    let normalized = match (kept.rfind('.'), kept.rfind(',')) {
        (None, None) if leading_mark => format!("0.{}", kept),
        (Some(dot), Some(comma)) if dot > comma => kept.replace(',', ""),
        (Some(_), Some(_)) => kept.replace('.', "").replace(',', "."),
        (None, Some(comma)) => {
            let single = kept.matches(',').count() == 1;
            if single && kept.len() - comma - 1 != 3 {
                kept.replace(',', ".")
            } else {
                kept.replace(',', "")
            }
        }
        (Some(_), None) if kept.matches('.').count() > 1 => kept.replace('.', ""),
        _ => kept.to_string(),
    };

    let value: f64 = normalized.parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    Some(if negative { -value } else { value })
}

/// Coerce to a number; anything unreadable becomes null
pub fn normalize_number(value: &Value) -> FieldValue {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_decimal(s),
        _ => None,
    };
    parsed.map_or(FieldValue::Null, FieldValue::Number)
}

/// Coerce to a boolean; null stays null so the host toggle is left alone
pub fn normalize_bool(value: &Value) -> FieldValue {
    let truth = match value {
        Value::Null => return FieldValue::Null,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n > 0.0),
        Value::String(s) => {
            let token = s.trim().to_lowercase();
            if token.is_empty() {
                return FieldValue::Null;
            }
            AFFIRMATIVE.contains(&token.as_str()) || parse_decimal(&token).is_some_and(|n| n > 0.0)
        }
        Value::Array(_) | Value::Object(_) => false,
    };
    FieldValue::Bool(truth)
}

/// Coerce to text, zero-padding numeric date parts when the field asks for it
pub fn normalize_text(value: &Value, pad: Option<usize>) -> FieldValue {
    let text = match value {
        Value::Null => return FieldValue::Null,
        Value::String(s) => collapse_whitespace(s),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Array(_) | Value::Object(_) => return FieldValue::Null,
    };

    match pad {
        Some(width) if !text.is_empty() && text.chars().all(|c| c.is_ascii_digit()) => {
            FieldValue::Text(format!("{:0>width$}", text, width = width))
        }
        _ => FieldValue::Text(text),
    }
}

/// Normalize a single value against its field specification
pub fn normalize_value(field: &FieldSpec, value: &Value) -> FieldValue {
    match field.kind {
        FieldType::String => normalize_text(value, field.pad),
        FieldType::Number => normalize_number(value),
        FieldType::Boolean => normalize_bool(value),
    }
}

/// Bring an already-typed value in line with its field type
///
/// Records read back from a file or built by a caller may carry text where a
/// number or toggle is declared; those go through the same rules as raw
/// model output.
pub fn coerce_value(field: &FieldSpec, value: &FieldValue) -> FieldValue {
    let raw = match value {
        FieldValue::Null => Value::Null,
        FieldValue::Bool(b) => Value::Bool(*b),
        FieldValue::Number(n) if field.kind == FieldType::Number => return FieldValue::Number(*n),
        FieldValue::Number(n) => Value::String(n.to_string()),
        FieldValue::Text(s) => Value::String(s.clone()),
    };
    normalize_value(field, &raw)
}

/// Transformer from raw model items to typed row records
pub struct Normalizer {
    registry: Arc<SchemaRegistry>,
    transaction_type: String,
}

impl Normalizer {
    pub fn new(registry: Arc<SchemaRegistry>, transaction_type: impl Into<String>) -> Self {
        Self {
            registry,
            transaction_type: transaction_type.into(),
        }
    }

    fn lookup<'a>(item: &'a RawItem, id: &str) -> Option<&'a Value> {
        item.get(id).or_else(|| {
            item.iter()
                .find(|(key, _)| key.trim().eq_ignore_ascii_case(id))
                .map(|(_, value)| value)
        })
    }
}

impl Transformer for Normalizer {
    type Input = RawItem;
    type Output = RowRecord;

    fn transform(&self, input: Self::Input) -> Result<Self::Output> {
        let fields = self.registry.resolve_fields(&self.transaction_type);
        let mut record = RowRecord::new();

        for field in &fields {
            if let Some(value) = Self::lookup(&input, &field.id) {
                record.insert(field.id.clone(), normalize_value(field, value));
            }
        }

        let dropped = input
            .keys()
            .filter(|key| !fields.iter().any(|f| f.id.eq_ignore_ascii_case(key.trim())))
            .count();
        if dropped > 0 {
            log::debug!("Dropped {} unknown key(s) from extracted item", dropped);
        }

        Ok(record)
    }
}
