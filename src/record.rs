//! Row records: one extracted line item keyed by registry field ids

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Typed value of a single field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl FieldValue {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// Null and whitespace-only text are never written to the host
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// A partial mapping from field id to typed value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowRecord {
    fields: BTreeMap<String, FieldValue>,
}

impl RowRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, id: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(id, value);
        self
    }

    pub fn insert(&mut self, id: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(id.into(), value.into());
    }

    pub fn get(&self, id: &str) -> Option<&FieldValue> {
        self.fields.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut FieldValue> {
        self.fields.get_mut(id)
    }

    /// True when the field is absent, null or blank text
    pub fn is_blank(&self, id: &str) -> bool {
        self.get(id).is_none_or(FieldValue::is_blank)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.fields.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.fields.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&String, &mut FieldValue)> {
        self.fields.iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_json_shape() {
        let record = RowRecord::new()
            .with("description", "Aspirin 100mg")
            .with("quantity", 2.0)
            .with("free_of_charge", false);
        let mut with_null = record.clone();
        with_null.insert("unit_price", FieldValue::Null);

        let value = serde_json::to_value(&with_null).unwrap();
        assert_eq!(
            value,
            json!({
                "description": "Aspirin 100mg",
                "free_of_charge": false,
                "quantity": 2.0,
                "unit_price": null
            })
        );

        let back: RowRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back.get("unit_price"), Some(&FieldValue::Null));
        assert_eq!(back.get("quantity").and_then(FieldValue::as_f64), Some(2.0));
    }

    #[test]
    fn test_blank_detection() {
        let record = RowRecord::new()
            .with("a", "   ")
            .with("b", "x")
            .with("c", FieldValue::Null)
            .with("d", 0.0);
        assert!(record.is_blank("a"));
        assert!(!record.is_blank("b"));
        assert!(record.is_blank("c"));
        assert!(!record.is_blank("d"));
        assert!(record.is_blank("missing"));
    }
}
