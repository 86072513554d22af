//! Field specifications
//!
//! A field is one column of the host form's line-item grid. Each field has a
//! semantic type, a DOM naming template and optional length constraints.

use serde::{Deserialize, Serialize};

/// Placeholder substituted with the host row index in DOM suffixes
pub const ROW_PLACEHOLDER: &str = "{row}";

/// Semantic type of a field value
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::String => write!(f, "string"),
            Self::Number => write!(f, "number"),
            Self::Boolean => write!(f, "boolean"),
        }
    }
}

/// How the host exposes the field
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Control {
    /// Editable input, written with focus → commit → blur
    #[default]
    Input,
    /// Read-only field computed by the host; only focused and blurred
    Calculated,
}

/// DOM naming template: `base + suffix`, with `{row}` in the suffix
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DomTemplate {
    pub base: String,
    pub suffix: String,
}

impl DomTemplate {
    pub fn new(base: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            suffix: suffix.into(),
        }
    }

    /// Render the element name for a host row
    pub fn render(&self, row: usize) -> String {
        format!(
            "{}{}",
            self.base,
            self.suffix.replace(ROW_PLACEHOLDER, &row.to_string())
        )
    }

    pub fn has_placeholder(&self) -> bool {
        self.suffix.contains(ROW_PLACEHOLDER)
    }
}

/// Registry entry describing one field
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldSpec {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: FieldType,
    pub dom: DomTemplate,
    #[serde(default)]
    pub control: Control,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    /// Zero-pad width for date parts (day, month, year)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pad: Option<usize>,
    /// Short description shown to the model
    #[serde(default)]
    pub description: String,
}

impl FieldSpec {
    pub fn new(id: impl Into<String>, kind: FieldType, dom: DomTemplate) -> Self {
        Self {
            id: id.into(),
            kind,
            dom,
            control: Control::Input,
            min_length: None,
            max_length: None,
            pad: None,
            description: String::new(),
        }
    }

    pub fn with_control(mut self, control: Control) -> Self {
        self.control = control;
        self
    }

    pub fn with_length(mut self, min: Option<usize>, max: Option<usize>) -> Self {
        self.min_length = min;
        self.max_length = max;
        self
    }

    pub fn with_pad(mut self, width: usize) -> Self {
        self.pad = Some(width);
        self
    }

    pub fn is_calculated(&self) -> bool {
        self.control == Control::Calculated
    }

    pub fn is_toggle(&self) -> bool {
        self.kind == FieldType::Boolean
    }
}
