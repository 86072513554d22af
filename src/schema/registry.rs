//! Schema registry
//!
//! The registry is loaded once at startup and shared as `Arc<SchemaRegistry>`.
//! Extraction reads it through [`FieldCatalog`], filling through [`DomNames`].
//!
//! Example format:
//! ```yaml
//! version: 1.0.0
//! stock_field: stock_code
//! decimal_separator: ","
//! fields:
//!   - id: stock_code
//!     type: string
//!     dom: { base: "grdLines$", suffix: "{row}$txtStockCode" }
//!     max_length: 30
//! profiles:
//!   default: [stock_code]
//! ```

use super::field::{FieldSpec, FieldType};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the profile every unknown transaction type falls back to
pub const DEFAULT_PROFILE: &str = "default";

/// Supported schema file major version
const SUPPORTED_MAJOR: u64 = 1;

const BUILTIN_SCHEMA: &str = include_str!("default_schema.yml");

/// Configuration-fatal schema problems
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("failed to read schema file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse schema: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid schema version '{0}'")]
    InvalidVersion(String),
    #[error("unsupported schema version {0}, expected 1.x")]
    UnsupportedVersion(semver::Version),
    #[error("field '{0}' is declared more than once")]
    DuplicateField(String),
    #[error("field '{0}' is not registered")]
    UnknownField(String),
    #[error("profile '{profile}' references unknown field '{field}'")]
    UnknownProfileField { profile: String, field: String },
    #[error("profile '{profile}' lists field '{field}' more than once")]
    DuplicateProfileField { profile: String, field: String },
    #[error("schema has no 'default' profile")]
    MissingDefaultProfile,
    #[error("profile '{0}' has no fields")]
    EmptyProfile(String),
    #[error("DOM suffix of field '{0}' has no {{row}} placeholder")]
    MissingPlaceholder(String),
    #[error("stock field '{0}' must be a registered string field")]
    InvalidStockField(String),
    #[error("field '{0}' has min_length greater than max_length")]
    InvalidLength(String),
}

/// Raw schema document as stored in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SchemaDocument {
    version: String,
    #[serde(default)]
    stock_field: Option<String>,
    #[serde(default = "default_decimal_separator")]
    decimal_separator: char,
    fields: Vec<FieldSpec>,
    profiles: BTreeMap<String, Vec<String>>,
}

fn default_decimal_separator() -> char {
    '.'
}

/// Field lookup used by the extraction side
pub trait FieldCatalog {
    /// Ordered fields active for a transaction type, `default` when unknown
    fn resolve_fields(&self, transaction_type: &str) -> Vec<&FieldSpec>;

    /// Look up a single registered field
    fn field(&self, id: &str) -> Option<&FieldSpec>;

    /// Field that triggers the host item search, if any
    fn stock_field(&self) -> Option<&FieldSpec>;
}

/// DOM name lookup used by the fill side
pub trait DomNames {
    /// Element name of a field in a host row
    fn resolve_dom_name(&self, field_id: &str, row: usize) -> Result<String, SchemaError>;

    /// Decimal separator the host expects in numeric inputs
    fn decimal_separator(&self) -> char;
}

/// Immutable, validated schema
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    version: semver::Version,
    fields: Vec<FieldSpec>,
    profiles: BTreeMap<String, Vec<usize>>,
    stock_field: Option<usize>,
    decimal_separator: char,
}

impl SchemaRegistry {
    /// Registry built from the schema shipped with the binary
    pub fn builtin() -> Result<Self, SchemaError> {
        Self::from_yaml(BUILTIN_SCHEMA)
    }

    /// Load a schema file
    pub fn read(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| SchemaError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("Loaded schema from {}", path.display());
        Self::from_yaml(&content)
    }

    /// Load a schema file when given, the built-in schema otherwise
    pub fn load(path: Option<&Path>) -> Result<Self, SchemaError> {
        match path {
            Some(path) => Self::read(path),
            None => Self::builtin(),
        }
    }

    pub fn from_yaml(content: &str) -> Result<Self, SchemaError> {
        let document: SchemaDocument = serde_yaml::from_str(content)?;
        Self::from_document(document)
    }

    fn from_document(document: SchemaDocument) -> Result<Self, SchemaError> {
        let version = semver::Version::parse(document.version.trim())
            .map_err(|_| SchemaError::InvalidVersion(document.version.clone()))?;
        if version.major != SUPPORTED_MAJOR {
            return Err(SchemaError::UnsupportedVersion(version));
        }

        let mut seen = HashSet::new();
        for field in &document.fields {
            if !seen.insert(field.id.as_str()) {
                return Err(SchemaError::DuplicateField(field.id.clone()));
            }
            if !field.dom.has_placeholder() {
                return Err(SchemaError::MissingPlaceholder(field.id.clone()));
            }
            if let (Some(min), Some(max)) = (field.min_length, field.max_length)
                && min > max
            {
                return Err(SchemaError::InvalidLength(field.id.clone()));
            }
        }

        let position = |id: &str| document.fields.iter().position(|f| f.id == id);

        let mut profiles = BTreeMap::new();
        for (name, ids) in &document.profiles {
            if ids.is_empty() {
                return Err(SchemaError::EmptyProfile(name.clone()));
            }
            let indices = ids
                .iter()
                .map(|id| {
                    position(id.as_str()).ok_or_else(|| SchemaError::UnknownProfileField {
                        profile: name.clone(),
                        field: id.clone(),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            for (i, idx) in indices.iter().enumerate() {
                if indices[..i].contains(idx) {
                    return Err(SchemaError::DuplicateProfileField {
                        profile: name.clone(),
                        field: ids[i].clone(),
                    });
                }
            }
            profiles.insert(name.clone(), indices);
        }
        if !profiles.contains_key(DEFAULT_PROFILE) {
            return Err(SchemaError::MissingDefaultProfile);
        }

        let stock_field = match &document.stock_field {
            Some(id) => match position(id.as_str()) {
                Some(idx) if document.fields[idx].kind == FieldType::String => Some(idx),
                _ => return Err(SchemaError::InvalidStockField(id.clone())),
            },
            None => None,
        };

        Ok(Self {
            version,
            fields: document.fields,
            profiles,
            stock_field,
            decimal_separator: document.decimal_separator,
        })
    }

    pub fn version(&self) -> &semver::Version {
        &self.version
    }

    /// Every registered field in declaration order
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Names of the known transaction profiles
    pub fn profiles(&self) -> Vec<&str> {
        self.profiles.keys().map(|s| s.as_str()).collect()
    }

    pub fn has_profile(&self, name: &str) -> bool {
        self.profiles.contains_key(name)
    }

    /// Profile actually used for a transaction type
    pub fn effective_profile<'a>(&'a self, transaction_type: &'a str) -> &'a str {
        if self.has_profile(transaction_type) {
            transaction_type
        } else {
            DEFAULT_PROFILE
        }
    }
}

impl FieldCatalog for SchemaRegistry {
    fn resolve_fields(&self, transaction_type: &str) -> Vec<&FieldSpec> {
        let indices = match self.profiles.get(transaction_type) {
            Some(indices) => indices,
            None => {
                log::warn!(
                    "Unknown transaction type '{}', using '{}' profile",
                    transaction_type,
                    DEFAULT_PROFILE
                );
                &self.profiles[DEFAULT_PROFILE]
            }
        };
        indices.iter().map(|&i| &self.fields[i]).collect()
    }

    fn field(&self, id: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.id == id)
    }

    fn stock_field(&self) -> Option<&FieldSpec> {
        self.stock_field.map(|i| &self.fields[i])
    }
}

impl DomNames for SchemaRegistry {
    fn resolve_dom_name(&self, field_id: &str, row: usize) -> Result<String, SchemaError> {
        self.field(field_id)
            .map(|f| f.dom.render(row))
            .ok_or_else(|| SchemaError::UnknownField(field_id.to_string()))
    }

    fn decimal_separator(&self) -> char {
        self.decimal_separator
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL: &str = r#"
version: 1.2.0
fields:
  - id: a
    type: string
    dom: { base: "x$", suffix: "{row}$a" }
  - id: b
    type: number
    dom: { base: "x$", suffix: "{row}$b" }
  - id: c
    type: boolean
    dom: { base: "x$", suffix: "{row}$c" }
profiles:
  default: [c, a, b]
  narrow: [b]
"#;

    fn ids(fields: Vec<&FieldSpec>) -> Vec<&str> {
        fields.into_iter().map(|f| f.id.as_str()).collect()
    }

    #[test]
    fn test_builtin_schema_loads() {
        let registry = SchemaRegistry::builtin().unwrap();
        assert_eq!(registry.version().major, 1);
        assert!(registry.has_profile("default"));
        assert_eq!(registry.stock_field().unwrap().id, "stock_code");
        assert_eq!(registry.decimal_separator(), ',');
    }

    #[test]
    fn test_every_profile_non_empty() {
        let registry = SchemaRegistry::builtin().unwrap();
        for name in registry.profiles() {
            assert!(!registry.resolve_fields(name).is_empty(), "{name}");
        }
    }

    #[test]
    fn test_profile_order() {
        let registry = SchemaRegistry::from_yaml(SMALL).unwrap();
        assert_eq!(ids(registry.resolve_fields("default")), vec!["c", "a", "b"]);
        assert_eq!(ids(registry.resolve_fields("narrow")), vec!["b"]);
    }

    #[test]
    fn test_unknown_type_falls_back_to_default() {
        let registry = SchemaRegistry::from_yaml(SMALL).unwrap();
        assert_eq!(
            ids(registry.resolve_fields("no-such-type")),
            ids(registry.resolve_fields("default"))
        );
        assert_eq!(registry.effective_profile("no-such-type"), "default");
        assert_eq!(registry.effective_profile("narrow"), "narrow");
    }

    #[test]
    fn test_resolve_dom_name() {
        let registry = SchemaRegistry::from_yaml(SMALL).unwrap();
        assert_eq!(registry.resolve_dom_name("b", 4).unwrap(), "x$4$b");
        assert!(matches!(
            registry.resolve_dom_name("zzz", 1),
            Err(SchemaError::UnknownField(id)) if id == "zzz"
        ));
    }

    #[test]
    fn test_missing_default_profile() {
        let yaml = SMALL.replace("default:", "other:");
        assert!(matches!(
            SchemaRegistry::from_yaml(&yaml),
            Err(SchemaError::MissingDefaultProfile)
        ));
    }

    #[test]
    fn test_unknown_profile_field() {
        let yaml = SMALL.replace("narrow: [b]", "narrow: [b, q]");
        let err = SchemaRegistry::from_yaml(&yaml).unwrap_err();
        assert!(err.to_string().contains("unknown field 'q'"));
    }

    #[test]
    fn test_duplicate_field() {
        let yaml = SMALL.replace("id: b", "id: a");
        assert!(matches!(
            SchemaRegistry::from_yaml(&yaml),
            Err(SchemaError::DuplicateField(_))
        ));
    }

    #[test]
    fn test_profile_lists_field_twice() {
        let yaml = SMALL.replace("narrow: [b]", "narrow: [b, a, b]");
        let err = SchemaRegistry::from_yaml(&yaml).unwrap_err();
        assert!(matches!(
            &err,
            SchemaError::DuplicateProfileField { profile, field } if profile == "narrow" && field == "b"
        ));
        assert_eq!(err.to_string(), "profile 'narrow' lists field 'b' more than once");
    }

    #[test]
    fn test_missing_placeholder() {
        let yaml = SMALL.replace("suffix: \"{row}$b\"", "suffix: \"$b\"");
        assert!(matches!(
            SchemaRegistry::from_yaml(&yaml),
            Err(SchemaError::MissingPlaceholder(id)) if id == "b"
        ));
    }

    #[test]
    fn test_unsupported_version() {
        let yaml = SMALL.replace("version: 1.2.0", "version: 2.0.0");
        assert!(matches!(
            SchemaRegistry::from_yaml(&yaml),
            Err(SchemaError::UnsupportedVersion(_))
        ));
    }

    #[test]
    fn test_stock_field_must_be_string() {
        let yaml = format!("stock_field: b\n{}", SMALL);
        assert!(matches!(
            SchemaRegistry::from_yaml(&yaml),
            Err(SchemaError::InvalidStockField(_))
        ));
    }

    #[test]
    fn test_read_missing_file() {
        let err = SchemaRegistry::read("/nonexistent/schema.yml").unwrap_err();
        assert!(matches!(err, SchemaError::Read { .. }));
    }
}
