//! Extraction prompt generated from the schema registry

use crate::schema::{FieldCatalog, FieldSpec, FieldType};
use std::fmt::Write;

/// Default cap for string fields without an explicit `max_length`
pub const DEFAULT_MAX_LENGTH: usize = 120;

fn describe(field: &FieldSpec) -> String {
    let mut line = format!("- \"{}\" ({})", field.id, field.kind);
    if !field.description.is_empty() {
        let _ = write!(line, ": {}", field.description);
    }
    if field.kind == FieldType::String {
        let max = field.max_length.unwrap_or(DEFAULT_MAX_LENGTH);
        let _ = write!(line, " [max {} characters]", max);
    }
    if let Some(width) = field.pad {
        let _ = write!(line, " [{} digits, zero padded]", width);
    }
    if field.is_calculated() {
        line.push_str(" [copy as printed, do not compute]");
    }
    line
}

/// Build the instruction text sent with every image
pub fn build_prompt(catalog: &impl FieldCatalog, transaction_type: &str) -> String {
    let fields = catalog.resolve_fields(transaction_type);
    let mut prompt = String::new();

    prompt.push_str(
        "You are reading one page of a commercial document (invoice, delivery note or \
         stock voucher). Extract every product line item on this page.\n\n",
    );
    prompt.push_str("Each line item is a JSON object with exactly these keys:\n");
    for field in &fields {
        prompt.push_str(&describe(field));
        prompt.push('\n');
    }

    prompt.push_str(
        "\nRules:\n\
         - Answer with a single raw JSON array of objects and nothing else. No prose, no \
         markdown, no code fences.\n\
         - Use only the keys listed above. Omit keys you cannot read, or set them to null.\n\
         - Numbers: plain JSON numbers without currency symbols, units or thousands \
         separators.\n\
         - Booleans: true or false.\n\
         - Skip headers, subtotals, totals, tax summaries and empty table rows.\n\
         - Placeholder text such as dashes, underscores, dots or repeated characters \
         means the value is missing: use null instead of copying it.\n\
         - Never exceed the character limits given above.\n\
         - If the page has no line items, answer with [].\n",
    );

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaRegistry;

    #[test]
    fn test_prompt_lists_only_active_fields() {
        let registry = SchemaRegistry::builtin().unwrap();
        let prompt = build_prompt(&registry, "sales");

        assert!(prompt.contains("\"free_of_charge\" (boolean)"));
        assert!(prompt.contains("\"quantity\" (number)"));
        assert!(!prompt.contains("\"lot_number\""));
        assert!(!prompt.contains("\"expiry_day\""));
    }

    #[test]
    fn test_prompt_states_limits_and_format() {
        let registry = SchemaRegistry::builtin().unwrap();
        let prompt = build_prompt(&registry, "purchase");

        assert!(prompt.contains("\"stock_code\" (string)"));
        assert!(prompt.contains("[max 30 characters]"));
        assert!(prompt.contains("\"expiry_year\" (string)"));
        assert!(prompt.contains("[4 digits, zero padded]"));
        assert!(prompt.contains("single raw JSON array"));
        assert!(prompt.contains("no code fences"));
    }

    #[test]
    fn test_unknown_type_uses_default_fields() {
        let registry = SchemaRegistry::builtin().unwrap();
        assert_eq!(
            build_prompt(&registry, "mystery"),
            build_prompt(&registry, "default")
        );
    }
}
