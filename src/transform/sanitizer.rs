//! Sanitizer transformer
//!
//! Cleans string values after normalization: blanks noise the model copied
//! from placeholders (dashes, dots, underscores), squeezes long character
//! runs, and enforces the per-field length limits.

use crate::etl::Transformer;
use crate::extraction::DEFAULT_MAX_LENGTH;
use crate::record::{FieldValue, RowRecord};
use crate::schema::{FieldCatalog, FieldSpec, SchemaRegistry};
use eyre::Result;
use std::sync::Arc;

/// A run this long of one character marks the whole value as noise
const NOISE_RUN: usize = 10;
/// Values at least this long are checked for a dominant character
const DOMINANCE_MIN_LEN: usize = 20;
/// Share of the dominant character that marks the value as noise
const DOMINANCE_RATIO: f64 = 0.8;
/// Runs this long are squeezed down to [`SQUEEZED_RUN`]
const SQUEEZE_FROM: usize = 5;
const SQUEEZED_RUN: usize = 3;

fn longest_run(chars: &[char]) -> usize {
    let mut longest = 0;
    let mut current = 0;
    let mut previous = None;
    for &c in chars {
        current = if previous == Some(c) { current + 1 } else { 1 };
        previous = Some(c);
        longest = longest.max(current);
    }
    longest
}

fn dominant_share(chars: &[char]) -> f64 {
    let mut counts = std::collections::HashMap::new();
    for &c in chars {
        *counts.entry(c).or_insert(0usize) += 1;
    }
    let top = counts.values().copied().max().unwrap_or(0);
    top as f64 / chars.len() as f64
}

/// True for placeholder-like strings that carry no information
pub fn is_noise(value: &str) -> bool {
    let chars: Vec<char> = value.chars().collect();
    if chars.is_empty() {
        return false;
    }
    longest_run(&chars) >= NOISE_RUN
        || (chars.len() >= DOMINANCE_MIN_LEN && dominant_share(&chars) >= DOMINANCE_RATIO)
}

/// Squeeze every run of 5 or more identical characters down to 3
pub fn squeeze_runs(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    let mut out = String::with_capacity(value.len());
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        let mut end = i;
        while end < chars.len() && chars[end] == c {
            end += 1;
        }
        let run = end - i;
        let keep = if run >= SQUEEZE_FROM { SQUEEZED_RUN } else { run };
        out.extend(std::iter::repeat_n(c, keep));
        i = end;
    }
    out
}

/// Cut to at most `max` characters
pub fn clamp_chars(value: &str, max: usize) -> String {
    value.chars().take(max).collect::<String>().trim_end().to_string()
}

/// Full string cleanup for one field
pub fn sanitize_text(field: Option<&FieldSpec>, value: &str) -> String {
    let value = value.trim();
    if is_noise(value) {
        log::debug!("Blanking noise value {:?}", value);
        return String::new();
    }

    let max = field
        .and_then(|f| f.max_length)
        .unwrap_or(DEFAULT_MAX_LENGTH);
    let cleaned = clamp_chars(&squeeze_runs(value), max);

    match field.and_then(|f| f.min_length) {
        Some(min) if !cleaned.is_empty() && cleaned.chars().count() < min => String::new(),
        _ => cleaned,
    }
}

/// Transformer that sanitizes every text value of a record
pub struct Sanitizer {
    registry: Arc<SchemaRegistry>,
}

impl Sanitizer {
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        Self { registry }
    }
}

impl Transformer for Sanitizer {
    type Input = RowRecord;
    type Output = RowRecord;

    fn transform(&self, mut input: Self::Input) -> Result<Self::Output> {
        for (id, value) in input.iter_mut() {
            if let FieldValue::Text(text) = value {
                *text = sanitize_text(self.registry.field(id), text);
            }
        }
        Ok(input)
    }
}
