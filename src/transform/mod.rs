//! Transformers turning raw model items into clean, typed row records
//!
//! [`Normalizer`] coerces values to their declared types, [`Sanitizer`]
//! removes noise and enforces length limits. They are usually chained:
//! `Normalizer::new(..).then(Sanitizer::new(..))`.

mod normalizer;
mod sanitizer;

pub use normalizer::{
    Normalizer, coerce_value, collapse_whitespace, normalize_bool, normalize_number,
    normalize_text, normalize_value, parse_decimal,
};
pub use sanitizer::{Sanitizer, clamp_chars, is_noise, sanitize_text, squeeze_runs};
