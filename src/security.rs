//! Identifier validation and query cleanup.

mod identifiers;
mod sanitizer;

pub use identifiers::{
    escape_identifier, safe_identifier, validate_identifier, validate_parameter_name,
    QualifiedName, MAX_IDENTIFIER_LENGTH,
};
pub use sanitizer::sanitize_query;
