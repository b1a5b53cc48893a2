//! SQL Server identifier escaping utilities.
//!
//! Tool names, resource names and argument names arrive from callers and end
//! up inside generated call text. They are validated first and then wrapped
//! in SQL Server's bracket notation `[identifier]`.

use crate::error::ServerError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

/// Maximum length for SQL Server identifiers.
pub const MAX_IDENTIFIER_LENGTH: usize = 128;

static PARAMETER_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[\p{L}_][\p{L}\p{N}_#$]*$")
        .unwrap_or_else(|e| panic!("invalid parameter name pattern: {}", e))
});

/// Escape a single SQL Server identifier using bracket notation.
///
/// ```
/// use mssql_tool_gateway::security::escape_identifier;
///
/// assert_eq!(escape_identifier("Users").unwrap(), "[Users]");
/// assert_eq!(escape_identifier("My Table").unwrap(), "[My Table]");
/// assert_eq!(escape_identifier("odd]name").unwrap(), "[odd]]name]");
/// ```
pub fn escape_identifier(identifier: &str) -> Result<String, ServerError> {
    let trimmed = identifier.trim();

    if trimmed.is_empty() {
        return Err(ServerError::invalid_input("Identifier cannot be empty"));
    }

    if trimmed.len() > MAX_IDENTIFIER_LENGTH {
        return Err(ServerError::invalid_input(format!(
            "Identifier exceeds maximum length of {} characters",
            MAX_IDENTIFIER_LENGTH
        )));
    }

    // Escape any embedded right brackets by doubling them
    Ok(format!("[{}]", trimmed.replace(']', "]]")))
}

/// Validate that an identifier contains no dangerous character sequences.
pub fn validate_identifier(identifier: &str) -> Result<(), ServerError> {
    if identifier.trim().is_empty() {
        return Err(ServerError::invalid_input("Identifier cannot be empty"));
    }

    if identifier.len() > MAX_IDENTIFIER_LENGTH {
        return Err(ServerError::invalid_input(format!(
            "Identifier exceeds maximum length of {} characters",
            MAX_IDENTIFIER_LENGTH
        )));
    }

    let dangerous_patterns = [
        "--",   // SQL comment
        "/*",   // Multi-line comment start
        "*/",   // Multi-line comment end
        ";",    // Statement separator
        "'",    // String delimiter
        "\"",   // Quoted identifier delimiter
        "\\",   // Escape character
        "\x00", // Null byte
    ];

    for pattern in &dangerous_patterns {
        if identifier.contains(pattern) {
            return Err(ServerError::invalid_input(format!(
                "Identifier contains forbidden character sequence: {}",
                pattern
            )));
        }
    }

    Ok(())
}

/// Validate and escape an identifier for safe use in SQL.
pub fn safe_identifier(identifier: &str) -> Result<String, ServerError> {
    validate_identifier(identifier)?;
    escape_identifier(identifier)
}

/// Validate an argument name and return it without any leading `@`.
///
/// Argument names are spliced into call text as `@name`, so they must be
/// plain identifiers.
pub fn validate_parameter_name(name: &str) -> Result<&str, ServerError> {
    let bare = name.strip_prefix('@').unwrap_or(name);

    if bare.is_empty() || bare.len() > MAX_IDENTIFIER_LENGTH - 1 {
        return Err(ServerError::invalid_input(format!(
            "Invalid argument name '{}'",
            name
        )));
    }

    if !PARAMETER_NAME.is_match(bare) {
        return Err(ServerError::invalid_input(format!(
            "Invalid argument name '{}': use letters, digits and underscores",
            name
        )));
    }

    Ok(bare)
}

/// A validated two-part object name, rendered as `[schema].[name]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualifiedName {
    schema: String,
    name: String,
}

impl QualifiedName {
    pub fn new(schema: &str, name: &str) -> Result<Self, ServerError> {
        Ok(Self {
            schema: safe_identifier(schema)?,
            name: safe_identifier(name)?,
        })
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}
