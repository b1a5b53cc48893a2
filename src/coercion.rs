//! Value coercion between JSON and backend parameters.
//!
//! Inbound, every JSON value maps to exactly one [`SqlParam`]:
//!
//! | JSON            | Parameter                         |
//! |-----------------|-----------------------------------|
//! | string          | `Text`                            |
//! | number          | `Decimal` (`Float` if out of range) |
//! | boolean         | `Bool`                            |
//! | null            | `Null` (explicit absence)         |
//! | array / object  | `Text` holding the JSON text      |
//!
//! Query-string text has no JSON typing, so it goes through an ordered trial
//! instead: integer, then decimal, then boolean, then text.
//!
//! Outbound, a single JSON text cell is parsed back into a value, with an
//! absent or empty cell becoming `{}`.

use crate::database::SqlValue;
use crate::error::ServerError;
use crate::security::validate_parameter_name;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use serde_json::{json, Map, Number, Value};
use std::fmt;
use std::str::FromStr;

/// Magnitude beyond which a JSON number cannot be a DECIMAL.
const DECIMAL_LIMIT: f64 = 7.9e28;

/// Plain decimal text: optional sign, digits, at most one point.
static DECIMAL_TEXT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([+-]?)([0-9]*)(?:\.([0-9]*))?$")
        .unwrap_or_else(|e| panic!("invalid decimal pattern: {}", e))
});

/// A backend-typed parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Text(String),
    Int(i32),
    Decimal(Decimal),
    Float(f64),
    Bool(bool),
    /// Explicit absence of a value (SQL NULL), never a default.
    Null,
}

impl SqlParam {
    /// Coerce one JSON value.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::String(s) => SqlParam::Text(s.clone()),
            Value::Number(n) => number_param(n),
            Value::Bool(b) => SqlParam::Bool(*b),
            Value::Null => SqlParam::Null,
            Value::Array(_) | Value::Object(_) => SqlParam::Text(value.to_string()),
        }
    }

    /// Coerce one query-string value by ordered trial.
    ///
    /// `"42"` is an integer, `"4.2"` a decimal, `"TRUE"` a boolean, and
    /// anything else text. An empty value is NULL.
    pub fn from_query_text(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return SqlParam::Null;
        }
        if let Ok(i) = trimmed.parse::<i32>() {
            return SqlParam::Int(i);
        }
        if let Some(d) = parse_plain_decimal(trimmed) {
            return SqlParam::Decimal(d);
        }
        if trimmed.eq_ignore_ascii_case("true") {
            return SqlParam::Bool(true);
        }
        if trimmed.eq_ignore_ascii_case("false") {
            return SqlParam::Bool(false);
        }
        SqlParam::Text(raw.to_string())
    }
}

/// Parse `"12"`, `"-4.25"`, `".5"` or `"5."`; digit separators, exponents
/// and radix prefixes are not decimals.
fn parse_plain_decimal(text: &str) -> Option<Decimal> {
    let caps = DECIMAL_TEXT.captures(text)?;
    let sign = caps.get(1).map_or("", |m| m.as_str());
    let whole = caps.get(2).map_or("", |m| m.as_str());
    let fraction = caps.get(3).map_or("", |m| m.as_str());
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }

    let whole = if whole.is_empty() { "0" } else { whole };
    let normalized = if fraction.is_empty() {
        format!("{}{}", sign, whole)
    } else {
        format!("{}{}.{}", sign, whole, fraction)
    };
    Decimal::from_str(&normalized).ok()
}

fn number_param(n: &Number) -> SqlParam {
    let float = n.as_f64().unwrap_or_default();
    if float.abs() >= DECIMAL_LIMIT {
        return SqlParam::Float(float);
    }
    let text = n.to_string();
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map(SqlParam::Decimal)
        .unwrap_or(SqlParam::Float(float))
}

impl fmt::Display for SqlParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlParam::Text(s) => write!(f, "'{}'", s),
            other => write!(f, "{}", SqlValue::from(other)),
        }
    }
}

/// One named argument.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedParam {
    /// Argument name without the leading `@`.
    pub name: String,
    pub value: SqlParam,
}

/// The coerced arguments of one call, in caller order.
///
/// Built per call and dropped after the backend call returns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolArguments(Vec<NamedParam>);

impl ToolArguments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Coerce a JSON object of arguments.
    pub fn from_json(map: &Map<String, Value>) -> Result<Self, ServerError> {
        let mut args = Self::new();
        args.merge_json(map)?;
        Ok(args)
    }

    /// Coerce an optional `arguments` member: absent or null is empty,
    /// anything other than an object is rejected.
    pub fn from_optional(value: Option<&Value>) -> Result<Self, ServerError> {
        match value {
            None | Some(Value::Null) => Ok(Self::new()),
            Some(Value::Object(map)) => Self::from_json(map),
            Some(_) => Err(ServerError::invalid_input(
                "'arguments' must be an object of name/value pairs",
            )),
        }
    }

    /// Coerce query-string pairs. A repeated name keeps its first value.
    pub fn from_query_pairs<I, K, V>(pairs: I) -> Result<Self, ServerError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut args = Self::new();
        for (name, raw) in pairs {
            let name = validate_parameter_name(name.as_ref())?;
            if args.get(name).is_none() {
                args.0.push(NamedParam {
                    name: name.to_string(),
                    value: SqlParam::from_query_text(raw.as_ref()),
                });
            }
        }
        Ok(args)
    }

    /// Merge a JSON object in; its values replace same-named arguments.
    pub fn merge_json(&mut self, map: &Map<String, Value>) -> Result<(), ServerError> {
        for (name, value) in map {
            let name = validate_parameter_name(name)?;
            self.set(name, SqlParam::from_json(value));
        }
        Ok(())
    }

    /// Insert or replace an argument.
    pub fn set(&mut self, name: &str, value: SqlParam) {
        match self.0.iter_mut().find(|p| p.name.eq_ignore_ascii_case(name)) {
            Some(existing) => existing.value = value,
            None => self.0.push(NamedParam {
                name: name.to_string(),
                value,
            }),
        }
    }

    /// Look up an argument. Names compare case-insensitively, as in T-SQL.
    pub fn get(&self, name: &str) -> Option<&SqlParam> {
        self.0
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .map(|p| &p.value)
    }

    /// The text value of an argument, if it is text.
    pub fn text(&self, name: &str) -> Option<&str> {
        match self.get(name) {
            Some(SqlParam::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &NamedParam> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ToolArguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, param) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "@{}={}", param.name, param.value)?;
        }
        Ok(())
    }
}

/// Parse the JSON text a tool returned.
///
/// An absent or blank cell is `{}`; text that is not JSON is an upstream error.
pub fn decode_json_payload(cell: Option<String>) -> Result<Value, ServerError> {
    match cell {
        None => Ok(json!({})),
        Some(text) if text.trim().is_empty() => Ok(json!({})),
        Some(text) => serde_json::from_str(&text)
            .map_err(|e| ServerError::malformed(format!("backend returned invalid JSON: {}", e))),
    }
}

/// Like [`decode_json_payload`], but text that is not JSON is wrapped as
/// `{"result": text}` instead of failing.
pub fn decode_lenient_payload(cell: Option<String>) -> Value {
    match cell {
        None => json!({}),
        Some(text) if text.trim().is_empty() => json!({}),
        Some(text) => serde_json::from_str(&text).unwrap_or_else(|_| json!({ "result": text })),
    }
}
