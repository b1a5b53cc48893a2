//! SQL Server type mapping between driver values, Rust values and JSON.

use crate::coercion::SqlParam;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::{Number, Value};
use std::fmt;
use tiberius::{ColumnData, Row, ToSql};
use uuid::Uuid;

/// A value read from a result column.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    String(String),
    Bytes(Vec<u8>),
    Decimal(Decimal),
    Uuid(Uuid),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    DateTimeUtc(DateTime<Utc>),
}

impl SqlValue {
    /// Convert to a display string.
    pub fn to_display_string(&self) -> String {
        match self {
            SqlValue::Null => "NULL".to_string(),
            SqlValue::Bool(v) => v.to_string(),
            SqlValue::I8(v) => v.to_string(),
            SqlValue::I16(v) => v.to_string(),
            SqlValue::I32(v) => v.to_string(),
            SqlValue::I64(v) => v.to_string(),
            SqlValue::F32(v) => v.to_string(),
            SqlValue::F64(v) => v.to_string(),
            SqlValue::String(v) => v.clone(),
            SqlValue::Bytes(v) => format!("0x{}", hex::encode(v)),
            SqlValue::Decimal(v) => v.to_string(),
            SqlValue::Uuid(v) => v.to_string(),
            SqlValue::Date(v) => v.to_string(),
            SqlValue::Time(v) => v.to_string(),
            SqlValue::DateTime(v) => v.format("%Y-%m-%dT%H:%M:%S%.f").to_string(),
            SqlValue::DateTimeUtc(v) => v.to_rfc3339(),
        }
    }

    /// Native value to JSON scalar. NULL becomes JSON null.
    pub fn to_json(&self) -> Value {
        match self {
            SqlValue::Null => Value::Null,
            SqlValue::Bool(v) => Value::Bool(*v),
            SqlValue::I8(v) => Value::from(*v),
            SqlValue::I16(v) => Value::from(*v),
            SqlValue::I32(v) => Value::from(*v),
            SqlValue::I64(v) => Value::from(*v),
            SqlValue::F32(v) => float_to_json(f64::from(*v)),
            SqlValue::F64(v) => float_to_json(*v),
            SqlValue::Decimal(v) => decimal_to_json(v),
            SqlValue::String(v) => Value::String(v.clone()),
            _ => Value::String(self.to_display_string()),
        }
    }

    /// Text payload of a single-cell result, if the cell holds anything.
    pub fn into_payload(self) -> Option<String> {
        match self {
            SqlValue::Null => None,
            SqlValue::String(s) => Some(s),
            other => Some(other.to_display_string()),
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_display_string())
    }
}

fn float_to_json(v: f64) -> Value {
    Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null)
}

/// Integral decimals stay integers on the wire; others go through f64.
pub fn decimal_to_json(v: &Decimal) -> Value {
    let normalized = v.normalize();
    if normalized.scale() == 0 {
        if let Some(i) = normalized.to_i64() {
            return Value::from(i);
        }
    }
    v.to_f64().map(float_to_json).unwrap_or(Value::Null)
}

impl From<&SqlParam> for SqlValue {
    fn from(param: &SqlParam) -> Self {
        match param {
            SqlParam::Text(s) => SqlValue::String(s.clone()),
            SqlParam::Int(i) => SqlValue::I32(*i),
            SqlParam::Decimal(d) => SqlValue::Decimal(*d),
            SqlParam::Float(f) => SqlValue::F64(*f),
            SqlParam::Bool(b) => SqlValue::Bool(*b),
            SqlParam::Null => SqlValue::Null,
        }
    }
}

impl ToSql for SqlParam {
    fn to_sql(&self) -> ColumnData<'_> {
        match self {
            SqlParam::Text(s) => s.to_sql(),
            SqlParam::Int(i) => i.to_sql(),
            SqlParam::Decimal(d) => d.to_sql(),
            SqlParam::Float(f) => f.to_sql(),
            SqlParam::Bool(b) => b.to_sql(),
            SqlParam::Null => ColumnData::String(None),
        }
    }
}

/// Type mapper for converting SQL Server column data to [`SqlValue`].
pub struct TypeMapper;

impl TypeMapper {
    /// Extract a value from a Tiberius row column.
    pub fn extract_column(row: &Row, idx: usize) -> SqlValue {
        if row.columns().get(idx).is_none() {
            return SqlValue::Null;
        }

        // Strings (most common)
        if let Some(v) = row.try_get::<&str, _>(idx).ok().flatten() {
            return SqlValue::String(v.to_string());
        }

        // Integers
        if let Some(v) = row.try_get::<i32, _>(idx).ok().flatten() {
            return SqlValue::I32(v);
        }
        if let Some(v) = row.try_get::<i64, _>(idx).ok().flatten() {
            return SqlValue::I64(v);
        }
        if let Some(v) = row.try_get::<i16, _>(idx).ok().flatten() {
            return SqlValue::I16(v);
        }
        // TINYINT is unsigned in tiberius
        if let Some(v) = row.try_get::<u8, _>(idx).ok().flatten() {
            return SqlValue::I16(i16::from(v));
        }

        // Floating point
        if let Some(v) = row.try_get::<f64, _>(idx).ok().flatten() {
            return SqlValue::F64(v);
        }
        if let Some(v) = row.try_get::<f32, _>(idx).ok().flatten() {
            return SqlValue::F32(v);
        }

        if let Some(v) = row.try_get::<Decimal, _>(idx).ok().flatten() {
            return SqlValue::Decimal(v);
        }

        if let Some(v) = row.try_get::<bool, _>(idx).ok().flatten() {
            return SqlValue::Bool(v);
        }

        if let Some(v) = row.try_get::<Uuid, _>(idx).ok().flatten() {
            return SqlValue::Uuid(v);
        }

        // Date/Time types
        if let Some(v) = row.try_get::<DateTime<Utc>, _>(idx).ok().flatten() {
            return SqlValue::DateTimeUtc(v);
        }
        if let Some(v) = row.try_get::<NaiveDateTime, _>(idx).ok().flatten() {
            return SqlValue::DateTime(v);
        }
        if let Some(v) = row.try_get::<NaiveDate, _>(idx).ok().flatten() {
            return SqlValue::Date(v);
        }
        if let Some(v) = row.try_get::<NaiveTime, _>(idx).ok().flatten() {
            return SqlValue::Time(v);
        }

        if let Some(v) = row.try_get::<&tiberius::xml::XmlData, _>(idx).ok().flatten() {
            return SqlValue::String(v.clone().into_string());
        }

        if let Some(v) = row.try_get::<&[u8], _>(idx).ok().flatten() {
            return SqlValue::Bytes(v.to_vec());
        }

        SqlValue::Null
    }
}

/// Hex encoding helper for binary columns.
mod hex {
    pub fn encode(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{:02X}", b)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::str::FromStr;

    #[test]
    fn test_sql_value_display() {
        assert_eq!(SqlValue::Null.to_display_string(), "NULL");
        assert_eq!(SqlValue::I32(42).to_display_string(), "42");
        assert_eq!(
            SqlValue::String("hello".to_string()).to_display_string(),
            "hello"
        );
        assert_eq!(SqlValue::Bool(true).to_display_string(), "true");
    }

    #[test]
    fn test_to_json_scalars() {
        assert_eq!(SqlValue::Null.to_json(), Value::Null);
        assert_eq!(SqlValue::Bool(false).to_json(), json!(false));
        assert_eq!(SqlValue::I64(-7).to_json(), json!(-7));
        assert_eq!(SqlValue::F64(1.5).to_json(), json!(1.5));
        assert_eq!(SqlValue::F64(f64::NAN).to_json(), Value::Null);
        assert_eq!(SqlValue::String("x".into()).to_json(), json!("x"));
        assert_eq!(SqlValue::Bytes(vec![0xDE, 0xAD]).to_json(), json!("0xDEAD"));
    }

    #[test]
    fn test_decimal_to_json() {
        let whole = Decimal::from_str("3.00").unwrap();
        assert_eq!(decimal_to_json(&whole), json!(3));

        let fraction = Decimal::from_str("12.25").unwrap();
        assert_eq!(decimal_to_json(&fraction), json!(12.25));
    }

    #[test]
    fn test_payload_text() {
        assert_eq!(SqlValue::Null.into_payload(), None);
        assert_eq!(
            SqlValue::String("{}".into()).into_payload(),
            Some("{}".to_string())
        );
        assert_eq!(SqlValue::I32(5).into_payload(), Some("5".to_string()));
    }

    #[test]
    fn test_param_to_value() {
        assert_eq!(SqlValue::from(&SqlParam::Null), SqlValue::Null);
        assert_eq!(SqlValue::from(&SqlParam::Int(4)), SqlValue::I32(4));
        assert_eq!(
            SqlValue::from(&SqlParam::Text("a".into())),
            SqlValue::String("a".into())
        );
    }

    #[test]
    fn test_hex_encode() {
        assert_eq!(hex::encode(&[0xDE, 0xAD, 0xBE, 0xEF]), "DEADBEEF");
        assert_eq!(hex::encode(&[]), "");
    }
}
