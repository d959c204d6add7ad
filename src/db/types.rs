//! Row decoding into JSON.
//!
//! Type conversion uses a two-phase approach:
//! 1. `TypeCategory` classifies column types into logical categories
//! 2. Driver-specific decoders handle the actual value extraction
//!
//! SQLite columns computed from expressions carry no declared type, so the
//! SQLite decoder falls back to the storage class of each value.

use crate::models::{DatabaseType, JsonRow};
use serde_json::Value as JsonValue;
use sqlx::postgres::{PgRow, PgTypeInfo, PgValueRef};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Decode, Row, Type, TypeInfo, ValueRef};

/// Logical category for database column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    Decimal,
    Boolean,
    Text,
    Binary,
    Json,
    Uuid,
    Unknown,
}

/// Classify a database type name into a logical category.
pub fn categorize_type(type_name: &str, db: DatabaseType) -> TypeCategory {
    let lower = type_name.to_lowercase();

    // Checked first; "numeric" would otherwise fall through to the float test
    if lower.contains("decimal") || lower.contains("numeric") {
        if db == DatabaseType::SQLite {
            return TypeCategory::Float;
        }
        return TypeCategory::Decimal;
    }

    if lower.contains("int") || lower.contains("serial") {
        return TypeCategory::Integer;
    }

    if lower == "bool" || lower == "boolean" {
        return TypeCategory::Boolean;
    }

    if lower.contains("float") || lower.contains("double") || lower == "real" {
        return TypeCategory::Float;
    }

    if lower == "json" || lower == "jsonb" {
        return TypeCategory::Json;
    }

    if lower == "uuid" {
        return TypeCategory::Uuid;
    }

    if lower.contains("blob") || lower == "bytea" {
        return TypeCategory::Binary;
    }

    if lower.contains("char") || lower == "text" || lower == "name" {
        return TypeCategory::Text;
    }

    TypeCategory::Unknown
}

/// Wrapper type for raw NUMERIC values as strings, preserving precision.
#[derive(Debug)]
pub struct RawDecimal(pub String);

impl Type<sqlx::Postgres> for RawDecimal {
    fn type_info() -> PgTypeInfo {
        <String as Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("numeric") || name.contains("decimal")
    }
}

impl<'r> Decode<'r, sqlx::Postgres> for RawDecimal {
    fn decode(value: PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        // Unparameterized statements use the simple protocol, so NUMERIC is text
        let s = <&str as Decode<sqlx::Postgres>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

/// Decode binary data to a JSON string.
///
/// With `decode_binary`, valid UTF-8 is returned as text; everything else is
/// base64.
pub fn decode_binary_value(bytes: &[u8], decode_binary: bool) -> JsonValue {
    use base64::{Engine as _, engine::general_purpose::STANDARD};

    if decode_binary {
        if let Ok(s) = std::str::from_utf8(bytes) {
            return JsonValue::String(s.to_string());
        }
    }
    JsonValue::String(STANDARD.encode(bytes))
}

/// Convert driver rows to JSON maps.
pub trait RowToJson {
    fn to_json_map(&self, decode_binary: bool) -> JsonRow;
    fn column_names(&self) -> Vec<String>;
}

impl RowToJson for PgRow {
    fn to_json_map(&self, decode_binary: bool) -> JsonRow {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let category = categorize_type(col.type_info().name(), DatabaseType::PostgreSQL);
                let value = postgres::decode_column(self, idx, category, decode_binary);
                (col.name().to_string(), value)
            })
            .collect()
    }

    fn column_names(&self) -> Vec<String> {
        self.columns().iter().map(|c| c.name().to_string()).collect()
    }
}

impl RowToJson for SqliteRow {
    fn to_json_map(&self, decode_binary: bool) -> JsonRow {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let type_name = col.type_info().name();
                let category = categorize_type(type_name, DatabaseType::SQLite);
                let value = sqlite::decode_column(self, idx, type_name, category, decode_binary);
                (col.name().to_string(), value)
            })
            .collect()
    }

    fn column_names(&self) -> Vec<String> {
        self.columns().iter().map(|c| c.name().to_string()).collect()
    }
}

mod postgres {
    use super::*;

    pub fn decode_column(
        row: &PgRow,
        idx: usize,
        category: TypeCategory,
        decode_binary: bool,
    ) -> JsonValue {
        match category {
            TypeCategory::Decimal => decode_decimal(row, idx),
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::Boolean => decode_boolean(row, idx),
            TypeCategory::Float => decode_float(row, idx),
            TypeCategory::Binary => decode_binary_col(row, idx, decode_binary),
            TypeCategory::Json => decode_json(row, idx),
            TypeCategory::Uuid => decode_uuid(row, idx),
            TypeCategory::Text | TypeCategory::Unknown => decode_text(row, idx),
        }
    }

    fn decode_decimal(row: &PgRow, idx: usize) -> JsonValue {
        match row.try_get::<Option<RawDecimal>, _>(idx) {
            Ok(Some(v)) => JsonValue::String(v.0),
            Ok(None) => JsonValue::Null,
            Err(e) => {
                tracing::error!(error = ?e, "Failed to decode NUMERIC");
                JsonValue::Null
            }
        }
    }

    fn decode_integer(row: &PgRow, idx: usize) -> JsonValue {
        if let Ok(Some(v)) = row.try_get::<Option<i16>, _>(idx) {
            return JsonValue::Number(v.into());
        }
        if let Ok(Some(v)) = row.try_get::<Option<i32>, _>(idx) {
            return JsonValue::Number(v.into());
        }
        if let Ok(Some(v)) = row.try_get::<Option<i64>, _>(idx) {
            return JsonValue::Number(v.into());
        }
        JsonValue::Null
    }

    fn decode_boolean(row: &PgRow, idx: usize) -> JsonValue {
        row.try_get::<Option<bool>, _>(idx)
            .ok()
            .flatten()
            .map(JsonValue::Bool)
            .unwrap_or(JsonValue::Null)
    }

    fn decode_float(row: &PgRow, idx: usize) -> JsonValue {
        if let Ok(Some(v)) = row.try_get::<Option<f64>, _>(idx) {
            return float_value(v);
        }
        if let Ok(Some(v)) = row.try_get::<Option<f32>, _>(idx) {
            return float_value(v as f64);
        }
        JsonValue::Null
    }

    fn decode_binary_col(row: &PgRow, idx: usize, decode_binary: bool) -> JsonValue {
        row.try_get::<Option<Vec<u8>>, _>(idx)
            .ok()
            .flatten()
            .map(|v| decode_binary_value(&v, decode_binary))
            .unwrap_or(JsonValue::Null)
    }

    fn decode_json(row: &PgRow, idx: usize) -> JsonValue {
        row.try_get::<Option<JsonValue>, _>(idx)
            .ok()
            .flatten()
            .unwrap_or(JsonValue::Null)
    }

    fn decode_uuid(row: &PgRow, idx: usize) -> JsonValue {
        row.try_get::<Option<sqlx::types::Uuid>, _>(idx)
            .ok()
            .flatten()
            .map(|u| JsonValue::String(u.to_string()))
            .unwrap_or(JsonValue::Null)
    }

    fn decode_text(row: &PgRow, idx: usize) -> JsonValue {
        if let Ok(v) = row.try_get::<Option<String>, _>(idx) {
            return v.map(JsonValue::String).unwrap_or(JsonValue::Null);
        }
        // Dates and timestamps are not text on the wire
        if let Ok(Some(v)) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(idx) {
            return JsonValue::String(v.to_rfc3339());
        }
        if let Ok(Some(v)) = row.try_get::<Option<chrono::NaiveDateTime>, _>(idx) {
            return JsonValue::String(v.to_string());
        }
        if let Ok(Some(v)) = row.try_get::<Option<chrono::NaiveDate>, _>(idx) {
            return JsonValue::String(v.to_string());
        }
        if let Ok(Some(v)) = row.try_get::<Option<chrono::NaiveTime>, _>(idx) {
            return JsonValue::String(v.to_string());
        }
        JsonValue::Null
    }
}

mod sqlite {
    use super::*;

    pub fn decode_column(
        row: &SqliteRow,
        idx: usize,
        type_name: &str,
        category: TypeCategory,
        decode_binary: bool,
    ) -> JsonValue {
        let category = match category {
            TypeCategory::Unknown | TypeCategory::Text => storage_class(row, idx).unwrap_or(category),
            other => other,
        };
        match category {
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::Boolean => decode_boolean(row, idx),
            TypeCategory::Float | TypeCategory::Decimal => decode_float(row, idx),
            TypeCategory::Binary => decode_binary_col(row, idx, decode_binary),
            _ => decode_text(row, idx, type_name),
        }
    }

    /// Category from the value's runtime storage class.
    fn storage_class(row: &SqliteRow, idx: usize) -> Option<TypeCategory> {
        let raw = row.try_get_raw(idx).ok()?;
        if raw.is_null() {
            return None;
        }
        let category = match raw.type_info().name() {
            "INTEGER" => TypeCategory::Integer,
            "REAL" => TypeCategory::Float,
            "BLOB" => TypeCategory::Binary,
            _ => TypeCategory::Text,
        };
        Some(category)
    }

    fn decode_integer(row: &SqliteRow, idx: usize) -> JsonValue {
        row.try_get::<Option<i64>, _>(idx)
            .ok()
            .flatten()
            .map(|v| JsonValue::Number(v.into()))
            .unwrap_or(JsonValue::Null)
    }

    fn decode_boolean(row: &SqliteRow, idx: usize) -> JsonValue {
        row.try_get::<Option<bool>, _>(idx)
            .ok()
            .flatten()
            .map(JsonValue::Bool)
            .unwrap_or(JsonValue::Null)
    }

    fn decode_float(row: &SqliteRow, idx: usize) -> JsonValue {
        row.try_get::<Option<f64>, _>(idx)
            .ok()
            .flatten()
            .map(float_value)
            .unwrap_or(JsonValue::Null)
    }

    fn decode_binary_col(row: &SqliteRow, idx: usize, decode_binary: bool) -> JsonValue {
        row.try_get::<Option<Vec<u8>>, _>(idx)
            .ok()
            .flatten()
            .map(|v| decode_binary_value(&v, decode_binary))
            .unwrap_or(JsonValue::Null)
    }

    fn decode_text(row: &SqliteRow, idx: usize, type_name: &str) -> JsonValue {
        let Ok(Some(v)) = row.try_get::<Option<String>, _>(idx) else {
            return JsonValue::Null;
        };
        if type_name.to_lowercase().contains("json") {
            if let Ok(json) = serde_json::from_str::<JsonValue>(&v) {
                return json;
            }
        }
        JsonValue::String(v)
    }
}

/// Non-finite floats have no JSON number form; keep them as strings.
fn float_value(v: f64) -> JsonValue {
    serde_json::Number::from_f64(v)
        .map(JsonValue::Number)
        .unwrap_or_else(|| JsonValue::String(v.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categorize_type_integer() {
        assert_eq!(
            categorize_type("INT8", DatabaseType::PostgreSQL),
            TypeCategory::Integer
        );
        assert_eq!(
            categorize_type("BIGSERIAL", DatabaseType::PostgreSQL),
            TypeCategory::Integer
        );
        assert_eq!(
            categorize_type("INTEGER", DatabaseType::SQLite),
            TypeCategory::Integer
        );
    }

    #[test]
    fn test_categorize_type_decimal() {
        assert_eq!(
            categorize_type("NUMERIC", DatabaseType::PostgreSQL),
            TypeCategory::Decimal
        );
        assert_eq!(
            categorize_type("numeric", DatabaseType::SQLite),
            TypeCategory::Float
        );
    }

    #[test]
    fn test_categorize_type_other() {
        assert_eq!(
            categorize_type("jsonb", DatabaseType::PostgreSQL),
            TypeCategory::Json
        );
        assert_eq!(
            categorize_type("VARCHAR", DatabaseType::PostgreSQL),
            TypeCategory::Text
        );
        assert_eq!(
            categorize_type("TIMESTAMPTZ", DatabaseType::PostgreSQL),
            TypeCategory::Unknown
        );
        assert_eq!(
            categorize_type("NULL", DatabaseType::SQLite),
            TypeCategory::Unknown
        );
    }

    #[test]
    fn test_decode_binary_value() {
        assert_eq!(
            decode_binary_value(b"hello world", true),
            JsonValue::String("hello world".to_string())
        );
        assert_eq!(
            decode_binary_value(b"hello world", false),
            JsonValue::String("aGVsbG8gd29ybGQ=".to_string())
        );
        assert_eq!(
            decode_binary_value(&[0xFF, 0xFE, 0x00, 0x01], true),
            JsonValue::String("//4AAQ==".to_string())
        );
    }

    #[test]
    fn test_float_value_non_finite() {
        assert_eq!(float_value(f64::NAN), JsonValue::String("NaN".to_string()));
        assert_eq!(float_value(1.5), serde_json::json!(1.5));
    }
}
