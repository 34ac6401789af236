//! Dynamic attribute values.
//!
//! Layers are loaded with their full attribute rows, so cell values must
//! cover every SQLite storage class. [`Value`] is the in-memory form; it
//! converts losslessly to and from rusqlite's value types on read and write.

use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};

/// A single attribute cell, mirroring the SQLite storage classes.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    /// The textual content, when the value is TEXT.
    ///
    /// Foreign-key grouping and `globalid` lookup operate on TEXT values
    /// only; NULL and non-text values can never match a `globalid`.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The SQLite column declaration type for this value, or `None` for NULL.
    pub fn decl_type(&self) -> Option<&'static str> {
        match self {
            Value::Null => None,
            Value::Integer(_) => Some("INTEGER"),
            Value::Real(_) => Some("REAL"),
            Value::Text(_) => Some("TEXT"),
            Value::Blob(_) => Some("BLOB"),
        }
    }
}

/// Infer a column declaration type from the column's values.
///
/// The first non-null value decides; an all-null column falls back to TEXT.
pub fn infer_decl_type<'a>(values: impl Iterator<Item = &'a Value>) -> &'static str {
    for v in values {
        if let Some(t) = v.decl_type() {
            return t;
        }
    }
    "TEXT"
}

impl From<ValueRef<'_>> for Value {
    fn from(v: ValueRef<'_>) -> Self {
        match v {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::Integer(i),
            ValueRef::Real(f) => Value::Real(f),
            ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => Value::Blob(b.to_vec()),
        }
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            Value::Integer(i) => ToSqlOutput::Borrowed(ValueRef::Integer(*i)),
            Value::Real(f) => ToSqlOutput::Borrowed(ValueRef::Real(*f)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Real(f)
    }
}
