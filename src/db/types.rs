//! Statement result types.
//!
//! Defines the structures used to carry values and result sets from a
//! driver session back to the cursor.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Result of sending one SQL text to a session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatementResult {
    /// Column metadata of the result set (empty when none was produced).
    pub columns: Vec<ColumnInfo>,

    /// Rows of the result set of the last statement in the text.
    pub rows: Vec<Row>,

    /// Rows affected by every statement in the text.
    pub rows_affected: u64,

    /// Whether the last statement produced a result set.
    pub returns_rows: bool,

    /// Command status tag, e.g. `SELECT 3` or `INSERT 0 1`.
    pub status: String,
}

impl StatementResult {
    /// Creates a result set with the given columns and rows.
    pub fn with_rows(columns: Vec<ColumnInfo>, rows: Vec<Row>) -> Self {
        let status = format!("SELECT {}", rows.len());
        Self {
            columns,
            rows,
            rows_affected: 0,
            returns_rows: true,
            status,
        }
    }

    /// Creates a result for a statement that produced no result set.
    pub fn command(status: impl Into<String>, rows_affected: u64) -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
            rows_affected,
            returns_rows: false,
            status: status.into(),
        }
    }

    /// Returns true if no rows were produced.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Metadata about a column in a result set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    /// Column name.
    pub name: String,

    /// Column data type.
    pub data_type: String,
}

impl ColumnInfo {
    /// Creates a new column info with the given name and type.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }
}

/// A row of data in result-column order.
pub type Row = Vec<Value>;

/// Represents a single value sent to or read from the database.
///
/// Serialized untagged so rows map naturally onto JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Value {
    /// NULL value.
    #[default]
    Null,

    /// Boolean value.
    Bool(bool),

    /// Signed integer (up to i64).
    Int(i64),

    /// Floating point number.
    Float(f64),

    /// Text/string value.
    String(String),

    /// Binary data.
    Bytes(Vec<u8>),
}

impl Value {
    /// Returns true if this value is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the string payload, if this is a text value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Attempts to convert the value to a string representation.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::String(s) => s.clone(),
            Value::Bytes(b) => format!("<{} bytes>", b.len()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_display_string())
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => Value::Null,
        }
    }
}
