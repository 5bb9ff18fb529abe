//! Row shapes returned by fetch.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::db::{ColumnInfo, Row, Value};
use crate::error::{HandlerError, Result};

/// Column name to value mapping for one row.
pub type RowMap = BTreeMap<String, Value>;

/// Shape of each fetched row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReturnType {
    /// Values in result-column order.
    #[default]
    List,
    /// Column name to value.
    Map,
}

impl ReturnType {
    /// Returns the shape name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::List => "LIST",
            Self::Map => "MAP",
        }
    }
}

impl fmt::Display for ReturnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ReturnType {
    type Err = HandlerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "list" => Ok(Self::List),
            "map" | "dict" => Ok(Self::Map),
            _ => Err(HandlerError::invalid_argument(format!(
                "return type '{s}' is not a ReturnType. Expected: list or map"
            ))),
        }
    }
}

/// One fetched row in the requested shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FetchedRow {
    List(Row),
    Map(RowMap),
}

impl FetchedRow {
    /// Shapes a buffered row.
    ///
    /// A row whose width differs from the column metadata means the cursor
    /// buffer is corrupt, which is reported as an internal error.
    pub fn shape(row: Row, columns: &[ColumnInfo], shape: ReturnType) -> Result<Self> {
        match shape {
            ReturnType::List => Ok(Self::List(row)),
            ReturnType::Map => {
                if row.len() != columns.len() {
                    return Err(HandlerError::internal(format!(
                        "row has {} values but the result has {} columns",
                        row.len(),
                        columns.len()
                    )));
                }
                Ok(Self::Map(
                    columns
                        .iter()
                        .map(|c| c.name.clone())
                        .zip(row)
                        .collect(),
                ))
            }
        }
    }

    /// Returns the values in column order, if this is a list row.
    pub fn as_list(&self) -> Option<&Row> {
        match self {
            Self::List(row) => Some(row),
            Self::Map(_) => None,
        }
    }

    /// Returns the mapping, if this is a map row.
    pub fn as_map(&self) -> Option<&RowMap> {
        match self {
            Self::List(_) => None,
            Self::Map(map) => Some(map),
        }
    }

    /// Returns the named value of a map row. List rows carry no names.
    pub fn get(&self, column: &str) -> Option<&Value> {
        match self {
            Self::List(_) => None,
            Self::Map(map) => map.get(column),
        }
    }

    /// Returns the value at `index` of a list row.
    pub fn get_index(&self, index: usize) -> Option<&Value> {
        match self {
            Self::List(row) => row.get(index),
            Self::Map(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns() -> Vec<ColumnInfo> {
        vec![ColumnInfo::new("id", "INT4"), ColumnInfo::new("comment", "TEXT")]
    }

    #[test]
    fn test_shape_list() {
        let row = vec![Value::Int(1), Value::from("hi")];
        let shaped = FetchedRow::shape(row.clone(), &columns(), ReturnType::List).unwrap();
        assert_eq!(shaped.as_list(), Some(&row));
        assert!(shaped.as_map().is_none());
    }

    #[test]
    fn test_shape_map() {
        let row = vec![Value::Int(1), Value::from("hi")];
        let shaped = FetchedRow::shape(row, &columns(), ReturnType::Map).unwrap();
        let map = shaped.as_map().unwrap();
        assert_eq!(map.get("comment"), Some(&Value::from("hi")));
        assert_eq!(map.get("id"), Some(&Value::Int(1)));
    }

    #[test]
    fn test_get_by_name_and_index() {
        let row = vec![Value::Int(1), Value::from("hi")];
        let list = FetchedRow::shape(row.clone(), &columns(), ReturnType::List).unwrap();
        assert_eq!(list.get("comment"), None);
        assert_eq!(list.get("nonexistent"), None);
        assert_eq!(list.get_index(1), Some(&Value::from("hi")));
        assert_eq!(list.get_index(2), None);

        let map = FetchedRow::shape(row, &columns(), ReturnType::Map).unwrap();
        assert_eq!(map.get("comment"), Some(&Value::from("hi")));
        assert_eq!(map.get("nonexistent"), None);
        assert_eq!(map.get_index(0), None);
    }

    #[test]
    fn test_shape_map_width_mismatch_is_internal() {
        let err = FetchedRow::shape(vec![Value::Int(1)], &columns(), ReturnType::Map).unwrap_err();
        assert!(matches!(err, HandlerError::Internal(_)));
    }

    #[test]
    fn test_return_type_from_str() {
        assert_eq!("dict".parse::<ReturnType>().unwrap(), ReturnType::Map);
        assert_eq!("LIST".parse::<ReturnType>().unwrap(), ReturnType::List);
        let err = "1".parse::<ReturnType>().unwrap_err();
        assert!(matches!(err, HandlerError::InvalidArgument(_)));
    }

    #[test]
    fn test_fetched_row_json() {
        let shaped =
            FetchedRow::shape(vec![Value::Int(1), Value::from("hi")], &columns(), ReturnType::Map)
                .unwrap();
        assert_eq!(
            serde_json::to_string(&shaped).unwrap(),
            r#"{"comment":"hi","id":1}"#
        );
    }
}
