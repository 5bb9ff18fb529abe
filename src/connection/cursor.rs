//! Client-side cursor over the most recent statement result.

use std::collections::VecDeque;

use crate::db::{ColumnInfo, Row, StatementResult};

/// Row count reported for statements that produced no result set.
pub const UNKNOWN_ROW_COUNT: i64 = -1;

/// Buffered result of the last dispatch plus fetch progress.
#[derive(Debug)]
pub struct Cursor {
    query: Option<String>,
    status: Option<String>,
    columns: Vec<ColumnInfo>,
    buffer: VecDeque<Row>,
    row_number: u64,
    row_count: i64,
    rows_affected: u64,
}

impl Default for Cursor {
    fn default() -> Self {
        Self::new()
    }
}

impl Cursor {
    /// Creates a cursor with no result.
    pub fn new() -> Self {
        Self {
            query: None,
            status: None,
            columns: Vec::new(),
            buffer: VecDeque::new(),
            row_number: 0,
            row_count: UNKNOWN_ROW_COUNT,
            rows_affected: 0,
        }
    }

    /// Forgets the previous result; fetch progress starts again at 0.
    pub(crate) fn reset(&mut self) {
        *self = Self::new();
    }

    /// Buffers the result of `sql`.
    pub(crate) fn load(&mut self, sql: &str, result: StatementResult, rows_affected: u64) {
        self.query = Some(sql.to_string());
        self.status = Some(result.status);
        self.row_count = if result.returns_rows {
            result.rows.len() as i64
        } else {
            UNKNOWN_ROW_COUNT
        };
        self.columns = result.columns;
        self.buffer = result.rows.into();
        self.row_number = 0;
        self.rows_affected = rows_affected;
    }

    /// Takes up to `max_rows` buffered rows, or all of them.
    pub(crate) fn take(&mut self, max_rows: Option<usize>) -> Vec<Row> {
        let n = max_rows
            .unwrap_or(self.buffer.len())
            .min(self.buffer.len());
        let rows: Vec<Row> = self.buffer.drain(..n).collect();
        self.row_number += rows.len() as u64;
        rows
    }

    /// Releases the buffered rows.
    pub(crate) fn close(&mut self) {
        self.buffer.clear();
        self.columns.clear();
    }

    /// Text of the last statement sent, if any.
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Status tag of the last statement sent, if any.
    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    /// Column metadata of the current result.
    pub fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    /// Rows fetched so far from the current result.
    pub fn row_number(&self) -> u64 {
        self.row_number
    }

    /// Rows in the current result, or `UNKNOWN_ROW_COUNT`.
    pub fn row_count(&self) -> i64 {
        self.row_count
    }

    /// Rows affected by the last dispatch.
    pub fn rows_affected(&self) -> u64 {
        self.rows_affected
    }
}
