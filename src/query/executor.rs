//! Query staging, execution and incremental fetch.
//!
//! The executor owns the staged query and dispatches it over a
//! `Connection` according to the boost mode. Results stay buffered in the
//! connection's cursor until fetched.

use std::sync::Arc;

use tracing::debug;

use super::boost::{self, BoostType};
use super::shape::{FetchedRow, ReturnType};
use crate::connection::Connection;
use crate::db::Value;
use crate::debug::{DebugSink, Silent};
use crate::error::{HandlerError, Result};

/// The staged SQL text and whether it has been sent since it was staged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    text: String,
    executed: bool,
}

impl Query {
    /// Stages `text`, not yet executed.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            executed: false,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_executed(&self) -> bool {
        self.executed
    }

    fn mark_executed(&mut self) {
        self.executed = true;
    }
}

/// Options for one `execute` call.
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    /// Replaces the staged query before executing.
    pub query: Option<String>,
    /// Commit after dispatch.
    pub commit: bool,
    /// Fetch every row and return it.
    pub fetch_all: bool,
    /// Row shape used when `fetch_all` is set.
    pub return_type: ReturnType,
    pub boost_type: BoostType,
    /// Parameter rows substituted in `Batch`/`Values` mode.
    pub params: Vec<Vec<Value>>,
}

impl ExecuteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn commit(mut self, commit: bool) -> Self {
        self.commit = commit;
        self
    }

    pub fn fetch_all(mut self, fetch_all: bool) -> Self {
        self.fetch_all = fetch_all;
        self
    }

    pub fn return_type(mut self, return_type: ReturnType) -> Self {
        self.return_type = return_type;
        self
    }

    /// Selects a boost mode and its parameter rows.
    pub fn boost(mut self, boost_type: BoostType, params: Vec<Vec<Value>>) -> Self {
        self.boost_type = boost_type;
        self.params = params;
        self
    }
}

/// Stages and executes queries, then fetches their rows.
pub struct QueryExecutor {
    query: Query,
    sink: Arc<dyn DebugSink>,
}

impl Default for QueryExecutor {
    fn default() -> Self {
        Self::new(Arc::new(Silent))
    }
}

impl QueryExecutor {
    /// Creates an executor with nothing staged.
    pub fn new(sink: Arc<dyn DebugSink>) -> Self {
        Self {
            query: Query::default(),
            sink,
        }
    }

    /// Replaces the staged query.
    pub fn stage_query(&mut self, text: impl Into<String>) {
        self.query = Query::new(text);
    }

    /// The staged text verbatim, or "" if nothing was staged.
    pub fn current_query_text(&self) -> &str {
        self.query.text()
    }

    /// True once the staged query has been executed successfully.
    pub fn current_query_executed(&self) -> bool {
        self.query.is_executed()
    }

    /// Executes the staged query (or `options.query`) on `connection`.
    ///
    /// Returns the fetched rows when `options.fetch_all` is set.
    pub async fn execute(
        &mut self,
        connection: &mut Connection,
        options: ExecuteOptions,
    ) -> Result<Option<Vec<FetchedRow>>> {
        let ExecuteOptions {
            query,
            commit,
            fetch_all,
            return_type,
            boost_type,
            params,
        } = options;

        if let Some(query) = query {
            self.stage_query(query);
        }

        self.sink.emit(&format!("execute `{}`", self.query.text()));
        if self.query.text().is_empty() {
            return Err(HandlerError::invalid_query("Current SQL query is empty."));
        }

        let statements = boost::expand(self.query.text(), boost_type, &params)?;
        debug!(
            "Executing in {} mode as {} round trip(s)",
            boost_type,
            statements.len()
        );
        connection.dispatch(&statements).await?;
        self.query.mark_executed();

        if commit {
            connection.commit().await?;
        }
        self.sink.emit(&format!(
            "status: `{}`",
            connection.cursor().status().unwrap_or_default()
        ));

        if fetch_all {
            Ok(Some(self.fetch(connection, None, return_type)?))
        } else {
            Ok(None)
        }
    }

    /// Drains up to `max_rows` buffered rows, or all of them.
    ///
    /// Returns an empty vec when nothing is buffered.
    pub fn fetch(
        &self,
        connection: &mut Connection,
        max_rows: Option<usize>,
        return_type: ReturnType,
    ) -> Result<Vec<FetchedRow>> {
        let cursor = connection.cursor_mut();
        let rows = cursor.take(max_rows);
        let columns = cursor.columns();
        rows.into_iter()
            .map(|row| FetchedRow::shape(row, columns, return_type))
            .collect()
    }

    /// Text of the last statement sent, or "".
    pub fn last_executed_text<'a>(&self, connection: &'a Connection) -> &'a str {
        connection.cursor().query().unwrap_or_default()
    }

    /// Status tag of the last statement sent, or "".
    pub fn last_status_message<'a>(&self, connection: &'a Connection) -> &'a str {
        connection.cursor().status().unwrap_or_default()
    }

    /// True while no row of the current result has been fetched.
    pub fn response_is_empty(&self, connection: &Connection) -> bool {
        connection.cursor().row_number() == 0
    }

    /// True once every row of the current result has been fetched.
    pub fn all_fetched(&self, connection: &Connection) -> bool {
        let cursor = connection.cursor();
        cursor.row_number() as i64 == cursor.row_count()
    }

    /// Rows of the current result not fetched yet.
    ///
    /// Negative when the last statement produced no result set.
    pub fn unfetched_count(&self, connection: &Connection) -> i64 {
        let cursor = connection.cursor();
        cursor.row_count() - cursor.row_number() as i64
    }
}
