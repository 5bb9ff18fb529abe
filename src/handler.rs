//! The public facade: one connection paired with one query executor.

use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::warn;

use crate::config::ConnectionConfig;
use crate::connection::{Connection, ConnectionManager};
use crate::db::Value;
use crate::debug::DebugSink;
use crate::error::{HandlerError, Result};
use crate::query::{quote_literal, ExecuteOptions, FetchedRow, QueryExecutor, ReturnType};

/// A connected handler.
///
/// ```no_run
/// # async fn run(manager: pg_handler::ConnectionManager, config: pg_handler::config::ConnectionConfig) -> pg_handler::Result<()> {
/// use pg_handler::{ExecuteOptions, PgHandler};
///
/// let handler = PgHandler::connect(&manager, &config).await?;
/// let _rows = handler
///     .scoped(|h| {
///         Box::pin(async move {
///             h.execute_query(ExecuteOptions::new().query("select 1").fetch_all(true))
///                 .await
///         })
///     })
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct PgHandler {
    connection: Connection,
    executor: QueryExecutor,
    sink: Arc<dyn DebugSink>,
}

impl fmt::Debug for PgHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgHandler")
            .field("connection", &self.connection)
            .field("current_query", &self.executor.current_query_text())
            .finish_non_exhaustive()
    }
}

impl PgHandler {
    /// Connects through `manager`, retrying per its policy.
    pub async fn connect(manager: &ConnectionManager, config: &ConnectionConfig) -> Result<Self> {
        let connection = manager.connect(config).await?;
        Ok(Self::from_connection(connection, manager.sink()))
    }

    /// Wraps an already open connection.
    pub fn from_connection(connection: Connection, sink: Arc<dyn DebugSink>) -> Self {
        Self {
            connection,
            executor: QueryExecutor::new(Arc::clone(&sink)),
            sink,
        }
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Stages `query`; it is not executed yet.
    pub fn set_query(&mut self, query: impl Into<String>) {
        self.executor.stage_query(query);
    }

    /// The staged query text, or "".
    pub fn current_query(&self) -> &str {
        self.executor.current_query_text()
    }

    /// Executes the staged query. See [`QueryExecutor::execute`].
    pub async fn execute_query(
        &mut self,
        options: ExecuteOptions,
    ) -> Result<Option<Vec<FetchedRow>>> {
        self.executor.execute(&mut self.connection, options).await
    }

    /// Fetches up to `rows` rows of the last result, or all of them.
    pub fn fetch(&mut self, rows: Option<usize>, return_type: ReturnType) -> Result<Vec<FetchedRow>> {
        self.executor.fetch(&mut self.connection, rows, return_type)
    }

    /// Column names of `table_name` in ordinal order.
    pub async fn get_columns(&mut self, table_name: &str) -> Result<Vec<String>> {
        self.sink.emit("Getting columns...");
        let query = format!(
            "select column_name from information_schema.columns where table_name = {} order by ordinal_position",
            quote_literal(&Value::from(table_name))
        );

        let rows = self
            .execute_query(ExecuteOptions::new().query(query).fetch_all(true))
            .await?
            .unwrap_or_default();

        Ok(rows
            .iter()
            .filter_map(|row| row.as_list())
            .flat_map(|values| values.iter().map(|v| v.to_display_string()))
            .collect())
    }

    /// Text of the last statement sent, or "".
    pub fn last_executed_query(&self) -> &str {
        self.executor.last_executed_text(&self.connection)
    }

    /// Status tag of the last statement sent, or "".
    pub fn status(&self) -> &str {
        self.executor.last_status_message(&self.connection)
    }

    pub fn current_query_is_executed(&self) -> bool {
        self.executor.current_query_executed()
    }

    pub fn response_is_empty(&self) -> bool {
        self.executor.response_is_empty(&self.connection)
    }

    pub fn all_fetched(&self) -> bool {
        self.executor.all_fetched(&self.connection)
    }

    pub fn unfetched_count(&self) -> i64 {
        self.executor.unfetched_count(&self.connection)
    }

    /// Closes the cursor and then the connection; errors are returned as is.
    pub async fn close(self) -> Result<()> {
        self.connection.close().await
    }

    /// Runs `body` against the handler, then closes it exactly once.
    ///
    /// A body error is returned unchanged; a close failure that follows it
    /// is only logged. A close failure after a successful body is returned
    /// as `HandlerError::ExitFailed`.
    pub async fn scoped<T, F>(mut self, body: F) -> Result<T>
    where
        F: for<'a> FnOnce(&'a mut PgHandler) -> BoxFuture<'a, Result<T>>,
    {
        let outcome = body(&mut self).await;
        let sink = Arc::clone(&self.sink);

        match (outcome, self.close().await) {
            (outcome, Ok(())) => outcome,
            (Ok(_), Err(close_error)) => {
                warn!("Closing connection failed: {}", close_error);
                Err(HandlerError::exit_failed(close_error.to_string()))
            }
            (Err(error), Err(close_error)) => {
                let exit = HandlerError::exit_failed(close_error.to_string());
                warn!("Closing connection after an error failed: {}", close_error);
                sink.emit(&exit.to_string());
                Err(error)
            }
        }
    }
}
