//! PostgreSQL driver implementation.
//!
//! Provides `PostgresDriver` and its session type, implementing the
//! `Driver`/`Session` traits on top of a single sqlx `PgConnection`.

use crate::db::{
    classify_command, ColumnInfo, ConnectParams, Driver, OptionSet, Row, Session, StatementResult,
    Value,
};
use crate::error::{HandlerError, Result};
use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::postgres::{PgConnectOptions, PgConnection, PgRow, PgSslMode};
use sqlx::{Column as SqlxColumn, Connection as SqlxConnection, Either, Row as SqlxRow};
use sqlx::{TypeInfo, ValueRef};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// SQLSTATE for "unrecognized configuration parameter", sent by servers
/// that do not know a startup option.
const UNRECOGNIZED_PARAMETER: &str = "42704";

/// Opens PostgreSQL sessions with sqlx.
#[derive(Debug, Clone, Default)]
pub struct PostgresDriver;

impl PostgresDriver {
    /// Creates a new driver.
    pub fn new() -> Self {
        Self
    }

    fn connect_options(params: &ConnectParams, options: OptionSet) -> Result<PgConnectOptions> {
        let mut connect_options = PgConnectOptions::new()
            .host(&params.host)
            .port(params.port)
            .username(&params.user)
            .password(&params.password)
            .database(&params.database);

        if let Some(sslmode) = &params.sslmode {
            let mode: PgSslMode = sslmode
                .parse()
                .map_err(|e| HandlerError::config(format!("Invalid sslmode '{sslmode}': {e}")))?;
            connect_options = connect_options.ssl_mode(mode);
        }

        if options == OptionSet::Full {
            connect_options = connect_options.application_name(&params.application_name);
        }

        Ok(connect_options)
    }
}

#[async_trait]
impl Driver for PostgresDriver {
    async fn connect(
        &self,
        params: &ConnectParams,
        options: OptionSet,
    ) -> Result<Box<dyn Session>> {
        let connect_options = Self::connect_options(params, options)?;
        debug!(
            "Opening PostgreSQL connection to {}:{} ({} options)",
            params.host, params.port, options
        );

        let connection = bounded(
            params.connect_timeout,
            PgConnection::connect_with(&connect_options),
        )
        .await
        .ok_or_else(|| {
            HandlerError::connectivity(format!(
                "Connection to {}:{} timed out after {} seconds",
                params.host,
                params.port,
                params.connect_timeout.as_secs()
            ))
        })?
        .map_err(|e| map_connect_error(e, params))?;

        Ok(Box::new(PostgresSession {
            connection,
            in_transaction: false,
        }))
    }
}

/// Awaits `future` for at most `limit`; a zero limit waits indefinitely.
async fn bounded<F: Future>(limit: Duration, future: F) -> Option<F::Output> {
    if limit.is_zero() {
        return Some(future.await);
    }
    tokio::time::timeout(limit, future).await.ok()
}

/// One physical PostgreSQL connection.
///
/// Uses implicit transactions: the first statement after connect
/// or commit implicitly opens a transaction which stays open until
/// `commit`.
pub struct PostgresSession {
    connection: PgConnection,
    in_transaction: bool,
}

impl PostgresSession {
    async fn begin_if_needed(&mut self) -> Result<()> {
        if !self.in_transaction {
            sqlx::Executor::execute(&mut self.connection, "BEGIN")
                .await
                .map_err(|e| HandlerError::query(format_query_error(e)))?;
            self.in_transaction = true;
        }
        Ok(())
    }
}

#[async_trait]
impl Session for PostgresSession {
    async fn execute(&mut self, sql: &str) -> Result<StatementResult> {
        self.begin_if_needed().await?;

        // The simple query protocol returns every statement's rows followed
        // by its completion; only the last statement's rows are kept.
        let mut stream = sqlx::raw_sql(sql).fetch_many(&mut self.connection);
        let mut pending: Vec<PgRow> = Vec::new();
        let mut last_rows: Vec<PgRow> = Vec::new();
        let mut rows_affected = 0u64;

        while let Some(step) = stream
            .try_next()
            .await
            .map_err(|e| HandlerError::query(format_query_error(e)))?
        {
            match step {
                Either::Left(done) => {
                    rows_affected += done.rows_affected();
                    last_rows = std::mem::take(&mut pending);
                }
                Either::Right(row) => pending.push(row),
            }
        }
        drop(stream);

        if !pending.is_empty() {
            last_rows = pending;
        }

        let columns: Vec<ColumnInfo> = last_rows
            .first()
            .map(|row| {
                row.columns()
                    .iter()
                    .map(|col| ColumnInfo::new(col.name(), col.type_info().name()))
                    .collect()
            })
            .unwrap_or_default();
        let rows: Vec<Row> = last_rows.iter().map(convert_row).collect();

        let command = classify_command(sql);
        let returns_rows = command.returns_rows || !rows.is_empty();

        Ok(StatementResult {
            status: command.status(rows.len(), rows_affected),
            columns,
            rows,
            rows_affected,
            returns_rows,
        })
    }

    async fn commit(&mut self) -> Result<()> {
        if self.in_transaction {
            sqlx::Executor::execute(&mut self.connection, "COMMIT")
                .await
                .map_err(|e| HandlerError::query(format_query_error(e)))?;
            self.in_transaction = false;
        }
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let session = *self;
        session
            .connection
            .close()
            .await
            .map_err(|e| HandlerError::query(format!("Failed to close connection: {e}")))
    }
}

/// Converts a sqlx PgRow to our Row type.
fn convert_row(row: &PgRow) -> Row {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| convert_value(row, i, col.type_info().name()))
        .collect()
}

/// Converts a single column value from a PgRow to our Value type.
fn convert_value(row: &PgRow, index: usize, type_name: &str) -> Value {
    match type_name.to_uppercase().as_str() {
        "BOOL" | "BOOLEAN" => row
            .try_get::<Option<bool>, _>(index)
            .ok()
            .flatten()
            .map(Value::Bool)
            .unwrap_or(Value::Null),

        "INT2" | "SMALLINT" => row
            .try_get::<Option<i16>, _>(index)
            .ok()
            .flatten()
            .map(|v| Value::Int(v as i64))
            .unwrap_or(Value::Null),

        "INT4" | "INT" | "INTEGER" => row
            .try_get::<Option<i32>, _>(index)
            .ok()
            .flatten()
            .map(|v| Value::Int(v as i64))
            .unwrap_or(Value::Null),

        "INT8" | "BIGINT" => row
            .try_get::<Option<i64>, _>(index)
            .ok()
            .flatten()
            .map(Value::Int)
            .unwrap_or(Value::Null),

        "FLOAT4" | "REAL" => row
            .try_get::<Option<f32>, _>(index)
            .ok()
            .flatten()
            .map(|v| Value::Float(v as f64))
            .unwrap_or(Value::Null),

        "FLOAT8" | "DOUBLE PRECISION" => row
            .try_get::<Option<f64>, _>(index)
            .ok()
            .flatten()
            .map(Value::Float)
            .unwrap_or(Value::Null),

        "BYTEA" => row
            .try_get::<Option<Vec<u8>>, _>(index)
            .ok()
            .flatten()
            .map(Value::Bytes)
            .unwrap_or(Value::Null),

        // Everything else comes back in text format; keep the server's
        // rendering (numeric, timestamps, json, ...).
        _ => match row.try_get_raw(index) {
            Ok(raw) if !raw.is_null() => raw
                .as_str()
                .map(|s| Value::String(s.to_string()))
                .unwrap_or(Value::Null),
            _ => Value::Null,
        },
    }
}

/// Maps sqlx connection errors onto the connection state machine's error
/// classes.
fn map_connect_error(error: sqlx::Error, params: &ConnectParams) -> HandlerError {
    if let Some(db_error) = error.as_database_error() {
        let code = db_error.code().map(|c| c.to_string()).unwrap_or_default();
        if code == UNRECOGNIZED_PARAMETER {
            return HandlerError::unsupported_option(db_error.message().to_string());
        }
        // Class 08 (connection exception), 28 (invalid authorization),
        // 3D000 (unknown database), 53 (insufficient resources) and 57P0x
        // (server shutting down / starting up) are all connectivity problems.
        if code.starts_with("08")
            || code.starts_with("28")
            || code.starts_with("53")
            || code.starts_with("57P")
            || code == "3D000"
        {
            return HandlerError::connectivity(format!(
                "{}@{}:{}/{}: {}",
                params.user,
                params.host,
                params.port,
                params.database,
                db_error.message()
            ));
        }
        return HandlerError::query(format_query_error(error));
    }

    match error {
        sqlx::Error::Configuration(e) => HandlerError::unsupported_option(e.to_string()),
        sqlx::Error::Io(e) => HandlerError::connectivity(format!(
            "Cannot connect to {}:{}: {e}",
            params.host, params.port
        )),
        sqlx::Error::Tls(e) => HandlerError::connectivity(format!(
            "TLS negotiation with {}:{} failed: {e}",
            params.host, params.port
        )),
        sqlx::Error::Protocol(e) => HandlerError::connectivity(format!(
            "Protocol error talking to {}:{}: {e}",
            params.host, params.port
        )),
        other => HandlerError::query(other.to_string()),
    }
}

/// Formats a query error with hints if available.
fn format_query_error(error: sqlx::Error) -> String {
    let Some(db_error) = error.as_database_error() else {
        return error.to_string();
    };

    let mut result = String::from("ERROR: ");
    result.push_str(db_error.message());

    if let Some(pg_error) = db_error.try_downcast_ref::<sqlx::postgres::PgDatabaseError>() {
        if let Some(detail) = pg_error.detail() {
            result.push_str("\n  DETAIL: ");
            result.push_str(detail);
        }

        if let Some(hint) = pg_error.hint() {
            result.push_str("\n  HINT: ");
            result.push_str(hint);
        }

        if let Some(table) = pg_error.table() {
            result.push_str("\n  TABLE: ");
            result.push_str(table);
        }

        if let Some(column) = pg_error.column() {
            result.push_str("\n  COLUMN: ");
            result.push_str(column);
        }

        if let Some(constraint) = pg_error.constraint() {
            result.push_str("\n  CONSTRAINT: ");
            result.push_str(constraint);
        }
    }

    result
}
