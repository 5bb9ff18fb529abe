//! Database driver boundary.
//!
//! Provides a trait-based interface over the physical database driver so the
//! connection state machine and the query executor can run against
//! PostgreSQL or against the in-memory mock interchangeably.

mod command;
mod mock;
mod postgres;
mod types;

pub use command::{classify_command, CommandInfo};
pub use mock::{MockConnect, MockDriver};
pub use postgres::PostgresDriver;
pub use types::{ColumnInfo, Row, StatementResult, Value};

use crate::error::Result;
use async_trait::async_trait;
use std::fmt;
use std::time::Duration;

/// Which set of connection options to offer the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionSet {
    /// Every option the driver knows how to send.
    Full,
    /// Only the options every server accepts.
    Reduced,
}

impl fmt::Display for OptionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => write!(f, "full"),
            Self::Reduced => write!(f, "reduced"),
        }
    }
}

/// Fully resolved parameters for one connection attempt.
#[derive(Clone)]
pub struct ConnectParams {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub connect_timeout: Duration,
    pub application_name: String,
    pub sslmode: Option<String>,
}

impl fmt::Debug for ConnectParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("connect_timeout", &self.connect_timeout)
            .field("application_name", &self.application_name)
            .field("sslmode", &self.sslmode)
            .finish()
    }
}

/// Opens physical connections.
///
/// Implementations must report network/authentication failures as
/// `HandlerError::Connectivity` and options the server or driver cannot
/// honour as `HandlerError::UnsupportedOption`; every other error is treated
/// as fatal by the connection manager.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Opens a session using the given option set.
    async fn connect(&self, params: &ConnectParams, options: OptionSet)
        -> Result<Box<dyn Session>>;
}

/// A live physical connection.
#[async_trait]
pub trait Session: Send {
    /// Sends SQL text (possibly several `;`-separated statements) and
    /// buffers the result of the last statement.
    async fn execute(&mut self, sql: &str) -> Result<StatementResult>;

    /// Commits the current transaction.
    async fn commit(&mut self) -> Result<()>;

    /// Closes the session, releasing the physical handle.
    async fn close(self: Box<Self>) -> Result<()>;
}
