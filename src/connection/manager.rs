//! Connection manager: opens connections with option fallback and retry.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::cursor::Cursor;
use super::prompt::{CredentialProvider, TerminalPrompt};
use super::retry::{policy_for, PromptRetry, RetryPolicy};
use crate::config::{ConnectionConfig, HandlerSettings};
use crate::db::{ConnectParams, Driver, OptionSet, Session};
use crate::debug::{sink_for, DebugSink, StdoutSink};
use crate::error::{HandlerError, Result};

/// Default connection timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// An open physical connection and its cursor.
///
/// `close` consumes the connection, so a closed connection cannot be used.
pub struct Connection {
    host: String,
    port: u16,
    user: String,
    database: String,
    session: Box<dyn Session>,
    cursor: Cursor,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("database", &self.database)
            .field("cursor", &self.cursor)
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Wraps an open session.
    pub fn new(params: &ConnectParams, session: Box<dyn Session>) -> Self {
        Self {
            host: params.host.clone(),
            port: params.port,
            user: params.user.clone(),
            database: params.database.clone(),
            session,
            cursor: Cursor::new(),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    /// Returns a display-safe description of the connection.
    pub fn display_string(&self) -> String {
        format!("{} @ {}:{}", self.database, self.host, self.port)
    }

    /// The cursor over the last dispatched result.
    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    pub(crate) fn cursor_mut(&mut self) -> &mut Cursor {
        &mut self.cursor
    }

    /// Sends `statements` in order and buffers the result of the last one.
    ///
    /// Rows affected are summed over every statement sent. On error the
    /// cursor is left empty.
    pub async fn dispatch(&mut self, statements: &[String]) -> Result<()> {
        self.cursor.reset();

        let mut rows_affected = 0;
        let mut last = None;
        for sql in statements {
            debug!("Dispatching {} bytes of SQL", sql.len());
            let result = self.session.execute(sql).await?;
            rows_affected += result.rows_affected;
            last = Some((sql, result));
        }

        if let Some((sql, result)) = last {
            self.cursor.load(sql, result, rows_affected);
        }
        Ok(())
    }

    /// Commits the current transaction.
    pub async fn commit(&mut self) -> Result<()> {
        self.session.commit().await
    }

    /// Closes the cursor, then the session handle.
    pub async fn close(mut self) -> Result<()> {
        self.cursor.close();
        self.session.close().await
    }
}

/// Opens connections through a driver, retrying connectivity failures.
pub struct ConnectionManager {
    driver: Arc<dyn Driver>,
    credentials: Arc<dyn CredentialProvider>,
    retry: Box<dyn RetryPolicy>,
    sink: Arc<dyn DebugSink>,
    connect_timeout: Duration,
    application_name: String,
}

impl ConnectionManager {
    /// Creates a manager with terminal prompts and stdout debug output.
    pub fn new(driver: Arc<dyn Driver>) -> Self {
        Self {
            driver,
            credentials: Arc::new(TerminalPrompt),
            retry: Box::new(PromptRetry::new(Arc::new(TerminalPrompt))),
            sink: Arc::new(StdoutSink),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            application_name: HandlerSettings::default().application_name,
        }
    }

    /// Creates a manager configured from the `[handler]` settings.
    pub fn from_settings(driver: Arc<dyn Driver>, settings: &HandlerSettings) -> Self {
        Self::new(driver)
            .with_retry_policy(policy_for(
                settings.loop_mode,
                settings.retry_interval(),
                Arc::new(TerminalPrompt),
            ))
            .with_sink(sink_for(settings.print_debug))
            .with_connect_timeout(settings.connect_timeout())
            .with_application_name(settings.application_name.clone())
    }

    pub fn with_credentials(mut self, credentials: Arc<dyn CredentialProvider>) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_retry_policy(mut self, retry: Box<dyn RetryPolicy>) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn DebugSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = name.into();
        self
    }

    /// The debug sink shared with the query executor.
    pub fn sink(&self) -> Arc<dyn DebugSink> {
        Arc::clone(&self.sink)
    }

    /// Connects to the server described by `config`.
    ///
    /// Connectivity failures are handed to the retry policy; declining a
    /// retry returns the last connectivity error. Any other error is
    /// returned immediately.
    pub async fn connect(&self, config: &ConnectionConfig) -> Result<Connection> {
        let password = match &config.password {
            Some(password) => password.clone(),
            None => {
                let credentials = Arc::clone(&self.credentials);
                let user = config.user().to_string();
                tokio::task::spawn_blocking(move || credentials.password(&user))
                    .await
                    .map_err(|e| HandlerError::prompt(format!("Password prompt failed: {e}")))??
            }
        };
        let params = config.connect_params(password, self.connect_timeout, &self.application_name);

        let mut attempt = 0;
        loop {
            attempt += 1;
            self.sink.emit("Connecting to SQL server...");

            match self.open(&params).await {
                Ok(session) => {
                    self.sink.emit("Connected.");
                    debug!("Connected to {}:{} as {}", params.host, params.port, params.user);
                    return Ok(Connection::new(&params, session));
                }
                Err(error) if error.is_connectivity() => {
                    warn!("Connection attempt {} failed: {}", attempt, error);
                    self.sink.emit("An error occurred while connecting to the SQL server.");
                    self.sink.emit(&error.to_string());
                    if !self.retry.should_retry(attempt, self.sink.as_ref()).await? {
                        return Err(error);
                    }
                }
                Err(error) => return Err(error),
            }
        }
    }

    /// One attempt: full option set, then the reduced set if the driver
    /// rejects an option.
    async fn open(&self, params: &ConnectParams) -> Result<Box<dyn Session>> {
        match self.driver.connect(params, OptionSet::Full).await {
            Err(HandlerError::UnsupportedOption(reason)) => {
                debug!("Full option set rejected ({}), retrying reduced", reason);
                self.driver.connect(params, OptionSet::Reduced).await
            }
            other => other,
        }
    }
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("connect_timeout", &self.connect_timeout)
            .field("application_name", &self.application_name)
            .finish_non_exhaustive()
    }
}
