//! Integration tests for pg-handler.

pub mod connection_test;
pub mod handler_test;
pub mod query_test;

use std::sync::Arc;

use pg_handler::config::ConnectionConfig;
use pg_handler::connection::{PromptRetry, ScriptedPrompt};
use pg_handler::db::PostgresDriver;
use pg_handler::debug::Silent;
use pg_handler::{ConnectionManager, PgHandler};

/// Connection config from DATABASE_URL, if set.
pub fn test_config() -> Option<ConnectionConfig> {
    let url = std::env::var("DATABASE_URL").ok()?;
    ConnectionConfig::from_connection_string(&url).ok()
}

/// A quiet manager that never retries.
pub fn test_manager() -> ConnectionManager {
    ConnectionManager::new(Arc::new(PostgresDriver::new()))
        .with_sink(Arc::new(Silent))
        .with_retry_policy(Box::new(PromptRetry::new(Arc::new(ScriptedPrompt::new(
            &["n"],
        )))))
        .with_credentials(Arc::new(|_: &str| -> pg_handler::Result<String> {
            Ok(String::new())
        }))
}

/// A handler connected to DATABASE_URL, if set.
pub async fn test_handler() -> Option<PgHandler> {
    let config = test_config()?;
    PgHandler::connect(&test_manager(), &config).await.ok()
}

/// A table name private to this test process.
pub fn scratch_table(name: &str) -> String {
    format!("pgh_{}_{}", name, std::process::id())
}
