//! pghandler - run a query against PostgreSQL and print the rows.

use std::sync::Arc;

use pg_handler::cli::Cli;
use pg_handler::config::{Config, ConnectionConfig};
use pg_handler::db::PostgresDriver;
use pg_handler::{logging, ConnectionManager, FetchedRow, HandlerError, PgHandler, Result};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    logging::init_stderr_logging();

    if let Err(e) = run().await {
        error!("{}: {}", e.category(), e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse_args();

    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let mut config = Config::load_from_file(&config_path)?;
    cli.apply_to(&mut config.handler);

    let connection = resolve_connection(&cli, &config)?;
    info!("Connection: {}", connection.display_string());

    let options = cli.execute_options()?;
    let return_type = cli.return_type()?;
    let max_rows = cli.rows;
    let columns = cli.columns.clone();

    let manager = ConnectionManager::from_settings(Arc::new(PostgresDriver::new()), &config.handler);
    let handler = PgHandler::connect(&manager, &connection).await?;

    handler
        .scoped(move |h| {
            Box::pin(async move {
                if let Some(table) = columns {
                    for column in h.get_columns(&table).await? {
                        println!("{}", to_json(&column)?);
                    }
                }

                if let Some(options) = options {
                    h.execute_query(options).await?;
                    let rows: Vec<FetchedRow> = h.fetch(max_rows, return_type)?;
                    for row in &rows {
                        println!("{}", to_json(row)?);
                    }
                }
                Ok(())
            })
        })
        .await
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value)
        .map_err(|e| HandlerError::internal(format!("Failed to serialize row: {e}")))
}

/// Resolves the final connection configuration from CLI args, config file, and environment.
fn resolve_connection(cli: &Cli, config: &Config) -> Result<ConnectionConfig> {
    // Precedence: CLI arguments, named connection, default connection, then
    // environment and built-in defaults.
    let mut connection = cli.to_connection_config()?;

    if connection.is_none() {
        if let Some(name) = cli.connection_name() {
            connection = config.get_connection(Some(name)).cloned();
            if connection.is_none() {
                return Err(HandlerError::config(format!(
                    "Connection '{}' not found in config file",
                    name
                )));
            }
        }
    }

    if connection.is_none() {
        connection = config.get_connection(None).cloned();
    }

    let mut connection = connection.unwrap_or_default();
    connection.apply_env_defaults();
    Ok(connection)
}
