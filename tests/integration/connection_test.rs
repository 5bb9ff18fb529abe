//! Connection integration tests.
//!
//! Tests database connectivity, option fallback and error handling.

use super::{test_config, test_handler, test_manager};
use pg_handler::config::ConnectionConfig;
use pg_handler::{ExecuteOptions, HandlerError};

#[tokio::test]
async fn test_connect_with_valid_credentials() {
    let Some(handler) = test_handler().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    // Connection succeeded if we got here
    handler.close().await.unwrap();
}

#[tokio::test]
async fn test_application_name_is_sent() {
    let Some(mut handler) = test_handler().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let rows = handler
        .execute_query(
            ExecuteOptions::new()
                .query("select current_setting('application_name')")
                .fetch_all(true),
        )
        .await
        .unwrap()
        .unwrap();
    let name = rows[0].get_index(0).and_then(|v| v.as_str());
    assert_eq!(name, Some("pg-handler"));

    handler.close().await.unwrap();
}

#[tokio::test(flavor = "current_thread")]
async fn test_connect_with_invalid_port_is_connectivity_error() {
    let config = ConnectionConfig {
        host: Some("localhost".to_string()),
        port: 59999, // Unlikely to be in use
        database: Some("testdb".to_string()),
        user: Some("testuser".to_string()),
        password: Some("testpass".to_string()),
        sslmode: None,
    };

    let error = test_manager().connect(&config).await.unwrap_err();
    assert!(error.is_connectivity(), "unexpected error: {error}");
}

#[tokio::test(flavor = "current_thread")]
async fn test_wrong_password_is_connectivity_error() {
    let Some(mut config) = test_config() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };
    config.password = Some("definitely-not-the-password".to_string());

    // Trust authentication accepts any password; only assert when rejected.
    if let Err(error) = test_manager().connect(&config).await {
        assert!(error.is_connectivity(), "unexpected error: {error}");
    }
}

#[tokio::test]
async fn test_invalid_sslmode_is_config_error() {
    let config = ConnectionConfig {
        password: Some("admin".to_string()),
        sslmode: Some("sometimes".to_string()),
        ..Default::default()
    };

    let error = test_manager().connect(&config).await.unwrap_err();
    assert!(matches!(error, HandlerError::Config(_)));
}
