//! End-to-end handler tests against the in-memory mock driver.
//!
//! These run without a database.

use std::sync::Arc;
use std::time::Duration;

use pg_handler::config::ConnectionConfig;
use pg_handler::connection::{LoopRetry, PromptRetry, ScriptedPrompt};
use pg_handler::db::{MockConnect, MockDriver, OptionSet, Value};
use pg_handler::debug::RecordingSink;
use pg_handler::{
    BoostType, ConnectionManager, ExecuteOptions, FetchedRow, HandlerError, PgHandler, ReturnType,
};

fn config() -> ConnectionConfig {
    ConnectionConfig {
        password: Some("admin".to_string()),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_notes_workflow() {
    let driver = MockDriver::new();
    let sink = RecordingSink::new();
    let manager = ConnectionManager::new(Arc::new(driver.clone())).with_sink(Arc::new(sink.clone()));
    let handler = PgHandler::connect(&manager, &config()).await.unwrap();

    let (columns, rows) = handler
        .scoped(|h| {
            Box::pin(async move {
                h.execute_query(
                    ExecuteOptions::new()
                        .query("create table notes (id int, comment text)")
                        .commit(true),
                )
                .await?;

                let params = (1..=3)
                    .map(|i| vec![Value::Int(i), Value::from(format!("note {i}"))])
                    .collect();
                h.execute_query(
                    ExecuteOptions::new()
                        .query("insert into notes (id, comment) values %s")
                        .boost(BoostType::Values, params)
                        .commit(true),
                )
                .await?;

                let columns = h.get_columns("notes").await?;
                h.execute_query(ExecuteOptions::new().query("select id, comment from notes"))
                    .await?;
                let rows = h.fetch(Some(2), ReturnType::Map)?;
                Ok((columns, rows))
            })
        })
        .await
        .unwrap();

    assert_eq!(columns, vec!["id", "comment"]);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1].get("comment"), Some(&Value::from("note 2")));
    assert_eq!(driver.commits(), 2);
    assert_eq!(driver.closes(), 1);
    assert!(sink.contains("execute `insert into notes (id, comment) values %s`"));
    assert!(sink.contains("status: `INSERT 0 3`"));
}

#[tokio::test]
async fn test_reduced_options_then_prompted_retry() {
    let driver = MockDriver::new().with_connect_script(&[
        MockConnect::RejectFullOptions,
        MockConnect::Unreachable,
    ]);
    let prompt = ScriptedPrompt::new(&["what", "yes"]);
    let manager = ConnectionManager::new(Arc::new(driver.clone()))
        .with_sink(Arc::new(RecordingSink::new()))
        .with_retry_policy(Box::new(PromptRetry::new(Arc::new(prompt.clone()))));

    let handler = PgHandler::connect(&manager, &config()).await.unwrap();
    assert_eq!(
        driver.connect_attempts(),
        vec![OptionSet::Full, OptionSet::Reduced, OptionSet::Full]
    );
    assert_eq!(prompt.transcript().len(), 3);
    handler.close().await.unwrap();
}

#[tokio::test]
async fn test_loop_mode_reconnects() {
    let driver = MockDriver::new().with_connect_script(&[MockConnect::Unreachable; 5]);
    let manager = ConnectionManager::new(Arc::new(driver.clone()))
        .with_sink(Arc::new(RecordingSink::new()))
        .with_retry_policy(Box::new(LoopRetry::new(Duration::from_millis(1))));

    let handler = PgHandler::connect(&manager, &config()).await.unwrap();
    assert_eq!(driver.connect_attempts().len(), 6);
    handler.close().await.unwrap();
}

#[tokio::test]
async fn test_fetch_all_on_command_is_empty() {
    let driver = MockDriver::new().with_table("notes", &["comment"]);
    let manager = ConnectionManager::new(Arc::new(driver.clone()))
        .with_sink(Arc::new(RecordingSink::new()));
    let mut handler = PgHandler::connect(&manager, &config()).await.unwrap();

    let rows = handler
        .execute_query(
            ExecuteOptions::new()
                .query("insert into notes values ('a')")
                .fetch_all(true),
        )
        .await
        .unwrap();
    assert_eq!(rows, Some(Vec::<FetchedRow>::new()));
    assert_eq!(handler.unfetched_count(), -1);

    let error = handler
        .execute_query(
            ExecuteOptions::new()
                .query("insert into notes values %s %s")
                .boost(BoostType::Batch, vec![vec![Value::Null]]),
        )
        .await
        .unwrap_err();
    assert!(matches!(error, HandlerError::BoostMode { boost: BoostType::Batch, .. }));

    handler.close().await.unwrap();
}
