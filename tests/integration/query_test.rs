//! Query execution integration tests against PostgreSQL.
//!
//! Every test works on a temporary table, so nothing outlives the session.

use std::collections::BTreeMap;

use super::{scratch_table, test_handler};
use pg_handler::db::Value;
use pg_handler::{BoostType, ExecuteOptions, FetchedRow, HandlerError, PgHandler, ReturnType};

async fn create_notes(handler: &mut PgHandler, table: &str) {
    handler
        .execute_query(ExecuteOptions::new().query(format!(
            "create temp table {table} (id serial primary key, comment text)"
        )))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_values_round_trip_as_list_and_map() {
    let Some(mut handler) = test_handler().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };
    let table = scratch_table("round_trip");
    create_notes(&mut handler, &table).await;

    let comment = "it's a \\ test";
    handler
        .execute_query(
            ExecuteOptions::new()
                .query(format!("insert into {table} (comment) values %s"))
                .boost(BoostType::Values, vec![vec![Value::from(comment)]])
                .commit(true),
        )
        .await
        .unwrap();
    assert_eq!(handler.status(), "INSERT 0 1");

    let select = format!("select comment from {table}");
    let list = handler
        .execute_query(ExecuteOptions::new().query(select.clone()).fetch_all(true))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(list, vec![FetchedRow::List(vec![Value::from(comment)])]);

    let map = handler
        .execute_query(
            ExecuteOptions::new()
                .query(select)
                .fetch_all(true)
                .return_type(ReturnType::Map),
        )
        .await
        .unwrap()
        .unwrap();
    let expected: BTreeMap<String, Value> = [("comment".to_string(), Value::from(comment))].into();
    assert_eq!(map, vec![FetchedRow::Map(expected)]);

    handler.close().await.unwrap();
}

#[tokio::test]
async fn test_partial_fetch_leaves_remaining_rows() {
    let Some(mut handler) = test_handler().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };
    let table = scratch_table("partial_fetch");
    create_notes(&mut handler, &table).await;

    let params = (1..=120)
        .map(|i| vec![Value::from(format!("comment {i}"))])
        .collect();
    handler
        .execute_query(
            ExecuteOptions::new()
                .query(format!("insert into {table} (comment) values %s"))
                .boost(BoostType::Values, params),
        )
        .await
        .unwrap();

    handler
        .execute_query(ExecuteOptions::new().query(format!("select comment from {table} order by id")))
        .await
        .unwrap();
    assert!(handler.response_is_empty());

    let first = handler.fetch(Some(32), ReturnType::List).unwrap();
    assert_eq!(first.len(), 32);
    assert_eq!(handler.unfetched_count(), 88);
    assert!(!handler.all_fetched());

    let rest = handler.fetch(None, ReturnType::List).unwrap();
    assert_eq!(rest.len(), 88);
    assert_eq!(handler.unfetched_count(), 0);
    assert!(handler.all_fetched());

    handler.close().await.unwrap();
}

#[tokio::test]
async fn test_batch_mode_inserts_every_row() {
    let Some(mut handler) = test_handler().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };
    let table = scratch_table("batch");
    create_notes(&mut handler, &table).await;

    let params = (1..=150).map(|i| vec![Value::Int(i), Value::from("x")]).collect();
    handler
        .execute_query(
            ExecuteOptions::new()
                .query(format!("insert into {table} (id, comment) values %s"))
                .boost(BoostType::Batch, params),
        )
        .await
        .unwrap();

    let rows = handler
        .execute_query(
            ExecuteOptions::new()
                .query(format!("select count(*) from {table}"))
                .fetch_all(true),
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(rows[0].get_index(0), Some(&Value::Int(150)));

    handler.close().await.unwrap();
}

#[tokio::test]
async fn test_values_without_placeholder_is_boost_error() {
    let Some(mut handler) = test_handler().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };
    let table = scratch_table("no_placeholder");
    create_notes(&mut handler, &table).await;

    let error = handler
        .execute_query(
            ExecuteOptions::new()
                .query(format!("insert into {table} (comment) values ('x')"))
                .boost(BoostType::Values, vec![vec![Value::from("y")]]),
        )
        .await
        .unwrap_err();
    assert!(matches!(error, HandlerError::BoostMode { .. }));
    assert!(!handler.current_query_is_executed());

    handler.close().await.unwrap();
}

#[tokio::test]
async fn test_get_columns_in_ordinal_order() {
    let Some(mut handler) = test_handler().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };
    let table = scratch_table("columns");
    create_notes(&mut handler, &table).await;

    let columns = handler.get_columns(&table).await.unwrap();
    assert_eq!(columns, vec!["id", "comment"]);

    handler.close().await.unwrap();
}

#[tokio::test]
async fn test_sql_error_is_query_error() {
    let Some(mut handler) = test_handler().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let error = handler
        .execute_query(ExecuteOptions::new().query("select * from nonexistent_table_xyz"))
        .await
        .unwrap_err();
    assert!(matches!(error, HandlerError::Query(_)));
    assert!(!handler.current_query_is_executed());

    handler.close().await.unwrap();
}
