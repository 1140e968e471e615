use smartsec_mcp::{
    connectors::{ColumnValue, MockConnector, RawRow, StorageConnection},
    engine::{compile, QueryExecutor},
    schema::build_schema,
    utils::{
        error::{McpError, StorageError},
        types::{CompiledQuery, FieldValue, QueryRequest},
    },
};
use std::sync::Arc;
use std::time::Duration;

fn compiled(request: &QueryRequest) -> CompiledQuery {
    let schema = build_schema();
    compile(request, schema.entity(&request.entity).unwrap()).unwrap()
}

#[tokio::test]
async fn test_query_executor_compiled_request() {
    let executor = QueryExecutor::new(Some(Arc::new(MockConnector::new())));

    let request = QueryRequest::new("devices").with_fields(&["id", "hostname"]).with_limit(2);
    let outcome = executor.execute(&compiled(&request)).await.unwrap();

    assert_eq!(outcome.row_count, 2);
    assert_eq!(outcome.records.len(), 2);
    assert_eq!(outcome.records[0].len(), 2);
    assert_eq!(outcome.records[0]["hostname"], FieldValue::from("laptop-001"));
}

#[tokio::test]
async fn test_query_executor_offset_past_end() {
    let executor = QueryExecutor::new(Some(Arc::new(MockConnector::new())));

    let request = QueryRequest::new("devices").with_fields(&["id"]).with_offset(10);
    let outcome = executor.execute(&compiled(&request)).await.unwrap();

    assert_eq!(outcome.row_count, 0);
    assert!(outcome.records.is_empty());
}

#[tokio::test]
async fn test_query_executor_empty_relation() {
    let executor = QueryExecutor::new(Some(Arc::new(MockConnector::new())));

    let outcome = executor
        .execute(&compiled(&QueryRequest::new("browser_sessions")))
        .await
        .unwrap();

    assert_eq!(outcome.row_count, 0);
}

#[tokio::test]
async fn test_query_executor_custom_table() {
    let mut mock = MockConnector::empty();
    mock.add_table(
        "containers",
        vec![RawRow::new()
            .with_column("id", ColumnValue::Text("ctr-9".to_string()))
            .with_column("ports", ColumnValue::Bytes(b"[80, 443]".to_vec()))],
    );
    let executor = QueryExecutor::new(Some(Arc::new(mock)));

    let request = QueryRequest::new("containers").with_fields(&["id", "ports"]);
    let outcome = executor.execute(&compiled(&request)).await.unwrap();

    assert_eq!(
        outcome.records[0]["ports"],
        FieldValue::Sequence(vec![FieldValue::Integer(80), FieldValue::Integer(443)])
    );
}

#[tokio::test]
async fn test_query_executor_disconnected_storage() {
    let storage: Arc<dyn StorageConnection> = Arc::new(MockConnector::new().disconnected());
    let executor = QueryExecutor::new(Some(storage));

    assert!(!executor.is_connected());
    let result = executor.execute(&compiled(&QueryRequest::new("devices"))).await;
    assert!(matches!(result, Err(McpError::Storage(StorageError::ConnectionFailed(_)))));
}

#[tokio::test]
async fn test_query_executor_within_timeout() {
    let storage = MockConnector::new().with_delay(Duration::from_millis(10));
    let executor = QueryExecutor::new(Some(Arc::new(storage))).with_timeout(Some(Duration::from_secs(5)));

    let outcome = executor.execute(&compiled(&QueryRequest::new("devices"))).await.unwrap();

    assert_eq!(outcome.row_count, 3);
    assert!(outcome.elapsed >= Duration::from_millis(10));
}

#[test]
fn test_query_executor_from_blocking_caller() {
    let executor = QueryExecutor::new(Some(Arc::new(MockConnector::new())));
    let query = compiled(&QueryRequest::new("threat_findings").with_fields(&["id", "severity"]));

    let outcome = tokio_test::block_on(executor.execute(&query)).unwrap();

    assert_eq!(outcome.row_count, 2);
    assert_eq!(outcome.records[0]["severity"], FieldValue::from("critical"));
}
