use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::connectors::{ColumnValue, RawRow, StorageConnection};
use crate::utils::{
    error::{McpResult, StorageError},
    types::{format_timestamp, CompiledQuery, FieldValue, Record},
};

/// Rows produced by one storage round trip
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionOutcome {
    pub records: Vec<Record>,
    pub row_count: usize,
    pub elapsed: Duration,
}

/// Runs compiled queries against the storage collaborator
pub struct QueryExecutor {
    /// Absent in schema-only mode
    storage: Option<Arc<dyn StorageConnection>>,
    timeout: Option<Duration>,
}

impl QueryExecutor {
    /// Create a query executor over an optional storage connection
    pub fn new(storage: Option<Arc<dyn StorageConnection>>) -> Self {
        Self { storage, timeout: None }
    }

    /// Deadline for the storage round trip
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Whether storage is provisioned and reports itself connected
    pub fn is_connected(&self) -> bool {
        self.storage.as_ref().map_or(false, |storage| storage.is_connected())
    }

    /// Execute a compiled query and reshape its rows into records
    pub async fn execute(&self, query: &CompiledQuery) -> McpResult<ExecutionOutcome> {
        self.execute_with_deadline(query, None).await
    }

    /// Like `execute`, bounded by the shorter of the configured timeout and `deadline`
    pub async fn execute_with_deadline(
        &self,
        query: &CompiledQuery,
        deadline: Option<Duration>,
    ) -> McpResult<ExecutionOutcome> {
        let storage = self.storage.as_ref().ok_or(StorageError::Unavailable)?;

        let limit = match (self.timeout, deadline) {
            (Some(configured), Some(deadline)) => Some(configured.min(deadline)),
            (configured, deadline) => configured.or(deadline),
        };

        let start_time = Instant::now();
        let rows = match limit {
            Some(limit) => tokio::time::timeout(limit, storage.execute(query))
                .await
                .map_err(|_| StorageError::Timeout(limit))??,
            None => storage.execute(query).await?,
        };
        let elapsed = start_time.elapsed();

        let records: Vec<Record> = rows.into_iter().map(reshape_row).collect();
        Ok(ExecutionOutcome {
            row_count: records.len(),
            records,
            elapsed,
        })
    }
}

/// Key a raw row by column name. Null columns stay in the record.
pub fn reshape_row(row: RawRow) -> Record {
    row.columns
        .into_iter()
        .map(|(name, value)| (name, reshape_value(value)))
        .collect()
}

fn reshape_value(value: ColumnValue) -> FieldValue {
    match value {
        ColumnValue::Text(s) => FieldValue::String(s),
        ColumnValue::Integer(i) => FieldValue::Integer(i),
        ColumnValue::Float(f) => FieldValue::Float(f),
        ColumnValue::Boolean(b) => FieldValue::Boolean(b),
        ColumnValue::Timestamp(ts) => FieldValue::String(format_timestamp(&ts)),
        ColumnValue::Json(json) => FieldValue::from(json),
        // Opaque payloads are usually JSON written by the ingestion side
        ColumnValue::Bytes(bytes) => match serde_json::from_slice::<JsonValue>(&bytes) {
            Ok(json) => FieldValue::from(json),
            Err(_) => FieldValue::String(String::from_utf8_lossy(&bytes).into_owned()),
        },
        ColumnValue::Null => FieldValue::Null,
    }
}
