use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use crate::utils::{error::McpResult, types::CompiledQuery};

/// Kind of storage backend behind a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectorType {
    PostgreSQL,
    Mock,
}

impl std::fmt::Display for ConnectorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectorType::PostgreSQL => write!(f, "postgresql"),
            ConnectorType::Mock => write!(f, "mock"),
        }
    }
}

/// Column value as decoded by a backend, before reshaping into a record
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Timestamp(DateTime<Utc>),
    Json(JsonValue),
    /// Opaque payload; may hold embedded JSON
    Bytes(Vec<u8>),
    Null,
}

/// A row as returned by the backend: named columns in result order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow {
    pub columns: Vec<(String, ColumnValue)>,
}

impl RawRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_column(mut self, name: &str, value: ColumnValue) -> Self {
        self.columns.push((name.to_string(), value));
        self
    }

    pub fn get(&self, name: &str) -> Option<&ColumnValue> {
        self.columns.iter().find(|(column, _)| column == name).map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Pooled, thread-safe handle able to run compiled queries
#[async_trait]
pub trait StorageConnection: Send + Sync {
    /// Run a compiled query and return its rows
    async fn execute(&self, query: &CompiledQuery) -> McpResult<Vec<RawRow>>;

    /// Get the type of this connector
    fn connector_type(&self) -> ConnectorType;

    /// Check if the connector is currently connected
    fn is_connected(&self) -> bool;
}
