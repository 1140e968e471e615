use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use regex::Regex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::connectors::connector_trait::{ColumnValue, ConnectorType, RawRow, StorageConnection};
use crate::utils::{
    error::{McpError, McpResult, StorageError},
    types::CompiledQuery,
};

/// Mock connector for testing with deterministic in-memory data.
///
/// Every call is recorded, so it doubles as a spy: tests can assert a
/// rejected request never reached storage.
#[derive(Debug)]
pub struct MockConnector {
    connected: bool,
    tables: HashMap<String, Vec<RawRow>>,
    delay: Option<Duration>,
    failure: Option<String>,
    calls: AtomicUsize,
    executed: Mutex<Vec<String>>,
}

impl MockConnector {
    /// Create a new mock connector with default telemetry data
    pub fn new() -> Self {
        let mut connector = Self::empty();
        connector.initialize_test_data();
        connector
    }

    /// Connected mock with no tables at all
    pub fn empty() -> Self {
        Self {
            connected: true,
            tables: HashMap::new(),
            delay: None,
            failure: None,
            calls: AtomicUsize::new(0),
            executed: Mutex::new(Vec::new()),
        }
    }

    /// Sleep this long before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fail every execution with the given backend message
    pub fn with_failure(mut self, message: &str) -> Self {
        self.failure = Some(message.to_string());
        self
    }

    pub fn disconnected(mut self) -> Self {
        self.connected = false;
        self
    }

    /// Add or replace the rows of a relation
    pub fn add_table(&mut self, name: &str, rows: Vec<RawRow>) {
        self.tables.insert(name.to_string(), rows);
    }

    /// Number of `execute` calls received
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Inline query text of every call, oldest first
    pub fn executed_queries(&self) -> Vec<String> {
        self.executed.lock().map(|log| log.clone()).unwrap_or_default()
    }

    fn initialize_test_data(&mut self) {
        let device = |id: &str, hostname: &str, os: &str, org_unit: Option<&str>, seen: i64| {
            RawRow::new()
                .with_column("id", ColumnValue::Text(id.to_string()))
                .with_column("hostname", ColumnValue::Text(hostname.to_string()))
                .with_column("os", ColumnValue::Text(os.to_string()))
                .with_column(
                    "org_unit",
                    org_unit.map_or(ColumnValue::Null, |o| ColumnValue::Text(o.to_string())),
                )
                .with_column("last_seen_at", timestamp(seen))
        };
        self.add_table(
            "devices",
            vec![
                device("dev-001", "laptop-001", "Linux", Some("Engineering"), 1_736_937_000),
                device("dev-002", "macbook-007", "Darwin", Some("Design"), 1_736_933_400),
                device("dev-003", "build-agent", "Linux", None, 1_736_929_800),
            ],
        );

        let process = |id: &str, device_id: &str, name: &str, pid: i64, cmdline: &str| {
            RawRow::new()
                .with_column("id", ColumnValue::Text(id.to_string()))
                .with_column("device_id", ColumnValue::Text(device_id.to_string()))
                .with_column("name", ColumnValue::Text(name.to_string()))
                .with_column("pid", ColumnValue::Integer(pid))
                .with_column("cmdline", ColumnValue::Bytes(cmdline.as_bytes().to_vec()))
        };
        self.add_table(
            "processes",
            vec![
                process("proc-001", "dev-001", "nginx", 1234, r#"["nginx","-g","daemon off;"]"#),
                process("proc-002", "dev-003", "sshd", 812, "not json"),
            ],
        );

        let finding = |id: &str, device_id: &str, severity: &str, rule: &str, at: i64| {
            RawRow::new()
                .with_column("id", ColumnValue::Text(id.to_string()))
                .with_column("device_id", ColumnValue::Text(device_id.to_string()))
                .with_column("severity", ColumnValue::Text(severity.to_string()))
                .with_column("rule_name", ColumnValue::Text(rule.to_string()))
                .with_column("timestamp", timestamp(at))
        };
        self.add_table(
            "threat_findings",
            vec![
                finding("thr-001", "dev-001", "critical", "Reverse shell", 1_736_936_000),
                finding("thr-002", "dev-002", "high", "Unsigned binary", 1_736_932_000),
            ],
        );

        self.add_table(
            "containers",
            vec![RawRow::new()
                .with_column("id", ColumnValue::Text("ctr-001".to_string()))
                .with_column("device_id", ColumnValue::Text("dev-003".to_string()))
                .with_column("image", ColumnValue::Text("nginx:latest".to_string()))
                .with_column("labels", ColumnValue::Json(serde_json::json!({"tier": "web"})))],
        );
        self.add_table("browser_sessions", Vec::new());
    }

    fn select_rows(&self, sql: &str) -> McpResult<Vec<RawRow>> {
        let from = pattern(r"(?i)\bFROM\s+([A-Za-z_][A-Za-z0-9_]*)")?;
        let table = from
            .captures(sql)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
            .ok_or_else(|| StorageError::ExecutionFailed("syntax error: missing FROM".to_string()))?;

        let rows = self.tables.get(table).ok_or_else(|| {
            StorageError::ExecutionFailed(format!("relation \"{}\" does not exist", table))
        })?;

        let offset = clause_number(sql, "OFFSET")?.unwrap_or(0);
        let limit = clause_number(sql, "LIMIT")?.unwrap_or(usize::MAX);
        let columns = projected_columns(sql, table)?;

        Ok(rows
            .iter()
            .skip(offset)
            .take(limit)
            .map(|row| match &columns {
                Some(columns) => project(row, columns),
                None => row.clone(),
            })
            .collect())
    }
}

impl Default for MockConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageConnection for MockConnector {
    async fn execute(&self, query: &CompiledQuery) -> McpResult<Vec<RawRow>> {
        if !self.connected {
            return Err(StorageError::ConnectionFailed("Not connected".to_string()).into());
        }

        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut log) = self.executed.lock() {
            log.push(query.sql.clone());
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(message) = &self.failure {
            return Err(StorageError::ExecutionFailed(message.clone()).into());
        }

        self.select_rows(&query.sql)
    }

    fn connector_type(&self) -> ConnectorType {
        ConnectorType::Mock
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

fn pattern(re: &str) -> McpResult<Regex> {
    Regex::new(re).map_err(|e| McpError::Internal(format!("Invalid pattern {}: {}", re, e)))
}

fn timestamp(secs: i64) -> ColumnValue {
    Utc.timestamp_opt(secs, 0)
        .single()
        .map_or(ColumnValue::Null, ColumnValue::Timestamp)
}

fn clause_number(sql: &str, keyword: &str) -> McpResult<Option<usize>> {
    let re = pattern(&format!(r"(?i)\b{}\s+(\d+)", keyword))?;
    Ok(re
        .captures(sql)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok()))
}

/// Plain `table.column` select lists are projected; anything else
/// (aggregates, expressions) returns whole rows.
fn projected_columns(sql: &str, table: &str) -> McpResult<Option<Vec<String>>> {
    let select = pattern(r"(?is)^\s*SELECT\s+(.*?)\s+FROM\s")?;
    let list = match select.captures(sql).and_then(|caps| caps.get(1)) {
        Some(m) => m.as_str(),
        None => return Ok(None),
    };

    let prefix = format!("{}.", table);
    let mut columns = Vec::new();
    for item in list.split(',').map(str::trim) {
        match item.strip_prefix(&prefix) {
            Some(column) if column.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') => {
                columns.push(column.to_string())
            }
            _ => return Ok(None),
        }
    }
    Ok(Some(columns))
}

fn project(row: &RawRow, columns: &[String]) -> RawRow {
    RawRow {
        columns: columns
            .iter()
            .map(|name| {
                let value = row.get(name).cloned().unwrap_or(ColumnValue::Null);
                (name.clone(), value)
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(sql: &str) -> CompiledQuery {
        CompiledQuery {
            sql: sql.to_string(),
            template: sql.to_string(),
            params: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_mock_connector_select_devices() {
        let connector = MockConnector::new();
        let rows = connector.execute(&query("SELECT devices.id, devices.os FROM devices")).await.unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].len(), 2);
        assert_eq!(rows[0].get("os"), Some(&ColumnValue::Text("Linux".to_string())));
        assert_eq!(connector.call_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_connector_limit_and_offset() {
        let connector = MockConnector::new();
        let rows = connector
            .execute(&query("SELECT devices.id FROM devices ORDER BY devices.id ASC LIMIT 1 OFFSET 1"))
            .await
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("id"), Some(&ColumnValue::Text("dev-002".to_string())));
    }

    #[tokio::test]
    async fn test_mock_connector_aggregate_returns_whole_rows() {
        let connector = MockConnector::new();
        let rows = connector
            .execute(&query("SELECT devices.os, COUNT(*) AS count_all FROM devices GROUP BY os"))
            .await
            .unwrap();
        assert_eq!(rows[0].len(), 5);
    }

    #[tokio::test]
    async fn test_mock_connector_unknown_relation() {
        let connector = MockConnector::new();
        match connector.execute(&query("SELECT * FROM laptops")).await {
            Err(McpError::Storage(StorageError::ExecutionFailed(msg))) => {
                assert_eq!(msg, "relation \"laptops\" does not exist")
            }
            other => panic!("Expected ExecutionFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_mock_connector_failure_and_log() {
        let connector = MockConnector::new().with_failure("deadlock detected");
        let result = connector.execute(&query("SELECT devices.id FROM devices")).await;

        assert!(matches!(result, Err(McpError::Storage(StorageError::ExecutionFailed(_)))));
        assert_eq!(connector.executed_queries(), vec!["SELECT devices.id FROM devices".to_string()]);
    }

    #[tokio::test]
    async fn test_mock_connector_disconnected() {
        let connector = MockConnector::new().disconnected();
        assert!(!connector.is_connected());

        let result = connector.execute(&query("SELECT devices.id FROM devices")).await;
        assert!(matches!(result, Err(McpError::Storage(StorageError::ConnectionFailed(_)))));
        assert_eq!(connector.call_count(), 0);
    }
}
