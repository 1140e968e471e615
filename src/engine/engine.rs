use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    connectors::{PostgresConnector, StorageConnection},
    engine::{
        query_compiler::compile,
        query_executor::{ExecutionOutcome, QueryExecutor},
        query_validator::validate,
        result_store::ResultStore,
    },
    schema::{build_schema, Entity, OperationExample, Schema},
    utils::{
        config::EngineConfig,
        error::{McpError, McpResult, StorageError, ValidationError},
        types::{CompiledQuery, QueryRequest, QueryResponse},
    },
};

pub const SERVICE_NAME: &str = "smartsec-mcp";

/// Main query engine: validates, compiles and executes structured queries
/// and keeps their responses addressable by id
pub struct QueryEngine {
    /// Engine configuration
    config: EngineConfig,
    /// Schema registry, built once
    schema: Arc<Schema>,
    /// Storage round trips
    executor: QueryExecutor,
    /// Responses by request id
    results: Arc<ResultStore>,
    /// Running eviction task
    sweeper: Option<JoinHandle<()>>,
    /// Shutdown signal
    shutdown_signal: Option<broadcast::Sender<()>>,
}

/// Snapshot reported by `health`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub service: String,
    pub version: String,
    pub schema_version: String,
    pub timestamp: DateTime<Utc>,
    pub storage_connected: bool,
    pub cached_results: usize,
}

/// Running response stored for the lifetime of one execution.
/// Dropped without `finish`, it stores the response as cancelled.
struct InFlight<'a> {
    results: &'a ResultStore,
    pending: Option<QueryResponse>,
}

impl<'a> InFlight<'a> {
    fn start(results: &'a ResultStore, running: QueryResponse) -> Self {
        results.put(running.clone());
        Self {
            results,
            pending: Some(running),
        }
    }

    fn finish(&mut self, terminal: QueryResponse) {
        self.pending = None;
        self.results.put(terminal);
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if let Some(mut response) = self.pending.take() {
            warn!(query_id = %response.id, "Query dropped before completion");
            response.fail(&McpError::from(StorageError::Cancelled));
            self.results.put(response);
        }
    }
}

impl QueryEngine {
    /// Create an engine over an optional storage connection; `None` means schema-only mode
    pub fn new(config: EngineConfig, storage: Option<Arc<dyn StorageConnection>>) -> Self {
        let executor = QueryExecutor::new(storage).with_timeout(config.storage.query_timeout());

        Self {
            config,
            schema: Arc::new(build_schema()),
            executor,
            results: Arc::new(ResultStore::new()),
            sweeper: None,
            shutdown_signal: None,
        }
    }

    /// Connect to the configured database. Failure to connect degrades to schema-only mode.
    pub async fn from_config(config: EngineConfig) -> Self {
        let storage: Option<Arc<dyn StorageConnection>> = match config.storage.database_url {
            Some(_) => {
                let mut connector = PostgresConnector::new();
                match connector.connect(&config.storage).await {
                    Ok(()) => Some(Arc::new(connector)),
                    Err(e) => {
                        warn!(error = %e, "Failed to connect to database, running in schema-only mode");
                        None
                    }
                }
            }
            None => {
                warn!("No database configured, running in schema-only mode");
                None
            }
        };

        Self::new(config, storage)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run one request through validation, compilation and execution.
    ///
    /// Always returns a response carrying the request id; failures are
    /// recorded on it rather than returned as errors. If the returned future
    /// is dropped before it resolves, the stored response is failed as cancelled.
    pub async fn execute_query(&self, request: QueryRequest) -> QueryResponse {
        self.execute_query_within(request, None).await
    }

    /// `execute_query` with a caller deadline on the storage round trip.
    /// The configured query timeout still applies when it is shorter.
    pub async fn execute_query_with_deadline(&self, request: QueryRequest, deadline: Duration) -> QueryResponse {
        self.execute_query_within(request, Some(deadline)).await
    }

    async fn execute_query_within(&self, mut request: QueryRequest, deadline: Option<Duration>) -> QueryResponse {
        if request.id.is_empty() {
            request.id = Uuid::new_v4().to_string();
        }
        let created_at = Utc::now();
        request.created_at = Some(created_at);

        let mut response = QueryResponse::running(&request.id, created_at);
        let mut in_flight = InFlight::start(&self.results, response.clone());

        match self.run(&request, deadline).await {
            Ok((compiled, outcome)) => {
                debug!(
                    query_id = %response.id,
                    rows = outcome.row_count,
                    elapsed_ms = outcome.elapsed.as_millis() as u64,
                    "Query completed"
                );
                response.metadata.sql = Some(compiled.sql);
                response.complete(outcome.records, outcome.elapsed);
            }
            Err(e) => {
                error!(query_id = %response.id, entity = %request.entity, error = %e, "Query failed");
                response.fail(&e);
            }
        }

        in_flight.finish(response.clone());
        response
    }

    async fn run(
        &self,
        request: &QueryRequest,
        deadline: Option<Duration>,
    ) -> McpResult<(CompiledQuery, ExecutionOutcome)> {
        validate(request, &self.schema)?;
        let entity = self
            .schema
            .entity(&request.entity)
            .ok_or_else(|| ValidationError::UnknownEntity(request.entity.clone()))?;
        let compiled = compile(request, entity)?;
        let outcome = self.executor.execute_with_deadline(&compiled, deadline).await?;
        Ok((compiled, outcome))
    }

    /// Look up a stored response by id
    pub fn get_query_result(&self, id: &str) -> McpResult<QueryResponse> {
        self.results.get(id)
    }

    /// Pre-flight check without executing
    pub fn validate_query(&self, request: &QueryRequest) -> Result<(), ValidationError> {
        validate(request, &self.schema)
    }

    /// Schema snapshot with a fresh timestamp
    pub fn get_schema(&self) -> Schema {
        self.schema.refreshed()
    }

    pub fn list_entities(&self) -> Vec<&Entity> {
        self.schema.entities.values().collect()
    }

    pub fn get_entity(&self, name: &str) -> McpResult<&Entity> {
        self.schema
            .entity(name)
            .ok_or_else(|| ValidationError::UnknownEntity(name.to_string()).into())
    }

    /// Documentation examples, optionally only those querying `entity`
    pub fn query_examples(&self, entity: Option<&str>) -> Vec<&OperationExample> {
        self.schema
            .examples()
            .filter(|example| entity.map_or(true, |name| example.request.entity == name))
            .collect()
    }

    pub fn health(&self) -> HealthStatus {
        HealthStatus {
            status: "healthy".to_string(),
            service: SERVICE_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            schema_version: self.schema.version.clone(),
            timestamp: Utc::now(),
            storage_connected: self.executor.is_connected(),
            cached_results: self.results.len(),
        }
    }

    pub fn result_store(&self) -> Arc<ResultStore> {
        Arc::clone(&self.results)
    }

    /// Drop responses older than the configured retention
    pub fn evict_expired(&self) -> usize {
        sweep(&self.results, self.config.cache.retention())
    }

    /// Spawn the periodic eviction task. Needs a running tokio runtime.
    pub fn start_eviction_sweeper(&mut self) {
        if self.sweeper.is_some() {
            return;
        }

        let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);
        let results = Arc::clone(&self.results);
        let retention = self.config.cache.retention();
        let interval = self.config.cache.sweep_interval();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = sweep(&results, retention);
                        if removed > 0 {
                            info!(removed, remaining = results.len(), "Evicted expired query results");
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }
        });

        info!(interval_secs = interval.as_secs(), "Started result eviction sweeper");
        self.shutdown_signal = Some(shutdown_tx);
        self.sweeper = Some(task);
    }

    /// Stop background tasks
    pub async fn shutdown(&mut self) {
        if let Some(shutdown_tx) = self.shutdown_signal.take() {
            let _ = shutdown_tx.send(());
        }
        if let Some(task) = self.sweeper.take() {
            let _ = task.await;
        }
    }
}

fn sweep(results: &ResultStore, retention: Duration) -> usize {
    match expiry_cutoff(retention) {
        Some(cutoff) => results.evict_older_than(cutoff),
        None => 0,
    }
}

fn expiry_cutoff(retention: Duration) -> Option<DateTime<Utc>> {
    let retention = chrono::Duration::from_std(retention).ok()?;
    Utc::now().checked_sub_signed(retention)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectors::MockConnector;
    use crate::utils::error::ErrorKind;
    use crate::utils::types::{Filter, QueryStatus};

    fn engine_with_mock() -> QueryEngine {
        QueryEngine::new(EngineConfig::default(), Some(Arc::new(MockConnector::new())))
    }

    #[tokio::test]
    async fn test_execute_query_assigns_id_and_completes() {
        let engine = engine_with_mock();
        let response = engine
            .execute_query(QueryRequest::new("devices").with_fields(&["id", "os"]))
            .await;

        assert!(!response.id.is_empty());
        assert_eq!(response.status, QueryStatus::Completed);
        assert_eq!(response.metadata.row_count, 3);
        assert_eq!(
            response.metadata.sql.as_deref(),
            Some("SELECT devices.id, devices.os FROM devices")
        );
        assert!(response.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_caller_id_is_kept() {
        let engine = engine_with_mock();
        let response = engine
            .execute_query(QueryRequest::new("devices").with_id("my-query"))
            .await;
        assert_eq!(response.id, "my-query");
        assert_eq!(engine.get_query_result("my-query").unwrap(), response);
    }

    #[tokio::test]
    async fn test_compile_error_recorded() {
        let engine = engine_with_mock();
        let request = QueryRequest::new("devices").with_filter(Filter::new("os", "in", "Linux"));

        let response = engine.execute_query(request).await;

        assert_eq!(response.status, QueryStatus::Failed);
        assert_eq!(response.error_kind, Some(ErrorKind::MalformedFilterValue));
    }

    #[test]
    fn test_documentation_helpers() {
        let engine = QueryEngine::new(EngineConfig::default(), None);

        assert_eq!(engine.list_entities().len(), 5);
        assert_eq!(engine.get_entity("containers").unwrap().name, "containers");
        assert!(engine.get_entity("laptops").is_err());
        assert_eq!(engine.query_examples(None).len(), 3);

        let threat_examples = engine.query_examples(Some("threat_findings"));
        assert_eq!(threat_examples.len(), 1);
        assert_eq!(threat_examples[0].name, "critical_threats");
        assert!(engine.query_examples(Some("browser_sessions")).is_empty());
    }

    #[test]
    fn test_health_without_storage() {
        let engine = QueryEngine::new(EngineConfig::default(), None);
        let health = engine.health();

        assert_eq!(health.service, SERVICE_NAME);
        assert!(!health.storage_connected);
        assert_eq!(health.cached_results, 0);
    }

    #[test]
    fn test_schema_timestamp_refreshes() {
        let engine = QueryEngine::new(EngineConfig::default(), None);
        let first = engine.get_schema();
        let second = engine.get_schema();

        assert!(second.timestamp >= first.timestamp);
        assert_eq!(first.entities, second.entities);
    }

    #[tokio::test]
    async fn test_sweeper_start_and_shutdown() {
        let mut engine = engine_with_mock();
        engine.start_eviction_sweeper();
        engine.start_eviction_sweeper();
        assert!(engine.sweeper.is_some());

        engine.shutdown().await;
        assert!(engine.sweeper.is_none());
        assert!(engine.shutdown_signal.is_none());
    }

    #[test]
    fn test_expiry_cutoff_out_of_range() {
        assert!(expiry_cutoff(Duration::from_secs(u64::MAX)).is_none());
        assert!(expiry_cutoff(Duration::from_secs(60)).is_some());
    }
}
