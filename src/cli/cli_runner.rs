use clap::Parser;
use std::path::Path;

use crate::cli::{CliArgs, Commands, OutputFormat, OutputFormatter};
use crate::engine::QueryEngine;
use crate::utils::{
    config::EngineConfig,
    error::{McpError, McpResult},
    logging::init_logging,
    types::{QueryRequest, QueryStatus},
};

/// Main CLI runner that handles command execution
pub struct CliRunner {
    engine: QueryEngine,
}

impl CliRunner {
    /// Create a runner, connecting to storage when a database is configured
    pub async fn new(config: EngineConfig) -> Self {
        Self {
            engine: QueryEngine::from_config(config).await,
        }
    }

    /// Create a runner around an existing engine
    pub fn with_engine(engine: QueryEngine) -> Self {
        Self { engine }
    }

    /// Execute a request; the bool is false when the query failed
    pub async fn execute_query(&self, raw: &str, format: &OutputFormat, verbose: bool) -> McpResult<(String, bool)> {
        let request = parse_request(raw)?;

        if verbose {
            eprintln!("{}", OutputFormatter::format_info(&format!("Querying entity '{}'", request.entity)));
        }

        let response = self.engine.execute_query(request).await;

        if verbose {
            if let Some(sql) = &response.metadata.sql {
                eprintln!("{}", OutputFormatter::format_info(&format!("SQL: {}", sql)));
            }
            eprintln!(
                "{}",
                OutputFormatter::format_info(&format!("Query {} finished as {:?}", response.id, response.status))
            );
        }

        let succeeded = response.status == QueryStatus::Completed;
        Ok((OutputFormatter::format_response(&response, format), succeeded))
    }

    /// Validate a request without executing it
    pub fn validate_query(&self, raw: &str) -> McpResult<String> {
        let request = parse_request(raw)?;
        self.engine.validate_query(&request)?;
        Ok(OutputFormatter::format_success(&format!("Request against '{}' is valid", request.entity)))
    }

    pub fn show_schema(&self) -> McpResult<String> {
        self.engine.get_schema().to_json()
    }

    pub fn list_entities(&self, detailed: bool) -> String {
        OutputFormatter::format_entities(&self.engine.list_entities(), detailed)
    }

    pub fn show_entity(&self, name: &str) -> McpResult<String> {
        Ok(OutputFormatter::format_entity(self.engine.get_entity(name)?))
    }

    pub fn show_examples(&self, entity: Option<&str>) -> String {
        OutputFormatter::format_examples(&self.engine.query_examples(entity))
    }

    pub fn show_health(&self) -> String {
        OutputFormatter::format_health(&self.engine.health())
    }
}

/// Inline JSON, or `@path` naming a JSON file
pub fn parse_request(raw: &str) -> McpResult<QueryRequest> {
    let content = match raw.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)
            .map_err(|e| McpError::Configuration(format!("Failed to read request file {}: {}", path, e)))?,
        None => raw.to_string(),
    };
    serde_json::from_str(&content)
        .map_err(|e| McpError::Configuration(format!("Invalid query request: {}", e)))
}

/// Main entry point for CLI execution
pub async fn run_cli() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    let mut config = match EngineConfig::load(args.config.as_deref().map(Path::new)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", OutputFormatter::format_error(&e));
            std::process::exit(1);
        }
    };
    if let Some(url) = args.database_url {
        config.storage.database_url = Some(url);
    }

    init_logging(&config.logging);

    // Only queries need storage
    if !matches!(args.command, Commands::Query { .. } | Commands::Health) {
        config.storage.database_url = None;
    }
    let runner = CliRunner::new(config).await;

    let result = match args.command {
        Commands::Schema => runner.show_schema(),
        Commands::Entities { detailed } => Ok(runner.list_entities(detailed)),
        Commands::Entity { name } => runner.show_entity(&name),
        Commands::Examples { entity } => Ok(runner.show_examples(entity.as_deref())),
        Commands::Validate { request } => runner.validate_query(&request),
        Commands::Health => Ok(runner.show_health()),
        Commands::Query { request, format, verbose } => match runner.execute_query(&request, &format, verbose).await {
            Ok((output, true)) => Ok(output),
            Ok((output, false)) => {
                println!("{}", output);
                std::process::exit(1);
            }
            Err(e) => Err(e),
        },
    };

    match result {
        Ok(output) => {
            println!("{}", output);
            Ok(())
        }
        Err(e) => {
            eprintln!("{}", OutputFormatter::format_error(&e));
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectors::MockConnector;
    use std::io::Write;
    use std::sync::Arc;

    fn runner() -> CliRunner {
        CliRunner::with_engine(QueryEngine::new(
            EngineConfig::default(),
            Some(Arc::new(MockConnector::new())),
        ))
    }

    #[test]
    fn test_parse_request_inline_and_file() {
        let inline = parse_request(r#"{"entity": "devices", "limit": 5}"#).unwrap();
        assert_eq!(inline.limit, Some(5));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"entity": "processes"}}"#).unwrap();
        let from_file = parse_request(&format!("@{}", file.path().display())).unwrap();
        assert_eq!(from_file.entity, "processes");

        assert!(matches!(parse_request("{not json"), Err(McpError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_execute_query_json() {
        let (output, succeeded) = runner()
            .execute_query(r#"{"entity": "devices", "fields": ["id"]}"#, &OutputFormat::Json, false)
            .await
            .unwrap();

        assert!(succeeded);
        let json: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(json["metadata"]["row_count"], 3);
    }

    #[test]
    fn test_validate_query_reports_error() {
        let result = runner().validate_query(r#"{"entity": "laptops"}"#);
        match result {
            Err(McpError::Validation(e)) => assert_eq!(e.to_string(), "entity 'laptops' not found"),
            other => panic!("Expected validation error, got {:?}", other),
        }
    }
}
