use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Main error type for the MCP query engine
#[derive(Debug, Error)]
pub enum McpError {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    Compilation(#[from] CompilationError),

    #[error("{0}")]
    Storage(#[from] StorageError),

    #[error("query not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Request rejected against the schema registry
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("entity '{0}' not found")]
    UnknownEntity(String),

    #[error("{context} field '{field}' not found in entity '{entity}'")]
    UnknownField {
        entity: String,
        field: String,
        context: FieldContext,
    },

    #[error("invalid filter operator: {0}")]
    InvalidOperator(String),

    #[error("invalid join type: {0}")]
    InvalidJoinType(String),

    #[error("invalid order direction: {0}")]
    InvalidOrderDirection(String),

    #[error("invalid aggregate function: {0}")]
    InvalidAggregateFunction(String),
}

/// Clause a field reference was found in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldContext {
    Select,
    Filter,
    OrderBy,
    Aggregate,
}

impl std::fmt::Display for FieldContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldContext::Select => write!(f, "select"),
            FieldContext::Filter => write!(f, "filter"),
            FieldContext::OrderBy => write!(f, "order by"),
            FieldContext::Aggregate => write!(f, "aggregate"),
        }
    }
}

/// Errors raised while turning a request into query text
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompilationError {
    #[error("invalid value for {operator} operator on '{field}': {reason}")]
    MalformedFilterValue {
        field: String,
        operator: String,
        reason: String,
    },

    #[error("unsupported operator: {0}")]
    UnsupportedOperator(String),

    #[error("invalid filter logic: {0}")]
    InvalidLogic(String),
}

/// Storage collaborator errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StorageError {
    #[error("Database connection not available - running in schema-only mode")]
    Unavailable,

    #[error("Connection to storage failed: {0}")]
    ConnectionFailed(String),

    /// Backend message, passed through untouched
    #[error("{0}")]
    ExecutionFailed(String),

    #[error("query timed out after {0:?}")]
    Timeout(Duration),

    /// The caller stopped waiting before storage answered
    #[error("query cancelled before completion")]
    Cancelled,
}

/// Flat classification of a failure, recorded on failed responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnknownEntity,
    UnknownField,
    InvalidOperator,
    InvalidJoinType,
    InvalidOrderDirection,
    InvalidAggregateFunction,
    MalformedFilterValue,
    StorageUnavailable,
    StorageExecutionFailed,
    StorageTimeout,
    NotFound,
    Internal,
}

impl McpError {
    /// Classify this error into its externally visible kind
    pub fn kind(&self) -> ErrorKind {
        match self {
            McpError::Validation(e) => match e {
                ValidationError::UnknownEntity(_) => ErrorKind::UnknownEntity,
                ValidationError::UnknownField { .. } => ErrorKind::UnknownField,
                ValidationError::InvalidOperator(_) => ErrorKind::InvalidOperator,
                ValidationError::InvalidJoinType(_) => ErrorKind::InvalidJoinType,
                ValidationError::InvalidOrderDirection(_) => ErrorKind::InvalidOrderDirection,
                ValidationError::InvalidAggregateFunction(_) => ErrorKind::InvalidAggregateFunction,
            },
            McpError::Compilation(e) => match e {
                CompilationError::MalformedFilterValue { .. } => ErrorKind::MalformedFilterValue,
                CompilationError::UnsupportedOperator(_) => ErrorKind::InvalidOperator,
                CompilationError::InvalidLogic(_) => ErrorKind::InvalidOperator,
            },
            McpError::Storage(e) => match e {
                StorageError::Unavailable => ErrorKind::StorageUnavailable,
                StorageError::ConnectionFailed(_) | StorageError::ExecutionFailed(_) => {
                    ErrorKind::StorageExecutionFailed
                }
                StorageError::Timeout(_) | StorageError::Cancelled => ErrorKind::StorageTimeout,
            },
            McpError::NotFound(_) => ErrorKind::NotFound,
            McpError::Configuration(_) | McpError::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// Result type alias for engine operations
pub type McpResult<T> = Result<T, McpError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_converts_and_keeps_message() {
        let error: McpError = ValidationError::UnknownEntity("laptops".to_string()).into();

        assert_eq!(error.to_string(), "entity 'laptops' not found");
        assert_eq!(error.kind(), ErrorKind::UnknownEntity);
    }

    #[test]
    fn test_unknown_field_message_names_context() {
        let error = ValidationError::UnknownField {
            entity: "devices".to_string(),
            field: "ram".to_string(),
            context: FieldContext::OrderBy,
        };

        assert_eq!(error.to_string(), "order by field 'ram' not found in entity 'devices'");
    }

    #[test]
    fn test_storage_execution_message_is_verbatim() {
        let message = "ERROR: column devices.nope does not exist";
        let error: McpError = StorageError::ExecutionFailed(message.to_string()).into();

        assert_eq!(error.to_string(), message);
        assert_eq!(error.kind(), ErrorKind::StorageExecutionFailed);
    }

    #[test]
    fn test_error_kind_mapping() {
        let unavailable: McpError = StorageError::Unavailable.into();
        let timeout: McpError = StorageError::Timeout(Duration::from_secs(2)).into();
        let malformed: McpError = CompilationError::MalformedFilterValue {
            field: "os".to_string(),
            operator: "in".to_string(),
            reason: "expected a sequence".to_string(),
        }
        .into();

        assert_eq!(unavailable.kind(), ErrorKind::StorageUnavailable);
        assert_eq!(timeout.kind(), ErrorKind::StorageTimeout);
        assert_eq!(McpError::from(StorageError::Cancelled).kind(), ErrorKind::StorageTimeout);
        assert_eq!(malformed.kind(), ErrorKind::MalformedFilterValue);
        assert_eq!(McpError::NotFound("abc".to_string()).kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_error_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::StorageUnavailable).unwrap();
        assert_eq!(json, "\"storage_unavailable\"");
    }

    #[test]
    fn test_mcp_result_type() {
        let failure: McpResult<String> = Err(McpError::Internal("test error".to_string()));

        match failure {
            Err(McpError::Internal(msg)) => assert_eq!(msg, "test error"),
            _ => panic!("Expected Internal error"),
        }
    }
}
