use serde_json::json;
use std::collections::BTreeMap;

use super::types::{Field, FieldType, Operation, OperationExample, Parameter, ResponseSchema};
use crate::utils::types::{Filter, QueryRequest};

const QUERY_PATH: &str = "/mcp/query";

/// Illustrative per-entity query operations with example requests
pub fn telemetry_operations() -> BTreeMap<String, Operation> {
    [
        operation(
            "query_devices",
            "Query devices with filtering, joins and pagination",
            OperationExample {
                name: "linux_devices".to_string(),
                description: "Get all Linux devices".to_string(),
                request: QueryRequest::new("devices")
                    .with_fields(&["id", "hostname", "os", "last_seen_at"])
                    .with_filter(Filter::new("os", "eq", "Linux"))
                    .with_order("last_seen_at", "desc")
                    .with_limit(10),
                response: None,
            },
        ),
        operation(
            "query_processes",
            "Query processes with optional device information",
            OperationExample {
                name: "processes_with_devices".to_string(),
                description: "Get recent processes together with their devices".to_string(),
                request: QueryRequest::new("processes")
                    .with_fields(&["id", "name", "pid", "exe_path", "device_id"])
                    .with_join("devices", "inner", "processes.device_id = devices.id")
                    .with_order("collected_at", "desc")
                    .with_limit(50),
                response: None,
            },
        ),
        operation(
            "query_threats",
            "Query threat findings by severity and time",
            OperationExample {
                name: "critical_threats".to_string(),
                description: "Get critical threats".to_string(),
                request: QueryRequest::new("threat_findings")
                    .with_filter(Filter::new("severity", "eq", "critical"))
                    .with_order("timestamp", "desc")
                    .with_limit(20),
                response: None,
            },
        ),
    ]
    .into_iter()
    .map(|op| (op.name.clone(), op))
    .collect()
}

fn operation(name: &str, description: &str, example: OperationExample) -> Operation {
    Operation {
        name: name.to_string(),
        description: description.to_string(),
        method: "POST".to_string(),
        path: QUERY_PATH.to_string(),
        parameters: query_parameters(),
        response: query_response(),
        examples: vec![example],
    }
}

fn query_parameters() -> BTreeMap<String, Parameter> {
    [
        Parameter::new("entity", FieldType::String, true, "Entity to query").with_example(json!("devices")),
        Parameter::new("fields", FieldType::Array, false, "Fields to return; all fields when omitted"),
        Parameter::new("filters", FieldType::Array, false, "Filter conditions"),
        Parameter::new("joins", FieldType::Array, false, "Joins with related entities"),
        Parameter::new("order_by", FieldType::Array, false, "Sort order"),
        Parameter::new("limit", FieldType::Integer, false, "Maximum number of rows").with_example(json!(100)),
        Parameter::new("offset", FieldType::Integer, false, "Number of rows to skip"),
        Parameter::new("aggregates", FieldType::Array, false, "Aggregate functions"),
        Parameter::new("group_by", FieldType::Array, false, "Group by fields"),
    ]
    .into_iter()
    .map(|param| (param.name.clone(), param))
    .collect()
}

fn query_response() -> ResponseSchema {
    let properties = [
        Field::new("id", FieldType::String, true, "Query identifier"),
        Field::new("status", FieldType::String, true, "Query status").with_enum(&["running", "completed", "failed"]),
        Field::new("data", FieldType::Array, false, "Result rows"),
        Field::new("error", FieldType::String, false, "Error message when the query failed"),
        Field::new("metadata", FieldType::Object, true, "Row count, execution time and query text"),
    ]
    .into_iter()
    .map(|field| (field.name.clone(), field))
    .collect();

    ResponseSchema {
        schema_type: "object".to_string(),
        description: "Query response".to_string(),
        properties,
    }
}
