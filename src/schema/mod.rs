pub mod entities;
pub mod operations;
pub mod types;

pub use types::*;

use chrono::Utc;

pub const SCHEMA_VERSION: &str = "1.0.0";

/// Build the telemetry schema. Called once at engine construction.
pub fn build_schema() -> Schema {
    Schema {
        version: SCHEMA_VERSION.to_string(),
        timestamp: Utc::now(),
        entities: entities::telemetry_entities(),
        relations: entities::telemetry_relations(),
        operations: operations::telemetry_operations(),
    }
}
