use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

use crate::utils::error::{McpError, McpResult};
use crate::utils::types::QueryRequest;

/// Self-describing schema of everything the query interface can reach
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub entities: BTreeMap<String, Entity>,
    pub relations: BTreeMap<String, Relation>,
    pub operations: BTreeMap<String, Operation>,
}

/// A named relation (table) of typed fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    pub description: String,
    pub fields: BTreeMap<String, Field>,
    pub indexes: Vec<Index>,
    pub relations: Vec<EntityRelation>,
}

/// A field of an entity. Descriptive only; never used to coerce stored values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub required: bool,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<JsonValue>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Integer,
    Float,
    Boolean,
    Datetime,
    Array,
    Object,
}

/// Index declared on an entity; enforcement belongs to the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Index {
    pub name: String,
    pub fields: Vec<String>,
    pub unique: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelationKind {
    #[serde(rename = "one-to-many")]
    OneToMany,
    #[serde(rename = "many-to-one")]
    ManyToOne,
    #[serde(rename = "many-to-many")]
    ManyToMany,
}

/// Directed edge from an entity to another
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRelation {
    #[serde(rename = "type")]
    pub relation_type: RelationKind,
    pub target_entity: String,
    pub foreign_key: String,
    pub description: String,
}

/// Named cross-entity relation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub name: String,
    pub description: String,
    pub from_entity: String,
    pub to_entity: String,
    #[serde(rename = "type")]
    pub relation_type: RelationKind,
}

/// Illustrative operation, used for documentation only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub name: String,
    pub description: String,
    pub method: String,
    pub path: String,
    pub parameters: BTreeMap<String, Parameter>,
    pub response: ResponseSchema,
    pub examples: Vec<OperationExample>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: FieldType,
    pub required: bool,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<JsonValue>,
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseSchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, Field>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationExample {
    pub name: String,
    pub description: String,
    pub request: QueryRequest,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<JsonValue>,
}

impl Schema {
    pub fn entity(&self, name: &str) -> Option<&Entity> {
        self.entities.get(name)
    }

    pub fn has_entity(&self, name: &str) -> bool {
        self.entities.contains_key(name)
    }

    /// Copy of this schema stamped with the current time
    pub fn refreshed(&self) -> Schema {
        Schema {
            timestamp: Utc::now(),
            ..self.clone()
        }
    }

    /// All examples across operations, in operation-name order
    pub fn examples(&self) -> impl Iterator<Item = &OperationExample> {
        self.operations.values().flat_map(|op| op.examples.iter())
    }

    pub fn to_json(&self) -> McpResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| McpError::Internal(format!("Failed to serialize schema: {}", e)))
    }
}

impl Entity {
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            fields: BTreeMap::new(),
            indexes: Vec::new(),
            relations: Vec::new(),
        }
    }

    pub fn with_field(mut self, field: Field) -> Self {
        self.fields.insert(field.name.clone(), field);
        self
    }

    pub fn with_index(mut self, name: &str, fields: &[&str], unique: bool) -> Self {
        self.indexes.push(Index {
            name: name.to_string(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
            unique,
        });
        self
    }

    pub fn with_relation(
        mut self,
        relation_type: RelationKind,
        target_entity: &str,
        foreign_key: &str,
        description: &str,
    ) -> Self {
        self.relations.push(EntityRelation {
            relation_type,
            target_entity: target_entity.to_string(),
            foreign_key: foreign_key.to_string(),
            description: description.to_string(),
        });
        self
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}

impl Field {
    pub fn new(name: &str, field_type: FieldType, required: bool, description: &str) -> Self {
        Self {
            name: name.to_string(),
            field_type,
            required,
            description: description.to_string(),
            format: None,
            enum_values: None,
            example: None,
        }
    }

    pub fn with_example(mut self, example: JsonValue) -> Self {
        self.example = Some(example);
        self
    }

    pub fn with_enum(mut self, values: &[&str]) -> Self {
        self.enum_values = Some(values.iter().map(|v| v.to_string()).collect());
        self
    }

    pub fn with_format(mut self, format: &str) -> Self {
        self.format = Some(format.to_string());
        self
    }
}

impl Parameter {
    pub fn new(name: &str, param_type: FieldType, required: bool, description: &str) -> Self {
        Self {
            name: name.to_string(),
            param_type,
            required,
            description: description.to_string(),
            example: None,
            enum_values: None,
        }
    }

    pub fn with_example(mut self, example: JsonValue) -> Self {
        self.example = Some(example);
        self
    }
}
