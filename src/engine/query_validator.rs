use crate::schema::{Entity, Schema};
use crate::utils::{
    error::{FieldContext, ValidationError},
    types::{AggregateFunction, FilterOperator, JoinKind, QueryRequest, SortDirection},
};

/// Wildcard accepted in place of an aggregate field
pub const AGGREGATE_WILDCARD: &str = "*";

/// Check a request against the schema, stopping at the first problem
pub fn validate(request: &QueryRequest, schema: &Schema) -> Result<(), ValidationError> {
    let entity = schema
        .entity(&request.entity)
        .ok_or_else(|| ValidationError::UnknownEntity(request.entity.clone()))?;

    for field in &request.fields {
        require_field(entity, field, FieldContext::Select)?;
    }

    for filter in &request.filters {
        require_field(entity, &filter.field, FieldContext::Filter)?;
        if FilterOperator::parse(&filter.operator).is_none() {
            return Err(ValidationError::InvalidOperator(filter.operator.clone()));
        }
    }

    for join in &request.joins {
        if !schema.has_entity(&join.entity) {
            return Err(ValidationError::UnknownEntity(join.entity.clone()));
        }
        if JoinKind::parse(&join.join_type).is_none() {
            return Err(ValidationError::InvalidJoinType(join.join_type.clone()));
        }
    }

    for order in &request.order_by {
        require_field(entity, &order.field, FieldContext::OrderBy)?;
        // Empty means "use the default"
        if !order.direction.is_empty() && SortDirection::parse_strict(&order.direction).is_none() {
            return Err(ValidationError::InvalidOrderDirection(order.direction.clone()));
        }
    }

    for aggregate in &request.aggregates {
        if AggregateFunction::parse(&aggregate.function).is_none() {
            return Err(ValidationError::InvalidAggregateFunction(aggregate.function.clone()));
        }
        if aggregate.field != AGGREGATE_WILDCARD {
            require_field(entity, &aggregate.field, FieldContext::Aggregate)?;
        }
    }

    Ok(())
}

fn require_field(entity: &Entity, field: &str, context: FieldContext) -> Result<(), ValidationError> {
    if entity.has_field(field) {
        Ok(())
    } else {
        Err(ValidationError::UnknownField {
            entity: entity.name.clone(),
            field: field.to_string(),
            context,
        })
    }
}
