use tracing::{debug, warn};

use crate::engine::query_validator::AGGREGATE_WILDCARD;
use crate::schema::Entity;
use crate::utils::{
    error::{CompilationError, FieldContext, McpError, McpResult, ValidationError},
    types::{
        format_timestamp, AggregateFunction, CompiledQuery, FieldValue, Filter, FilterLogic,
        FilterOperator, JoinKind, QueryRequest, SortDirection,
    },
};

/// Compile a request against its primary entity.
///
/// Clauses are emitted in a fixed order: SELECT, FROM, joins, WHERE,
/// GROUP BY, ORDER BY, LIMIT, OFFSET. Filter conditions chain strictly
/// left to right with no parentheses, so `c1 OR c2 AND c3` is left for
/// the backend's own precedence rules.
pub fn compile(request: &QueryRequest, entity: &Entity) -> McpResult<CompiledQuery> {
    let mut text = QueryText::default();

    text.push("SELECT ");
    text.push(&select_list(request, entity)?.join(", "));

    text.push(" FROM ");
    text.push(&entity.name);

    for join in &request.joins {
        let kind = JoinKind::parse(&join.join_type)
            .ok_or_else(|| ValidationError::InvalidJoinType(join.join_type.clone()))?;
        text.push(&format!(" {} JOIN {} ON {}", kind.keyword(), join.entity, join.condition));
    }

    for (i, filter) in request.filters.iter().enumerate() {
        if i == 0 {
            text.push(" WHERE ");
        } else {
            let logic = FilterLogic::parse(&filter.logic)
                .ok_or_else(|| CompilationError::InvalidLogic(filter.logic.clone()))?;
            text.push(&format!(" {} ", logic.keyword()));
        }
        push_condition(&mut text, entity, filter)?;
    }

    if !request.group_by.is_empty() {
        for field in request.group_by.iter().filter(|f| !entity.has_field(f)) {
            warn!(entity = %entity.name, field = %field, "GROUP BY field is not part of the entity");
        }
        text.push(" GROUP BY ");
        text.push(&request.group_by.join(", "));
    }

    if !request.order_by.is_empty() {
        let terms: Vec<String> = request
            .order_by
            .iter()
            .map(|order| {
                let direction = SortDirection::parse_lenient(&order.direction);
                format!("{}.{} {}", entity.name, order.field, direction.keyword())
            })
            .collect();
        text.push(" ORDER BY ");
        text.push(&terms.join(", "));
    }

    if let Some(limit) = request.limit {
        text.push(&format!(" LIMIT {}", limit));
    }
    if let Some(offset) = request.offset {
        text.push(&format!(" OFFSET {}", offset));
    }

    let compiled = text.finish();
    debug!(entity = %entity.name, sql = %compiled.sql, params = compiled.params.len(), "Compiled query");
    Ok(compiled)
}

/// Render a value as an inline SQL literal
pub fn render_value(value: &FieldValue) -> String {
    match value {
        FieldValue::String(s) => quote(s),
        FieldValue::Integer(i) => i.to_string(),
        FieldValue::Float(f) => f.to_string(),
        FieldValue::Boolean(b) => b.to_string(),
        FieldValue::Timestamp(ts) => quote(&format_timestamp(ts)),
        FieldValue::Sequence(_) | FieldValue::Mapping(_) => {
            quote(&serde_json::Value::from(value).to_string())
        }
        FieldValue::Null => "NULL".to_string(),
    }
}

fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn select_list(request: &QueryRequest, entity: &Entity) -> McpResult<Vec<String>> {
    let mut columns = Vec::new();

    if request.fields.is_empty() {
        columns.extend(entity.field_names().map(|f| format!("{}.{}", entity.name, f)));
    } else {
        for field in &request.fields {
            if !entity.has_field(field) {
                return Err(ValidationError::UnknownField {
                    entity: entity.name.clone(),
                    field: field.clone(),
                    context: FieldContext::Select,
                }
                .into());
            }
            columns.push(format!("{}.{}", entity.name, field));
        }
    }

    for aggregate in &request.aggregates {
        let function = AggregateFunction::parse(&aggregate.function)
            .ok_or_else(|| ValidationError::InvalidAggregateFunction(aggregate.function.clone()))?;
        let (argument, alias_suffix) = if aggregate.field == AGGREGATE_WILDCARD {
            (AGGREGATE_WILDCARD.to_string(), "all")
        } else {
            (format!("{}.{}", entity.name, aggregate.field), aggregate.field.as_str())
        };
        let alias = match &aggregate.alias {
            Some(alias) if !alias.is_empty() => alias.clone(),
            _ => format!("{}_{}", aggregate.function, alias_suffix),
        };
        columns.push(format!("{}({}) AS {}", function.keyword(), argument, alias));
    }

    Ok(columns)
}

fn push_condition(text: &mut QueryText, entity: &Entity, filter: &Filter) -> McpResult<()> {
    let operator = FilterOperator::parse(&filter.operator)
        .ok_or_else(|| CompilationError::UnsupportedOperator(filter.operator.clone()))?;
    let column = format!("{}.{}", entity.name, filter.field);

    match operator {
        FilterOperator::IsNull | FilterOperator::IsNotNull => {
            text.push(&format!("{} {}", column, operator.sql_token()));
        }
        FilterOperator::In | FilterOperator::NotIn => {
            let values = match filter.value.as_ref() {
                Some(FieldValue::Sequence(values)) if !values.is_empty() => values,
                Some(FieldValue::Sequence(_)) => {
                    return Err(malformed(filter, "expected a non-empty sequence".to_string()))
                }
                Some(other) => {
                    return Err(malformed(filter, format!("expected a sequence, got {}", other.type_name())))
                }
                None => return Err(malformed(filter, "expected a sequence, got nothing".to_string())),
            };
            text.push(&format!("{} {} (", column, operator.sql_token()));
            for (i, value) in values.iter().enumerate() {
                if i > 0 {
                    text.push(", ");
                }
                text.push_value(value);
            }
            text.push(")");
        }
        _ => {
            text.push(&format!("{} {} ", column, operator.sql_token()));
            text.push_value(filter.value.as_ref().unwrap_or(&FieldValue::Null));
        }
    }

    Ok(())
}

fn malformed(filter: &Filter, reason: String) -> McpError {
    CompilationError::MalformedFilterValue {
        field: filter.field.clone(),
        operator: filter.operator.clone(),
        reason,
    }
    .into()
}

/// Pin the placeholder type to the one the inline literal carries.
/// Text-like literals are untyped inline, so their placeholders stay untyped too.
fn placeholder_cast(value: &FieldValue) -> &'static str {
    match value {
        FieldValue::Integer(_) => "::int8",
        FieldValue::Float(_) => "::float8",
        FieldValue::Boolean(_) => "::bool",
        _ => "",
    }
}

/// Inline text and placeholder template built side by side
#[derive(Default)]
struct QueryText {
    sql: String,
    template: String,
    params: Vec<FieldValue>,
}

impl QueryText {
    fn push(&mut self, fragment: &str) {
        self.sql.push_str(fragment);
        self.template.push_str(fragment);
    }

    fn push_value(&mut self, value: &FieldValue) {
        if value.is_null() {
            self.push("NULL");
            return;
        }
        self.sql.push_str(&render_value(value));
        self.params.push(value.clone());
        self.template.push_str(&format!("${}{}", self.params.len(), placeholder_cast(value)));
    }

    fn finish(self) -> CompiledQuery {
        CompiledQuery {
            sql: self.sql,
            template: self.template,
            params: self.params,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::build_schema;

    fn devices() -> Entity {
        build_schema().entities["devices"].clone()
    }

    #[test]
    fn test_minimal_select() {
        let request = QueryRequest::new("devices").with_fields(&["id", "hostname"]);
        let compiled = compile(&request, &devices()).unwrap();

        assert_eq!(compiled.sql, "SELECT devices.id, devices.hostname FROM devices");
        assert_eq!(compiled.template, compiled.sql);
        assert!(compiled.params.is_empty());
    }

    #[test]
    fn test_all_fields_when_none_selected() {
        let entity = devices();
        let compiled = compile(&QueryRequest::new("devices"), &entity).unwrap();

        assert!(compiled.sql.starts_with("SELECT devices.created_at, devices.current_user, "));
        for field in entity.field_names() {
            assert!(compiled.sql.contains(&format!("devices.{}", field)));
        }
    }

    #[test]
    fn test_template_uses_placeholders() {
        let request = QueryRequest::new("devices")
            .with_fields(&["id"])
            .with_filter(Filter::new("os", "eq", "Linux"))
            .with_filter(Filter::new("hostname", "in", vec!["a".into(), "b".into()]));
        let compiled = compile(&request, &devices()).unwrap();

        assert_eq!(
            compiled.sql,
            "SELECT devices.id FROM devices WHERE devices.os = 'Linux' AND devices.hostname IN ('a', 'b')"
        );
        assert_eq!(
            compiled.template,
            "SELECT devices.id FROM devices WHERE devices.os = $1 AND devices.hostname IN ($2, $3)"
        );
        assert_eq!(compiled.params.len(), 3);
    }

    #[test]
    fn test_typed_placeholders_follow_literal_type() {
        let entity = build_schema().entities["processes"].clone();
        let request = QueryRequest::new("processes")
            .with_fields(&["id"])
            .with_filter(Filter::new("pid", "gt", 2.5))
            .with_filter(Filter::new("file_size", "lte", 4096i64))
            .with_filter(Filter::new("status", "ne", true).with_logic("or"))
            .with_filter(Filter::new("pid", "in", vec![FieldValue::Integer(1), FieldValue::Float(2.0)]));
        let compiled = compile(&request, &entity).unwrap();

        assert_eq!(
            compiled.sql,
            "SELECT processes.id FROM processes WHERE processes.pid > 2.5 AND processes.file_size <= 4096 \
             OR processes.status != true AND processes.pid IN (1, 2)"
        );
        assert_eq!(
            compiled.template,
            "SELECT processes.id FROM processes WHERE processes.pid > $1::float8 \
             AND processes.file_size <= $2::int8 OR processes.status != $3::bool \
             AND processes.pid IN ($4::int8, $5::float8)"
        );
        assert_eq!(compiled.params.len(), 5);
    }

    #[test]
    fn test_null_value_is_inlined() {
        let mut filter = Filter::new("org_unit", "eq", "x");
        filter.value = None;
        let request = QueryRequest::new("devices").with_fields(&["id"]).with_filter(filter);
        let compiled = compile(&request, &devices()).unwrap();

        assert!(compiled.sql.ends_with("WHERE devices.org_unit = NULL"));
        assert!(compiled.template.ends_with("WHERE devices.org_unit = NULL"));
        assert!(compiled.params.is_empty());
    }

    #[test]
    fn test_invalid_logic_rejected() {
        let request = QueryRequest::new("devices")
            .with_filter(Filter::new("os", "eq", "Linux"))
            .with_filter(Filter::new("os", "eq", "Darwin").with_logic("xor"));

        match compile(&request, &devices()) {
            Err(McpError::Compilation(CompilationError::InvalidLogic(logic))) => assert_eq!(logic, "xor"),
            other => panic!("Expected InvalidLogic, got {:?}", other),
        }
    }

    #[test]
    fn test_first_filter_logic_ignored() {
        let request = QueryRequest::new("devices")
            .with_fields(&["id"])
            .with_filter(Filter::new("os", "eq", "Linux").with_logic("whatever"));
        let compiled = compile(&request, &devices()).unwrap();
        assert!(compiled.sql.ends_with("WHERE devices.os = 'Linux'"));
    }

    #[test]
    fn test_render_value() {
        assert_eq!(render_value(&FieldValue::Integer(-3)), "-3");
        assert_eq!(render_value(&FieldValue::Float(2.5)), "2.5");
        assert_eq!(render_value(&FieldValue::Boolean(false)), "false");
        assert_eq!(render_value(&"it's".into()), "'it''s'");

        let mut map = std::collections::BTreeMap::new();
        map.insert("k".to_string(), FieldValue::String("v'".to_string()));
        assert_eq!(render_value(&FieldValue::Mapping(map)), r#"'{"k":"v''"}'"#);
    }
}
