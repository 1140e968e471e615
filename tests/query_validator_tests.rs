use smartsec_mcp::engine::validate;
use smartsec_mcp::schema::build_schema;
use smartsec_mcp::utils::{
    error::{FieldContext, ValidationError},
    types::{Filter, QueryRequest},
};

fn check(request: &QueryRequest) -> Result<(), ValidationError> {
    validate(request, &build_schema())
}

fn unknown_field(result: Result<(), ValidationError>) -> (String, FieldContext) {
    match result {
        Err(ValidationError::UnknownField { field, context, .. }) => (field, context),
        other => panic!("Expected UnknownField, got {:?}", other),
    }
}

#[test]
fn test_documented_examples_are_valid() {
    let schema = build_schema();
    for example in schema.examples() {
        assert!(
            validate(&example.request, &schema).is_ok(),
            "example {} should validate",
            example.name
        );
    }
}

#[test]
fn test_every_entity_accepts_a_bare_request() {
    for entity in ["devices", "processes", "containers", "threat_findings", "browser_sessions"] {
        assert!(check(&QueryRequest::new(entity)).is_ok(), "{}", entity);
    }
}

#[test]
fn test_entity_name_is_case_sensitive() {
    assert_eq!(
        check(&QueryRequest::new("Devices")),
        Err(ValidationError::UnknownEntity("Devices".to_string()))
    );
}

#[test]
fn test_field_contexts() {
    let (field, context) = unknown_field(check(&QueryRequest::new("devices").with_fields(&["id", "ram"])));
    assert_eq!((field.as_str(), context), ("ram", FieldContext::Select));

    let (field, context) = unknown_field(check(
        &QueryRequest::new("devices").with_filter(Filter::new("cpu", "eq", "x")),
    ));
    assert_eq!((field.as_str(), context), ("cpu", FieldContext::Filter));

    let (field, context) = unknown_field(check(&QueryRequest::new("devices").with_order("uptime", "asc")));
    assert_eq!((field.as_str(), context), ("uptime", FieldContext::OrderBy));

    let (field, context) = unknown_field(check(
        &QueryRequest::new("processes").with_aggregate("sum", "memory", None),
    ));
    assert_eq!((field.as_str(), context), ("memory", FieldContext::Aggregate));
}

#[test]
fn test_all_operators_accepted() {
    let operators = [
        "eq", "ne", "gt", "gte", "lt", "lte", "like", "ilike", "in", "not_in", "is_null", "is_not_null",
    ];
    for operator in operators {
        let request = QueryRequest::new("devices").with_filter(Filter::new("os", operator, "Linux"));
        assert!(check(&request).is_ok(), "operator {}", operator);
    }
}

#[test]
fn test_unknown_operator_rejected() {
    for operator in ["between", "Eq", "LIKE", ""] {
        let request = QueryRequest::new("devices").with_filter(Filter::new("os", operator, "Linux"));
        assert_eq!(
            check(&request),
            Err(ValidationError::InvalidOperator(operator.to_string())),
            "operator {}",
            operator
        );
    }
}

#[test]
fn test_value_shape_is_not_checked() {
    // Shape problems surface at compile time
    let request = QueryRequest::new("devices").with_filter(Filter::new("os", "in", "Linux"));
    assert!(check(&request).is_ok());
}

#[test]
fn test_join_rules() {
    for join_type in ["inner", "LEFT", "Right", "full"] {
        let request = QueryRequest::new("processes").with_join("devices", join_type, "processes.device_id = devices.id");
        assert!(check(&request).is_ok(), "join type {}", join_type);
    }

    assert_eq!(
        check(&QueryRequest::new("processes").with_join("hosts", "inner", "1 = 1")),
        Err(ValidationError::UnknownEntity("hosts".to_string()))
    );
    assert_eq!(
        check(&QueryRequest::new("processes").with_join("devices", "outer", "1 = 1")),
        Err(ValidationError::InvalidJoinType("outer".to_string()))
    );
}

#[test]
fn test_join_condition_is_opaque() {
    let request = QueryRequest::new("processes").with_join("devices", "inner", "anything at all ;");
    assert!(check(&request).is_ok());
}

#[test]
fn test_order_direction_rules() {
    for direction in ["asc", "desc", ""] {
        assert!(check(&QueryRequest::new("devices").with_order("hostname", direction)).is_ok());
    }
    for direction in ["ASC", "Desc", "up"] {
        assert_eq!(
            check(&QueryRequest::new("devices").with_order("hostname", direction)),
            Err(ValidationError::InvalidOrderDirection(direction.to_string()))
        );
    }
}

#[test]
fn test_aggregate_rules() {
    for function in ["count", "SUM", "Avg", "min", "MAX"] {
        let request = QueryRequest::new("processes").with_aggregate(function, "file_size", None);
        assert!(check(&request).is_ok(), "function {}", function);
    }

    assert!(check(&QueryRequest::new("processes").with_aggregate("count", "*", None)).is_ok());
    assert_eq!(
        check(&QueryRequest::new("processes").with_aggregate("median", "file_size", None)),
        Err(ValidationError::InvalidAggregateFunction("median".to_string()))
    );
}

#[test]
fn test_group_by_is_not_checked() {
    let request = QueryRequest::new("devices").with_group_by(&["no_such_column"]);
    assert!(check(&request).is_ok());
}

#[test]
fn test_checks_run_in_order() {
    // Unknown entity beats every other problem
    let request = QueryRequest::new("laptops")
        .with_fields(&["ram"])
        .with_filter(Filter::new("os", "between", "a"));
    assert_eq!(check(&request), Err(ValidationError::UnknownEntity("laptops".to_string())));

    // Filter operator beats a later bad join
    let request = QueryRequest::new("devices")
        .with_filter(Filter::new("os", "between", "a"))
        .with_join("processes", "cross", "1 = 1");
    assert_eq!(check(&request), Err(ValidationError::InvalidOperator("between".to_string())));

    // Bad join beats a later bad order direction
    let request = QueryRequest::new("devices")
        .with_join("processes", "cross", "1 = 1")
        .with_order("hostname", "UP");
    assert_eq!(check(&request), Err(ValidationError::InvalidJoinType("cross".to_string())));
}

#[test]
fn test_validation_messages() {
    let error = check(&QueryRequest::new("devices").with_fields(&["ram"])).unwrap_err();
    assert_eq!(error.to_string(), "select field 'ram' not found in entity 'devices'");

    let error = check(&QueryRequest::new("devices").with_filter(Filter::new("os", "between", "a"))).unwrap_err();
    assert_eq!(error.to_string(), "invalid filter operator: between");
}
