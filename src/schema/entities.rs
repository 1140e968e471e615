use serde_json::json;
use std::collections::BTreeMap;

use super::types::{Entity, Field, FieldType, Relation, RelationKind};

const SEVERITY_LEVELS: [&str; 4] = ["low", "medium", "high", "critical"];

/// The five telemetry entities, keyed by name
pub fn telemetry_entities() -> BTreeMap<String, Entity> {
    [devices(), processes(), containers(), threat_findings(), browser_sessions()]
        .into_iter()
        .map(|entity| (entity.name.clone(), entity))
        .collect()
}

/// Named cross-entity relations
pub fn telemetry_relations() -> BTreeMap<String, Relation> {
    [
        relation("device_processes", "A device can have multiple processes", "devices", "processes"),
        relation("device_containers", "A device can have multiple containers", "devices", "containers"),
        relation("device_threats", "A device can have multiple threat findings", "devices", "threat_findings"),
        relation("process_threats", "A process can have multiple threat findings", "processes", "threat_findings"),
        relation(
            "container_threats",
            "A container can have multiple threat findings",
            "containers",
            "threat_findings",
        ),
    ]
    .into_iter()
    .map(|rel| (rel.name.clone(), rel))
    .collect()
}

fn relation(name: &str, description: &str, from: &str, to: &str) -> Relation {
    Relation {
        name: name.to_string(),
        description: description.to_string(),
        from_entity: from.to_string(),
        to_entity: to.to_string(),
        relation_type: RelationKind::OneToMany,
    }
}

const SAMPLE_TIMESTAMP: &str = "2025-01-15T10:30:00Z";

fn datetime(name: &str, description: &str, example: &str) -> Field {
    Field::new(name, FieldType::Datetime, true, description)
        .with_format("date-time")
        .with_example(json!(example))
}

fn field(name: &str, field_type: FieldType, required: bool, description: &str, example: serde_json::Value) -> Field {
    Field::new(name, field_type, required, description).with_example(example)
}

fn devices() -> Entity {
    Entity::new("devices", "Devices in the system with their metadata")
        .with_field(
            Field::new("id", FieldType::String, true, "Unique device identifier").with_example(json!("dev-123")),
        )
        .with_field(
            Field::new("mac_address", FieldType::String, true, "MAC address of the device")
                .with_example(json!("00:11:22:33:44:55")),
        )
        .with_field(
            Field::new("hostname", FieldType::String, true, "Device hostname").with_example(json!("laptop-001")),
        )
        .with_field(Field::new("os", FieldType::String, true, "Operating system").with_example(json!("Linux")))
        .with_field(
            Field::new("platform", FieldType::String, true, "Hardware platform").with_example(json!("x86_64")),
        )
        .with_field(
            Field::new("version", FieldType::String, true, "OS version").with_example(json!("Ubuntu 22.04")),
        )
        .with_field(
            Field::new("current_user", FieldType::String, true, "Currently logged in user")
                .with_example(json!("john.doe")),
        )
        .with_field(
            Field::new("user_id", FieldType::String, false, "Associated user identifier")
                .with_example(json!("user-456")),
        )
        .with_field(
            Field::new("org_unit", FieldType::String, false, "Organizational unit")
                .with_example(json!("Engineering")),
        )
        .with_field(datetime("created_at", "When the device was first registered", SAMPLE_TIMESTAMP))
        .with_field(datetime("updated_at", "When the device record was last updated", "2025-01-15T11:30:00Z"))
        .with_field(datetime("last_seen_at", "When the device last reported in", "2025-01-15T12:30:00Z"))
        .with_index("idx_devices_mac_address", &["mac_address"], true)
        .with_index("idx_devices_hostname", &["hostname"], false)
        .with_index("idx_devices_last_seen", &["last_seen_at"], false)
        .with_relation(RelationKind::OneToMany, "processes", "device_id", "Processes running on this device")
        .with_relation(RelationKind::OneToMany, "containers", "device_id", "Containers on this device")
        .with_relation(
            RelationKind::OneToMany,
            "threat_findings",
            "device_id",
            "Threat findings for this device",
        )
        .with_relation(
            RelationKind::OneToMany,
            "browser_sessions",
            "device_id",
            "Browser sessions on this device",
        )
}

fn processes() -> Entity {
    Entity::new("processes", "Process information collected from devices")
        .with_field(field(
            "id",
            FieldType::String,
            true,
            "Unique process record identifier",
            json!("proc-123"),
        ))
        .with_field(field(
            "device_id",
            FieldType::String,
            true,
            "Device this process was collected from",
            json!("dev-123"),
        ))
        .with_field(field("pid", FieldType::Integer, true, "Process ID", json!(1234)))
        .with_field(field("name", FieldType::String, true, "Process name", json!("nginx")))
        .with_field(field(
            "cmdline",
            FieldType::Array,
            false,
            "Command line arguments",
            json!(["nginx", "-g", "daemon off;"]),
        ))
        .with_field(field(
            "username",
            FieldType::String,
            false,
            "User running the process",
            json!("www-data"),
        ))
        .with_field(field(
            "exe_path",
            FieldType::String,
            false,
            "Path to the executable",
            json!("/usr/sbin/nginx"),
        ))
        .with_field(field("status", FieldType::String, false, "Process status", json!("running")))
        .with_field(field(
            "start_time",
            FieldType::Integer,
            false,
            "Process start time (epoch seconds)",
            json!(1704441600),
        ))
        .with_field(field(
            "sha256",
            FieldType::String,
            false,
            "SHA-256 hash of the executable",
            json!("abc123..."),
        ))
        .with_field(field("file_size", FieldType::Integer, false, "Executable size in bytes", json!(1048576)))
        .with_field(field("version", FieldType::String, false, "Executable version", json!("1.18.0")))
        .with_field(datetime("collected_at", "When the process was observed", SAMPLE_TIMESTAMP))
        .with_field(datetime("created_at", "When the record was stored", SAMPLE_TIMESTAMP))
        .with_index("idx_processes_device_id", &["device_id"], false)
        .with_index("idx_processes_pid_device", &["pid", "device_id"], false)
        .with_index("idx_processes_collected_at", &["collected_at"], false)
        .with_relation(RelationKind::ManyToOne, "devices", "device_id", "Device running this process")
        .with_relation(
            RelationKind::OneToMany,
            "threat_findings",
            "process_id",
            "Threat findings involving this process",
        )
}

fn containers() -> Entity {
    Entity::new("containers", "Container information collected from devices")
        .with_field(field(
            "id",
            FieldType::String,
            true,
            "Unique container record identifier",
            json!("cont-123"),
        ))
        .with_field(field(
            "device_id",
            FieldType::String,
            true,
            "Device hosting the container",
            json!("dev-123"),
        ))
        .with_field(field(
            "container_id",
            FieldType::String,
            true,
            "Runtime container identifier",
            json!("abc123def456"),
        ))
        .with_field(field("names", FieldType::Array, false, "Container names", json!(["web-server"])))
        .with_field(field("image", FieldType::String, true, "Container image", json!("nginx:latest")))
        .with_field(field("status", FieldType::String, false, "Container status", json!("running")))
        .with_field(field("ports", FieldType::Array, false, "Exposed ports", json!(["80/tcp", "443/tcp"])))
        .with_field(field("labels", FieldType::Object, false, "Container labels", json!({"env": "prod"})))
        .with_field(field(
            "container_created",
            FieldType::Integer,
            false,
            "Container creation time (epoch seconds)",
            json!(1704441600),
        ))
        .with_field(datetime("collected_at", "When the container was observed", SAMPLE_TIMESTAMP))
        .with_field(datetime("created_at", "When the record was stored", SAMPLE_TIMESTAMP))
        .with_index("idx_containers_device_id", &["device_id"], false)
        .with_index("idx_containers_container_id", &["container_id"], false)
        .with_index("idx_containers_collected_at", &["collected_at"], false)
        .with_relation(RelationKind::ManyToOne, "devices", "device_id", "Device hosting this container")
        .with_relation(
            RelationKind::OneToMany,
            "threat_findings",
            "container_id",
            "Threat findings involving this container",
        )
}

fn threat_findings() -> Entity {
    Entity::new("threat_findings", "Security threat findings and alerts")
        .with_field(field("id", FieldType::String, true, "Unique finding identifier", json!("threat-123")))
        .with_field(field(
            "device_id",
            FieldType::String,
            true,
            "Device the finding was raised on",
            json!("dev-123"),
        ))
        .with_field(field(
            "process_id",
            FieldType::String,
            false,
            "Process involved, if any",
            json!("proc-456"),
        ))
        .with_field(field(
            "container_id",
            FieldType::String,
            false,
            "Container involved, if any",
            json!("cont-789"),
        ))
        .with_field(
            field(
                "severity",
                FieldType::String,
                true,
                "Threat severity level",
                json!("high"),
            )
            .with_enum(&SEVERITY_LEVELS),
        )
        .with_field(field(
            "description",
            FieldType::String,
            true,
            "Human-readable description",
            json!("Suspicious process detected"),
        ))
        .with_field(field(
            "rule_id",
            FieldType::String,
            true,
            "Identifier of the detection rule",
            json!("rule-001"),
        ))
        .with_field(field(
            "rule_name",
            FieldType::String,
            true,
            "Name of the detection rule",
            json!("Malware Detection"),
        ))
        .with_field(datetime("timestamp", "When the threat was detected", SAMPLE_TIMESTAMP))
        .with_field(datetime("created_at", "When the record was stored", SAMPLE_TIMESTAMP))
        .with_index("idx_threats_device_id", &["device_id"], false)
        .with_index("idx_threats_severity", &["severity"], false)
        .with_index("idx_threats_timestamp", &["timestamp"], false)
        .with_relation(RelationKind::ManyToOne, "devices", "device_id", "Device this finding belongs to")
        .with_relation(RelationKind::ManyToOne, "processes", "process_id", "Process this finding involves")
        .with_relation(RelationKind::ManyToOne, "containers", "container_id", "Container this finding involves")
}

fn browser_sessions() -> Entity {
    Entity::new("browser_sessions", "Browser session information collected from devices")
        .with_field(field("id", FieldType::String, true, "Unique session identifier", json!("session-123")))
        .with_field(field(
            "device_id",
            FieldType::String,
            true,
            "Device the session was collected from",
            json!("dev-123"),
        ))
        .with_field(field(
            "browser_fingerprint",
            FieldType::String,
            true,
            "Browser fingerprint",
            json!("fp-abc123"),
        ))
        .with_field(field(
            "user_agent",
            FieldType::String,
            true,
            "Browser user agent string",
            json!("Mozilla/5.0..."),
        ))
        .with_field(field("tabs", FieldType::Array, false, "Open tabs", json!(["https://example.com"])))
        .with_field(field(
            "user_id",
            FieldType::String,
            false,
            "Associated user identifier",
            json!("user-456"),
        ))
        .with_field(datetime("collected_at", "When the session was observed", SAMPLE_TIMESTAMP))
        .with_field(datetime("created_at", "When the record was stored", SAMPLE_TIMESTAMP))
        .with_index("idx_browser_sessions_device_id", &["device_id"], false)
        .with_index("idx_browser_sessions_collected_at", &["collected_at"], false)
        .with_relation(RelationKind::ManyToOne, "devices", "device_id", "Device this session belongs to")
}
