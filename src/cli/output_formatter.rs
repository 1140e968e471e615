use colored::*;

use crate::cli::cli_args::OutputFormat;
use crate::engine::HealthStatus;
use crate::schema::{Entity, OperationExample};
use crate::utils::error::McpError;
use crate::utils::types::{format_timestamp, FieldValue, QueryResponse, QueryStatus, Record};

/// Formats engine output for CLI display
pub struct OutputFormatter;

impl OutputFormatter {
    /// Format a query response according to the specified format
    pub fn format_response(response: &QueryResponse, format: &OutputFormat) -> String {
        match format {
            OutputFormat::Table => Self::format_table(response),
            OutputFormat::Json => Self::to_pretty_json(response),
        }
    }

    /// Format results as a colored table
    fn format_table(response: &QueryResponse) -> String {
        if response.status == QueryStatus::Failed {
            return format!(
                "{} {}",
                "Query failed:".red().bold(),
                response.error.as_deref().unwrap_or("unknown error").red()
            );
        }
        if response.data.is_empty() {
            return "No results found.".dimmed().to_string();
        }

        let columns = Self::collect_columns(&response.data);

        // Calculate column widths
        let mut col_widths: Vec<usize> = columns.iter().map(|c| c.len()).collect();
        for record in &response.data {
            for (i, column) in columns.iter().enumerate() {
                let width = record.get(column).map_or(4, |v| Self::value_to_string(v).len());
                col_widths[i] = col_widths[i].max(width);
            }
        }
        for width in &mut col_widths {
            *width = (*width).max(8);
        }

        let mut output = String::new();

        // Header
        output.push_str(&Self::format_table_separator(&col_widths, true));
        output.push('|');
        for (i, column) in columns.iter().enumerate() {
            output.push_str(&format!(" {:<width$} |", column.bold().cyan(), width = col_widths[i]));
        }
        output.push('\n');
        output.push_str(&Self::format_table_separator(&col_widths, false));

        // Data rows
        for record in &response.data {
            output.push('|');
            for (i, column) in columns.iter().enumerate() {
                let value = record.get(column).unwrap_or(&FieldValue::Null);
                output.push_str(&format!(
                    " {:<width$} |",
                    Self::format_value_colored(value),
                    width = col_widths[i]
                ));
            }
            output.push('\n');
        }

        output.push_str(&Self::format_table_separator(&col_widths, true));

        // Footer with metadata
        let row_count = response.metadata.row_count;
        output.push_str(&format!(
            "\n{} {} in {:.2}ms\n",
            row_count.to_string().green().bold(),
            if row_count == 1 { "row" } else { "rows" },
            response.metadata.execution_time.as_secs_f64() * 1000.0
        ));

        output
    }

    /// Column names in first-seen order across records
    fn collect_columns(records: &[Record]) -> Vec<String> {
        let mut columns: Vec<String> = Vec::new();
        for record in records {
            for key in record.keys() {
                if !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
        }
        columns
    }

    /// Format table separator line
    fn format_table_separator(col_widths: &[usize], is_border: bool) -> String {
        let edge = if is_border { '+' } else { '|' };
        let mut separator = String::new();
        separator.push(edge);
        for &width in col_widths {
            separator.push_str(&"-".repeat(width + 2));
            separator.push(edge);
        }
        separator.push('\n');
        separator
    }

    /// Convert a value to a display string
    fn value_to_string(value: &FieldValue) -> String {
        match value {
            FieldValue::String(s) => s.clone(),
            FieldValue::Integer(i) => i.to_string(),
            FieldValue::Float(f) => f.to_string(),
            FieldValue::Boolean(b) => b.to_string(),
            FieldValue::Timestamp(ts) => format_timestamp(ts),
            FieldValue::Sequence(_) | FieldValue::Mapping(_) => serde_json::Value::from(value).to_string(),
            FieldValue::Null => "NULL".to_string(),
        }
    }

    /// Convert a value to a colored string for table display
    fn format_value_colored(value: &FieldValue) -> ColoredString {
        let text = Self::value_to_string(value);
        match value {
            FieldValue::String(_) => text.normal(),
            FieldValue::Integer(_) | FieldValue::Float(_) => text.blue(),
            FieldValue::Boolean(true) => text.green(),
            FieldValue::Boolean(false) => text.red(),
            FieldValue::Timestamp(_) => text.yellow(),
            FieldValue::Sequence(_) | FieldValue::Mapping(_) => text.magenta(),
            FieldValue::Null => text.dimmed(),
        }
    }

    /// List entities, optionally with their fields, indexes and relations
    pub fn format_entities(entities: &[&Entity], detailed: bool) -> String {
        let mut output = String::new();
        output.push_str(&format!("{}\n", "Available Entities:".bold()));

        for entity in entities {
            output.push_str(&format!("  {} {} - {}\n", "•".green(), entity.name.cyan().bold(), entity.description));
            if detailed {
                output.push_str(&format!("    Fields: {}\n", entity.fields.len()));
                output.push_str(&format!("    Indexes: {}\n", entity.indexes.len()));
                let targets: Vec<&str> = entity.relations.iter().map(|r| r.target_entity.as_str()).collect();
                output.push_str(&format!("    Related: {}\n", targets.join(", ").yellow()));
            }
        }

        output
    }

    /// Describe one entity
    pub fn format_entity(entity: &Entity) -> String {
        let mut output = String::new();
        output.push_str(&format!("{} {}\n", "Entity".bold(), entity.name.cyan().bold()));
        output.push_str(&format!("{}\n", entity.description));

        output.push_str(&format!("\n{}\n", "Fields:".bold()));
        for field in entity.fields.values() {
            let required = if field.required { "required".green() } else { "optional".yellow() };
            let ty = serde_json::to_value(field.field_type)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default();
            output.push_str(&format!("  {} {} {} {}", "•".green(), field.name.cyan().bold(), ty.blue(), required));
            if let Some(values) = &field.enum_values {
                output.push_str(&format!(" [{}]", values.join(", ").magenta()));
            }
            output.push('\n');
        }

        if !entity.indexes.is_empty() {
            output.push_str(&format!("\n{}\n", "Indexes:".bold()));
            for index in &entity.indexes {
                let unique_str = if index.unique { " (UNIQUE)" } else { "" };
                output.push_str(&format!(
                    "  {} {} on ({}){}\n",
                    "•".green(),
                    index.name.cyan(),
                    index.fields.join(", ").yellow(),
                    unique_str.magenta()
                ));
            }
        }

        if !entity.relations.is_empty() {
            output.push_str(&format!("\n{}\n", "Relations:".bold()));
            for relation in &entity.relations {
                output.push_str(&format!(
                    "  {} {} via {} - {}\n",
                    "•".green(),
                    relation.target_entity.cyan(),
                    relation.foreign_key.yellow(),
                    relation.description
                ));
            }
        }

        output
    }

    pub fn format_examples(examples: &[&OperationExample]) -> String {
        if examples.is_empty() {
            return Self::format_info("No examples found.");
        }

        let mut output = String::new();
        for example in examples {
            output.push_str(&format!("{} {}\n", example.name.cyan().bold(), example.description));
            output.push_str(&Self::to_pretty_json(&example.request));
            output.push_str("\n\n");
        }
        output
    }

    pub fn format_health(health: &HealthStatus) -> String {
        let storage = if health.storage_connected { "connected".green() } else { "schema-only".yellow() };
        format!(
            "{} {} {}\n  Schema version: {}\n  Storage: {}\n  Cached results: {}\n",
            health.service.cyan().bold(),
            health.version,
            health.status.green(),
            health.schema_version,
            storage,
            health.cached_results
        )
    }

    pub fn to_pretty_json<T: serde::Serialize>(value: &T) -> String {
        serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
    }

    /// Format error message for CLI display
    pub fn format_error(error: &McpError) -> String {
        format!("{} {}", "Error:".red().bold(), error.to_string().red())
    }

    /// Format success message for CLI display
    pub fn format_success(message: &str) -> String {
        format!("{} {}", "Success:".green().bold(), message)
    }

    /// Format info message for CLI display
    pub fn format_info(message: &str) -> String {
        format!("{} {}", "Info:".blue().bold(), message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::StorageError;
    use chrono::Utc;
    use std::time::Duration;

    fn completed(records: Vec<Record>) -> QueryResponse {
        let mut response = QueryResponse::running("q-1", Utc::now());
        response.complete(records, Duration::from_millis(2));
        response
    }

    #[test]
    fn test_table_contains_values() {
        colored::control::set_override(false);
        let mut record = Record::new();
        record.insert("hostname".to_string(), "laptop-001".into());
        record.insert("pid".to_string(), FieldValue::Integer(42));

        let output = OutputFormatter::format_response(&completed(vec![record]), &OutputFormat::Table);

        assert!(output.contains("hostname"));
        assert!(output.contains("laptop-001"));
        assert!(output.contains("1 row in"));
    }

    #[test]
    fn test_empty_and_failed() {
        colored::control::set_override(false);
        let empty = OutputFormatter::format_response(&completed(Vec::new()), &OutputFormat::Table);
        assert_eq!(empty, "No results found.");

        let mut failed = QueryResponse::running("q-2", Utc::now());
        failed.fail(&StorageError::Unavailable.into());
        let output = OutputFormatter::format_response(&failed, &OutputFormat::Table);
        assert!(output.contains("schema-only mode"));
    }

    #[test]
    fn test_json_is_response_envelope() {
        let output = OutputFormatter::format_response(&completed(Vec::new()), &OutputFormat::Json);
        let json: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(json["id"], "q-1");
        assert_eq!(json["status"], "completed");
    }

    #[test]
    fn test_columns_keep_first_seen_order() {
        let mut a = Record::new();
        a.insert("b".to_string(), FieldValue::Null);
        let mut b = Record::new();
        b.insert("a".to_string(), FieldValue::Null);
        b.insert("b".to_string(), FieldValue::Null);

        assert_eq!(OutputFormatter::collect_columns(&[a, b]), vec!["b".to_string(), "a".to_string()]);
    }
}
