use async_trait::async_trait;
use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod, Runtime};
use serde_json::Value as JsonValue;
use std::error::Error;
use tokio_postgres::types::{to_sql_checked, Format, IsNull, ToSql, Type};
use tokio_postgres::{NoTls, Row as PgRow};
use tracing::{debug, info};

use crate::connectors::connector_trait::{ColumnValue, ConnectorType, RawRow, StorageConnection};
use crate::utils::{
    config::StorageConfig,
    error::{McpError, McpResult, StorageError},
    types::{format_timestamp, CompiledQuery, FieldValue},
};

type BoxedParam = Box<dyn ToSql + Sync + Send>;

/// PostgreSQL connector using tokio-postgres with connection pooling
#[derive(Debug)]
pub struct PostgresConnector {
    pool: Option<Pool>,
    connected: bool,
    bind_parameters: bool,
}

impl PostgresConnector {
    /// Create a new PostgreSQL connector
    pub fn new() -> Self {
        Self {
            pool: None,
            connected: false,
            bind_parameters: true,
        }
    }

    /// Build the pool and prove it with one checkout
    pub async fn connect(&mut self, config: &StorageConfig) -> McpResult<()> {
        let url = config
            .database_url
            .as_deref()
            .ok_or_else(|| McpError::Configuration("database_url is not set".to_string()))?;

        let pg_config = url
            .parse::<tokio_postgres::Config>()
            .map_err(|e| StorageError::ConnectionFailed(format!("Invalid database_url: {}", e)))?;

        let manager = Manager::from_config(
            pg_config,
            NoTls,
            ManagerConfig {
                recycling_method: RecyclingMethod::Fast,
            },
        );
        let pool = Pool::builder(manager)
            .max_size(config.max_connections)
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| StorageError::ConnectionFailed(format!("Failed to create pool: {}", e)))?;

        let _client = tokio::time::timeout(config.connect_timeout(), pool.get())
            .await
            .map_err(|_| StorageError::ConnectionFailed("Connection timeout".to_string()))?
            .map_err(|e| StorageError::ConnectionFailed(format!("Failed to get connection: {}", e)))?;

        info!(max_connections = config.max_connections, "Connected to PostgreSQL");

        self.pool = Some(pool);
        self.connected = true;
        self.bind_parameters = config.bind_parameters;
        Ok(())
    }

    pub async fn disconnect(&mut self) -> McpResult<()> {
        if let Some(pool) = self.pool.take() {
            pool.close();
        }
        self.connected = false;
        Ok(())
    }

    /// Convert PostgreSQL row to a raw row
    fn convert_pg_row(&self, pg_row: &PgRow) -> McpResult<RawRow> {
        let mut row = RawRow::new();
        for (i, column) in pg_row.columns().iter().enumerate() {
            let value = self.convert_pg_value(pg_row, i)?;
            row.columns.push((column.name().to_string(), value));
        }
        Ok(row)
    }

    /// Convert a PostgreSQL value based on its column type
    fn convert_pg_value(&self, row: &PgRow, index: usize) -> McpResult<ColumnValue> {
        let column = &row.columns()[index];
        let ty = column.type_();

        let value = match *ty {
            Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME => {
                get::<String>(row, index)?.map(ColumnValue::Text)
            }
            Type::INT2 => get::<i16>(row, index)?.map(|v| ColumnValue::Integer(v.into())),
            Type::INT4 => get::<i32>(row, index)?.map(|v| ColumnValue::Integer(v.into())),
            Type::INT8 => get::<i64>(row, index)?.map(ColumnValue::Integer),
            Type::FLOAT4 => get::<f32>(row, index)?.map(|v| ColumnValue::Float(v.into())),
            Type::FLOAT8 => get::<f64>(row, index)?.map(ColumnValue::Float),
            Type::BOOL => get::<bool>(row, index)?.map(ColumnValue::Boolean),
            Type::JSON | Type::JSONB => get::<JsonValue>(row, index)?.map(ColumnValue::Json),
            Type::TIMESTAMPTZ => get::<DateTime<Utc>>(row, index)?.map(ColumnValue::Timestamp),
            Type::TIMESTAMP => get::<NaiveDateTime>(row, index)?
                .map(|naive| ColumnValue::Timestamp(Utc.from_utc_datetime(&naive))),
            Type::DATE => get::<NaiveDate>(row, index)?.map(|date| ColumnValue::Text(date.to_string())),
            Type::UUID => get::<uuid::Uuid>(row, index)?.map(|id| ColumnValue::Text(id.to_string())),
            Type::BYTEA => get::<Vec<u8>>(row, index)?.map(ColumnValue::Bytes),
            Type::TEXT_ARRAY | Type::VARCHAR_ARRAY => get::<Vec<Option<String>>>(row, index)?.map(|items| {
                ColumnValue::Json(JsonValue::Array(
                    items.into_iter().map(|item| item.map_or(JsonValue::Null, JsonValue::String)).collect(),
                ))
            }),
            // Anything else only works if the driver can read it as text
            _ => row
                .try_get::<_, Option<String>>(index)
                .map_err(|_| {
                    StorageError::ExecutionFailed(format!(
                        "unsupported column type {} for column {}",
                        ty.name(),
                        column.name()
                    ))
                })?
                .map(ColumnValue::Text),
        };

        Ok(value.unwrap_or(ColumnValue::Null))
    }
}

impl Default for PostgresConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageConnection for PostgresConnector {
    async fn execute(&self, query: &CompiledQuery) -> McpResult<Vec<RawRow>> {
        if !self.connected {
            return Err(StorageError::ConnectionFailed("Not connected".to_string()).into());
        }

        let pool = self
            .pool
            .as_ref()
            .ok_or_else(|| StorageError::ConnectionFailed("No connection pool available".to_string()))?;

        let client = pool
            .get()
            .await
            .map_err(|e| StorageError::ConnectionFailed(format!("Failed to get connection from pool: {}", e)))?;

        let pg_rows = if self.bind_parameters && !query.params.is_empty() {
            debug!(template = %query.template, params = query.params.len(), "Executing bound query");
            let statement = client.prepare(&query.template).await.map_err(execution_failed)?;
            let params = statement
                .params()
                .iter()
                .zip(&query.params)
                .map(|(ty, value)| bind_value(ty, value))
                .collect::<McpResult<Vec<_>>>()?;
            let refs: Vec<&(dyn ToSql + Sync)> =
                params.iter().map(|p| p.as_ref() as &(dyn ToSql + Sync)).collect();
            client.query(&statement, &refs).await.map_err(execution_failed)?
        } else {
            debug!(sql = %query.sql, "Executing inline query");
            client.query(query.sql.as_str(), &[]).await.map_err(execution_failed)?
        };

        pg_rows.iter().map(|row| self.convert_pg_row(row)).collect()
    }

    fn connector_type(&self) -> ConnectorType {
        ConnectorType::PostgreSQL
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

fn get<'a, T>(row: &'a PgRow, index: usize) -> McpResult<Option<T>>
where
    T: tokio_postgres::types::FromSql<'a>,
{
    row.try_get::<_, Option<T>>(index).map_err(|e| {
        StorageError::ExecutionFailed(format!("Failed to read column {}: {}", index, e)).into()
    })
}

/// Backend message passed through untouched when the server produced one
fn execution_failed(e: tokio_postgres::Error) -> McpError {
    let message = match e.as_db_error() {
        Some(db) => db.message().to_string(),
        None => e.to_string(),
    };
    StorageError::ExecutionFailed(message).into()
}

/// Convert a filter value to the type Postgres inferred for its placeholder.
/// Types without a native mapping are sent in text format and parsed server-side.
fn bind_value(ty: &Type, value: &FieldValue) -> McpResult<BoxedParam> {
    let param: BoxedParam = match (value, ty) {
        (FieldValue::Integer(i), &Type::INT2) => Box::new(i16::try_from(*i).map_err(|_| mismatch(ty, value))?),
        (FieldValue::Integer(i), &Type::INT4) => Box::new(i32::try_from(*i).map_err(|_| mismatch(ty, value))?),
        (FieldValue::Integer(i), &Type::INT8) => Box::new(*i),
        (FieldValue::Integer(i), &Type::FLOAT8) => Box::new(*i as f64),
        (FieldValue::Float(f), &Type::FLOAT8) => Box::new(*f),
        (FieldValue::Float(f), &Type::FLOAT4) => Box::new(*f as f32),
        (FieldValue::Boolean(b), &Type::BOOL) => Box::new(*b),
        (FieldValue::Timestamp(ts), &Type::TIMESTAMPTZ) => Box::new(*ts),
        (FieldValue::Timestamp(ts), &Type::TIMESTAMP) => Box::new(ts.naive_utc()),
        (FieldValue::String(s), &Type::TEXT | &Type::VARCHAR | &Type::BPCHAR | &Type::NAME) => Box::new(s.clone()),
        (FieldValue::String(s), &Type::TIMESTAMPTZ) => Box::new(
            DateTime::parse_from_rfc3339(s)
                .map_err(|_| mismatch(ty, value))?
                .with_timezone(&Utc),
        ),
        (FieldValue::String(s), &Type::UUID) => {
            Box::new(uuid::Uuid::parse_str(s).map_err(|_| mismatch(ty, value))?)
        }
        (_, &Type::JSON | &Type::JSONB) => Box::new(JsonValue::from(value)),
        (FieldValue::Sequence(_) | FieldValue::Mapping(_), _) => {
            Box::new(TextParam(JsonValue::from(value).to_string()))
        }
        (FieldValue::Timestamp(ts), _) => Box::new(TextParam(format_timestamp(ts))),
        (FieldValue::String(s), _) => Box::new(TextParam(s.clone())),
        (FieldValue::Integer(i), _) => Box::new(TextParam(i.to_string())),
        (FieldValue::Float(f), _) => Box::new(TextParam(f.to_string())),
        (FieldValue::Boolean(b), _) => Box::new(TextParam(b.to_string())),
        (FieldValue::Null, _) => Box::new(Option::<String>::None),
    };
    Ok(param)
}

fn mismatch(ty: &Type, value: &FieldValue) -> McpError {
    StorageError::ExecutionFailed(format!("cannot bind {} value as {}", value.type_name(), ty.name())).into()
}

/// Parameter sent in text format, leaving the parsing to the server
#[derive(Debug)]
struct TextParam(String);

impl ToSql for TextParam {
    fn to_sql(&self, _ty: &Type, out: &mut BytesMut) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        out.extend_from_slice(self.0.as_bytes());
        Ok(IsNull::No)
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    fn encode_format(&self, _ty: &Type) -> Format {
        Format::Text
    }

    to_sql_checked!();
}
