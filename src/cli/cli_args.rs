use clap::{Parser, Subcommand, ValueEnum};

/// SmartSec MCP CLI - structured queries over security telemetry
#[derive(Parser, Debug)]
#[command(name = "smartsec-mcp")]
#[command(about = "Schema-driven structured query engine over SmartSec security telemetry")]
#[command(version)]
pub struct CliArgs {
    /// JSON configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Database URL; overrides configuration and DATABASE_URL
    #[arg(long, global = true)]
    pub database_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the full schema as JSON
    Schema,

    /// List queryable entities
    Entities {
        /// Show fields, indexes and relations
        #[arg(short, long)]
        detailed: bool,
    },

    /// Show one entity
    Entity {
        /// Entity name (e.g. "devices")
        name: String,
    },

    /// Show example query requests
    Examples {
        /// Only examples querying this entity
        #[arg(short, long)]
        entity: Option<String>,
    },

    /// Validate a query request without executing it
    Validate {
        /// Request JSON, or @path to a JSON file
        #[arg(value_name = "REQUEST")]
        request: String,
    },

    /// Execute a query request
    Query {
        /// Request JSON, or @path to a JSON file
        #[arg(value_name = "REQUEST")]
        request: String,

        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,

        /// Enable verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Report engine health
    Health,
}

/// Output format options
#[derive(ValueEnum, Debug, Clone)]
pub enum OutputFormat {
    /// Formatted table output
    Table,
    /// JSON output
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}
