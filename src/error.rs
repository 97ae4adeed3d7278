use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    /// The catalog query itself failed (connectivity, permissions, bad SQL for the engine version).
    #[error("Catalog query failed on {engine}: {cause}")]
    QueryFailed { engine: String, cause: String },

    /// The query succeeded but no recognizable definition came back.
    #[error("Failed to parse definition of {object}: {cause}")]
    ParseFailed { object: String, cause: String },

    #[error("Unknown column {column} in index {index} of table {table}")]
    Inconsistent {
        table: String,
        column: String,
        index: String,
    },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SchemaError {
    pub fn query(engine: &str, cause: impl ToString) -> Self {
        SchemaError::QueryFailed {
            engine: engine.to_string(),
            cause: cause.to_string(),
        }
    }

    pub fn parse(object: &str, cause: impl ToString) -> Self {
        SchemaError::ParseFailed {
            object: object.to_string(),
            cause: cause.to_string(),
        }
    }

    pub fn configuration(message: impl ToString) -> Self {
        SchemaError::Configuration {
            message: message.to_string(),
        }
    }

    /// Short machine-readable tag, used when errors are reported as data.
    pub fn kind(&self) -> &'static str {
        match self {
            SchemaError::QueryFailed { .. } => "query_failed",
            SchemaError::ParseFailed { .. } => "parse_failed",
            SchemaError::Inconsistent { .. } => "inconsistent_schema",
            SchemaError::Configuration { .. } => "configuration",
            SchemaError::Internal(_) => "internal_error",
        }
    }

    pub fn to_response(&self) -> ErrorResponse {
        let (table, cause) = match self {
            SchemaError::QueryFailed { cause, .. } | SchemaError::ParseFailed { cause, .. } => {
                (None, Some(cause.clone()))
            }
            SchemaError::Inconsistent { table, .. } => (Some(table.clone()), None),
            SchemaError::Configuration { .. } | SchemaError::Internal(_) => (None, None),
        };

        ErrorResponse {
            error: self.kind().to_string(),
            message: self.to_string(),
            table,
            cause,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

impl From<tokio_postgres::Error> for SchemaError {
    fn from(err: tokio_postgres::Error) -> Self {
        SchemaError::query("postgres", err)
    }
}

impl From<deadpool_postgres::PoolError> for SchemaError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        SchemaError::query("postgres", format!("Pool error: {}", err))
    }
}

impl From<rusqlite::Error> for SchemaError {
    fn from(err: rusqlite::Error) -> Self {
        SchemaError::query("sqlite3", err)
    }
}

impl From<serde_json::Error> for SchemaError {
    fn from(err: serde_json::Error) -> Self {
        SchemaError::Internal(format!("Serialization error: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, SchemaError>;
