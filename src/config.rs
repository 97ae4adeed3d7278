use crate::dialect::DatabaseKind;
use crate::error::{Result, SchemaError};
use std::env;
use std::path::{Path, PathBuf};

/// One database to snapshot, parsed from a connection URL.
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseConfig {
    pub kind: DatabaseKind,
    /// Driver connection string; a file path for the embedded engine.
    pub url: String,
    /// Logical database name reported by the adapter.
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub databases: Vec<DatabaseConfig>,
    /// Schema override for PostgreSQL and SQL Server; `None` keeps the
    /// adapter default.
    pub schema: Option<String>,
    pub max_connections_per_pool: u32,
    pub show_sql: bool,
    /// Directory for the daily JSON log file; console only when unset.
    pub log_dir: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any key lookup (the process environment
    /// in production, a map in tests).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let urls: Vec<String> = match lookup("DATABASES") {
            Some(list) => list
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            None => vec![default_postgres_url(&lookup)],
        };

        let databases = urls
            .iter()
            .map(|url| parse_database_url(url))
            .collect::<Result<Vec<_>>>()?;

        let max_connections_per_pool = lookup("MAX_CONNECTIONS_PER_POOL")
            .and_then(|v| v.parse().ok())
            .unwrap_or(4);

        let show_sql = lookup("SHOW_SQL")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Ok(Config {
            databases,
            schema: lookup("DB_SCHEMA"),
            max_connections_per_pool,
            show_sql,
            log_dir: lookup("LOG_DIR").map(PathBuf::from),
        })
    }
}

/// Build the PostgreSQL URL from `DATABASE_URL` or the individual `DB_*` fields.
fn default_postgres_url(lookup: &impl Fn(&str) -> Option<String>) -> String {
    if let Some(url) = lookup("DATABASE_URL") {
        return url;
    }

    let db_host = lookup("DB_HOST").unwrap_or_else(|| "localhost".to_string());
    let db_port = lookup("DB_PORT").unwrap_or_else(|| "5432".to_string());
    let db_name = lookup("DB_NAME").unwrap_or_else(|| "postgres".to_string());
    let db_user = lookup("DB_USER").unwrap_or_else(|| "postgres".to_string());
    let db_password = lookup("DB_PASSWORD").unwrap_or_default();

    // URL-encode password to handle special characters
    let encoded_password = urlencoding::encode(&db_password);

    format!(
        "postgres://{}:{}@{}:{}/{}",
        db_user, encoded_password, db_host, db_port, db_name
    )
}

/// Map a connection URL to its engine by scheme.
pub fn parse_database_url(url: &str) -> Result<DatabaseConfig> {
    let (scheme, rest) = url
        .split_once("://")
        .ok_or_else(|| SchemaError::configuration(format!("Not a connection URL: {}", url)))?;

    match scheme.to_ascii_lowercase().as_str() {
        "postgres" | "postgresql" => {
            let path = rest.split('?').next().unwrap_or_default();
            let name = path
                .rsplit_once('/')
                .map(|(_, name)| name)
                .filter(|name| !name.is_empty())
                .unwrap_or("postgres");
            Ok(DatabaseConfig {
                kind: DatabaseKind::Postgres,
                url: url.to_string(),
                name: name.to_string(),
            })
        }
        "sqlite" | "sqlite3" => {
            if rest.is_empty() {
                return Err(SchemaError::configuration(format!(
                    "Missing database path in {}",
                    url
                )));
            }
            let name = Path::new(rest)
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "main".to_string());
            Ok(DatabaseConfig {
                kind: DatabaseKind::Sqlite,
                url: rest.to_string(),
                name,
            })
        }
        "mysql" | "mssql" | "sqlserver" | "oracle" => Err(SchemaError::configuration(format!(
            "No built-in driver for {} URLs; bind the connection through CatalogConnection",
            scheme
        ))),
        other => Err(SchemaError::configuration(format!(
            "Unsupported database scheme: {}",
            other
        ))),
    }
}
