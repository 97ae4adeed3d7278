//! Per-engine schema adapters
//!
//! Each adapter reads one engine's system catalog through a borrowed
//! [`CatalogConnection`] and converts what it finds into the canonical
//! [`Table`]/[`Column`]/[`Index`] model.

mod mssql;
mod mysql;
mod oracle;
mod postgres;
mod sqlite;

pub use mssql::MssqlAdapter;
pub use mysql::MysqlAdapter;
pub use oracle::OracleAdapter;
pub use postgres::{PostgresAdapter, DEFAULT_POSTGRES_SCHEMA};
pub use sqlite::SqliteAdapter;

use crate::connection::{CatalogConnection, CatalogRow};
use crate::error::{Result, SchemaError};
use crate::schema::{Column, Index, Table};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, trace};

/// Closed set of supported engines. The string forms are the public
/// database-type identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DatabaseKind {
    #[serde(rename = "postgres")]
    Postgres,
    #[serde(rename = "mysql")]
    Mysql,
    #[serde(rename = "mssql")]
    Mssql,
    #[serde(rename = "oracle")]
    Oracle,
    #[serde(rename = "sqlite3")]
    Sqlite,
}

impl DatabaseKind {
    pub const ALL: [DatabaseKind; 5] = [
        DatabaseKind::Postgres,
        DatabaseKind::Mysql,
        DatabaseKind::Mssql,
        DatabaseKind::Oracle,
        DatabaseKind::Sqlite,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DatabaseKind::Postgres => "postgres",
            DatabaseKind::Mysql => "mysql",
            DatabaseKind::Mssql => "mssql",
            DatabaseKind::Oracle => "oracle",
            DatabaseKind::Sqlite => "sqlite3",
        }
    }

    /// Exact, case-sensitive lookup of a database-type identifier.
    pub fn lookup(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }

    /// Build the adapter for this engine, bound to `connection`.
    pub fn init(
        self,
        connection: Arc<dyn CatalogConnection>,
        database: &str,
    ) -> Box<dyn SchemaAdapter> {
        let base = AdapterBase::new(connection, self, database);
        match self {
            DatabaseKind::Postgres => Box::new(PostgresAdapter::new(base)),
            DatabaseKind::Mysql => Box::new(MysqlAdapter::new(base)),
            DatabaseKind::Mssql => Box::new(MssqlAdapter::new(base)),
            DatabaseKind::Oracle => Box::new(OracleAdapter::new(base)),
            DatabaseKind::Sqlite => Box::new(SqliteAdapter::new(base)),
        }
    }
}

impl fmt::Display for DatabaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatabaseKind {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self> {
        Self::lookup(s)
            .ok_or_else(|| SchemaError::configuration(format!("Unsupported database type: {}", s)))
    }
}

/// Read access to one database's schema.
///
/// `tables` returns table-level metadata only; callers fill columns and
/// indexes through the other two calls and cross-link them.
#[async_trait]
pub trait SchemaAdapter: Send + Sync {
    fn base(&self) -> &AdapterBase;

    fn base_mut(&mut self) -> &mut AdapterBase;

    fn kind(&self) -> DatabaseKind {
        self.base().kind
    }

    fn database(&self) -> &str {
        &self.base().database
    }

    fn connection(&self) -> &Arc<dyn CatalogConnection> {
        &self.base().connection
    }

    /// Restrict catalog reads to one namespace. Ignored by engines without one.
    fn set_schema(&mut self, _schema: &str) {}

    fn set_show_sql(&mut self, show: bool) {
        self.base_mut().show_sql = show;
    }

    async fn tables(&self) -> Result<Vec<Table>>;

    async fn columns(&self, table: &str) -> Result<Vec<Column>>;

    /// Secondary indexes of `table`, keyed by canonical index name.
    async fn indexes(&self, table: &str) -> Result<BTreeMap<String, Index>>;

    async fn ping(&self) -> Result<()> {
        self.connection().ping().await
    }
}

/// State shared by every adapter.
pub struct AdapterBase {
    connection: Arc<dyn CatalogConnection>,
    kind: DatabaseKind,
    database: String,
    show_sql: bool,
}

impl AdapterBase {
    pub fn new(connection: Arc<dyn CatalogConnection>, kind: DatabaseKind, database: &str) -> Self {
        Self {
            connection,
            kind,
            database: database.to_string(),
            show_sql: false,
        }
    }

    pub fn show_sql(&self) -> bool {
        self.show_sql
    }

    pub async fn query(&self, sql: &str, params: &[&str]) -> Result<Vec<CatalogRow>> {
        self.log_sql(sql, params);
        self.connection
            .query(sql, params)
            .await
            .map_err(|e| self.attribute(e))
    }

    /// Convert every row, attributing conversion failures to this engine.
    pub fn convert<T>(
        &self,
        rows: &[CatalogRow],
        f: impl Fn(&CatalogRow) -> Result<Option<T>>,
    ) -> Result<Vec<T>> {
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            if let Some(item) = f(row).map_err(|e| self.attribute(e))? {
                out.push(item);
            }
        }
        Ok(out)
    }

    fn log_sql(&self, sql: &str, params: &[&str]) {
        if self.show_sql {
            if params.is_empty() {
                info!("[SQL] {}", sql);
            } else {
                info!("[SQL] {} {:?}", sql, params);
            }
        } else {
            trace!(engine = self.kind.as_str(), "[SQL] {} {:?}", sql, params);
        }
    }

    fn attribute(&self, err: SchemaError) -> SchemaError {
        match err {
            SchemaError::QueryFailed { cause, .. } => SchemaError::QueryFailed {
                engine: self.kind.as_str().to_string(),
                cause,
            },
            other => other,
        }
    }
}

/// Append the `(length)` or `(precision,scale)` suffix catalogs report
/// separately from the type name.
pub(crate) fn with_size(data_type: &str, length: Option<i64>, scale: Option<i64>) -> String {
    match (length, scale) {
        (Some(len), Some(scale)) if scale != 0 => format!("{}({},{})", data_type, len, scale),
        (Some(len), _) => format!("{}({})", data_type, len),
        _ => data_type.to_string(),
    }
}
