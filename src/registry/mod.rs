//! Adapter Registry
//!
//! Explicit, caller-owned list of initialized adapters. Registration order is
//! preserved and is the order snapshots and ping results are reported in.

use crate::config::{Config, DatabaseConfig};
use crate::connection::{create_pool, CatalogConnection, SqliteConnection};
use crate::dialect::{DatabaseKind, SchemaAdapter};
use crate::error::{Result, SchemaError};
use std::sync::Arc;
use tracing::{debug, info};

/// Per-registration settings.
#[derive(Debug, Clone, Default)]
pub struct RegisterOptions {
    /// Namespace override for PostgreSQL and SQL Server. On PostgreSQL
    /// `Some("")` reads every schema; on SQL Server it means the login's
    /// default schema.
    pub schema: Option<String>,
    pub show_sql: bool,
}

#[derive(Default)]
pub struct AdapterRegistry {
    adapters: Vec<Arc<dyn SchemaAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open connections for every configured database and register an
    /// adapter for each.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut registry = Self::new();

        for database in &config.databases {
            let connection = open_connection(database, config.max_connections_per_pool)?;
            let options = RegisterOptions {
                schema: config.schema.clone(),
                show_sql: config.show_sql,
            };
            registry.register_with(
                Some(connection),
                database.kind.as_str(),
                &database.name,
                options,
            )?;
        }

        info!("Registered {} database(s)", registry.len());
        Ok(registry)
    }

    pub fn register(
        &mut self,
        connection: Option<Arc<dyn CatalogConnection>>,
        db_type: &str,
        database: &str,
    ) -> Result<Arc<dyn SchemaAdapter>> {
        self.register_with(connection, db_type, database, RegisterOptions::default())
    }

    /// Bind an adapter of `db_type` to `connection`. A missing connection or an
    /// unknown type is a configuration error and nothing is registered.
    pub fn register_with(
        &mut self,
        connection: Option<Arc<dyn CatalogConnection>>,
        db_type: &str,
        database: &str,
        options: RegisterOptions,
    ) -> Result<Arc<dyn SchemaAdapter>> {
        let kind = DatabaseKind::lookup(db_type).ok_or_else(|| {
            SchemaError::configuration(format!("Unsupported database type: {}", db_type))
        })?;
        let connection = connection.ok_or_else(|| {
            SchemaError::configuration(format!("No connection for {} database {}", kind, database))
        })?;

        let mut adapter = kind.init(connection, database);
        if let Some(schema) = &options.schema {
            adapter.set_schema(schema);
        }
        adapter.set_show_sql(options.show_sql);

        debug!("Registered {} adapter for {}", kind, database);
        let adapter: Arc<dyn SchemaAdapter> = Arc::from(adapter);
        self.adapters.push(Arc::clone(&adapter));
        Ok(adapter)
    }

    /// Register an adapter built outside the closed engine set.
    pub fn push(&mut self, adapter: Arc<dyn SchemaAdapter>) {
        debug!("Registered custom {} adapter for {}", adapter.kind(), adapter.database());
        self.adapters.push(adapter);
    }

    pub fn adapters(&self) -> &[Arc<dyn SchemaAdapter>] {
        &self.adapters
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

fn open_connection(database: &DatabaseConfig, max_size: u32) -> Result<Arc<dyn CatalogConnection>> {
    match database.kind {
        DatabaseKind::Postgres => Ok(Arc::new(create_pool(&database.url, max_size)?)),
        DatabaseKind::Sqlite => Ok(Arc::new(SqliteConnection::open(&database.url)?)),
        other => Err(SchemaError::configuration(format!(
            "No built-in driver for {}; bind it through CatalogConnection",
            other
        ))),
    }
}
