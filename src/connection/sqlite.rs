use crate::connection::{CatalogConnection, CatalogRow, CatalogValue};
use crate::error::Result;
use async_trait::async_trait;
use rusqlite::types::ValueRef;
use rusqlite::{params_from_iter, Connection};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Shared handle to an embedded database file.
///
/// `rusqlite::Connection` is `Send` but not `Sync`, so calls are serialized
/// behind an async mutex. Queries run synchronously while the lock is held.
#[derive(Clone)]
pub struct SqliteConnection {
    inner: Arc<Mutex<Connection>>,
}

impl SqliteConnection {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Opening embedded database at {}", path.display());
        Ok(Self::from_connection(Connection::open(path)?))
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    pub fn from_connection(connection: Connection) -> Self {
        Self {
            inner: Arc::new(Mutex::new(connection)),
        }
    }

    /// Run a batch of statements, e.g. a fixture schema.
    pub async fn execute_batch(&self, sql: &str) -> Result<()> {
        let conn = self.inner.lock().await;
        conn.execute_batch(sql)?;
        Ok(())
    }
}

#[async_trait]
impl CatalogConnection for SqliteConnection {
    async fn query(&self, sql: &str, params: &[&str]) -> Result<Vec<CatalogRow>> {
        let conn = self.inner.lock().await;
        Ok(run_query(&conn, sql, params)?)
    }

    async fn ping(&self) -> Result<()> {
        let conn = self.inner.lock().await;
        conn.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
    }
}

fn run_query(conn: &Connection, sql: &str, params: &[&str]) -> rusqlite::Result<Vec<CatalogRow>> {
    let mut stmt = conn.prepare(sql)?;
    let column_count = stmt.column_count();
    let mut rows = stmt.query(params_from_iter(params.iter()))?;

    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut values = Vec::with_capacity(column_count);
        for i in 0..column_count {
            values.push(match row.get_ref(i)? {
                ValueRef::Null => CatalogValue::Null,
                ValueRef::Integer(v) => CatalogValue::Int(v),
                ValueRef::Real(v) => CatalogValue::Float(v),
                ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
                    CatalogValue::Text(String::from_utf8_lossy(bytes).into_owned())
                }
            });
        }
        out.push(CatalogRow::new(values));
    }

    Ok(out)
}
