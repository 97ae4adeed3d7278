//! Live connection handles
//!
//! Adapters never open connections. The caller owns a driver handle and hands
//! it over as a [`CatalogConnection`]; adapters only run catalog queries through
//! it. Built-in bindings exist for PostgreSQL (a `deadpool_postgres::Pool`) and
//! the embedded engine ([`SqliteConnection`]). MySQL, SQL Server and Oracle
//! handles are bound by implementing the trait over the caller's driver.

mod postgres;
mod sqlite;

#[cfg(test)]
pub(crate) mod testing;

pub use postgres::create_pool;
pub use sqlite::SqliteConnection;

use crate::error::{Result, SchemaError};
use async_trait::async_trait;

#[async_trait]
pub trait CatalogConnection: Send + Sync {
    /// Run one catalog query. Parameters are positional and use the engine's
    /// own placeholder syntax (`$1`, `?`, `@P1`, `:1`).
    async fn query(&self, sql: &str, params: &[&str]) -> Result<Vec<CatalogRow>>;

    /// Cheap liveness check.
    async fn ping(&self) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum CatalogValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<&str> for CatalogValue {
    fn from(value: &str) -> Self {
        CatalogValue::Text(value.to_string())
    }
}

impl From<String> for CatalogValue {
    fn from(value: String) -> Self {
        CatalogValue::Text(value)
    }
}

impl From<i64> for CatalogValue {
    fn from(value: i64) -> Self {
        CatalogValue::Int(value)
    }
}

impl From<bool> for CatalogValue {
    fn from(value: bool) -> Self {
        CatalogValue::Bool(value)
    }
}

impl<T: Into<CatalogValue>> From<Option<T>> for CatalogValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(CatalogValue::Null)
    }
}

/// One result row. Accessors convert loosely because drivers disagree on the
/// wire type of catalog columns (`IS_NULLABLE` may be `'YES'`, `1` or `true`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogRow {
    values: Vec<CatalogValue>,
}

impl From<Vec<CatalogValue>> for CatalogRow {
    fn from(values: Vec<CatalogValue>) -> Self {
        Self { values }
    }
}

impl CatalogRow {
    pub fn new(values: Vec<CatalogValue>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn value(&self, idx: usize) -> Result<&CatalogValue> {
        self.values
            .get(idx)
            .ok_or_else(|| row_error(idx, format!("row has only {} columns", self.values.len())))
    }

    pub fn opt_text(&self, idx: usize) -> Result<Option<String>> {
        Ok(match self.value(idx)? {
            CatalogValue::Null => None,
            CatalogValue::Text(s) => Some(s.clone()),
            CatalogValue::Int(v) => Some(v.to_string()),
            CatalogValue::Float(v) => Some(v.to_string()),
            CatalogValue::Bool(v) => Some(v.to_string()),
        })
    }

    pub fn text(&self, idx: usize) -> Result<String> {
        self.opt_text(idx)?
            .ok_or_else(|| row_error(idx, "unexpected NULL"))
    }

    pub fn opt_int(&self, idx: usize) -> Result<Option<i64>> {
        match self.value(idx)? {
            CatalogValue::Null => Ok(None),
            CatalogValue::Int(v) => Ok(Some(*v)),
            CatalogValue::Float(v) => Ok(Some(*v as i64)),
            CatalogValue::Bool(v) => Ok(Some(i64::from(*v))),
            CatalogValue::Text(s) => s
                .trim()
                .parse::<i64>()
                .map(Some)
                .map_err(|_| row_error(idx, format!("'{}' is not an integer", s))),
        }
    }

    pub fn int(&self, idx: usize) -> Result<i64> {
        self.opt_int(idx)?
            .ok_or_else(|| row_error(idx, "unexpected NULL"))
    }

    /// Boolean-ish catalog column. NULL reads as false.
    pub fn flag(&self, idx: usize) -> Result<bool> {
        match self.value(idx)? {
            CatalogValue::Null => Ok(false),
            CatalogValue::Bool(v) => Ok(*v),
            CatalogValue::Int(v) => Ok(*v != 0),
            CatalogValue::Float(v) => Ok(*v != 0.0),
            CatalogValue::Text(s) => match s.trim().to_ascii_uppercase().as_str() {
                "YES" | "Y" | "TRUE" | "T" | "1" => Ok(true),
                "NO" | "N" | "FALSE" | "F" | "0" | "" => Ok(false),
                other => Err(row_error(idx, format!("'{}' is not a boolean", other))),
            },
        }
    }
}

fn row_error(idx: usize, cause: impl std::fmt::Display) -> SchemaError {
    SchemaError::QueryFailed {
        engine: "catalog".to_string(),
        cause: format!("column {}: {}", idx, cause),
    }
}
