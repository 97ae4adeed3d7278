//! Schemascope Library
//!
//! Reads table, column and index metadata from PostgreSQL, MySQL, SQL Server,
//! Oracle and SQLite databases and normalizes it into one schema model.

pub mod config;
pub mod connection;
pub mod dialect;
pub mod error;
pub mod probe;
pub mod registry;
pub mod schema;

pub use connection::{CatalogConnection, CatalogRow, CatalogValue};
pub use dialect::{DatabaseKind, SchemaAdapter};
pub use error::{Result, SchemaError};
pub use registry::AdapterRegistry;
pub use schema::{Column, Index, SchemaAggregator, Table, TableInfo};
