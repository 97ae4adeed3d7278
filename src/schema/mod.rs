pub mod aggregator;
pub mod ddl;
pub mod identifier;
pub mod model;

pub use aggregator::SchemaAggregator;
pub use model::{Column, Index, Table, TableInfo};
