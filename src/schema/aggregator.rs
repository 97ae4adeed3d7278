//! Schema snapshot assembly
//!
//! Drives one adapter through tables, columns and indexes, then links every
//! index to the columns it covers. Adapters never see each other's state.

use crate::dialect::SchemaAdapter;
use crate::error::{Result, SchemaError};
use crate::registry::AdapterRegistry;
use crate::schema::{Index, Table, TableInfo};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info};

#[derive(Debug, Default, Clone, Copy)]
pub struct SchemaAggregator;

impl SchemaAggregator {
    pub fn new() -> Self {
        Self
    }

    /// Complete snapshot of one database. Any adapter error aborts the
    /// snapshot; no partial result is returned.
    pub async fn snapshot(&self, adapter: &dyn SchemaAdapter) -> Result<TableInfo> {
        let kind = adapter.kind();
        let mut tables = adapter.tables().await?;
        debug!("Found {} tables in {} ({})", tables.len(), adapter.database(), kind);

        for table in &mut tables {
            let lookup = table.lookup_name().to_string();
            table.columns = adapter.columns(&lookup).await?;
            let indexes = adapter.indexes(&lookup).await?;
            link_indexes(table, indexes)?;

            debug!(
                "Loaded table {}: {} columns, {} indexes",
                table.name,
                table.columns.len(),
                table.indexes.len()
            );
        }

        info!(
            "Snapshot of {} ({}) complete: {} tables",
            adapter.database(),
            kind,
            tables.len()
        );

        Ok(TableInfo {
            db_type: kind,
            tables,
        })
    }

    /// Snapshot every registered adapter concurrently, one task per adapter.
    /// Results keep registration order; the first failure is returned.
    pub async fn snapshot_all(&self, registry: &AdapterRegistry) -> Result<Vec<TableInfo>> {
        let adapters = registry.adapters();
        let mut tasks = JoinSet::new();

        for (position, adapter) in adapters.iter().enumerate() {
            let adapter = Arc::clone(adapter);
            tasks.spawn(async move {
                let result = SchemaAggregator::new().snapshot(adapter.as_ref()).await;
                (position, result)
            });
        }

        let mut slots: Vec<Option<TableInfo>> = vec![None; adapters.len()];
        while let Some(joined) = tasks.join_next().await {
            let (position, result) = joined
                .map_err(|e| SchemaError::Internal(format!("Snapshot task failed: {}", e)))?;
            slots[position] = Some(result?);
        }

        Ok(slots.into_iter().flatten().collect())
    }
}

/// Attach `indexes` to `table` and record each index name on the columns it
/// covers. An index naming a column the table does not have is an error.
pub fn link_indexes(table: &mut Table, indexes: BTreeMap<String, Index>) -> Result<()> {
    let table_name = table.name.clone();
    for index in indexes.values() {
        for column_name in &index.columns {
            let column = table
                .column_mut(column_name)
                .ok_or_else(|| SchemaError::Inconsistent {
                    table: table_name.clone(),
                    column: column_name.clone(),
                    index: index.name.clone(),
                })?;

            if !column.indexes.contains(&index.name) {
                column.indexes.push(index.name.clone());
            }
        }
    }

    table.indexes = indexes.into_values().collect();
    Ok(())
}
