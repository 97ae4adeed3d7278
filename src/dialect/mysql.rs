use crate::dialect::{AdapterBase, SchemaAdapter};
use crate::error::Result;
use crate::schema::identifier::unquote;
use crate::schema::model::non_empty;
use crate::schema::{Column, Index, Table};
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Storage engines whose tables are reported. Everything else (MEMORY, views,
/// federated tables) is skipped.
const SUPPORTED_ENGINES: [&str; 3] = ["MyISAM", "InnoDB", "TokuDB"];

const TABLES_SQL: &str = "SELECT `TABLE_NAME`, `ENGINE`, `TABLE_ROWS`, `TABLE_COMMENT` \
     FROM `INFORMATION_SCHEMA`.`TABLES` \
     WHERE `TABLE_SCHEMA` = ? AND `ENGINE` IN ('MyISAM', 'InnoDB', 'TokuDB') \
     ORDER BY `TABLE_NAME`";

const COLUMNS_SQL: &str = "SELECT `COLUMN_NAME`, `IS_NULLABLE`, `COLUMN_DEFAULT`, `COLUMN_TYPE`, \
     `COLUMN_KEY`, `EXTRA`, `COLUMN_COMMENT` \
     FROM `INFORMATION_SCHEMA`.`COLUMNS` \
     WHERE `TABLE_SCHEMA` = ? AND `TABLE_NAME` = ? \
     ORDER BY `ORDINAL_POSITION`";

const INDEXES_SQL: &str = "SELECT `INDEX_NAME`, `NON_UNIQUE`, `COLUMN_NAME` \
     FROM `INFORMATION_SCHEMA`.`STATISTICS` \
     WHERE `TABLE_SCHEMA` = ? AND `TABLE_NAME` = ? \
     ORDER BY `INDEX_NAME`, `SEQ_IN_INDEX`";

pub struct MysqlAdapter {
    base: AdapterBase,
}

impl MysqlAdapter {
    pub fn new(base: AdapterBase) -> Self {
        Self { base }
    }
}

fn is_supported_engine(engine: &str) -> bool {
    SUPPORTED_ENGINES
        .iter()
        .any(|e| e.eq_ignore_ascii_case(engine))
}

#[async_trait]
impl SchemaAdapter for MysqlAdapter {
    fn base(&self) -> &AdapterBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut AdapterBase {
        &mut self.base
    }

    async fn tables(&self) -> Result<Vec<Table>> {
        let rows = self.base.query(TABLES_SQL, &[self.database()]).await?;
        self.base.convert(&rows, |row| {
            let engine = row.opt_text(1)?.unwrap_or_default();
            if !is_supported_engine(&engine) {
                return Ok(None);
            }

            let mut table = Table::from_catalog(&row.text(0)?);
            table.engine = Some(engine);
            table.rows = row.opt_int(2)?.unwrap_or(0);
            table.comment = non_empty(row.opt_text(3)?);
            Ok(Some(table))
        })
    }

    async fn columns(&self, table: &str) -> Result<Vec<Column>> {
        let rows = self
            .base
            .query(COLUMNS_SQL, &[self.database(), table])
            .await?;

        self.base.convert(&rows, |row| {
            let mut column = Column::new(unquote(&row.text(0)?), row.text(3)?.to_lowercase());
            column.nullable = row.text(1)? == "YES";
            column.default = row.opt_text(2)?;
            column.is_primary_key = row.opt_text(4)?.as_deref() == Some("PRI");
            column.is_auto_increment = row
                .opt_text(5)?
                .is_some_and(|extra| extra.to_ascii_lowercase().contains("auto_increment"));
            column.comment = non_empty(row.opt_text(6)?);
            Ok(Some(column))
        })
    }

    async fn indexes(&self, table: &str) -> Result<BTreeMap<String, Index>> {
        let rows = self
            .base
            .query(INDEXES_SQL, &[self.database(), table])
            .await?;

        let entries = self.base.convert(&rows, |row| {
            let name = unquote(&row.text(0)?);
            // functional key parts have no column
            let Some(column) = row.opt_text(2)? else {
                return Ok(None);
            };
            Ok(Some((name, !row.flag(1)?, unquote(&column))))
        })?;

        let mut indexes: BTreeMap<String, Index> = BTreeMap::new();
        for (name, is_unique, column) in entries {
            if name == "PRIMARY" {
                continue;
            }
            indexes
                .entry(name.clone())
                .or_insert_with(|| Index::new(name, is_unique))
                .columns
                .push(column);
        }
        Ok(indexes)
    }
}
