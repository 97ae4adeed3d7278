use crate::dialect::{AdapterBase, SchemaAdapter};
use crate::error::{Result, SchemaError};
use crate::schema::ddl;
use crate::schema::identifier::{quote_ansi, unquote};
use crate::schema::{Column, Index, Table};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tracing::debug;

const TABLES_SQL: &str = "SELECT name FROM sqlite_master WHERE type = 'table'";
const TABLE_DDL_SQL: &str = "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?";
const INDEX_DDL_SQL: &str = "SELECT name, sql FROM sqlite_master WHERE type = 'index' AND tbl_name = ?";

/// Prefix reserved for the engine's own bookkeeping tables.
const INTERNAL_PREFIX: &str = "sqlite_";

/// The embedded engine has no column or index catalog worth trusting, so
/// everything below the table list comes from parsing the stored DDL.
pub struct SqliteAdapter {
    base: AdapterBase,
}

impl SqliteAdapter {
    pub fn new(base: AdapterBase) -> Self {
        Self { base }
    }

    async fn row_count(&self, table: &str) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ansi(table));
        let rows = self.base.query(&sql, &[]).await?;
        let counts = self.base.convert(&rows, |row| row.int(0).map(Some))?;
        Ok(counts.first().copied().unwrap_or(0))
    }
}

#[async_trait]
impl SchemaAdapter for SqliteAdapter {
    fn base(&self) -> &AdapterBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut AdapterBase {
        &mut self.base
    }

    async fn tables(&self) -> Result<Vec<Table>> {
        let rows = self.base.query(TABLES_SQL, &[]).await?;
        let names = self.base.convert(&rows, |row| {
            let name = row.text(0)?;
            Ok((!name.starts_with(INTERNAL_PREFIX)).then_some(name))
        })?;

        let mut tables = Vec::with_capacity(names.len());
        for name in names {
            let mut table = Table::from_catalog(&name);
            table.rows = self.row_count(&name).await?;
            tables.push(table);
        }
        Ok(tables)
    }

    async fn columns(&self, table: &str) -> Result<Vec<Column>> {
        let object = format!("table {}", table);
        let rows = self.base.query(TABLE_DDL_SQL, &[table]).await?;
        let ddl_text = self.base.convert(&rows, |row| row.opt_text(0))?;

        let sql = ddl_text
            .into_iter()
            .next()
            .filter(|sql| !sql.trim().is_empty())
            .ok_or_else(|| SchemaError::parse(&object, format!("no table named {}", table)))?;

        ddl::parse_create_table(&sql).map_err(|cause| SchemaError::parse(&object, cause))
    }

    async fn indexes(&self, table: &str) -> Result<BTreeMap<String, Index>> {
        let rows = self.base.query(INDEX_DDL_SQL, &[table]).await?;
        let defs = self.base.convert(&rows, |row| {
            let name = row.text(0)?;
            // automatic indexes behind UNIQUE/PRIMARY KEY constraints have no SQL
            Ok(row.opt_text(1)?.map(|sql| (name, sql)))
        })?;

        let mut indexes = BTreeMap::new();
        for (name, sql) in defs {
            let parsed = ddl::parse_create_index(&sql)
                .map_err(|cause| SchemaError::parse(&format!("index {}", name), cause))?;

            let name = unquote(&name);
            debug!("Parsed index {} on {}: {:?}", name, table, parsed.columns);
            indexes.insert(
                name.clone(),
                Index {
                    name,
                    is_unique: parsed.is_unique,
                    columns: parsed.columns,
                },
            );
        }
        Ok(indexes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{CatalogConnection, SqliteConnection};
    use crate::dialect::DatabaseKind;
    use std::sync::Arc;

    const FIXTURE: &str = r#"
        CREATE TABLE "user" (
          "id" integer PRIMARY KEY AUTOINCREMENT,
          "desc" text,
          "income" real(9,3),
          "attrs" blob
        );
        CREATE UNIQUE INDEX "main"."IDX_attrs" ON "user" ("attrs" ASC);
        CREATE TABLE "phone" (
          "id" integer PRIMARY KEY AUTOINCREMENT,
          "userId" integer,
          "num" text
        );
        CREATE UNIQUE INDEX "main"."IDX_phone" ON "phone" ("userId" ASC);
        INSERT INTO "user" ("desc") VALUES ('a'), ('b');
    "#;

    async fn fixture_adapter() -> SqliteAdapter {
        let conn = SqliteConnection::open_in_memory().unwrap();
        conn.execute_batch(FIXTURE).await.unwrap();
        let conn: Arc<dyn CatalogConnection> = Arc::new(conn);
        SqliteAdapter::new(AdapterBase::new(conn, DatabaseKind::Sqlite, "main"))
    }

    #[tokio::test]
    async fn test_tables_skip_internal() {
        let adapter = fixture_adapter().await;
        let tables = adapter.tables().await.unwrap();

        let names: Vec<&str> = tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["user", "phone"]);
        assert_eq!(tables[0].rows, 2);
        assert_eq!(tables[1].rows, 0);
    }

    #[tokio::test]
    async fn test_columns_from_ddl() {
        let adapter = fixture_adapter().await;
        let cols = adapter.columns("user").await.unwrap();

        let names: Vec<&str> = cols.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "desc", "income", "attrs"]);
        assert!(cols[0].is_primary_key);
        assert!(cols[0].is_auto_increment);
        assert_eq!(cols[2].data_type, "real(9,3)");
    }

    #[tokio::test]
    async fn test_missing_table_is_parse_error() {
        let adapter = fixture_adapter().await;
        assert!(matches!(
            adapter.columns("ghost").await,
            Err(SchemaError::ParseFailed { .. })
        ));
    }

    async fn adapter_over(sql: &str) -> SqliteAdapter {
        let conn = SqliteConnection::open_in_memory().unwrap();
        conn.execute_batch(sql).await.unwrap();
        let conn: Arc<dyn CatalogConnection> = Arc::new(conn);
        SqliteAdapter::new(AdapterBase::new(conn, DatabaseKind::Sqlite, "main"))
    }

    #[tokio::test]
    async fn test_columns_from_commented_ddl() {
        let adapter = adapter_over(
            "CREATE TABLE t (
               a integer, -- the user's id
               b text /* note :) */,
               c blob
             );
             CREATE INDEX idx_b ON t (
               b -- sorted (asc)
             );",
        )
        .await;

        let cols = adapter.columns("t").await.unwrap();
        let names: Vec<&str> = cols.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(cols[1].data_type, "text");

        let indexes = adapter.indexes("t").await.unwrap();
        assert_eq!(indexes["idx_b"].columns, vec!["b"]);
    }

    #[tokio::test]
    async fn test_quoted_table_name_keeps_catalog_key() {
        let adapter = adapter_over(
            r#"CREATE TABLE "we""ird" (a integer);
               CREATE INDEX idx_a ON "we""ird" (a);
               INSERT INTO "we""ird" VALUES (1);"#,
        )
        .await;

        let tables = adapter.tables().await.unwrap();
        assert_eq!(tables[0].name, "weird");
        assert_eq!(tables[0].lookup_name(), "we\"ird");
        assert_eq!(tables[0].rows, 1);

        let cols = adapter.columns(tables[0].lookup_name()).await.unwrap();
        assert_eq!(cols[0].name, "a");
        let indexes = adapter.indexes(tables[0].lookup_name()).await.unwrap();
        assert!(indexes.contains_key("idx_a"));
    }

    #[tokio::test]
    async fn test_indexes_skip_automatic() {
        let conn = SqliteConnection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE t (a text UNIQUE, b int, c int);
             CREATE INDEX idx_bc ON t (b, c DESC);",
        )
        .await
        .unwrap();
        let conn: Arc<dyn CatalogConnection> = Arc::new(conn);
        let adapter = SqliteAdapter::new(AdapterBase::new(conn, DatabaseKind::Sqlite, "main"));

        let indexes = adapter.indexes("t").await.unwrap();
        assert_eq!(indexes.len(), 1);
        assert_eq!(indexes["idx_bc"].columns, vec!["b", "c"]);
        assert!(!indexes["idx_bc"].is_unique);
    }
}
