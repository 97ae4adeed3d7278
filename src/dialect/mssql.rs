use crate::connection::CatalogRow;
use crate::dialect::{AdapterBase, SchemaAdapter};
use crate::error::Result;
use crate::schema::identifier::unquote;
use crate::schema::model::non_empty;
use crate::schema::{Column, Index, Table};
use async_trait::async_trait;
use std::collections::BTreeMap;

const TABLES_SQL: &str = "SELECT t.name, \
     (SELECT SUM(p.rows) FROM sys.partitions p \
      WHERE p.object_id = t.object_id AND p.index_id IN (0, 1)) AS row_count, \
     (SELECT CAST(ep.value AS NVARCHAR(4000)) FROM sys.extended_properties ep \
      WHERE ep.class = 1 AND ep.major_id = t.object_id AND ep.minor_id = 0 \
      AND ep.name = 'MS_Description') AS comment \
     FROM sys.tables t \
     WHERE t.is_ms_shipped = 0 \
     AND t.schema_id = SCHEMA_ID(COALESCE(NULLIF(@P1, ''), SCHEMA_NAME())) \
     ORDER BY t.name";

const COLUMNS_SQL: &str = "SELECT a.name, b.name AS ctype, a.max_length, a.precision, a.scale, \
     a.is_nullable, d.definition AS vdefault, \
     CAST(CASE WHEN EXISTS (SELECT 1 FROM sys.index_columns ic \
         INNER JOIN sys.indexes i ON i.object_id = ic.object_id AND i.index_id = ic.index_id \
         WHERE i.is_primary_key = 1 AND ic.object_id = a.object_id AND ic.column_id = a.column_id) \
       THEN 1 ELSE 0 END AS BIT) AS is_primary_key, \
     CAST(ep.value AS NVARCHAR(4000)) AS comment \
     FROM sys.columns a \
     LEFT JOIN sys.types b ON a.user_type_id = b.user_type_id \
     LEFT JOIN sys.default_constraints d ON d.object_id = a.default_object_id \
     LEFT JOIN sys.extended_properties ep ON ep.class = 1 AND ep.major_id = a.object_id \
       AND ep.minor_id = a.column_id AND ep.name = 'MS_Description' \
     WHERE a.object_id = OBJECT_ID(QUOTENAME(COALESCE(NULLIF(@P1, ''), SCHEMA_NAME())) \
       + '.' + QUOTENAME(@P2)) \
     ORDER BY a.column_id";

const INDEXES_SQL: &str = "SELECT i.name AS index_name, c.name AS column_name, i.is_unique \
     FROM sys.indexes i \
     INNER JOIN sys.index_columns ic ON ic.object_id = i.object_id AND ic.index_id = i.index_id \
     INNER JOIN sys.columns c ON c.object_id = ic.object_id AND c.column_id = ic.column_id \
     WHERE i.type_desc = 'NONCLUSTERED' AND i.is_primary_key = 0 AND ic.is_included_column = 0 \
     AND i.object_id = OBJECT_ID(QUOTENAME(COALESCE(NULLIF(@P1, ''), SCHEMA_NAME())) \
       + '.' + QUOTENAME(@P2)) \
     ORDER BY i.name, ic.key_ordinal";

/// Tables, columns and indexes are read from one schema. An empty schema
/// means the login's default schema.
pub struct MssqlAdapter {
    base: AdapterBase,
    schema: String,
}

impl MssqlAdapter {
    pub fn new(base: AdapterBase) -> Self {
        Self {
            base,
            schema: String::new(),
        }
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }
}

#[async_trait]
impl SchemaAdapter for MssqlAdapter {
    fn base(&self) -> &AdapterBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut AdapterBase {
        &mut self.base
    }

    fn set_schema(&mut self, schema: &str) {
        self.schema = schema.to_string();
    }

    async fn tables(&self) -> Result<Vec<Table>> {
        let rows = self.base.query(TABLES_SQL, &[self.schema.as_str()]).await?;
        self.base.convert(&rows, |row| {
            let mut table = Table::from_catalog(&row.text(0)?);
            table.rows = row.opt_int(1)?.unwrap_or(0);
            table.comment = non_empty(row.opt_text(2)?);
            Ok(Some(table))
        })
    }

    async fn columns(&self, table: &str) -> Result<Vec<Column>> {
        let rows = self.base.query(COLUMNS_SQL, &[self.schema.as_str(), table]).await?;
        self.base.convert(&rows, |row| column_from_row(row).map(Some))
    }

    async fn indexes(&self, table: &str) -> Result<BTreeMap<String, Index>> {
        let rows = self.base.query(INDEXES_SQL, &[self.schema.as_str(), table]).await?;
        let entries = self.base.convert(&rows, |row| {
            Ok(Some((
                unquote(&row.text(0)?),
                unquote(&row.text(1)?),
                row.flag(2)?,
            )))
        })?;

        let mut indexes: BTreeMap<String, Index> = BTreeMap::new();
        for (name, column, is_unique) in entries {
            indexes
                .entry(name.clone())
                .or_insert_with(|| Index::new(name, is_unique))
                .columns
                .push(column);
        }
        Ok(indexes)
    }
}

fn column_from_row(row: &CatalogRow) -> Result<Column> {
    let ctype = row.opt_text(1)?.unwrap_or_default();
    let max_length = row.opt_int(2)?.unwrap_or(0);
    let precision = row.opt_int(3)?.unwrap_or(0);
    let scale = row.opt_int(4)?.unwrap_or(0);

    let mut column = Column::new(
        unquote(&row.text(0)?),
        sized_type(&ctype, max_length, precision, scale),
    );
    column.nullable = row.flag(5)?;
    column.default = non_empty(row.opt_text(6)?.map(|d| peel_parens(&d).to_string()));
    column.is_primary_key = row.flag(7)?;
    // identity columns are not reported as auto-increment
    column.is_auto_increment = false;
    column.comment = non_empty(row.opt_text(8)?);
    Ok(column)
}

/// `max_length` is in bytes, so national character types are halved; `-1`
/// means `(max)`.
fn sized_type(ctype: &str, max_length: i64, precision: i64, scale: i64) -> String {
    let char_length = |len: i64| match len {
        -1 => format!("{}(max)", ctype),
        len if len > 0 => format!("{}({})", ctype, len),
        _ => ctype.to_string(),
    };

    match ctype {
        "decimal" | "numeric" => format!("{}({},{})", ctype, precision, scale),
        "binary" | "char" | "varbinary" | "varchar" => char_length(max_length),
        "nchar" | "nvarchar" => char_length(if max_length > 0 {
            max_length / 2
        } else {
            max_length
        }),
        _ => ctype.to_string(),
    }
}

/// Strip parentheses that wrap the whole expression: `((0))` becomes `0`,
/// `(getdate())` becomes `getdate()`, `(1)+(2)` is left alone.
fn peel_parens(value: &str) -> &str {
    let mut current = value.trim();
    while current.starts_with('(') && current.ends_with(')') && wraps_whole(current) {
        current = current[1..current.len() - 1].trim();
    }
    current
}

fn wraps_whole(value: &str) -> bool {
    let mut depth = 0usize;
    for (i, c) in value.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return i == value.len() - 1;
                }
            }
            _ => {}
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::testing::{row, ScriptedConnection};
    use crate::connection::CatalogConnection;
    use crate::dialect::DatabaseKind;
    use std::sync::Arc;

    fn adapter(conn: ScriptedConnection) -> (MssqlAdapter, Arc<ScriptedConnection>) {
        let conn = Arc::new(conn);
        let shared: Arc<dyn CatalogConnection> = conn.clone();
        let base = AdapterBase::new(shared, DatabaseKind::Mssql, "crm");
        (MssqlAdapter::new(base), conn)
    }

    #[test]
    fn test_peel_parens() {
        assert_eq!(peel_parens("((0))"), "0");
        assert_eq!(peel_parens("(getdate())"), "getdate()");
        assert_eq!(peel_parens("('n/a')"), "'n/a'");
        assert_eq!(peel_parens("(1)+(2)"), "(1)+(2)");
        assert_eq!(peel_parens("plain"), "plain");
    }

    #[test]
    fn test_sized_type() {
        assert_eq!(sized_type("nvarchar", 100, 0, 0), "nvarchar(50)");
        assert_eq!(sized_type("varchar", -1, 0, 0), "varchar(max)");
        assert_eq!(sized_type("nvarchar", -1, 0, 0), "nvarchar(max)");
        assert_eq!(sized_type("decimal", 9, 18, 4), "decimal(18,4)");
        assert_eq!(sized_type("int", 4, 10, 0), "int");
    }

    #[tokio::test]
    async fn test_tables() {
        let (adapter, _) = adapter(ScriptedConnection::new().on(
            "FROM sys.tables",
            vec![
                row!["[Customers]", 42i64, "people we sell to"],
                row!["Empty", None::<i64>, None::<&str>],
            ],
        ));

        let tables = adapter.tables().await.unwrap();
        assert_eq!(tables[0].name, "Customers");
        assert_eq!(tables[0].rows, 42);
        assert_eq!(tables[0].comment.as_deref(), Some("people we sell to"));
        assert_eq!(tables[1].rows, 0);
        assert_eq!(tables[1].engine, None);
    }

    #[tokio::test]
    async fn test_columns() {
        let (adapter, conn) = adapter(ScriptedConnection::new().on(
            "FROM sys.columns",
            vec![
                row!["Id", "int", 4i64, 10i64, 0i64, false, None::<&str>, true, None::<&str>],
                row![
                    "Name",
                    "nvarchar",
                    200i64,
                    0i64,
                    0i64,
                    true,
                    "(N'')",
                    false,
                    "display name"
                ],
                row![
                    "Created",
                    "datetime2",
                    8i64,
                    27i64,
                    7i64,
                    false,
                    "(getdate())",
                    false,
                    None::<&str>
                ],
            ],
        ));

        let cols = adapter.columns("Customers").await.unwrap();
        assert_eq!(cols[0].data_type, "int");
        assert!(cols[0].is_primary_key);
        assert!(!cols[0].is_auto_increment);
        assert_eq!(cols[0].default, None);

        assert_eq!(cols[1].data_type, "nvarchar(100)");
        assert_eq!(cols[1].default.as_deref(), Some("N''"));
        assert!(cols[1].nullable);
        assert_eq!(cols[1].comment.as_deref(), Some("display name"));

        assert_eq!(cols[2].default.as_deref(), Some("getdate()"));

        assert!(conn.calls()[0].0.contains("QUOTENAME(@P2)"));
        assert_eq!(conn.calls()[0].1, vec!["".to_string(), "Customers".to_string()]);
    }

    #[tokio::test]
    async fn test_schema_scopes_every_query() {
        let (mut adapter, conn) = adapter(
            ScriptedConnection::new()
                .on("FROM sys.tables", vec![row!["orders", 3i64, None::<&str>]])
                .on("FROM sys.columns", vec![])
                .on("FROM sys.indexes", vec![]),
        );
        adapter.set_schema("sales");
        assert_eq!(adapter.schema(), "sales");

        let tables = adapter.tables().await.unwrap();
        adapter.columns(tables[0].lookup_name()).await.unwrap();
        adapter.indexes(tables[0].lookup_name()).await.unwrap();

        let calls = conn.calls();
        assert!(calls[0].0.contains("SCHEMA_ID("));
        assert_eq!(calls[0].1, vec!["sales".to_string()]);
        for (sql, params) in &calls[1..] {
            assert!(sql.contains("QUOTENAME(COALESCE(NULLIF(@P1, ''), SCHEMA_NAME()))"));
            assert_eq!(params, &vec!["sales".to_string(), "orders".to_string()]);
        }
    }

    #[tokio::test]
    async fn test_indexes() {
        let (adapter, _) = adapter(ScriptedConnection::new().on(
            "FROM sys.indexes",
            vec![
                row!["IX_Name_City", "Name", false],
                row!["IX_Name_City", "City", false],
                row!["UX_Email", "Email", 1i64],
            ],
        ));

        let indexes = adapter.indexes("Customers").await.unwrap();
        assert_eq!(indexes["IX_Name_City"].columns, vec!["Name", "City"]);
        assert!(!indexes["IX_Name_City"].is_unique);
        assert!(indexes["UX_Email"].is_unique);
    }
}
