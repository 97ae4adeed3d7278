use crate::connection::CatalogRow;
use crate::dialect::{with_size, AdapterBase, SchemaAdapter};
use crate::error::{Result, SchemaError};
use crate::schema::ddl;
use crate::schema::identifier::unquote;
use crate::schema::model::non_empty;
use crate::schema::{Column, Index, Table};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tracing::debug;

/// Namespace read when no schema has been set.
pub const DEFAULT_POSTGRES_SCHEMA: &str = "public";

pub struct PostgresAdapter {
    base: AdapterBase,
    /// Empty means every non-system schema.
    schema: String,
}

impl PostgresAdapter {
    pub fn new(base: AdapterBase) -> Self {
        Self {
            base,
            schema: DEFAULT_POSTGRES_SCHEMA.to_string(),
        }
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    fn tables_sql(&self) -> String {
        let mut sql = String::from(
            "SELECT t.tablename::text, GREATEST(c.reltuples, 0)::bigint AS rows, \
             obj_description(c.oid, 'pg_class')::text AS comment \
             FROM pg_tables t \
             JOIN pg_class c ON t.tablename = c.relname \
             JOIN pg_namespace n ON n.oid = c.relnamespace AND n.nspname = t.schemaname",
        );
        if self.schema.is_empty() {
            sql.push_str(" WHERE t.schemaname NOT IN ('pg_catalog', 'information_schema')");
        } else {
            sql.push_str(" WHERE t.schemaname = $1");
        }
        sql.push_str(" ORDER BY t.tablename");
        sql
    }

    fn columns_sql(&self) -> String {
        let schema_filter = if self.schema.is_empty() {
            ""
        } else {
            " AND s.table_schema = $2"
        };
        format!(
            "SELECT s.column_name::text, s.column_default::text, s.is_nullable::text, \
             s.data_type::text, s.udt_name::text, \
             s.character_maximum_length::bigint AS char_length, \
             (CASE WHEN s.numeric_precision_radix = 10 THEN s.numeric_precision END)::bigint AS num_precision, \
             s.numeric_scale::bigint AS num_scale, \
             EXISTS (SELECT 1 FROM pg_constraint p \
                     WHERE p.conrelid = c.oid AND p.contype = 'p' AND f.attnum = ANY (p.conkey)) AS primarykey, \
             col_description(f.attrelid, f.attnum)::text AS column_comment \
             FROM information_schema.columns s \
             JOIN pg_class c ON c.relname = s.table_name \
             JOIN pg_namespace n ON n.oid = c.relnamespace AND n.nspname = s.table_schema \
             JOIN pg_attribute f ON f.attrelid = c.oid AND f.attname = s.column_name \
             WHERE c.relkind IN ('r', 'p') AND s.table_name = $1{} AND f.attnum > 0 \
             ORDER BY f.attnum",
            schema_filter
        )
    }

    fn indexes_sql(&self) -> String {
        let mut sql = String::from(
            "SELECT indexname::text, indexdef::text FROM pg_indexes WHERE tablename = $1",
        );
        if !self.schema.is_empty() {
            sql.push_str(" AND schemaname = $2");
        }
        sql.push_str(" ORDER BY indexname");
        sql
    }
}

#[async_trait]
impl SchemaAdapter for PostgresAdapter {
    fn base(&self) -> &AdapterBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut AdapterBase {
        &mut self.base
    }

    fn set_schema(&mut self, schema: &str) {
        debug!("PostgreSQL schema set to {:?}", schema);
        self.schema = schema.to_string();
    }

    async fn tables(&self) -> Result<Vec<Table>> {
        let mut params = Vec::new();
        if !self.schema.is_empty() {
            params.push(self.schema.as_str());
        }

        let rows = self.base.query(&self.tables_sql(), &params).await?;
        self.base.convert(&rows, |row| {
            let mut table = Table::from_catalog(&row.text(0)?);
            table.rows = row.opt_int(1)?.unwrap_or(0);
            table.comment = non_empty(row.opt_text(2)?);
            Ok(Some(table))
        })
    }

    async fn columns(&self, table: &str) -> Result<Vec<Column>> {
        let mut params = vec![table];
        if !self.schema.is_empty() {
            params.push(self.schema.as_str());
        }

        let rows = self.base.query(&self.columns_sql(), &params).await?;
        self.base.convert(&rows, |row| column_from_row(row).map(Some))
    }

    async fn indexes(&self, table: &str) -> Result<BTreeMap<String, Index>> {
        let mut params = vec![table];
        if !self.schema.is_empty() {
            params.push(self.schema.as_str());
        }

        let rows = self.base.query(&self.indexes_sql(), &params).await?;
        let defs = self.base.convert(&rows, |row| {
            Ok(Some((unquote(&row.text(0)?), row.text(1)?)))
        })?;

        let mut indexes: BTreeMap<String, Index> = BTreeMap::new();
        for (name, indexdef) in defs {
            if name.ends_with("_pkey") {
                continue;
            }

            let is_unique = indexdef.starts_with("CREATE UNIQUE INDEX");
            let columns = ddl::index_key_columns(&indexdef)
                .map_err(|cause| SchemaError::parse(&format!("index {}", name), cause))?;

            let name = short_index_name(table, &name);
            indexes
                .entry(name.clone())
                .or_insert_with(|| Index::new(name, is_unique))
                .columns
                .extend(columns);
        }

        Ok(indexes)
    }
}

fn column_from_row(row: &CatalogRow) -> Result<Column> {
    let default = row.opt_text(1)?;
    let is_primary_key = row.flag(8)?;

    let mut column = Column::new(unquote(&row.text(0)?), "");
    column.is_primary_key = is_primary_key;
    if !is_primary_key {
        column.default = default.clone();
    }
    column.is_auto_increment = default
        .as_deref()
        .is_some_and(|d| d.starts_with("nextval("));

    let (base_type, serial) = canonical_type(&row.text(3)?, row.opt_text(4)?.as_deref());
    if serial {
        column.is_auto_increment = true;
    }

    let length = match row.opt_int(5)? {
        Some(len) => Some(len),
        None => row.opt_int(6)?,
    };
    column.data_type = with_size(&base_type, length, row.opt_int(7)?);
    column.nullable = row.text(2)? == "YES";
    column.comment = non_empty(row.opt_text(9)?);
    Ok(column)
}

/// Short names for the verbose `information_schema` spellings. The flag marks
/// serial pseudo-types.
fn canonical_type(data_type: &str, udt_name: Option<&str>) -> (String, bool) {
    let short = match data_type {
        "character varying" => "varchar",
        "character" => "char",
        "bit varying" => "varbit",
        "timestamp without time zone" => "timestamp",
        "timestamp with time zone" => "timestamptz",
        "time without time zone" => "time",
        "time with time zone" => "timetz",
        "double precision" => "float8",
        "boolean" => "bool",
        "oid" => "bigint",
        "bigserial" | "smallserial" | "serial" => return (data_type.to_string(), true),
        "USER-DEFINED" => udt_name.unwrap_or(data_type),
        other => other,
    };
    (short.to_string(), false)
}

/// Drop the `IDX_<table>_` / `UQE_<table>_` prefix used by ORM-generated
/// index names. A name that would become empty is kept as is.
fn short_index_name(table: &str, name: &str) -> String {
    for prefix in ["IDX_", "UQE_"] {
        if let Some(rest) = name
            .strip_prefix(prefix)
            .and_then(|n| n.strip_prefix(table))
            .and_then(|n| n.strip_prefix('_'))
        {
            if !rest.is_empty() {
                return rest.to_string();
            }
        }
    }
    name.to_string()
}
