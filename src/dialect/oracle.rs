use crate::connection::CatalogRow;
use crate::dialect::{AdapterBase, SchemaAdapter};
use crate::error::Result;
use crate::schema::identifier::unquote;
use crate::schema::model::non_empty;
use crate::schema::{Column, Index, Table};
use async_trait::async_trait;
use std::collections::BTreeMap;

const TABLES_SQL: &str = "SELECT T.TABLE_NAME, T.NUM_ROWS, C.COMMENTS \
     FROM USER_TABLES T \
     LEFT JOIN USER_TAB_COMMENTS C ON T.TABLE_NAME = C.TABLE_NAME \
     ORDER BY T.TABLE_NAME";

const COLUMNS_SQL: &str = "SELECT T.COLUMN_NAME, T.DATA_DEFAULT, T.DATA_TYPE, T.DATA_LENGTH, \
     T.DATA_PRECISION, T.DATA_SCALE, T.NULLABLE, \
     (SELECT COUNT(1) FROM USER_CONS_COLUMNS CS \
      JOIN USER_CONSTRAINTS CC ON CS.CONSTRAINT_NAME = CC.CONSTRAINT_NAME AND CC.CONSTRAINT_TYPE = 'P' \
      WHERE CS.TABLE_NAME = T.TABLE_NAME AND CS.COLUMN_NAME = T.COLUMN_NAME) IS_PRIMARY_KEY, \
     C.COMMENTS \
     FROM USER_TAB_COLUMNS T \
     LEFT JOIN USER_COL_COMMENTS C ON T.TABLE_NAME = C.TABLE_NAME AND T.COLUMN_NAME = C.COLUMN_NAME \
     WHERE T.TABLE_NAME = :1 \
     ORDER BY T.COLUMN_ID";

const INDEXES_SQL: &str = "SELECT T.COLUMN_NAME, I.UNIQUENESS, I.INDEX_NAME \
     FROM USER_IND_COLUMNS T \
     JOIN USER_INDEXES I ON T.INDEX_NAME = I.INDEX_NAME AND T.TABLE_NAME = I.TABLE_NAME \
     WHERE NOT EXISTS (SELECT 1 FROM USER_CONSTRAINTS WHERE CONSTRAINT_NAME = T.INDEX_NAME) \
     AND T.TABLE_NAME = :1 \
     ORDER BY I.INDEX_NAME, T.COLUMN_POSITION";

pub struct OracleAdapter {
    base: AdapterBase,
}

impl OracleAdapter {
    pub fn new(base: AdapterBase) -> Self {
        Self { base }
    }
}

#[async_trait]
impl SchemaAdapter for OracleAdapter {
    fn base(&self) -> &AdapterBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut AdapterBase {
        &mut self.base
    }

    async fn tables(&self) -> Result<Vec<Table>> {
        let rows = self.base.query(TABLES_SQL, &[]).await?;
        self.base.convert(&rows, |row| {
            let mut table = Table::from_catalog(&row.text(0)?);
            // NUM_ROWS is NULL until statistics are gathered
            table.rows = row.opt_int(1)?.unwrap_or(0);
            table.comment = non_empty(row.opt_text(2)?);
            Ok(Some(table))
        })
    }

    async fn columns(&self, table: &str) -> Result<Vec<Column>> {
        let rows = self.base.query(COLUMNS_SQL, &[table]).await?;
        self.base.convert(&rows, column_from_row)
    }

    async fn indexes(&self, table: &str) -> Result<BTreeMap<String, Index>> {
        let rows = self.base.query(INDEXES_SQL, &[table]).await?;
        let entries = self.base.convert(&rows, |row| {
            Ok(Some((
                unquote(&row.text(2)?),
                row.opt_text(1)?.as_deref() == Some("UNIQUE"),
                unquote(&row.text(0)?),
            )))
        })?;

        let mut indexes: BTreeMap<String, Index> = BTreeMap::new();
        for (name, is_unique, column) in entries {
            indexes
                .entry(name.clone())
                .or_insert_with(|| Index::new(name, is_unique))
                .columns
                .push(column);
        }
        Ok(indexes)
    }
}

/// `None` for rows without a data type (hidden or unused columns).
fn column_from_row(row: &CatalogRow) -> Result<Option<Column>> {
    let Some(data_type) = row.opt_text(2)? else {
        return Ok(None);
    };

    let precision = row.opt_int(4)?;
    let data_type = match data_type.as_str() {
        "CHAR" | "NCHAR" | "VARCHAR2" | "NVARCHAR2" => {
            format!("{}({})", data_type, row.opt_int(3)?.unwrap_or(0))
        }
        "NUMBER" => match (precision, row.opt_int(5)?) {
            (Some(p), Some(s)) => format!("{}({},{})", data_type, p, s),
            (Some(p), None) => format!("{}({})", data_type, p),
            _ => data_type,
        },
        "FLOAT" => match precision {
            Some(p) => format!("{}({})", data_type, p),
            None => data_type,
        },
        _ => data_type,
    };

    let mut column = Column::new(unquote(&row.text(0)?), data_type);
    column.nullable = row.opt_text(6)?.as_deref() == Some("Y");
    column.default = row
        .opt_text(1)?
        .map(|d| d.trim_matches(|c| c == '\'' || c == ' ').to_string());
    column.is_primary_key = row.opt_int(7)?.unwrap_or(0) > 0;
    column.comment = non_empty(row.opt_text(8)?);
    Ok(Some(column))
}
