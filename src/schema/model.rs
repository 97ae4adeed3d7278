//! Canonical schema model
//!
//! Engine-agnostic representation every adapter converges to. The serialized
//! shape (camelCase keys, optional fields omitted) is what downstream
//! consumers such as a table-info endpoint render.

use crate::dialect::DatabaseKind;
use crate::error::{Result, SchemaError};
use crate::schema::identifier::unquote;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    pub name: String,
    /// Engine-reported estimate, not a transactional count
    pub rows: i64,
    /// Storage engine label, MySQL only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub columns: Vec<Column>,
    pub indexes: Vec<Index>,
    /// Name exactly as the catalog stores it, when it differs from `name`
    #[serde(skip)]
    pub catalog_name: Option<String>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Table named by a raw catalog entry. The reported name is unquoted; the
    /// raw text is kept for follow-up catalog lookups.
    pub fn from_catalog(raw: &str) -> Self {
        let name = unquote(raw);
        let catalog_name = (name != raw).then(|| raw.to_string());
        Self {
            name,
            catalog_name,
            ..Default::default()
        }
    }

    /// Key for column and index lookups against the catalog.
    pub fn lookup_name(&self) -> &str {
        self.catalog_name.as_deref().unwrap_or(&self.name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    pub fn index(&self, name: &str) -> Option<&Index> {
        self.indexes.iter().find(|i| i.name == name)
    }

    pub fn primary_key(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.is_primary_key)
            .map(|c| c.name.as_str())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    /// Names of the indexes covering this column. Filled in by the aggregator.
    pub indexes: Vec<String>,
    pub is_primary_key: bool,
    pub is_auto_increment: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable: true,
            default: None,
            indexes: Vec::new(),
            is_primary_key: false,
            is_auto_increment: false,
            comment: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Index {
    pub name: String,
    pub is_unique: bool,
    /// Key order, not alphabetical
    pub columns: Vec<String>,
}

impl Index {
    pub fn new(name: impl Into<String>, is_unique: bool) -> Self {
        Self {
            name: name.into(),
            is_unique,
            columns: Vec::new(),
        }
    }
}

/// One complete schema snapshot of a single database, tagged with its engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableInfo {
    pub db_type: DatabaseKind,
    pub tables: Vec<Table>,
}

impl TableInfo {
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Check that index membership is recorded on both sides: every column an
    /// index names exists and lists the index, and every index a column lists
    /// exists and names the column.
    pub fn validate(&self) -> Result<()> {
        for table in &self.tables {
            let broken = |column: &str, index: &str| SchemaError::Inconsistent {
                table: table.name.clone(),
                column: column.to_string(),
                index: index.to_string(),
            };

            for index in &table.indexes {
                for name in &index.columns {
                    match table.column(name) {
                        Some(column) if column.indexes.contains(&index.name) => {}
                        _ => return Err(broken(name, &index.name)),
                    }
                }
            }

            for column in &table.columns {
                for name in &column.indexes {
                    match table.index(name) {
                        Some(index) if index.columns.contains(&column.name) => {}
                        _ => return Err(broken(&column.name, name)),
                    }
                }
            }
        }
        Ok(())
    }
}

/// Turn blank catalog text into `None`.
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_json_shape() {
        let mut column = Column::new("id", "integer");
        column.is_primary_key = true;
        column.nullable = false;

        let mut table = Table::new("user");
        table.rows = 3;
        table.columns.push(column);

        let info = TableInfo {
            db_type: DatabaseKind::Sqlite,
            tables: vec![table],
        };

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["dbType"], "sqlite3");
        let table = &json["tables"][0];
        assert_eq!(table["name"], "user");
        assert!(table.get("engine").is_none());
        assert!(table.get("comment").is_none());
        let col = &table["columns"][0];
        assert_eq!(col["type"], "integer");
        assert_eq!(col["isPrimaryKey"], true);
        assert_eq!(col["isAutoIncrement"], false);
        assert!(col["indexes"].as_array().unwrap().is_empty());
        assert!(col.get("default").is_none());
    }

    #[test]
    fn test_catalog_name_kept_for_lookup() {
        let plain = Table::from_catalog("orders");
        assert_eq!(plain.name, "orders");
        assert_eq!(plain.catalog_name, None);
        assert_eq!(plain.lookup_name(), "orders");

        let quoted = Table::from_catalog("we\"ird");
        assert_eq!(quoted.name, "weird");
        assert_eq!(quoted.lookup_name(), "we\"ird");

        let json = serde_json::to_value(&quoted).unwrap();
        assert_eq!(json["name"], "weird");
        assert!(json.get("catalogName").is_none());
    }

    #[test]
    fn test_column_lookup() {
        let mut table = Table::new("t");
        table.columns.push(Column::new("a", "int"));
        table.columns.push(Column::new("b", "int"));

        table.column_mut("b").unwrap().is_primary_key = true;
        assert_eq!(table.primary_key(), vec!["b"]);
        assert!(table.column("c").is_none());
    }

    #[test]
    fn test_validate_catches_one_sided_links() {
        let mut table = Table::new("phone");
        table.columns.push(Column::new("num", "text"));
        let mut index = Index::new("idx_num", false);
        index.columns.push("num".to_string());
        table.indexes.push(index);

        let mut info = TableInfo {
            db_type: DatabaseKind::Sqlite,
            tables: vec![table],
        };
        assert!(matches!(
            info.validate(),
            Err(SchemaError::Inconsistent { .. })
        ));

        info.tables[0].columns[0].indexes.push("idx_num".to_string());
        assert!(info.validate().is_ok());

        info.tables[0].columns[0].indexes.push("idx_gone".to_string());
        assert!(info.validate().is_err());
    }

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty(Some("".to_string())), None);
        assert_eq!(non_empty(Some("  ".to_string())), None);
        assert_eq!(non_empty(Some("note".to_string())), Some("note".to_string()));
        assert_eq!(non_empty(None), None);
    }
}
