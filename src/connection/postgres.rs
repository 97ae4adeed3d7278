use crate::connection::{CatalogConnection, CatalogRow, CatalogValue};
use crate::error::{Result, SchemaError};
use async_trait::async_trait;
use deadpool_postgres::{Config as PoolConfig, Pool, Runtime};
use postgres_types::{ToSql, Type};
use std::time::Duration;
use tokio_postgres::{NoTls, Row};

#[async_trait]
impl CatalogConnection for Pool {
    async fn query(&self, sql: &str, params: &[&str]) -> Result<Vec<CatalogRow>> {
        let client = self.get().await?;

        let params: Vec<&(dyn ToSql + Sync)> =
            params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();

        let rows = client.query(sql, &params).await?;
        rows.iter().map(convert_row).collect()
    }

    async fn ping(&self) -> Result<()> {
        let client = self.get().await?;
        client.execute("SELECT 1", &[]).await?;
        Ok(())
    }
}

fn convert_row(row: &Row) -> Result<CatalogRow> {
    let mut values = Vec::with_capacity(row.len());

    for (i, column) in row.columns().iter().enumerate() {
        let ty = column.type_();
        let value = if *ty == Type::BOOL {
            row.try_get::<_, Option<bool>>(i)?.map(CatalogValue::Bool)
        } else if *ty == Type::INT2 {
            row.try_get::<_, Option<i16>>(i)?
                .map(|v| CatalogValue::Int(v.into()))
        } else if *ty == Type::INT4 {
            row.try_get::<_, Option<i32>>(i)?
                .map(|v| CatalogValue::Int(v.into()))
        } else if *ty == Type::INT8 {
            row.try_get::<_, Option<i64>>(i)?.map(CatalogValue::Int)
        } else if *ty == Type::OID {
            row.try_get::<_, Option<u32>>(i)?
                .map(|v| CatalogValue::Int(v.into()))
        } else if *ty == Type::FLOAT4 {
            row.try_get::<_, Option<f32>>(i)?
                .map(|v| CatalogValue::Float(v.into()))
        } else if *ty == Type::FLOAT8 {
            row.try_get::<_, Option<f64>>(i)?.map(CatalogValue::Float)
        } else {
            // catalog queries cast everything else to text
            row.try_get::<_, Option<String>>(i)?.map(CatalogValue::Text)
        };

        values.push(value.unwrap_or(CatalogValue::Null));
    }

    Ok(CatalogRow::new(values))
}

/// Build a small pool for catalog work. Creating the pool does not connect.
pub fn create_pool(database_url: &str, max_size: u32) -> Result<Pool> {
    let mut cfg = PoolConfig::new();
    cfg.url = Some(database_url.to_string());

    cfg.pool = Some(deadpool_postgres::PoolConfig {
        max_size: max_size as usize,
        timeouts: deadpool_postgres::Timeouts {
            wait: Some(Duration::from_secs(5)),
            create: Some(Duration::from_secs(5)),
            recycle: Some(Duration::from_secs(5)),
        },
        ..Default::default()
    });

    cfg.create_pool(Some(Runtime::Tokio1), NoTls)
        .map_err(|e| SchemaError::configuration(format!("Failed to create pool: {}", e)))
}
