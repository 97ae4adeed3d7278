//! Canned connection for adapter unit tests.

use crate::connection::{CatalogConnection, CatalogRow};
use crate::error::{Result, SchemaError};
use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

/// Build a [`CatalogRow`] from anything convertible into a catalog value.
macro_rules! row {
    ($($value:expr),* $(,)?) => {
        $crate::connection::CatalogRow::new(vec![
            $($crate::connection::CatalogValue::from($value)),*
        ])
    };
}
pub(crate) use row;

/// Answers each query with the rows of the first script entry whose SQL
/// fragment occurs in the statement. Every call is recorded.
#[derive(Default)]
pub(crate) struct ScriptedConnection {
    script: Vec<(String, Vec<CatalogRow>)>,
    ping_error: Option<String>,
    delay: Option<Duration>,
    calls: Mutex<Vec<(String, Vec<String>)>>,
}

impl ScriptedConnection {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn on(mut self, fragment: &str, rows: Vec<CatalogRow>) -> Self {
        self.script.push((fragment.to_string(), rows));
        self
    }

    pub(crate) fn failing_ping(mut self, cause: &str) -> Self {
        self.ping_error = Some(cause.to_string());
        self
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl CatalogConnection for ScriptedConnection {
    async fn query(&self, sql: &str, params: &[&str]) -> Result<Vec<CatalogRow>> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((
                sql.to_string(),
                params.iter().map(|p| p.to_string()).collect(),
            ));
        }

        self.script
            .iter()
            .find(|(fragment, _)| sql.contains(fragment.as_str()))
            .map(|(_, rows)| rows.clone())
            .ok_or_else(|| SchemaError::query("scripted", format!("no rows scripted for {}", sql)))
    }

    async fn ping(&self) -> Result<()> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.ping_error {
            Some(cause) => Err(SchemaError::query("scripted", cause)),
            None => Ok(()),
        }
    }
}
