//! Connectivity prober
//!
//! Pings every registered adapter concurrently and reports per-adapter latency.
//! Each probe owns its result slot; results come back through the task join.

use crate::dialect::{DatabaseKind, SchemaAdapter};
use crate::registry::AdapterRegistry;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PingResult {
    pub db_type: DatabaseKind,
    pub database: String,
    pub duration_nanoseconds: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PingResult {
    pub fn is_healthy(&self) -> bool {
        self.error.is_none()
    }
}

/// Ping all adapters, one task each. The output has exactly one entry per
/// registered adapter, in registration order.
pub async fn ping_all(registry: &AdapterRegistry) -> Vec<PingResult> {
    let handles: Vec<_> = registry
        .adapters()
        .iter()
        .map(|adapter| {
            let adapter = Arc::clone(adapter);
            tokio::spawn(async move { ping_one(adapter.as_ref()).await })
        })
        .collect();

    let mut results = Vec::with_capacity(handles.len());
    for (adapter, handle) in registry.adapters().iter().zip(handles) {
        let result = match handle.await {
            Ok(result) => result,
            Err(e) => PingResult {
                db_type: adapter.kind(),
                database: adapter.database().to_string(),
                duration_nanoseconds: 0,
                error: Some(format!("Ping task failed: {}", e)),
            },
        };
        results.push(result);
    }

    results
}

async fn ping_one(adapter: &dyn SchemaAdapter) -> PingResult {
    let start = Instant::now();
    let outcome = adapter.ping().await;
    let duration_nanoseconds = u64::try_from(start.elapsed().as_nanos()).unwrap_or(u64::MAX);

    let error = match outcome {
        Ok(()) => {
            debug!(
                "Ping {} ({}) ok in {}ns",
                adapter.database(),
                adapter.kind(),
                duration_nanoseconds
            );
            None
        }
        Err(e) => {
            warn!("Ping {} ({}) failed: {}", adapter.database(), adapter.kind(), e);
            Some(e.to_string())
        }
    };

    PingResult {
        db_type: adapter.kind(),
        database: adapter.database().to_string(),
        duration_nanoseconds,
        error,
    }
}
