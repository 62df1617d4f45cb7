use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};
use serde::Serialize;
use std::path::PathBuf;

use crate::utils::error::ChartsError;

/// Struct for managing server health metrics.
#[derive(Clone)]
pub struct HealthMetrics {
    /// Number of open live-reload connections, refreshed on every scrape.
    pub connections: IntGauge,
    /// Counts reload broadcasts, manual or triggered by the watcher.
    pub reloads_broadcast: IntCounter,
    /// Counts reload messages actually queued to clients.
    pub reloads_delivered: IntCounter,
    /// Counts settled file changes reported by the watcher.
    pub file_changes: IntCounter,
    /// Prometheus registry used to store and manage the metrics.
    registry: Registry,
}

impl HealthMetrics {
    /// Creates a new instance of `HealthMetrics` and registers the metrics with Prometheus.
    ///
    /// # Errors
    /// Returns `ChartsError::MetricsError` if a metric cannot be created or registered.
    pub fn new() -> Result<Self, ChartsError> {
        let registry = Registry::new();
        let connections = IntGauge::new("sse_connections", "Open live-reload connections")?;
        let reloads_broadcast = IntCounter::new("reloads_broadcast_total", "Reload broadcasts")?;
        let reloads_delivered =
            IntCounter::new("reloads_delivered_total", "Reload messages delivered to clients")?;
        let file_changes = IntCounter::new("file_changes_total", "Settled file changes")?;

        registry.register(Box::new(connections.clone()))?;
        registry.register(Box::new(reloads_broadcast.clone()))?;
        registry.register(Box::new(reloads_delivered.clone()))?;
        registry.register(Box::new(file_changes.clone()))?;

        Ok(Self {
            connections,
            reloads_broadcast,
            reloads_delivered,
            file_changes,
            registry,
        })
    }

    /// Records one reload broadcast that reached `delivered` clients.
    pub fn record_reload(&self, delivered: usize) {
        self.reloads_broadcast.inc();
        self.reloads_delivered.inc_by(delivered as u64);
    }

    /// Exposes the current state of all registered metrics in Prometheus-compatible format.
    ///
    /// # Errors
    /// Returns `ChartsError::MetricsError` if encoding fails.
    pub fn expose_metrics(&self, connections: usize) -> Result<String, ChartsError> {
        self.connections.set(connections as i64);

        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = vec![];
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| ChartsError::MetricsError(e.to_string()))
    }
}

/// Body of `GET /health`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct HealthReport {
    pub status: &'static str,
    pub clients: usize,
    pub workspace: Option<PathBuf>,
}

impl HealthReport {
    pub fn ok(clients: usize, workspace: Option<PathBuf>) -> Self {
        Self {
            status: "ok",
            clients,
            workspace,
        }
    }
}
