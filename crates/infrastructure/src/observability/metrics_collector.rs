//! Metrics collector for the swarm coordinator
//!
//! 通过 `metrics` 门面记录，未安装导出器时所有调用都是空操作。

use std::net::SocketAddr;

use anyhow::Result;
use metrics::{counter, gauge, histogram, Counter, Gauge, Histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use swarm_core::ItemCounts;
use tracing::info;

/// 安装 Prometheus 导出器并在给定地址上提供 `/metrics`
///
/// 必须在 tokio 运行时内调用。
pub fn install_prometheus_exporter(addr: SocketAddr) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus exporter: {}", e))?;

    info!("Prometheus 指标导出器已启动: {}", addr);
    Ok(())
}

/// Metrics collector for the swarm coordinator
#[derive(Clone)]
pub struct SwarmMetrics {
    // Inbound traffic
    messages_received_total: Counter,
    messages_invalid_total: Counter,
    messages_denied_total: Counter,
    dispatch_duration: Histogram,

    // Work item progress
    items_assigned_total: Counter,
    items_completed_total: Counter,
    items_reclaimed_total: Counter,
    items_unassigned: Gauge,
    items_in_progress: Gauge,

    // Liveness
    workers_active: Gauge,
    workers_timed_out_total: Counter,
    observers_attached: Gauge,
}

impl SwarmMetrics {
    pub fn new() -> Self {
        Self {
            messages_received_total: counter!("swarm_messages_received_total"),
            messages_invalid_total: counter!("swarm_messages_invalid_total"),
            messages_denied_total: counter!("swarm_messages_denied_total"),
            dispatch_duration: histogram!("swarm_dispatch_duration_seconds"),
            items_assigned_total: counter!("swarm_items_assigned_total"),
            items_completed_total: counter!("swarm_items_completed_total"),
            items_reclaimed_total: counter!("swarm_items_reclaimed_total"),
            items_unassigned: gauge!("swarm_items_unassigned"),
            items_in_progress: gauge!("swarm_items_in_progress"),
            workers_active: gauge!("swarm_workers_active"),
            workers_timed_out_total: counter!("swarm_workers_timed_out_total"),
            observers_attached: gauge!("swarm_observers_attached"),
        }
    }

    /// Record one decoded inbound message and its handling time
    pub fn record_message(&self, duration_seconds: f64) {
        self.messages_received_total.increment(1);
        self.dispatch_duration.record(duration_seconds);
    }

    /// Record a datagram that failed to decode
    pub fn record_invalid_message(&self) {
        self.messages_invalid_total.increment(1);
    }

    pub fn record_denied(&self) {
        self.messages_denied_total.increment(1);
    }

    pub fn record_assignment(&self) {
        self.items_assigned_total.increment(1);
    }

    pub fn record_completion(&self) {
        self.items_completed_total.increment(1);
    }

    pub fn record_reclaimed(&self, count: u64) {
        self.items_reclaimed_total.increment(count);
    }

    pub fn record_worker_timeouts(&self, count: u64) {
        self.workers_timed_out_total.increment(count);
    }

    /// Update item and worker gauges from a fresh snapshot
    pub fn update_progress(&self, counts: &ItemCounts, active_workers: usize) {
        self.items_unassigned.set(counts.unassigned as f64);
        self.items_in_progress.set(counts.assigned as f64);
        self.workers_active.set(active_workers as f64);
    }

    pub fn update_observers(&self, count: usize) {
        self.observers_attached.set(count as f64);
    }
}

impl Default for SwarmMetrics {
    fn default() -> Self {
        Self::new()
    }
}
