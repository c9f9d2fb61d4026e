//! Observability module
//!
//! 协调器的 Prometheus 指标。日志初始化在各个二进制入口完成。

pub mod metrics_collector;

pub use metrics_collector::{install_prometheus_exporter, SwarmMetrics};
