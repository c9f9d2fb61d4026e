use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{
    dispatcher_worker::{CoordinatorConfig, ObserverConfig, WorkerConfig},
    logging::ObservabilityConfig,
};
use crate::validation::ConfigValidator;

/// 环境变量前缀，例如 `SWARM_COORDINATOR__TOTAL_ITEMS=20`
pub const ENV_PREFIX: &str = "SWARM";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub coordinator: CoordinatorConfig,
    pub worker: WorkerConfig,
    pub observer: ObserverConfig,
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = Self::with_defaults(ConfigBuilder::builder())?;

        if let Some(path) = config_path {
            if Path::new(path).exists() {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            } else {
                return Err(anyhow::anyhow!("配置文件不存在: {}", path));
            }
        } else {
            let default_paths = ["config/swarm.toml", "swarm.toml"];

            for path in &default_paths {
                if Path::new(path).exists() {
                    builder = builder.add_source(File::new(path, FileFormat::Toml));
                    break;
                }
            }
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder
            .build()
            .context("构建配置失败")?
            .try_deserialize()
            .context("反序列化配置失败")?;

        config.validate()?;

        Ok(config)
    }

    /// 所有键都有默认值，配置文件只需覆盖关心的部分
    fn with_defaults(
        builder: config::builder::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<config::builder::ConfigBuilder<config::builder::DefaultState>> {
        let defaults = AppConfig::default();
        let c = &defaults.coordinator;
        let w = &defaults.worker;
        let o = &defaults.observer;
        let obs = &defaults.observability;

        let builder = builder
            .set_default("coordinator.bind_address", c.bind_address.as_str())?
            .set_default(
                "coordinator.observer_bind_address",
                c.observer_bind_address.as_str(),
            )?
            .set_default(
                "coordinator.control_bind_address",
                c.control_bind_address.as_str(),
            )?
            .set_default("coordinator.total_items", c.total_items as i64)?
            .set_default(
                "coordinator.heartbeat_interval_seconds",
                c.heartbeat_interval_seconds as i64,
            )?
            .set_default(
                "coordinator.worker_timeout_seconds",
                c.worker_timeout_seconds as i64,
            )?
            .set_default(
                "coordinator.liveness_check_interval_seconds",
                c.liveness_check_interval_seconds as i64,
            )?
            .set_default("coordinator.poll_timeout_ms", c.poll_timeout_ms as i64)?
            .set_default("coordinator.history_capacity", c.history_capacity as i64)?
            .set_default(
                "coordinator.observer_timeout_seconds",
                c.observer_timeout_seconds as i64,
            )?
            .set_default(
                "coordinator.shutdown_timeout_seconds",
                c.shutdown_timeout_seconds as i64,
            )?
            .set_default("worker.worker_id", w.worker_id as i64)?
            .set_default("worker.coordinator_address", w.coordinator_address.as_str())?
            .set_default("worker.bind_address", w.bind_address.as_str())?
            .set_default(
                "worker.heartbeat_interval_seconds",
                w.heartbeat_interval_seconds as i64,
            )?
            .set_default("worker.search_min_ms", w.search_min_ms as i64)?
            .set_default("worker.search_max_ms", w.search_max_ms as i64)?
            .set_default("worker.reply_timeout_ms", w.reply_timeout_ms as i64)?
            .set_default("worker.max_attempts", w.max_attempts as i64)?
            .set_default("worker.idle_retry_ms", w.idle_retry_ms as i64)?
            .set_default("observer.coordinator_address", o.coordinator_address.as_str())?
            .set_default("observer.bind_address", o.bind_address.as_str())?
            .set_default(
                "observer.status_interval_seconds",
                o.status_interval_seconds as i64,
            )?
            .set_default("observer.reply_timeout_ms", o.reply_timeout_ms as i64)?
            .set_default("observer.max_attempts", o.max_attempts as i64)?
            .set_default("observability.log_level", obs.log_level.to_string())?
            .set_default("observability.log_format", obs.log_format.to_string())?
            .set_default("observability.metrics_enabled", obs.metrics_enabled)?;

        Ok(builder)
    }

    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(toml_str).context("解析TOML配置失败")?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("序列化配置为TOML失败")
    }
}

impl ConfigValidator for AppConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        self.coordinator.validate()?;
        self.worker.validate()?;
        self.observer.validate()?;
        self.observability.validate()?;
        Ok(())
    }
}
