use std::time::Duration;

use serde::{Deserialize, Serialize};
use swarm_core::MAX_TOTAL_ITEMS;

use crate::validation::{ConfigValidator, ValidationUtils};

/// 协调器（调度端）配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// 蜂群通道监听地址
    pub bind_address: String,
    /// 观察者通道监听地址
    pub observer_bind_address: String,
    /// 管理通道监听地址
    pub control_bind_address: String,
    pub total_items: usize,
    /// 固定目标扇区，未设置时随机选取
    #[serde(default)]
    pub target_item: Option<u32>,
    /// 期望的蜂群心跳间隔
    pub heartbeat_interval_seconds: u64,
    pub worker_timeout_seconds: u64,
    pub liveness_check_interval_seconds: u64,
    /// 单次接收的最长等待时间
    pub poll_timeout_ms: u64,
    pub history_capacity: usize,
    pub observer_timeout_seconds: u64,
    pub shutdown_timeout_seconds: u64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:9000".to_string(),
            observer_bind_address: "127.0.0.1:10000".to_string(),
            control_bind_address: "127.0.0.1:11000".to_string(),
            total_items: 10,
            target_item: None,
            heartbeat_interval_seconds: 3,
            worker_timeout_seconds: 15,
            liveness_check_interval_seconds: 5,
            poll_timeout_ms: 200,
            history_capacity: 100,
            observer_timeout_seconds: 15,
            shutdown_timeout_seconds: 10,
        }
    }
}

impl CoordinatorConfig {
    pub fn worker_timeout(&self) -> Duration {
        Duration::from_secs(self.worker_timeout_seconds)
    }

    pub fn liveness_check_interval(&self) -> Duration {
        Duration::from_secs(self.liveness_check_interval_seconds)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn observer_timeout(&self) -> Duration {
        Duration::from_secs(self.observer_timeout_seconds)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_seconds)
    }
}

impl ConfigValidator for CoordinatorConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_socket_addr(&self.bind_address, "coordinator.bind_address")?;
        ValidationUtils::validate_socket_addr(
            &self.observer_bind_address,
            "coordinator.observer_bind_address",
        )?;
        ValidationUtils::validate_socket_addr(
            &self.control_bind_address,
            "coordinator.control_bind_address",
        )?;
        ValidationUtils::validate_count(
            self.total_items,
            "coordinator.total_items",
            MAX_TOTAL_ITEMS,
        )?;
        ValidationUtils::validate_timeout_seconds(
            self.heartbeat_interval_seconds,
            "coordinator.heartbeat_interval_seconds",
        )?;
        ValidationUtils::validate_timeout_seconds(
            self.worker_timeout_seconds,
            "coordinator.worker_timeout_seconds",
        )?;
        ValidationUtils::validate_timeout_seconds(
            self.liveness_check_interval_seconds,
            "coordinator.liveness_check_interval_seconds",
        )?;
        ValidationUtils::validate_millis(self.poll_timeout_ms, "coordinator.poll_timeout_ms")?;
        ValidationUtils::validate_count(
            self.history_capacity,
            "coordinator.history_capacity",
            10_000,
        )?;
        ValidationUtils::validate_timeout_seconds(
            self.observer_timeout_seconds,
            "coordinator.observer_timeout_seconds",
        )?;
        ValidationUtils::validate_timeout_seconds(
            self.shutdown_timeout_seconds,
            "coordinator.shutdown_timeout_seconds",
        )?;

        if let Some(target) = self.target_item {
            if target as usize >= self.total_items {
                return Err(crate::ConfigError::Validation(format!(
                    "coordinator.target_item ({target}) must be less than total_items ({})",
                    self.total_items
                )));
            }
        }

        if self.worker_timeout_seconds <= self.heartbeat_interval_seconds {
            return Err(crate::ConfigError::Validation(format!(
                "coordinator.worker_timeout_seconds ({}) must be greater than heartbeat_interval_seconds ({})",
                self.worker_timeout_seconds, self.heartbeat_interval_seconds
            )));
        }

        Ok(())
    }
}

/// 蜂群客户端配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub worker_id: u32,
    pub coordinator_address: String,
    pub bind_address: String,
    pub heartbeat_interval_seconds: u64,
    /// 模拟搜索耗时下限
    pub search_min_ms: u64,
    /// 模拟搜索耗时上限
    pub search_max_ms: u64,
    pub reply_timeout_ms: u64,
    pub max_attempts: u32,
    /// 收到 NO_MORE_ITEMS 后再次请求前的等待时间
    pub idle_retry_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_id: 1,
            coordinator_address: "127.0.0.1:9000".to_string(),
            bind_address: "0.0.0.0:0".to_string(),
            heartbeat_interval_seconds: 3,
            search_min_ms: 500,
            search_max_ms: 1500,
            reply_timeout_ms: 1000,
            max_attempts: 5,
            idle_retry_ms: 1000,
        }
    }
}

impl WorkerConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_seconds)
    }

    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }

    pub fn idle_retry(&self) -> Duration {
        Duration::from_millis(self.idle_retry_ms)
    }
}

impl ConfigValidator for WorkerConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_socket_addr(
            &self.coordinator_address,
            "worker.coordinator_address",
        )?;
        ValidationUtils::validate_socket_addr(&self.bind_address, "worker.bind_address")?;
        ValidationUtils::validate_timeout_seconds(
            self.heartbeat_interval_seconds,
            "worker.heartbeat_interval_seconds",
        )?;
        ValidationUtils::validate_millis(self.reply_timeout_ms, "worker.reply_timeout_ms")?;
        ValidationUtils::validate_millis(self.idle_retry_ms, "worker.idle_retry_ms")?;
        ValidationUtils::validate_count(self.max_attempts as usize, "worker.max_attempts", 100)?;

        if self.search_min_ms > self.search_max_ms {
            return Err(crate::ConfigError::Validation(format!(
                "worker.search_min_ms ({}) must not exceed worker.search_max_ms ({})",
                self.search_min_ms, self.search_max_ms
            )));
        }

        Ok(())
    }
}

/// 观察者客户端配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObserverConfig {
    pub coordinator_address: String,
    pub bind_address: String,
    /// 状态查询（兼保活）间隔
    pub status_interval_seconds: u64,
    pub reply_timeout_ms: u64,
    pub max_attempts: u32,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            coordinator_address: "127.0.0.1:10000".to_string(),
            bind_address: "0.0.0.0:0".to_string(),
            status_interval_seconds: 5,
            reply_timeout_ms: 1000,
            max_attempts: 5,
        }
    }
}

impl ObserverConfig {
    pub fn status_interval(&self) -> Duration {
        Duration::from_secs(self.status_interval_seconds)
    }

    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }
}

impl ConfigValidator for ObserverConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_socket_addr(
            &self.coordinator_address,
            "observer.coordinator_address",
        )?;
        ValidationUtils::validate_socket_addr(&self.bind_address, "observer.bind_address")?;
        ValidationUtils::validate_timeout_seconds(
            self.status_interval_seconds,
            "observer.status_interval_seconds",
        )?;
        ValidationUtils::validate_millis(self.reply_timeout_ms, "observer.reply_timeout_ms")?;
        ValidationUtils::validate_count(self.max_attempts as usize, "observer.max_attempts", 100)?;
        Ok(())
    }
}
