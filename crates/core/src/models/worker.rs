use std::net::SocketAddr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::{ItemId, WorkerId};

/// 蜂群状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerStatus {
    Active,
    Disconnected,
}

/// 蜂群（Worker）信息
#[derive(Debug, Clone)]
pub struct WorkerInfo {
    pub id: WorkerId,
    pub endpoint: SocketAddr,
    pub status: WorkerStatus,
    pub current_assignment: Option<ItemId>,
    pub last_seen: DateTime<Utc>,
    pub registered_at: DateTime<Utc>,
    pub items_completed: u32,
    /// 被管理通道强制断开后置位，直到重新准入
    pub blocked: bool,
}

impl WorkerInfo {
    /// 创建新的活跃蜂群
    pub fn new(id: WorkerId, endpoint: SocketAddr, now: DateTime<Utc>) -> Self {
        Self {
            id,
            endpoint,
            status: WorkerStatus::Active,
            current_assignment: None,
            last_seen: now,
            registered_at: now,
            items_completed: 0,
            blocked: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == WorkerStatus::Active
    }

    /// 活跃且没有进行中的扇区
    pub fn is_idle(&self) -> bool {
        self.is_active() && self.current_assignment.is_none()
    }

    /// 最后活跃时间距今是否超过超时阈值
    pub fn is_expired(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        self.is_active() && now - self.last_seen > timeout
    }

    pub fn snapshot(&self) -> WorkerSnapshot {
        WorkerSnapshot {
            worker_id: self.id,
            endpoint: self.endpoint,
            status: self.status,
            current_assignment: self.current_assignment,
            last_seen: self.last_seen,
            items_completed: self.items_completed,
            blocked: self.blocked,
        }
    }
}

/// 对外展示的蜂群快照
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkerSnapshot {
    pub worker_id: WorkerId,
    pub endpoint: SocketAddr,
    pub status: WorkerStatus,
    pub current_assignment: Option<ItemId>,
    pub last_seen: DateTime<Utc>,
    pub items_completed: u32,
    pub blocked: bool,
}
