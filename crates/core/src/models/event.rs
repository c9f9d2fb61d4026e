use std::fmt;
use std::net::SocketAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ItemId, WorkerId};

/// 值得通知观察者的搜索事件
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SearchEvent {
    CoordinatorStarted { total_items: usize },
    WorkerJoined { worker_id: WorkerId },
    WorkerResumed { worker_id: WorkerId },
    ItemAssigned { worker_id: WorkerId, item_id: ItemId },
    ItemSearched { worker_id: WorkerId, item_id: ItemId },
    TargetFound { worker_id: WorkerId, item_id: ItemId },
    AllItemsExhausted,
    WorkerDisconnected { worker_id: WorkerId, reclaimed: Option<ItemId> },
    WorkerTimedOut { worker_id: WorkerId, reclaimed: Option<ItemId> },
    WorkerBlocked { worker_id: WorkerId },
    WorkerReadmitted { worker_id: WorkerId },
    ObserverAttached { endpoint: SocketAddr },
    ObserverDetached { endpoint: SocketAddr },
    CoordinatorShutdown,
}

impl fmt::Display for SearchEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchEvent::CoordinatorStarted { total_items } => {
                write!(f, "协调器启动，共 {total_items} 个扇区")
            }
            SearchEvent::WorkerJoined { worker_id } => write!(f, "蜂群 #{worker_id} 加入搜索"),
            SearchEvent::WorkerResumed { worker_id } => write!(f, "蜂群 #{worker_id} 重新连接"),
            SearchEvent::ItemAssigned { worker_id, item_id } => {
                write!(f, "蜂群 #{worker_id} 被派往扇区 {item_id}")
            }
            SearchEvent::ItemSearched { worker_id, item_id } => {
                write!(f, "蜂群 #{worker_id} 搜索完扇区 {item_id}，未发现目标")
            }
            SearchEvent::TargetFound { worker_id, item_id } => {
                write!(f, "蜂群 #{worker_id} 在扇区 {item_id} 找到目标")
            }
            SearchEvent::AllItemsExhausted => write!(f, "所有扇区已搜索完毕，未找到目标"),
            SearchEvent::WorkerDisconnected {
                worker_id,
                reclaimed,
            } => match reclaimed {
                Some(item_id) => write!(f, "蜂群 #{worker_id} 断开连接，回收扇区 {item_id}"),
                None => write!(f, "蜂群 #{worker_id} 断开连接"),
            },
            SearchEvent::WorkerTimedOut {
                worker_id,
                reclaimed,
            } => match reclaimed {
                Some(item_id) => write!(f, "蜂群 #{worker_id} 心跳超时，回收扇区 {item_id}"),
                None => write!(f, "蜂群 #{worker_id} 心跳超时"),
            },
            SearchEvent::WorkerBlocked { worker_id } => write!(f, "蜂群 #{worker_id} 被管理员断开"),
            SearchEvent::WorkerReadmitted { worker_id } => {
                write!(f, "蜂群 #{worker_id} 被重新准入")
            }
            SearchEvent::ObserverAttached { endpoint } => write!(f, "观察者 {endpoint} 已连接"),
            SearchEvent::ObserverDetached { endpoint } => write!(f, "观察者 {endpoint} 已断开"),
            SearchEvent::CoordinatorShutdown => write!(f, "协调器关闭"),
        }
    }
}

/// 带时间戳的历史事件
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub event: SearchEvent,
}

impl HistoryEntry {
    pub fn new(event: SearchEvent, timestamp: DateTime<Utc>) -> Self {
        Self { timestamp, event }
    }
}

impl fmt::Display for HistoryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.timestamp.format("%H:%M:%S"), self.event)
    }
}
