use serde::{Deserialize, Serialize};

use super::{Conclusion, HistoryEntry, ItemCounts, ItemId, ItemSnapshot, WorkerId, WorkerSnapshot};

/// 蜂群发往协调器的消息
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerMessage {
    Request {
        worker_id: WorkerId,
    },
    Report {
        worker_id: WorkerId,
        item_id: ItemId,
        found: bool,
    },
    Heartbeat {
        worker_id: WorkerId,
    },
    Disconnect {
        worker_id: WorkerId,
    },
}

impl WorkerMessage {
    pub fn worker_id(&self) -> WorkerId {
        match self {
            WorkerMessage::Request { worker_id }
            | WorkerMessage::Report { worker_id, .. }
            | WorkerMessage::Heartbeat { worker_id }
            | WorkerMessage::Disconnect { worker_id } => *worker_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            WorkerMessage::Request { .. } => "REQUEST",
            WorkerMessage::Report { .. } => "REPORT",
            WorkerMessage::Heartbeat { .. } => "HEARTBEAT",
            WorkerMessage::Disconnect { .. } => "DISCONNECT",
        }
    }
}

/// 协调器发往蜂群的应答与推送
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CoordinatorReply {
    Search { item_id: ItemId },
    Continue,
    FoundAck,
    NoMoreItems,
    TargetFound,
    Denied,
    HeartbeatAck,
    DisconnectAck,
    Shutdown,
}

impl CoordinatorReply {
    /// 收到后蜂群应当停止工作的消息
    pub fn is_terminal(&self) -> bool {
        matches!(self, CoordinatorReply::TargetFound | CoordinatorReply::Shutdown)
    }
}

/// 观察者发往协调器的消息
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObserverRequest {
    Attach,
    /// 获取状态快照，同时作为观察者的保活
    Status,
    Detach,
}

/// 协调器推送给观察者的消息
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObserverEvent {
    Init {
        total_items: usize,
    },
    Event {
        entry: HistoryEntry,
    },
    Status {
        snapshot: StatusSnapshot,
    },
    SearchConcluded {
        target_found: bool,
        item_id: Option<ItemId>,
        worker_id: Option<WorkerId>,
    },
    Shutdown,
}

/// 管理通道命令
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlCommand {
    ListWorkers,
    Status,
    DisconnectWorker { worker_id: WorkerId },
    ReadmitWorker { worker_id: WorkerId },
}

/// 管理通道应答
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlResponse {
    Workers { workers: Vec<WorkerSnapshot> },
    Status { snapshot: StatusSnapshot },
    Ok { message: String },
    Error { message: String },
}

/// 协调器整体状态快照
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub items: ItemCounts,
    pub workers_total: usize,
    pub workers_active: usize,
    pub workers_disconnected: usize,
    pub target_found: bool,
    pub all_items_exhausted: bool,
    pub found_item: Option<ItemId>,
    pub found_by: Option<WorkerId>,
    pub item_details: Vec<ItemSnapshot>,
}

/// 需要广播给所有蜂群和观察者的终止通知
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalNotice {
    TargetFound { item_id: ItemId, worker_id: WorkerId },
    Exhausted,
    Shutdown,
}

impl TerminalNotice {
    /// 推送给蜂群的消息
    pub fn worker_reply(&self) -> CoordinatorReply {
        match self {
            TerminalNotice::TargetFound { .. } => CoordinatorReply::TargetFound,
            TerminalNotice::Exhausted => CoordinatorReply::NoMoreItems,
            TerminalNotice::Shutdown => CoordinatorReply::Shutdown,
        }
    }

    /// 推送给观察者的消息
    pub fn observer_event(&self) -> ObserverEvent {
        match self {
            TerminalNotice::TargetFound { item_id, worker_id } => ObserverEvent::SearchConcluded {
                target_found: true,
                item_id: Some(*item_id),
                worker_id: Some(*worker_id),
            },
            TerminalNotice::Exhausted => ObserverEvent::SearchConcluded {
                target_found: false,
                item_id: None,
                worker_id: None,
            },
            TerminalNotice::Shutdown => ObserverEvent::Shutdown,
        }
    }
}

impl From<Conclusion> for TerminalNotice {
    fn from(conclusion: Conclusion) -> Self {
        match conclusion {
            Conclusion::TargetFound { item_id, worker_id } => {
                TerminalNotice::TargetFound { item_id, worker_id }
            }
            Conclusion::Exhausted => TerminalNotice::Exhausted,
        }
    }
}
