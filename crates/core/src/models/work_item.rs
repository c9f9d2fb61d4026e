use serde::{Deserialize, Serialize};

use super::{ItemId, WorkerId};

/// 扇区状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkItemState {
    Unassigned,
    Assigned,
    Completed,
}

/// 扇区（工作项）
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub id: ItemId,
    pub state: WorkItemState,
    /// 仅在 `Assigned` 状态下有值
    pub assigned_worker: Option<WorkerId>,
    /// 完成该扇区的蜂群，用于重复REPORT的幂等确认
    pub completed_by: Option<WorkerId>,
    is_target: bool,
}

impl WorkItem {
    /// 创建新的未分配扇区
    pub fn new(id: ItemId, is_target: bool) -> Self {
        Self {
            id,
            state: WorkItemState::Unassigned,
            assigned_worker: None,
            completed_by: None,
            is_target,
        }
    }

    pub fn is_target(&self) -> bool {
        self.is_target
    }

    pub fn is_assignable(&self) -> bool {
        self.state == WorkItemState::Unassigned
    }

    /// 是否分配给了指定蜂群
    pub fn is_assigned_to(&self, worker_id: WorkerId) -> bool {
        self.state == WorkItemState::Assigned && self.assigned_worker == Some(worker_id)
    }

    pub fn is_completed(&self) -> bool {
        self.state == WorkItemState::Completed
    }
}

/// 扇区计数快照
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ItemCounts {
    pub total: usize,
    pub unassigned: usize,
    pub assigned: usize,
    pub completed: usize,
}

/// 对外展示的扇区快照，目标位置只有在被找到后才会暴露
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ItemSnapshot {
    pub id: ItemId,
    pub state: WorkItemState,
    pub assigned_worker: Option<WorkerId>,
    pub target_found_here: bool,
}
