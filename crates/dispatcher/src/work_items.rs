use rand::Rng;
use swarm_core::{ItemCounts, ItemId, ItemSnapshot, WorkItem, WorkItemState, WorkerId};

/// `complete` 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// 本次调用完成了该扇区
    Completed { is_target: bool },
    /// 同一蜂群重复上报，状态不变
    AlreadyCompleted { is_target: bool },
    /// 扇区当前未分配给该蜂群（已被回收、重新分配或由他人完成）
    NotAssigned,
    UnknownItem,
}

/// 固定数量的扇区集合
#[derive(Debug, Clone)]
pub struct WorkItemSet {
    items: Vec<WorkItem>,
}

impl WorkItemSet {
    /// 创建扇区集合，`target` 为 `None` 时没有任何扇区藏有目标
    pub fn new(total: usize, target: Option<ItemId>) -> Self {
        let items = (0..total)
            .map(|i| {
                let id = i as ItemId;
                WorkItem::new(id, target == Some(id))
            })
            .collect();
        Self { items }
    }

    /// 在 `[0, total)` 中均匀随机选取目标
    pub fn with_random_target(total: usize) -> Self {
        if total == 0 {
            return Self::new(0, None);
        }
        let target = rand::rng().random_range(0..total) as ItemId;
        Self::new(total, Some(target))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: ItemId) -> Option<&WorkItem> {
        self.items.get(id as usize)
    }

    fn get_mut(&mut self, id: ItemId) -> Option<&mut WorkItem> {
        self.items.get_mut(id as usize)
    }

    /// 目标所在扇区，只用于协调器本地日志
    pub fn target_id(&self) -> Option<ItemId> {
        self.items.iter().find(|item| item.is_target()).map(|item| item.id)
    }

    /// 按ID升序取第一个未分配扇区并分配给 `worker_id`
    pub fn next_unassigned(&mut self, worker_id: WorkerId) -> Option<ItemId> {
        let item = self.items.iter_mut().find(|item| item.is_assignable())?;
        item.state = WorkItemState::Assigned;
        item.assigned_worker = Some(worker_id);
        Some(item.id)
    }

    /// 将分配给 `worker_id` 的扇区标记为完成
    pub fn complete(&mut self, id: ItemId, worker_id: WorkerId) -> CompletionOutcome {
        let Some(item) = self.get_mut(id) else {
            return CompletionOutcome::UnknownItem;
        };

        match item.state {
            WorkItemState::Assigned if item.assigned_worker == Some(worker_id) => {
                item.state = WorkItemState::Completed;
                item.assigned_worker = None;
                item.completed_by = Some(worker_id);
                CompletionOutcome::Completed {
                    is_target: item.is_target(),
                }
            }
            WorkItemState::Completed if item.completed_by == Some(worker_id) => {
                CompletionOutcome::AlreadyCompleted {
                    is_target: item.is_target(),
                }
            }
            _ => CompletionOutcome::NotAssigned,
        }
    }

    /// 将已分配扇区退回未分配状态，返回是否发生了回收
    pub fn reclaim(&mut self, id: ItemId) -> bool {
        match self.get_mut(id) {
            Some(item) if item.state == WorkItemState::Assigned => {
                item.state = WorkItemState::Unassigned;
                item.assigned_worker = None;
                true
            }
            _ => false,
        }
    }

    /// 当前持有该扇区的蜂群
    pub fn assignee(&self, id: ItemId) -> Option<WorkerId> {
        self.get(id).and_then(|item| item.assigned_worker)
    }

    pub fn all_completed(&self) -> bool {
        self.items.iter().all(|item| item.is_completed())
    }

    pub fn counts(&self) -> ItemCounts {
        let mut counts = ItemCounts {
            total: self.items.len(),
            ..ItemCounts::default()
        };
        for item in &self.items {
            match item.state {
                WorkItemState::Unassigned => counts.unassigned += 1,
                WorkItemState::Assigned => counts.assigned += 1,
                WorkItemState::Completed => counts.completed += 1,
            }
        }
        counts
    }

    /// 对外快照，只有已完成的目标扇区才会被标出
    pub fn snapshots(&self) -> Vec<ItemSnapshot> {
        self.items
            .iter()
            .map(|item| ItemSnapshot {
                id: item.id,
                state: item.state,
                assigned_worker: item.assigned_worker,
                target_found_here: item.is_completed() && item.is_target(),
            })
            .collect()
    }
}
