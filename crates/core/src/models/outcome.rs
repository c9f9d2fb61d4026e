use serde::{Deserialize, Serialize};

use super::{ItemId, WorkerId};

/// 搜索的最终结论
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Conclusion {
    /// 目标在某个扇区被找到
    TargetFound { item_id: ItemId, worker_id: WorkerId },
    /// 所有扇区都已搜索完毕，未找到目标
    Exhausted,
}

/// 全局搜索结果
///
/// 两个标志都只允许 false → true 的单向变化。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchOutcome {
    target_found: bool,
    all_items_exhausted: bool,
    found: Option<(ItemId, WorkerId)>,
}

impl SearchOutcome {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn target_found(&self) -> bool {
        self.target_found
    }

    pub fn all_items_exhausted(&self) -> bool {
        self.all_items_exhausted
    }

    /// 任一标志为真即为终态
    pub fn is_terminal(&self) -> bool {
        self.target_found || self.all_items_exhausted
    }

    /// 记录目标被找到，返回本次调用是否发生了状态变化
    pub fn mark_target_found(&mut self, item_id: ItemId, worker_id: WorkerId) -> bool {
        if self.target_found {
            return false;
        }
        self.target_found = true;
        self.found = Some((item_id, worker_id));
        true
    }

    /// 记录所有扇区已完成，返回本次调用是否发生了状态变化
    pub fn mark_exhausted(&mut self) -> bool {
        if self.all_items_exhausted {
            return false;
        }
        self.all_items_exhausted = true;
        true
    }

    /// 找到目标的扇区与蜂群
    pub fn found(&self) -> Option<(ItemId, WorkerId)> {
        self.found
    }

    /// 当前结论，找到目标优先于扇区耗尽
    pub fn conclusion(&self) -> Option<Conclusion> {
        match self.found {
            Some((item_id, worker_id)) => Some(Conclusion::TargetFound { item_id, worker_id }),
            None if self.all_items_exhausted => Some(Conclusion::Exhausted),
            None => None,
        }
    }
}
