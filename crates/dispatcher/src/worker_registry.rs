use std::collections::BTreeMap;
use std::net::SocketAddr;

use chrono::{DateTime, Duration, Utc};
use swarm_core::{ItemId, WorkerId, WorkerInfo, WorkerSnapshot, WorkerStatus};
use tracing::debug;

use crate::work_items::WorkItemSet;

/// `touch` 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchOutcome {
    /// 首次出现的蜂群ID
    New,
    /// 之前已断开，重新激活
    Resumed,
    /// 活跃且空闲
    Refreshed,
    /// 活跃且仍持有扇区，或已被管理员封禁
    Rejected,
}

/// 被置为断开的蜂群及其被回收的扇区
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Released {
    pub worker_id: WorkerId,
    pub reclaimed: Option<ItemId>,
}

/// 蜂群注册表
#[derive(Debug, Clone, Default)]
pub struct WorkerRegistry {
    workers: BTreeMap<WorkerId, WorkerInfo>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, worker_id: WorkerId) -> Option<&WorkerInfo> {
        self.workers.get(&worker_id)
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.workers.values().filter(|w| w.is_active()).count()
    }

    /// 处理一次 REQUEST 的身份登记
    ///
    /// `Rejected` 不会修改注册表。
    pub fn touch(
        &mut self,
        worker_id: WorkerId,
        endpoint: SocketAddr,
        now: DateTime<Utc>,
    ) -> TouchOutcome {
        let Some(worker) = self.workers.get_mut(&worker_id) else {
            self.workers
                .insert(worker_id, WorkerInfo::new(worker_id, endpoint, now));
            return TouchOutcome::New;
        };

        if worker.blocked {
            return TouchOutcome::Rejected;
        }

        match worker.status {
            WorkerStatus::Disconnected => {
                worker.status = WorkerStatus::Active;
                worker.endpoint = endpoint;
                worker.last_seen = now;
                worker.current_assignment = None;
                TouchOutcome::Resumed
            }
            WorkerStatus::Active if worker.current_assignment.is_some() => TouchOutcome::Rejected,
            WorkerStatus::Active => {
                if worker.endpoint != endpoint {
                    debug!(
                        "蜂群 #{} 端点变更: {} -> {}",
                        worker_id, worker.endpoint, endpoint
                    );
                }
                worker.endpoint = endpoint;
                worker.last_seen = now;
                TouchOutcome::Refreshed
            }
        }
    }

    /// 刷新活跃蜂群的最后活跃时间，未知或已断开的蜂群返回 false
    pub fn heartbeat(&mut self, worker_id: WorkerId, now: DateTime<Utc>) -> bool {
        match self.workers.get_mut(&worker_id) {
            Some(worker) if worker.is_active() => {
                worker.last_seen = now;
                true
            }
            _ => false,
        }
    }

    /// 记录一次分配
    pub fn assign(&mut self, worker_id: WorkerId, item_id: ItemId) {
        if let Some(worker) = self.workers.get_mut(&worker_id) {
            worker.current_assignment = Some(item_id);
        }
    }

    /// 记录一次完成，释放该蜂群的当前分配
    pub fn record_completion(&mut self, worker_id: WorkerId, item_id: ItemId, now: DateTime<Utc>) {
        if let Some(worker) = self.workers.get_mut(&worker_id) {
            if worker.current_assignment == Some(item_id) {
                worker.current_assignment = None;
            }
            worker.items_completed += 1;
            worker.last_seen = now;
        }
    }

    /// 将活跃蜂群置为断开并回收其扇区
    ///
    /// 未知或已断开的蜂群返回 `None`。
    pub fn mark_disconnected(
        &mut self,
        worker_id: WorkerId,
        items: &mut WorkItemSet,
    ) -> Option<Released> {
        let worker = self.workers.get_mut(&worker_id)?;
        if !worker.is_active() {
            return None;
        }
        Some(Self::release(worker, items))
    }

    /// 将所有超时的活跃蜂群置为断开，返回受影响的蜂群
    pub fn sweep_timeouts(
        &mut self,
        now: DateTime<Utc>,
        timeout: Duration,
        items: &mut WorkItemSet,
    ) -> Vec<Released> {
        self.workers
            .values_mut()
            .filter(|worker| worker.is_expired(now, timeout))
            .map(|worker| Self::release(worker, items))
            .collect()
    }

    /// 管理员强制断开并封禁，未知蜂群返回 `None`
    pub fn block(&mut self, worker_id: WorkerId, items: &mut WorkItemSet) -> Option<Released> {
        let worker = self.workers.get_mut(&worker_id)?;
        worker.blocked = true;
        if worker.is_active() {
            Some(Self::release(worker, items))
        } else {
            Some(Released {
                worker_id,
                reclaimed: None,
            })
        }
    }

    /// 解除封禁，只对已知且已断开的蜂群生效
    pub fn readmit(&mut self, worker_id: WorkerId) -> bool {
        match self.workers.get_mut(&worker_id) {
            Some(worker) if !worker.is_active() => {
                worker.blocked = false;
                true
            }
            _ => false,
        }
    }

    /// 所有活跃蜂群的端点
    pub fn active_endpoints(&self) -> Vec<SocketAddr> {
        self.workers
            .values()
            .filter(|w| w.is_active())
            .map(|w| w.endpoint)
            .collect()
    }

    pub fn snapshots(&self) -> Vec<WorkerSnapshot> {
        self.workers.values().map(WorkerInfo::snapshot).collect()
    }

    fn release(worker: &mut WorkerInfo, items: &mut WorkItemSet) -> Released {
        worker.status = WorkerStatus::Disconnected;
        let reclaimed = worker.current_assignment.take().filter(|item_id| {
            items.assignee(*item_id) == Some(worker.id) && items.reclaim(*item_id)
        });
        Released {
            worker_id: worker.id,
            reclaimed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    #[test]
    fn test_touch_lifecycle() {
        let mut registry = WorkerRegistry::new();
        let mut items = WorkItemSet::new(3, None);
        let now = Utc::now();

        assert_eq!(registry.touch(1, addr(5001), now), TouchOutcome::New);
        assert_eq!(registry.touch(1, addr(5001), now), TouchOutcome::Refreshed);

        let item = items.next_unassigned(1).unwrap();
        registry.assign(1, item);
        // 持有扇区时的再次请求被拒绝，且不刷新活跃时间
        let later = now + Duration::seconds(5);
        assert_eq!(registry.touch(1, addr(5001), later), TouchOutcome::Rejected);
        assert_eq!(registry.get(1).unwrap().last_seen, now);

        let released = registry.mark_disconnected(1, &mut items).unwrap();
        assert_eq!(released.reclaimed, Some(item));
        assert!(items.get(item).unwrap().is_assignable());

        assert_eq!(registry.touch(1, addr(5002), later), TouchOutcome::Resumed);
        let worker = registry.get(1).unwrap();
        assert_eq!(worker.endpoint, addr(5002));
        assert!(worker.is_idle());
    }

    #[test]
    fn test_heartbeat_only_for_active_workers() {
        let mut registry = WorkerRegistry::new();
        let mut items = WorkItemSet::new(1, None);
        let now = Utc::now();

        assert!(!registry.heartbeat(7, now));

        registry.touch(7, addr(5007), now);
        let later = now + Duration::seconds(3);
        assert!(registry.heartbeat(7, later));
        assert_eq!(registry.get(7).unwrap().last_seen, later);

        registry.mark_disconnected(7, &mut items);
        assert!(!registry.heartbeat(7, later));
    }

    #[test]
    fn test_mark_disconnected_twice_is_noop() {
        let mut registry = WorkerRegistry::new();
        let mut items = WorkItemSet::new(1, None);
        registry.touch(1, addr(5001), Utc::now());

        assert!(registry.mark_disconnected(1, &mut items).is_some());
        assert!(registry.mark_disconnected(1, &mut items).is_none());
        assert!(registry.mark_disconnected(99, &mut items).is_none());
    }

    #[test]
    fn test_sweep_timeouts_reclaims_assignment() {
        let mut registry = WorkerRegistry::new();
        let mut items = WorkItemSet::new(6, None);
        let start = Utc::now();

        registry.touch(1, addr(5001), start);
        registry.touch(2, addr(5002), start);
        for _ in 0..5 {
            items.next_unassigned(99);
        }
        let item = items.next_unassigned(1).unwrap();
        assert_eq!(item, 5);
        registry.assign(1, item);

        let timeout = Duration::seconds(15);
        registry.heartbeat(2, start + Duration::seconds(10));

        // 恰好等于超时阈值时不回收
        let released = registry.sweep_timeouts(start + timeout, timeout, &mut items);
        assert!(released.is_empty());

        let now = start + Duration::seconds(16);
        let released = registry.sweep_timeouts(now, timeout, &mut items);
        assert_eq!(
            released,
            vec![Released {
                worker_id: 1,
                reclaimed: Some(5),
            }]
        );
        assert_eq!(registry.get(1).unwrap().status, WorkerStatus::Disconnected);
        assert!(registry.get(2).unwrap().is_active());
        assert!(items.get(5).unwrap().is_assignable());

        // 已断开的蜂群不会被重复回收
        let again = registry.sweep_timeouts(now + Duration::seconds(60), timeout, &mut items);
        assert_eq!(again.len(), 1);
        assert_eq!(again[0].worker_id, 2);
    }

    #[test]
    fn test_block_and_readmit() {
        let mut registry = WorkerRegistry::new();
        let mut items = WorkItemSet::new(2, None);
        let now = Utc::now();

        registry.touch(3, addr(5003), now);
        let item = items.next_unassigned(3).unwrap();
        registry.assign(3, item);

        // 活跃蜂群不能被重新准入
        assert!(!registry.readmit(3));

        let released = registry.block(3, &mut items).unwrap();
        assert_eq!(released.reclaimed, Some(item));
        assert_eq!(registry.touch(3, addr(5003), now), TouchOutcome::Rejected);

        assert!(registry.readmit(3));
        assert_eq!(registry.touch(3, addr(5003), now), TouchOutcome::Resumed);

        assert!(registry.block(42, &mut items).is_none());
        assert!(!registry.readmit(42));
    }

    #[test]
    fn test_release_does_not_steal_reassigned_item() {
        let mut registry = WorkerRegistry::new();
        let mut items = WorkItemSet::new(1, None);
        let now = Utc::now();

        registry.touch(1, addr(5001), now);
        let item = items.next_unassigned(1).unwrap();
        registry.assign(1, item);

        // 扇区在注册表之外被回收并转给了别的蜂群
        items.reclaim(item);
        items.next_unassigned(2);

        let released = registry.mark_disconnected(1, &mut items).unwrap();
        assert_eq!(released.reclaimed, None);
        assert_eq!(items.assignee(item), Some(2));
    }

    #[test]
    fn test_active_endpoints_and_snapshots() {
        let mut registry = WorkerRegistry::new();
        let mut items = WorkItemSet::new(1, None);
        let now = Utc::now();

        registry.touch(2, addr(5002), now);
        registry.touch(1, addr(5001), now);
        registry.mark_disconnected(2, &mut items);

        assert_eq!(registry.active_endpoints(), vec![addr(5001)]);
        assert_eq!(registry.active_count(), 1);

        let snapshots = registry.snapshots();
        assert_eq!(snapshots.len(), 2);
        // BTreeMap 保证按ID排序
        assert_eq!(snapshots[0].worker_id, 1);
        assert_eq!(snapshots[1].status, WorkerStatus::Disconnected);
    }
}
