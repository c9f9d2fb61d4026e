//! 协调器共享状态与消息状态机
//!
//! `CoordinatorState` 独占扇区集合、蜂群注册表和搜索结果，三者只能在同一把锁下一起修改。
//! `handle` 是 `(状态, 消息, now) -> 应答` 的全函数，不会返回错误。

use std::net::SocketAddr;

use chrono::{DateTime, Duration, Utc};
use swarm_core::{
    Conclusion, CoordinatorReply, ItemId, SearchEvent, SearchOutcome, StatusSnapshot, WorkerId,
    WorkerMessage, WorkerSnapshot,
};
use tracing::{debug, info, warn};

use crate::work_items::{CompletionOutcome, WorkItemSet};
use crate::worker_registry::{Released, TouchOutcome, WorkerRegistry};

/// 一条消息的处理结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    pub reply: CoordinatorReply,
    /// 需要发布给观察者的事件
    pub events: Vec<SearchEvent>,
    /// 本条消息使搜索进入终态时才有值
    pub conclusion: Option<Conclusion>,
}

impl Dispatch {
    fn reply(reply: CoordinatorReply) -> Self {
        Self {
            reply,
            events: Vec::new(),
            conclusion: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CoordinatorState {
    items: WorkItemSet,
    workers: WorkerRegistry,
    outcome: SearchOutcome,
}

impl CoordinatorState {
    pub fn new(items: WorkItemSet) -> Self {
        Self {
            items,
            workers: WorkerRegistry::new(),
            outcome: SearchOutcome::new(),
        }
    }

    pub fn items(&self) -> &WorkItemSet {
        &self.items
    }

    pub fn workers(&self) -> &WorkerRegistry {
        &self.workers
    }

    pub fn outcome(&self) -> &SearchOutcome {
        &self.outcome
    }

    pub fn is_terminal(&self) -> bool {
        self.outcome.is_terminal()
    }

    /// 处理一条蜂群消息
    pub fn handle(
        &mut self,
        message: WorkerMessage,
        source: SocketAddr,
        now: DateTime<Utc>,
    ) -> Dispatch {
        match message {
            WorkerMessage::Request { worker_id } => self.handle_request(worker_id, source, now),
            WorkerMessage::Report {
                worker_id,
                item_id,
                found,
            } => self.handle_report(worker_id, item_id, found, now),
            WorkerMessage::Heartbeat { worker_id } => {
                if self.workers.heartbeat(worker_id, now) {
                    Dispatch::reply(CoordinatorReply::HeartbeatAck)
                } else {
                    debug!("拒绝来自未知或已断开蜂群 #{} 的心跳", worker_id);
                    Dispatch::reply(CoordinatorReply::Denied)
                }
            }
            WorkerMessage::Disconnect { worker_id } => {
                let mut dispatch = Dispatch::reply(CoordinatorReply::DisconnectAck);
                if let Some(released) = self.workers.mark_disconnected(worker_id, &mut self.items)
                {
                    info!(
                        "蜂群 #{} 主动断开，回收扇区: {:?}",
                        worker_id, released.reclaimed
                    );
                    dispatch.events.push(SearchEvent::WorkerDisconnected {
                        worker_id,
                        reclaimed: released.reclaimed,
                    });
                }
                dispatch
            }
        }
    }

    fn handle_request(
        &mut self,
        worker_id: WorkerId,
        source: SocketAddr,
        now: DateTime<Utc>,
    ) -> Dispatch {
        if self.outcome.target_found() {
            return Dispatch::reply(CoordinatorReply::TargetFound);
        }
        if self.outcome.all_items_exhausted() {
            return Dispatch::reply(CoordinatorReply::NoMoreItems);
        }

        let mut dispatch = Dispatch::reply(CoordinatorReply::NoMoreItems);
        match self.workers.touch(worker_id, source, now) {
            TouchOutcome::Rejected => {
                warn!("拒绝蜂群 #{} 的请求 (仍持有扇区或已被封禁)", worker_id);
                return Dispatch::reply(CoordinatorReply::Denied);
            }
            TouchOutcome::New => {
                info!("新蜂群 #{} 加入，地址: {}", worker_id, source);
                dispatch
                    .events
                    .push(SearchEvent::WorkerJoined { worker_id });
            }
            TouchOutcome::Resumed => {
                info!("蜂群 #{} 重新连接，地址: {}", worker_id, source);
                dispatch
                    .events
                    .push(SearchEvent::WorkerResumed { worker_id });
            }
            TouchOutcome::Refreshed => {}
        }

        if let Some(item_id) = self.items.next_unassigned(worker_id) {
            self.workers.assign(worker_id, item_id);
            info!("蜂群 #{} 被派往扇区 {}", worker_id, item_id);
            dispatch.reply = CoordinatorReply::Search { item_id };
            dispatch
                .events
                .push(SearchEvent::ItemAssigned { worker_id, item_id });
        } else {
            debug!("没有可分配的扇区，蜂群 #{} 需稍后重试", worker_id);
        }
        dispatch
    }

    fn handle_report(
        &mut self,
        worker_id: WorkerId,
        item_id: ItemId,
        found: bool,
        now: DateTime<Utc>,
    ) -> Dispatch {
        match self.items.complete(item_id, worker_id) {
            CompletionOutcome::Completed { is_target } => {
                if found && !is_target {
                    warn!(
                        "蜂群 #{} 声称在扇区 {} 找到目标，与实际情况不符，以协调器为准",
                        worker_id, item_id
                    );
                }
                self.workers.record_completion(worker_id, item_id, now);
                let was_terminal = self.outcome.is_terminal();

                let mut dispatch;
                if is_target {
                    self.outcome.mark_target_found(item_id, worker_id);
                    info!("蜂群 #{} 在扇区 {} 找到目标", worker_id, item_id);
                    dispatch = Dispatch::reply(CoordinatorReply::FoundAck);
                    dispatch
                        .events
                        .push(SearchEvent::TargetFound { worker_id, item_id });
                } else {
                    info!("蜂群 #{} 搜索完扇区 {}，未发现目标", worker_id, item_id);
                    dispatch = Dispatch::reply(CoordinatorReply::Continue);
                    dispatch
                        .events
                        .push(SearchEvent::ItemSearched { worker_id, item_id });
                }

                if self.items.all_completed()
                    && self.outcome.mark_exhausted()
                    && !self.outcome.target_found()
                {
                    info!("所有扇区已搜索完毕，未找到目标");
                    dispatch.events.push(SearchEvent::AllItemsExhausted);
                }

                if !was_terminal && self.outcome.is_terminal() {
                    dispatch.conclusion = self.outcome.conclusion();
                }
                dispatch
            }
            CompletionOutcome::AlreadyCompleted { is_target } => {
                debug!("蜂群 #{} 重复上报扇区 {}，重发确认", worker_id, item_id);
                Dispatch::reply(if is_target {
                    CoordinatorReply::FoundAck
                } else {
                    CoordinatorReply::Continue
                })
            }
            CompletionOutcome::NotAssigned => {
                warn!(
                    "丢弃蜂群 #{} 对扇区 {} 的过期上报 (扇区未分配给该蜂群)",
                    worker_id, item_id
                );
                Dispatch::reply(CoordinatorReply::Denied)
            }
            CompletionOutcome::UnknownItem => {
                warn!("丢弃蜂群 #{} 对未知扇区 {} 的上报", worker_id, item_id);
                Dispatch::reply(CoordinatorReply::Denied)
            }
        }
    }

    /// 回收所有超时蜂群的扇区
    pub fn sweep(&mut self, now: DateTime<Utc>, timeout: Duration) -> Vec<Released> {
        self.workers
            .sweep_timeouts(now, timeout, &mut self.items)
    }

    /// 管理员强制断开并封禁蜂群，未知蜂群返回 `None`
    pub fn force_disconnect(&mut self, worker_id: WorkerId) -> Option<Released> {
        self.workers.block(worker_id, &mut self.items)
    }

    /// 解除蜂群封禁
    pub fn readmit(&mut self, worker_id: WorkerId) -> bool {
        self.workers.readmit(worker_id)
    }

    pub fn worker_snapshots(&self) -> Vec<WorkerSnapshot> {
        self.workers.snapshots()
    }

    pub fn status_snapshot(&self) -> StatusSnapshot {
        let found = self.outcome.found();
        let workers_total = self.workers.len();
        let workers_active = self.workers.active_count();
        StatusSnapshot {
            items: self.items.counts(),
            workers_total,
            workers_active,
            workers_disconnected: workers_total - workers_active,
            target_found: self.outcome.target_found(),
            all_items_exhausted: self.outcome.all_items_exhausted(),
            found_item: found.map(|(item_id, _)| item_id),
            found_by: found.map(|(_, worker_id)| worker_id),
            item_details: self.items.snapshots(),
        }
    }
}
