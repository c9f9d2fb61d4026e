use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use swarm_core::{
    send_message, HistoryEntry, ObserverEvent, ObserverInfo, SearchEvent, StatusSnapshot,
    TerminalNotice, Transport,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct FanoutState {
    observers: HashMap<SocketAddr, ObserverInfo>,
    history: VecDeque<HistoryEntry>,
}

/// 观察者集合、事件历史与终止通知的广播
///
/// 所有推送都是尽力而为：发送失败只记录日志，不重试。
pub struct NotificationFanout {
    worker_transport: Arc<dyn Transport>,
    observer_transport: Arc<dyn Transport>,
    total_items: usize,
    history_capacity: usize,
    state: Mutex<FanoutState>,
}

impl NotificationFanout {
    pub fn new(
        worker_transport: Arc<dyn Transport>,
        observer_transport: Arc<dyn Transport>,
        total_items: usize,
        history_capacity: usize,
    ) -> Self {
        Self {
            worker_transport,
            observer_transport,
            total_items,
            history_capacity,
            state: Mutex::new(FanoutState::default()),
        }
    }

    /// 登记观察者，发送 INIT 并回放历史，之后进入实时推送
    ///
    /// 已登记的观察者重复 ATTACH 时同样会收到完整回放。
    pub async fn attach(&self, endpoint: SocketAddr, now: DateTime<Utc>) -> bool {
        let (is_new, replay) = {
            let mut state = self.state.lock().await;
            let is_new = !state.observers.contains_key(&endpoint);
            state
                .observers
                .entry(endpoint)
                .and_modify(|observer| observer.last_seen = now)
                .or_insert_with(|| ObserverInfo::new(endpoint, now));
            (is_new, state.history.iter().cloned().collect::<Vec<_>>())
        };

        self.send_to_observer(
            endpoint,
            &ObserverEvent::Init {
                total_items: self.total_items,
            },
        )
        .await;
        for entry in replay {
            self.send_to_observer(endpoint, &ObserverEvent::Event { entry })
                .await;
        }

        if is_new {
            info!("观察者 {} 已连接", endpoint);
            self.publish(SearchEvent::ObserverAttached { endpoint }, now)
                .await;
        }
        is_new
    }

    /// 移除观察者，返回其是否存在
    pub async fn detach(&self, endpoint: SocketAddr, now: DateTime<Utc>) -> bool {
        let removed = self.state.lock().await.observers.remove(&endpoint).is_some();
        if removed {
            info!("观察者 {} 已断开", endpoint);
            self.publish(SearchEvent::ObserverDetached { endpoint }, now)
                .await;
        }
        removed
    }

    /// 刷新观察者的最后活跃时间，未登记的观察者返回 false
    pub async fn touch(&self, endpoint: SocketAddr, now: DateTime<Utc>) -> bool {
        match self.state.lock().await.observers.get_mut(&endpoint) {
            Some(observer) => {
                observer.last_seen = now;
                true
            }
            None => false,
        }
    }

    /// 移除超时的观察者
    pub async fn sweep_observers(&self, now: DateTime<Utc>, timeout: Duration) -> Vec<SocketAddr> {
        let expired: Vec<SocketAddr> = {
            let mut state = self.state.lock().await;
            let expired: Vec<SocketAddr> = state
                .observers
                .values()
                .filter(|observer| observer.is_expired(now, timeout))
                .map(|observer| observer.endpoint)
                .collect();
            for endpoint in &expired {
                state.observers.remove(endpoint);
            }
            expired
        };

        for endpoint in &expired {
            warn!("观察者 {} 超时，已移除", endpoint);
            self.publish(SearchEvent::ObserverDetached { endpoint: *endpoint }, now)
                .await;
        }
        expired
    }

    /// 记录事件并推送给所有观察者
    pub async fn publish(&self, event: SearchEvent, now: DateTime<Utc>) {
        let entry = HistoryEntry::new(event, now);
        let observers = {
            let mut state = self.state.lock().await;
            if self.history_capacity > 0 {
                while state.history.len() >= self.history_capacity {
                    state.history.pop_front();
                }
                state.history.push_back(entry.clone());
            }
            state.observers.keys().copied().collect::<Vec<_>>()
        };

        debug!("发布事件: {}", entry);
        let message = ObserverEvent::Event { entry };
        for endpoint in observers {
            self.send_to_observer(endpoint, &message).await;
        }
    }

    /// 向所有活跃蜂群和观察者推送一次终止通知
    pub async fn broadcast_terminal(&self, notice: TerminalNotice, workers: &[SocketAddr]) {
        info!(
            "广播终止通知 {:?}: {} 个蜂群, {} 个观察者",
            notice,
            workers.len(),
            self.observer_count().await
        );

        let reply = notice.worker_reply();
        for endpoint in workers {
            if let Err(e) = send_message(self.worker_transport.as_ref(), &reply, *endpoint).await {
                warn!("向蜂群 {} 推送终止通知失败: {}", endpoint, e);
            }
        }

        let event = notice.observer_event();
        let observers = self.observer_endpoints().await;
        for endpoint in observers {
            self.send_to_observer(endpoint, &event).await;
        }
    }

    /// 回复状态快照
    pub async fn send_status(&self, endpoint: SocketAddr, snapshot: StatusSnapshot) {
        self.send_to_observer(endpoint, &ObserverEvent::Status { snapshot })
            .await;
    }

    pub async fn observer_count(&self) -> usize {
        self.state.lock().await.observers.len()
    }

    pub async fn observer_endpoints(&self) -> Vec<SocketAddr> {
        self.state.lock().await.observers.keys().copied().collect()
    }

    /// 当前保留的历史事件
    pub async fn history(&self) -> Vec<HistoryEntry> {
        self.state.lock().await.history.iter().cloned().collect()
    }

    async fn send_to_observer(&self, endpoint: SocketAddr, event: &ObserverEvent) {
        if let Err(e) = send_message(self.observer_transport.as_ref(), event, endpoint).await {
            warn!("向观察者 {} 推送消息失败: {}", endpoint, e);
        }
    }
}
