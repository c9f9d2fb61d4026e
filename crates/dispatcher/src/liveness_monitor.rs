use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use swarm_core::SearchEvent;
use swarm_infrastructure::SwarmMetrics;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::notification::NotificationFanout;
use crate::state::CoordinatorState;
use crate::worker_registry::Released;

/// 存活检测配置
#[derive(Debug, Clone)]
pub struct LivenessConfig {
    /// 心跳超时时间
    pub worker_timeout: chrono::Duration,
    /// 检测间隔
    pub check_interval: Duration,
    /// 观察者超时时间
    pub observer_timeout: chrono::Duration,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            worker_timeout: chrono::Duration::seconds(15), // 15秒心跳超时
            check_interval: Duration::from_secs(5),        // 5秒检测一次
            observer_timeout: chrono::Duration::seconds(15),
        }
    }
}

/// 蜂群存活检测
///
/// 周期性回收超时蜂群持有的扇区，使其可以被重新分配。
pub struct LivenessMonitor {
    state: Arc<Mutex<CoordinatorState>>,
    fanout: Arc<NotificationFanout>,
    metrics: SwarmMetrics,
    config: LivenessConfig,
}

impl LivenessMonitor {
    pub fn new(
        state: Arc<Mutex<CoordinatorState>>,
        fanout: Arc<NotificationFanout>,
        metrics: SwarmMetrics,
        config: Option<LivenessConfig>,
    ) -> Self {
        Self {
            state,
            fanout,
            metrics,
            config: config.unwrap_or_default(),
        }
    }

    /// 执行检测循环，直到收到关闭信号
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) {
        info!(
            "启动蜂群存活检测，间隔 {:?}，超时 {} 秒",
            self.config.check_interval,
            self.config.worker_timeout.num_seconds()
        );

        let mut interval = tokio::time::interval(self.config.check_interval);
        // 第一次 tick 立即完成
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.sweep_once(Utc::now()).await;
                }
                _ = shutdown_rx.recv() => {
                    info!("收到停止信号，退出蜂群存活检测循环");
                    break;
                }
            }
        }
    }

    /// 执行一次检测，返回本次被判定超时的蜂群
    pub async fn sweep_once(&self, now: DateTime<Utc>) -> Vec<Released> {
        debug!("开始检测超时的蜂群");

        let (released, counts, active) = {
            let mut state = self.state.lock().await;
            let released = state.sweep(now, self.config.worker_timeout);
            (
                released,
                state.items().counts(),
                state.workers().active_count(),
            )
        };

        if !released.is_empty() {
            info!("检测到 {} 个超时的蜂群", released.len());
            let reclaimed = released.iter().filter(|r| r.reclaimed.is_some()).count();
            self.metrics.record_worker_timeouts(released.len() as u64);
            self.metrics.record_reclaimed(reclaimed as u64);
        }

        for r in &released {
            match r.reclaimed {
                Some(item_id) => warn!("蜂群 #{} 心跳超时，回收扇区 {}", r.worker_id, item_id),
                None => warn!("蜂群 #{} 心跳超时", r.worker_id),
            }
            self.fanout
                .publish(
                    SearchEvent::WorkerTimedOut {
                        worker_id: r.worker_id,
                        reclaimed: r.reclaimed,
                    },
                    now,
                )
                .await;
        }
        self.metrics.update_progress(&counts, active);

        let evicted = self
            .fanout
            .sweep_observers(now, self.config.observer_timeout)
            .await;
        if !evicted.is_empty() {
            self.metrics.update_observers(self.fanout.observer_count().await);
        }

        released
    }
}
