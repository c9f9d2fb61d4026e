use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use swarm_config::ObserverConfig;
use swarm_core::{
    decode, send_message, ItemId, ObserverEvent, ObserverRequest, SwarmError, SwarmResult,
    Transport, WorkerId,
};
use tokio::sync::broadcast;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// 观察者退出原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObserverExit {
    Concluded {
        target_found: bool,
        item_id: Option<ItemId>,
        worker_id: Option<WorkerId>,
    },
    CoordinatorShutdown,
    Interrupted,
}

/// 协调器观察者通道的客户端
pub struct ObserverClient {
    coordinator: SocketAddr,
    transport: Arc<dyn Transport>,
    status_interval: Duration,
    reply_timeout: Duration,
    max_attempts: u32,
}

impl ObserverClient {
    pub fn new(
        coordinator: SocketAddr,
        transport: Arc<dyn Transport>,
        status_interval: Duration,
        reply_timeout: Duration,
        max_attempts: u32,
    ) -> Self {
        Self {
            coordinator,
            transport,
            status_interval,
            reply_timeout,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn from_config(config: &ObserverConfig, transport: Arc<dyn Transport>) -> SwarmResult<Self> {
        let coordinator: SocketAddr = config.coordinator_address.parse().map_err(|e| {
            SwarmError::Configuration(format!(
                "无效的观察者通道地址 {}: {}",
                config.coordinator_address, e
            ))
        })?;
        Ok(Self::new(
            coordinator,
            transport,
            config.status_interval(),
            config.reply_timeout(),
            config.max_attempts,
        ))
    }

    /// 登记为观察者，返回协调器告知的扇区总数
    pub async fn attach(&self) -> SwarmResult<usize> {
        for attempt in 1..=self.max_attempts {
            self.send(ObserverRequest::Attach).await?;

            let deadline = Instant::now() + self.reply_timeout;
            loop {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    break;
                }
                let Some(event) = self.next_event(remaining).await? else {
                    break;
                };
                if let ObserverEvent::Init { total_items } = event {
                    info!("已连接协调器 {}，共 {} 个扇区", self.coordinator, total_items);
                    return Ok(total_items);
                }
            }
            warn!("等待 INIT 超时 (第 {}/{} 次)", attempt, self.max_attempts);
        }

        Err(SwarmError::Unreachable(format!(
            "{} 在 {} 次尝试后仍无应答",
            self.coordinator, self.max_attempts
        )))
    }

    /// 登记后持续接收推送，直到搜索结束、协调器关闭或本地中断
    ///
    /// 每隔 `status_interval` 发送一次 STATUS，既获取快照也作为保活。
    pub async fn run<F>(
        &self,
        mut shutdown_rx: broadcast::Receiver<()>,
        mut on_event: F,
    ) -> SwarmResult<ObserverExit>
    where
        F: FnMut(&ObserverEvent),
    {
        let total_items = self.attach().await?;
        on_event(&ObserverEvent::Init { total_items });

        let mut status_timer = interval(self.status_interval);
        status_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // 首次立即触发的 tick 跳过，INIT 之后已有完整回放
        status_timer.tick().await;

        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.recv() => {
                    if let Err(e) = self.send(ObserverRequest::Detach).await {
                        warn!("发送 DETACH 失败: {}", e);
                    }
                    return Ok(ObserverExit::Interrupted);
                }
                _ = status_timer.tick() => {
                    if let Err(e) = self.send(ObserverRequest::Status).await {
                        warn!("发送 STATUS 失败: {}", e);
                    }
                }
                received = self.next_event(self.reply_timeout) => {
                    let Some(event) = received? else {
                        continue;
                    };
                    on_event(&event);

                    match event {
                        ObserverEvent::SearchConcluded { target_found, item_id, worker_id } => {
                            return Ok(ObserverExit::Concluded { target_found, item_id, worker_id });
                        }
                        ObserverEvent::Shutdown => return Ok(ObserverExit::CoordinatorShutdown),
                        _ => {}
                    }
                }
            }
        }
    }

    async fn send(&self, request: ObserverRequest) -> SwarmResult<()> {
        send_message(self.transport.as_ref(), &request, self.coordinator).await
    }

    async fn next_event(&self, wait: Duration) -> SwarmResult<Option<ObserverEvent>> {
        let Some(datagram) = self.transport.recv_from(wait).await? else {
            return Ok(None);
        };
        if datagram.source != self.coordinator {
            debug!("忽略来自 {} 的数据报", datagram.source);
            return Ok(None);
        }
        match decode(&datagram.payload) {
            Ok(event) => Ok(Some(event)),
            Err(e) => {
                warn!("无法解析协调器推送: {}", e);
                Ok(None)
            }
        }
    }
}
