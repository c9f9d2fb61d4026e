use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use swarm_core::{decode, Datagram, ObserverRequest, SwarmResult, Transport};
use swarm_infrastructure::SwarmMetrics;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, error, info, warn};

use crate::notification::NotificationFanout;
use crate::state::CoordinatorState;

/// 观察者通道上的请求处理循环
pub struct ObserverService {
    transport: Arc<dyn Transport>,
    state: Arc<Mutex<CoordinatorState>>,
    fanout: Arc<NotificationFanout>,
    metrics: SwarmMetrics,
    poll_timeout: Duration,
}

impl ObserverService {
    pub fn new(
        transport: Arc<dyn Transport>,
        state: Arc<Mutex<CoordinatorState>>,
        fanout: Arc<NotificationFanout>,
        metrics: SwarmMetrics,
        poll_timeout: Duration,
    ) -> Self {
        Self {
            transport,
            state,
            fanout,
            metrics,
            poll_timeout,
        }
    }

    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) -> SwarmResult<()> {
        info!("观察者通道已启动，监听地址: {}", self.transport.local_addr()?);

        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.recv() => {
                    info!("收到关闭信号，停止观察者通道");
                    return Ok(());
                }
                received = self.transport.recv_from(self.poll_timeout) => {
                    match received {
                        Ok(Some(datagram)) => self.process(datagram).await,
                        Ok(None) => {}
                        Err(e) if e.is_recoverable() => warn!("接收观察者消息失败: {}", e),
                        Err(e) => {
                            error!("观察者通道不可用: {}", e);
                            return Err(e);
                        }
                    }
                }
            }
        }
    }

    /// 处理一个观察者数据报
    pub async fn process(&self, datagram: Datagram) {
        let source = datagram.source;
        let request: ObserverRequest = match decode(&datagram.payload) {
            Ok(request) => request,
            Err(e) => {
                warn!("丢弃来自 {} 的无法解析的观察者消息: {}", source, e);
                self.metrics.record_invalid_message();
                return;
            }
        };
        debug!("收到来自观察者 {} 的 {:?}", source, request);

        let now = Utc::now();
        match request {
            ObserverRequest::Attach => {
                self.fanout.attach(source, now).await;
            }
            ObserverRequest::Status => {
                if !self.fanout.touch(source, now).await {
                    debug!("未登记的观察者 {} 查询状态", source);
                }
                let snapshot = self.state.lock().await.status_snapshot();
                self.fanout.send_status(source, snapshot).await;
            }
            ObserverRequest::Detach => {
                self.fanout.detach(source, now).await;
            }
        }
        self.metrics
            .update_observers(self.fanout.observer_count().await);
    }
}
