use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use swarm_core::{
    decode, send_message, Conclusion, CoordinatorReply, Datagram, SearchEvent, SwarmResult,
    Transport, WorkerMessage,
};
use swarm_infrastructure::SwarmMetrics;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, error, info, warn};

use crate::notification::NotificationFanout;
use crate::state::CoordinatorState;

/// 调度循环的退出原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherExit {
    /// 搜索已得出结论，终止通知已经广播
    Concluded(Conclusion),
    /// 收到关闭信号
    Shutdown,
}

/// 蜂群通道上的消息处理循环
pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    state: Arc<Mutex<CoordinatorState>>,
    fanout: Arc<NotificationFanout>,
    metrics: SwarmMetrics,
    poll_timeout: Duration,
}

impl Dispatcher {
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

    /// 处理消息直到搜索结束或收到关闭信号
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) -> SwarmResult<DispatcherExit> {
        info!("调度循环已启动，监听地址: {}", self.transport.local_addr()?);

        loop {
            if let Some(conclusion) = self.state.lock().await.outcome().conclusion() {
                return Ok(DispatcherExit::Concluded(conclusion));
            }

            tokio::select! {
                biased;

                _ = shutdown_rx.recv() => {
                    info!("收到关闭信号，停止调度循环");
                    return Ok(DispatcherExit::Shutdown);
                }
                received = self.transport.recv_from(self.poll_timeout) => {
                    match received {
                        Ok(Some(datagram)) => {
                            if let Some(conclusion) = self.process(datagram).await {
                                return Ok(DispatcherExit::Concluded(conclusion));
                            }
                        }
                        Ok(None) => {}
                        Err(e) if e.is_recoverable() => {
                            warn!("接收蜂群消息失败: {}", e);
                        }
                        Err(e) => {
                            error!("蜂群通道不可用: {}", e);
                            return Err(e);
                        }
                    }
                }
            }
        }
    }

    /// 处理一个数据报，搜索在本条消息上结束时返回结论
    pub async fn process(&self, datagram: Datagram) -> Option<Conclusion> {
        let started = Instant::now();
        let source = datagram.source;

        let message: WorkerMessage = match decode(&datagram.payload) {
            Ok(message) => message,
            Err(e) => {
                warn!("丢弃来自 {} 的无法解析的消息: {}", source, e);
                self.metrics.record_invalid_message();
                return None;
            }
        };
        debug!(
            "收到来自 {} 的 {} (蜂群 #{})",
            source,
            message.kind(),
            message.worker_id()
        );

        let now = Utc::now();
        let (dispatch, counts, active, endpoints) = {
            let mut state = self.state.lock().await;
            let dispatch = state.handle(message, source, now);
            let endpoints = if dispatch.conclusion.is_some() {
                state.workers().active_endpoints()
            } else {
                Vec::new()
            };
            (
                dispatch,
                state.items().counts(),
                state.workers().active_count(),
                endpoints,
            )
        };

        if let Err(e) = send_message(self.transport.as_ref(), &dispatch.reply, source).await {
            warn!("向 {} 发送 {:?} 失败: {}", source, dispatch.reply, e);
        }

        if dispatch.reply == CoordinatorReply::Denied {
            self.metrics.record_denied();
        }
        for event in &dispatch.events {
            match event {
                SearchEvent::ItemAssigned { .. } => self.metrics.record_assignment(),
                SearchEvent::ItemSearched { .. } | SearchEvent::TargetFound { .. } => {
                    self.metrics.record_completion()
                }
                SearchEvent::WorkerDisconnected {
                    reclaimed: Some(_), ..
                } => self.metrics.record_reclaimed(1),
                _ => {}
            }
        }
        self.metrics.update_progress(&counts, active);
        self.metrics.record_message(started.elapsed().as_secs_f64());

        for event in dispatch.events {
            self.fanout.publish(event, now).await;
        }

        if let Some(conclusion) = dispatch.conclusion {
            info!("搜索结束: {:?}", conclusion);
            self.fanout
                .broadcast_terminal(conclusion.into(), &endpoints)
                .await;
        }
        dispatch.conclusion
    }
}
