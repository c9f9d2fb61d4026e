use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use swarm_core::{
    decode, send_message, ControlCommand, ControlResponse, Datagram, ItemId, SearchEvent,
    StatusSnapshot, SwarmError, SwarmResult, Transport, WorkerId, WorkerSnapshot,
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, error, info, warn};

use crate::notification::NotificationFanout;
use crate::state::CoordinatorState;

/// 管理操作接口
#[async_trait]
pub trait SwarmControlService: Send + Sync {
    /// 列出所有蜂群
    async fn list_workers(&self) -> Vec<WorkerSnapshot>;

    /// 协调器状态快照
    async fn status(&self) -> StatusSnapshot;

    /// 强制断开并封禁蜂群，返回被回收的扇区
    async fn disconnect_worker(&self, worker_id: WorkerId) -> SwarmResult<Option<ItemId>>;

    /// 重新准入已断开的蜂群
    async fn readmit_worker(&self, worker_id: WorkerId) -> SwarmResult<()>;
}

pub struct SwarmController {
    state: Arc<Mutex<CoordinatorState>>,
    fanout: Arc<NotificationFanout>,
}

impl SwarmController {
    pub fn new(state: Arc<Mutex<CoordinatorState>>, fanout: Arc<NotificationFanout>) -> Self {
        Self { state, fanout }
    }

    /// 执行一条管理命令
    pub async fn execute(&self, command: ControlCommand) -> ControlResponse {
        match command {
            ControlCommand::ListWorkers => ControlResponse::Workers {
                workers: self.list_workers().await,
            },
            ControlCommand::Status => ControlResponse::Status {
                snapshot: self.status().await,
            },
            ControlCommand::DisconnectWorker { worker_id } => {
                match self.disconnect_worker(worker_id).await {
                    Ok(Some(item_id)) => ControlResponse::Ok {
                        message: format!("蜂群 #{worker_id} 已断开，扇区 {item_id} 已回收"),
                    },
                    Ok(None) => ControlResponse::Ok {
                        message: format!("蜂群 #{worker_id} 已断开"),
                    },
                    Err(e) => ControlResponse::Error {
                        message: e.to_string(),
                    },
                }
            }
            ControlCommand::ReadmitWorker { worker_id } => {
                match self.readmit_worker(worker_id).await {
                    Ok(()) => ControlResponse::Ok {
                        message: format!("蜂群 #{worker_id} 已重新准入"),
                    },
                    Err(e) => ControlResponse::Error {
                        message: e.to_string(),
                    },
                }
            }
        }
    }
}

#[async_trait]
impl SwarmControlService for SwarmController {
    async fn list_workers(&self) -> Vec<WorkerSnapshot> {
        self.state.lock().await.worker_snapshots()
    }

    async fn status(&self) -> StatusSnapshot {
        self.state.lock().await.status_snapshot()
    }

    async fn disconnect_worker(&self, worker_id: WorkerId) -> SwarmResult<Option<ItemId>> {
        let released = self
            .state
            .lock()
            .await
            .force_disconnect(worker_id)
            .ok_or(SwarmError::UnknownWorker(worker_id))?;

        info!(
            "管理员断开蜂群 #{}，回收扇区: {:?}",
            worker_id, released.reclaimed
        );
        self.fanout
            .publish(SearchEvent::WorkerBlocked { worker_id }, Utc::now())
            .await;
        Ok(released.reclaimed)
    }

    async fn readmit_worker(&self, worker_id: WorkerId) -> SwarmResult<()> {
        {
            let mut state = self.state.lock().await;
            if state.workers().get(worker_id).is_none() {
                return Err(SwarmError::UnknownWorker(worker_id));
            }
            if !state.readmit(worker_id) {
                return Err(SwarmError::InvalidOperation(format!(
                    "蜂群 #{worker_id} 仍处于活跃状态"
                )));
            }
        }

        info!("蜂群 #{} 被重新准入", worker_id);
        self.fanout
            .publish(SearchEvent::WorkerReadmitted { worker_id }, Utc::now())
            .await;
        Ok(())
    }
}

/// 管理通道上的请求/应答循环
pub struct ControlService {
    transport: Arc<dyn Transport>,
    controller: SwarmController,
    poll_timeout: Duration,
}

impl ControlService {
    pub fn new(
        transport: Arc<dyn Transport>,
        controller: SwarmController,
        poll_timeout: Duration,
    ) -> Self {
        Self {
            transport,
            controller,
            poll_timeout,
        }
    }

    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) -> SwarmResult<()> {
        info!("管理通道已启动，监听地址: {}", self.transport.local_addr()?);

        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.recv() => {
                    info!("收到关闭信号，停止管理通道");
                    return Ok(());
                }
                received = self.transport.recv_from(self.poll_timeout) => {
                    match received {
                        Ok(Some(datagram)) => self.process(datagram).await,
                        Ok(None) => {}
                        Err(e) if e.is_recoverable() => warn!("接收管理命令失败: {}", e),
                        Err(e) => {
                            error!("管理通道不可用: {}", e);
                            return Err(e);
                        }
                    }
                }
            }
        }
    }

    async fn process(&self, datagram: Datagram) {
        let response = match decode::<ControlCommand>(&datagram.payload) {
            Ok(command) => {
                debug!("收到来自 {} 的管理命令: {:?}", datagram.source, command);
                self.controller.execute(command).await
            }
            Err(e) => {
                warn!("无法解析来自 {} 的管理命令: {}", datagram.source, e);
                ControlResponse::Error {
                    message: format!("无法解析命令: {e}"),
                }
            }
        };

        if let Err(e) = send_message(self.transport.as_ref(), &response, datagram.source).await {
            warn!("向 {} 发送管理应答失败: {}", datagram.source, e);
        }
    }
}
