use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use swarm_config::WorkerConfig;
use swarm_core::{CoordinatorReply, ItemId, SwarmError, SwarmResult, Transport};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::components::{DispatcherClient, HeartbeatManager};

/// 蜂群退出原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// 本蜂群找到了目标
    FoundTarget,
    /// 目标已被其他蜂群找到
    TargetFoundElsewhere,
    /// 协调器已关闭
    CoordinatorShutdown,
    /// 本地收到关闭信号
    Interrupted,
}

/// 蜂群主循环
pub struct WorkerService {
    client: Arc<DispatcherClient>,
    config: WorkerConfig,
}

impl WorkerService {
    pub fn new(client: Arc<DispatcherClient>, config: WorkerConfig) -> Self {
        Self { client, config }
    }

    /// 按配置连接协调器
    pub fn from_config(config: WorkerConfig, transport: Arc<dyn Transport>) -> SwarmResult<Self> {
        let coordinator: SocketAddr = config.coordinator_address.parse().map_err(|e| {
            SwarmError::Configuration(format!(
                "无效的协调器地址 {}: {}",
                config.coordinator_address, e
            ))
        })?;
        let client = Arc::new(DispatcherClient::new(
            config.worker_id,
            coordinator,
            transport,
            config.reply_timeout(),
            config.max_attempts,
        ));
        Ok(Self::new(client, config))
    }

    /// 运行直到搜索结束、协调器关闭或收到本地关闭信号
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) -> SwarmResult<WorkerExit> {
        let worker_id = self.client.worker_id();
        info!("蜂群 #{} 开始工作", worker_id);

        let (stop_tx, stop_rx) = broadcast::channel(1);
        let heartbeat = HeartbeatManager::new(self.client.clone(), self.config.heartbeat_interval())
            .start_heartbeat_task(stop_rx);

        let result = tokio::select! {
            result = self.search_loop() => result,
            _ = shutdown_rx.recv() => Ok(WorkerExit::Interrupted),
        };

        let _ = stop_tx.send(());
        if let Err(e) = heartbeat.await {
            warn!("心跳任务异常退出: {}", e);
        }

        if matches!(result, Ok(WorkerExit::Interrupted)) {
            if let Err(e) = self.client.disconnect().await {
                warn!("蜂群 #{} 断开时协调器无应答: {}", worker_id, e);
            }
        }

        match &result {
            Ok(exit) => info!("蜂群 #{} 退出: {:?}", worker_id, exit),
            Err(e) => warn!("蜂群 #{} 异常退出: {}", worker_id, e),
        }
        result
    }

    async fn search_loop(&self) -> SwarmResult<WorkerExit> {
        loop {
            match self.client.request().await? {
                CoordinatorReply::Search { item_id } => {
                    info!("蜂群 #{} 被派往扇区 {}", self.client.worker_id(), item_id);
                    self.search(item_id).await;

                    match self.client.report(item_id, false).await? {
                        CoordinatorReply::Continue => {
                            info!("扇区 {} 没有目标，继续搜索", item_id);
                        }
                        CoordinatorReply::FoundAck => {
                            info!("在扇区 {} 找到了目标!", item_id);
                            return Ok(WorkerExit::FoundTarget);
                        }
                        CoordinatorReply::Denied => {
                            warn!("扇区 {} 的上报被拒绝，扇区可能已被回收", item_id);
                        }
                        other => {
                            if let Some(exit) = Self::terminal_exit(other) {
                                return Ok(exit);
                            }
                        }
                    }
                }
                CoordinatorReply::NoMoreItems => {
                    debug!("暂时没有可搜索的扇区，等待后重试");
                    if let Some(exit) = self.idle().await? {
                        return Ok(exit);
                    }
                }
                CoordinatorReply::Denied => {
                    warn!("请求被拒绝，重新登记后重试");
                    if let Err(e) = self.client.disconnect().await {
                        warn!("重新登记失败: {}", e);
                    }
                    if let Some(exit) = self.idle().await? {
                        return Ok(exit);
                    }
                }
                other => {
                    if let Some(exit) = Self::terminal_exit(other) {
                        return Ok(exit);
                    }
                    warn!("意外的应答: {:?}", other);
                }
            }
        }
    }

    /// 模拟搜索耗时
    async fn search(&self, item_id: ItemId) {
        let millis = {
            let (min, max) = (self.config.search_min_ms, self.config.search_max_ms);
            if max > min {
                rand::rng().random_range(min..=max)
            } else {
                min
            }
        };
        debug!("搜索扇区 {} 需要 {} 毫秒", item_id, millis);
        tokio::time::sleep(Duration::from_millis(millis)).await;
    }

    /// 空闲等待，期间收到终止推送则返回退出原因
    async fn idle(&self) -> SwarmResult<Option<WorkerExit>> {
        let pushed = self
            .client
            .wait_for_terminal(self.config.idle_retry())
            .await?;
        Ok(pushed.and_then(Self::terminal_exit))
    }

    fn terminal_exit(reply: CoordinatorReply) -> Option<WorkerExit> {
        match reply {
            CoordinatorReply::TargetFound => {
                info!("目标已被找到，停止搜索");
                Some(WorkerExit::TargetFoundElsewhere)
            }
            CoordinatorReply::Shutdown => {
                info!("协调器已关闭");
                Some(WorkerExit::CoordinatorShutdown)
            }
            _ => None,
        }
    }
}
