use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::{info, warn};

use super::DispatcherClient;

pub struct HeartbeatManager {
    dispatcher_client: Arc<DispatcherClient>,
    heartbeat_interval: Duration,
}

impl HeartbeatManager {
    pub fn new(dispatcher_client: Arc<DispatcherClient>, heartbeat_interval: Duration) -> Self {
        Self {
            dispatcher_client,
            heartbeat_interval,
        }
    }

    /// 启动后台心跳任务，收到关闭信号后退出
    ///
    /// 第一次心跳在一个周期之后发出，此时蜂群已通过 REQUEST 完成登记。
    pub fn start_heartbeat_task(&self, mut shutdown_rx: broadcast::Receiver<()>) -> JoinHandle<()> {
        let mut heartbeat_interval = interval_at(
            Instant::now() + self.heartbeat_interval,
            self.heartbeat_interval,
        );
        let dispatcher_client = Arc::clone(&self.dispatcher_client);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = heartbeat_interval.tick() => {
                        if let Err(e) = dispatcher_client.send_heartbeat().await {
                            warn!("发送心跳失败: {}", e);
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!("蜂群 #{} 心跳任务退出", dispatcher_client.worker_id());
                        break;
                    }
                }
            }
        })
    }
}
