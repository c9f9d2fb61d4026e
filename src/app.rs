use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use futures::future::join_all;
use swarm_config::AppConfig;
use swarm_core::{SearchEvent, TerminalNotice, Transport};
use swarm_dispatcher::{
    ControlService, CoordinatorState, Dispatcher, DispatcherExit, LivenessConfig,
    LivenessMonitor, NotificationFanout, ObserverService, SwarmController, WorkItemSet,
};
use swarm_infrastructure::{SwarmMetrics, UdpTransport};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, error, info};

use crate::shutdown::ShutdownManager;

/// 协调器进程
///
/// 创建时绑定三个端点：蜂群通道、观察者通道和管理通道，任何一个绑定失败都会直接返回错误。
pub struct Application {
    config: AppConfig,
    worker_transport: Arc<UdpTransport>,
    observer_transport: Arc<UdpTransport>,
    control_transport: Arc<UdpTransport>,
    metrics: SwarmMetrics,
}

impl Application {
    /// 创建新的应用实例
    pub async fn new(config: AppConfig) -> Result<Self> {
        let coordinator = &config.coordinator;
        info!("初始化协调器，共 {} 个扇区", coordinator.total_items);

        let worker_transport = bind(&coordinator.bind_address, "蜂群通道").await?;
        let observer_transport = bind(&coordinator.observer_bind_address, "观察者通道").await?;
        let control_transport = bind(&coordinator.control_bind_address, "管理通道").await?;

        Ok(Self {
            config,
            worker_transport,
            observer_transport,
            control_transport,
            metrics: SwarmMetrics::new(),
        })
    }

    pub fn worker_addr(&self) -> Result<SocketAddr> {
        Ok(self.worker_transport.local_addr()?)
    }

    pub fn observer_addr(&self) -> Result<SocketAddr> {
        Ok(self.observer_transport.local_addr()?)
    }

    pub fn control_addr(&self) -> Result<SocketAddr> {
        Ok(self.control_transport.local_addr()?)
    }

    /// 运行协调器，直到搜索得出结论或收到关闭信号
    pub async fn run(&self, shutdown_rx: broadcast::Receiver<()>) -> Result<DispatcherExit> {
        let coordinator = &self.config.coordinator;

        let items = match coordinator.target_item {
            Some(target) => WorkItemSet::new(coordinator.total_items, Some(target)),
            None => WorkItemSet::with_random_target(coordinator.total_items),
        };
        debug!("目标位于扇区 {:?}", items.target_id());

        let state = Arc::new(Mutex::new(CoordinatorState::new(items)));
        let worker_transport: Arc<dyn Transport> = self.worker_transport.clone();
        let observer_transport: Arc<dyn Transport> = self.observer_transport.clone();
        let fanout = Arc::new(NotificationFanout::new(
            worker_transport.clone(),
            observer_transport.clone(),
            coordinator.total_items,
            coordinator.history_capacity,
        ));
        fanout
            .publish(
                SearchEvent::CoordinatorStarted {
                    total_items: coordinator.total_items,
                },
                Utc::now(),
            )
            .await;

        let background = ShutdownManager::with_timeout(coordinator.shutdown_timeout());
        let mut handles = Vec::new();

        // 存活检测
        {
            let monitor = LivenessMonitor::new(
                state.clone(),
                fanout.clone(),
                self.metrics.clone(),
                Some(LivenessConfig {
                    worker_timeout: chrono::Duration::seconds(
                        coordinator.worker_timeout_seconds as i64,
                    ),
                    check_interval: coordinator.liveness_check_interval(),
                    observer_timeout: chrono::Duration::seconds(
                        coordinator.observer_timeout_seconds as i64,
                    ),
                }),
            );
            let shutdown_rx = background.subscribe().await;
            handles.push(tokio::spawn(async move {
                monitor.run(shutdown_rx).await;
            }));
        }

        // 观察者通道
        {
            let service = ObserverService::new(
                observer_transport,
                state.clone(),
                fanout.clone(),
                self.metrics.clone(),
                coordinator.poll_timeout(),
            );
            let shutdown_rx = background.subscribe().await;
            handles.push(tokio::spawn(async move {
                if let Err(e) = service.run(shutdown_rx).await {
                    error!("观察者通道运行失败: {}", e);
                }
            }));
        }

        // 管理通道
        {
            let service = ControlService::new(
                self.control_transport.clone(),
                SwarmController::new(state.clone(), fanout.clone()),
                coordinator.poll_timeout(),
            );
            let shutdown_rx = background.subscribe().await;
            handles.push(tokio::spawn(async move {
                if let Err(e) = service.run(shutdown_rx).await {
                    error!("管理通道运行失败: {}", e);
                }
            }));
        }

        let dispatcher = Dispatcher::new(
            worker_transport,
            state.clone(),
            fanout.clone(),
            self.metrics.clone(),
            coordinator.poll_timeout(),
        );
        let result = dispatcher.run(shutdown_rx).await;

        match &result {
            Ok(DispatcherExit::Concluded(conclusion)) => info!("搜索结束: {:?}", conclusion),
            Ok(DispatcherExit::Shutdown) => info!("协调器收到关闭信号"),
            Err(e) => error!("蜂群通道运行失败: {}", e),
        }

        background
            .graceful_shutdown(async {
                join_all(handles).await;
            })
            .await;

        // 通知仍在线的蜂群和所有观察者
        let now = Utc::now();
        fanout.publish(SearchEvent::CoordinatorShutdown, now).await;
        let workers = state.lock().await.workers().active_endpoints();
        fanout
            .broadcast_terminal(TerminalNotice::Shutdown, &workers)
            .await;

        info!("协调器已停止");
        Ok(result?)
    }
}

async fn bind(address: &str, channel: &str) -> Result<Arc<UdpTransport>> {
    let addr: SocketAddr = address
        .parse()
        .with_context(|| format!("无效的{channel}地址: {address}"))?;
    let transport = UdpTransport::bind(addr)
        .await
        .with_context(|| format!("绑定{channel}地址失败: {address}"))?;
    info!("{} 监听地址: {}", channel, transport.local_addr()?);
    Ok(Arc::new(transport))
}
