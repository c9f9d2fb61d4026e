use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use swarm_core::{ItemId, WorkerId, WorkerMessage};
use swarm_infrastructure::{InMemoryNetwork, InMemoryTransport, SwarmMetrics};
use tokio::sync::Mutex;

use crate::controller::SwarmController;
use crate::liveness_monitor::{LivenessConfig, LivenessMonitor};
use crate::notification::NotificationFanout;
use crate::observer_service::ObserverService;
use crate::state::{CoordinatorState, Dispatch};
use crate::work_items::WorkItemSet;

/// 基于内存网络组装的协调器部件
pub struct TestCoordinator {
    pub network: InMemoryNetwork,
    pub state: Arc<Mutex<CoordinatorState>>,
    pub fanout: Arc<NotificationFanout>,
    pub worker_transport: Arc<InMemoryTransport>,
    pub observer_transport: Arc<InMemoryTransport>,
}

impl TestCoordinator {
    pub fn new(total_items: usize, target: Option<ItemId>) -> Self {
        let network = InMemoryNetwork::new();
        let worker_transport = Arc::new(network.endpoint().unwrap());
        let observer_transport = Arc::new(network.endpoint().unwrap());
        let fanout = Arc::new(NotificationFanout::new(
            worker_transport.clone(),
            observer_transport.clone(),
            total_items,
            100,
        ));
        let state = Arc::new(Mutex::new(CoordinatorState::new(WorkItemSet::new(
            total_items,
            target,
        ))));

        Self {
            network,
            state,
            fanout,
            worker_transport,
            observer_transport,
        }
    }

    /// 每个蜂群ID对应一个固定的虚拟地址
    pub fn worker_addr(worker_id: WorkerId) -> SocketAddr {
        SocketAddr::from(([10, 0, 0, 1], 20_000 + worker_id as u16))
    }

    /// 处理消息并发布产生的事件
    pub async fn handle(&self, message: WorkerMessage, now: DateTime<Utc>) -> Dispatch {
        let dispatch = self.state.lock().await.handle(
            message,
            Self::worker_addr(message.worker_id()),
            now,
        );
        for event in &dispatch.events {
            self.fanout.publish(event.clone(), now).await;
        }
        dispatch
    }

    pub fn liveness_monitor(&self, config: LivenessConfig) -> LivenessMonitor {
        LivenessMonitor::new(
            self.state.clone(),
            self.fanout.clone(),
            SwarmMetrics::new(),
            Some(config),
        )
    }

    pub fn controller(&self) -> SwarmController {
        SwarmController::new(self.state.clone(), self.fanout.clone())
    }

    pub fn observer_service(&self) -> ObserverService {
        self.observer_service_with_metrics(SwarmMetrics::new())
    }

    pub fn observer_service_with_metrics(&self, metrics: SwarmMetrics) -> ObserverService {
        ObserverService::new(
            self.observer_transport.clone(),
            self.state.clone(),
            self.fanout.clone(),
            metrics,
            Duration::from_millis(50),
        )
    }
}
