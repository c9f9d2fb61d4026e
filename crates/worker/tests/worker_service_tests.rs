use std::sync::Arc;
use std::time::Duration;

use swarm_config::WorkerConfig;
use swarm_core::{Conclusion, TerminalNotice, Transport};
use swarm_dispatcher::{
    CoordinatorState, Dispatcher, DispatcherExit, NotificationFanout, WorkItemSet,
};
use swarm_infrastructure::{InMemoryNetwork, SwarmMetrics};
use swarm_worker::{WorkerExit, WorkerService};
use tokio::sync::{broadcast, Mutex};

struct Harness {
    network: InMemoryNetwork,
    coordinator: Arc<dyn Transport>,
    state: Arc<Mutex<CoordinatorState>>,
    fanout: Arc<NotificationFanout>,
}

impl Harness {
    fn new(total_items: usize, target: Option<u32>) -> Self {
        let network = InMemoryNetwork::new();
        let coordinator: Arc<dyn Transport> = Arc::new(network.endpoint().unwrap());
        let observers: Arc<dyn Transport> = Arc::new(network.endpoint().unwrap());
        let fanout = Arc::new(NotificationFanout::new(
            coordinator.clone(),
            observers,
            total_items,
            50,
        ));
        let state = Arc::new(Mutex::new(CoordinatorState::new(WorkItemSet::new(
            total_items,
            target,
        ))));
        Self {
            network,
            coordinator,
            state,
            fanout,
        }
    }

    fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(
            self.coordinator.clone(),
            self.state.clone(),
            self.fanout.clone(),
            SwarmMetrics::new(),
            Duration::from_millis(10),
        )
    }

    fn worker(&self, worker_id: u32) -> WorkerService {
        let config = WorkerConfig {
            worker_id,
            coordinator_address: self.coordinator.local_addr().unwrap().to_string(),
            search_min_ms: 5,
            search_max_ms: 15,
            reply_timeout_ms: 200,
            idle_retry_ms: 20,
            ..WorkerConfig::default()
        };
        let transport = Arc::new(self.network.endpoint().unwrap());
        WorkerService::from_config(config, transport).unwrap()
    }
}

#[tokio::test]
async fn test_workers_stop_when_target_found() {
    let harness = Harness::new(6, Some(4));
    let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let dispatcher = harness.dispatcher();
    let dispatcher_handle = tokio::spawn(async move { dispatcher.run(shutdown_rx).await });

    let mut handles = Vec::new();
    for worker_id in 1..=2 {
        let worker = harness.worker(worker_id);
        let (tx, rx) = broadcast::channel(1);
        handles.push(tokio::spawn(async move {
            let exit = worker.run(rx).await;
            drop(tx);
            exit
        }));
    }

    let mut exits = Vec::new();
    for handle in handles {
        let exit = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("worker should stop")
            .unwrap()
            .unwrap();
        exits.push(exit);
    }
    exits.sort_by_key(|exit| *exit as u8);
    assert_eq!(
        exits,
        vec![WorkerExit::FoundTarget, WorkerExit::TargetFoundElsewhere]
    );

    let dispatcher_exit = dispatcher_handle.await.unwrap().unwrap();
    assert!(matches!(
        dispatcher_exit,
        DispatcherExit::Concluded(Conclusion::TargetFound { item_id: 4, .. })
    ));

    let state = harness.state.lock().await;
    let (item_id, _) = state.outcome().found().unwrap();
    assert_eq!(item_id, 4);
}

#[tokio::test]
async fn test_workers_idle_until_shutdown_when_exhausted() {
    let harness = Harness::new(3, None);
    let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let dispatcher = harness.dispatcher();
    let dispatcher_handle = tokio::spawn(async move { dispatcher.run(shutdown_rx).await });

    let mut handles = Vec::new();
    for worker_id in 1..=2 {
        let worker = harness.worker(worker_id);
        let (tx, rx) = broadcast::channel(1);
        handles.push(tokio::spawn(async move {
            let exit = worker.run(rx).await;
            drop(tx);
            exit
        }));
    }

    let dispatcher_exit = tokio::time::timeout(Duration::from_secs(5), dispatcher_handle)
        .await
        .expect("dispatcher should conclude")
        .unwrap()
        .unwrap();
    assert_eq!(dispatcher_exit, DispatcherExit::Concluded(Conclusion::Exhausted));

    // 扇区耗尽后蜂群保持空闲，直到协调器发出 SHUTDOWN
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(handles.iter().all(|handle| !handle.is_finished()));

    let workers = harness.state.lock().await.workers().active_endpoints();
    harness
        .fanout
        .broadcast_terminal(TerminalNotice::Shutdown, &workers)
        .await;

    for handle in handles {
        let exit = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("worker should stop")
            .unwrap()
            .unwrap();
        assert_eq!(exit, WorkerExit::CoordinatorShutdown);
    }

    let state = harness.state.lock().await;
    assert!(state.outcome().all_items_exhausted());
    assert!(!state.outcome().target_found());
}

#[tokio::test]
async fn test_interrupted_worker_disconnects() {
    let harness = Harness::new(50, None);
    let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let dispatcher = harness.dispatcher();
    tokio::spawn(async move { dispatcher.run(shutdown_rx).await });

    let worker = harness.worker(9);
    let (tx, rx) = broadcast::channel(1);
    let handle = tokio::spawn(async move { worker.run(rx).await });

    tokio::time::sleep(Duration::from_millis(60)).await;
    tx.send(()).unwrap();

    let exit = tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("worker should stop")
        .unwrap()
        .unwrap();
    assert_eq!(exit, WorkerExit::Interrupted);

    // 断开后扇区被回收，蜂群不再活跃
    let state = harness.state.lock().await;
    assert_eq!(state.workers().active_count(), 0);
    assert!(!state.workers().get(9).unwrap().is_active());
    assert!((0..50).all(|item_id| state.items().assignee(item_id) != Some(9)));
}
