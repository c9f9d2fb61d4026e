use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use swarm_core::{
    decode, encode, Conclusion, CoordinatorReply, Transport, WorkItemState, WorkerMessage,
    WorkerStatus,
};
use swarm_dispatcher::{
    CoordinatorState, Dispatcher, DispatcherExit, NotificationFanout, WorkItemSet,
};
use swarm_infrastructure::{InMemoryNetwork, SwarmMetrics};
use tokio::sync::{broadcast, Mutex};

fn addr(worker_id: u32) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 30_000 + worker_id as u16))
}

fn request(state: &mut CoordinatorState, worker_id: u32) -> CoordinatorReply {
    state
        .handle(WorkerMessage::Request { worker_id }, addr(worker_id), Utc::now())
        .reply
}

fn report(state: &mut CoordinatorState, worker_id: u32, item_id: u32, found: bool) -> CoordinatorReply {
    state
        .handle(
            WorkerMessage::Report {
                worker_id,
                item_id,
                found,
            },
            addr(worker_id),
            Utc::now(),
        )
        .reply
}

#[test]
fn test_single_worker_finds_target_on_fourth_cycle() {
    let mut state = CoordinatorState::new(WorkItemSet::new(10, Some(3)));

    for expected in 0..3 {
        assert_eq!(
            request(&mut state, 1),
            CoordinatorReply::Search { item_id: expected }
        );
        assert_eq!(report(&mut state, 1, expected, false), CoordinatorReply::Continue);
    }

    assert_eq!(request(&mut state, 1), CoordinatorReply::Search { item_id: 3 });
    let dispatch = state.handle(
        WorkerMessage::Report {
            worker_id: 1,
            item_id: 3,
            found: true,
        },
        addr(1),
        Utc::now(),
    );
    assert_eq!(dispatch.reply, CoordinatorReply::FoundAck);
    assert_eq!(
        dispatch.conclusion,
        Some(Conclusion::TargetFound {
            item_id: 3,
            worker_id: 1
        })
    );
    assert!(state.outcome().target_found());

    // 第二个蜂群在目标找到之后请求
    assert_eq!(request(&mut state, 2), CoordinatorReply::TargetFound);
    assert!(state.workers().get(2).is_none());
}

#[test]
fn test_two_workers_exhaust_three_items() {
    let mut state = CoordinatorState::new(WorkItemSet::new(3, None));

    let mut replies = vec![request(&mut state, 1), request(&mut state, 2)];
    let mut conclusion = None;
    let mut no_more = HashSet::new();

    while no_more.len() < 2 {
        for (index, worker_id) in [1u32, 2].into_iter().enumerate() {
            match replies[index] {
                CoordinatorReply::Search { item_id } => {
                    let dispatch = state.handle(
                        WorkerMessage::Report {
                            worker_id,
                            item_id,
                            found: false,
                        },
                        addr(worker_id),
                        Utc::now(),
                    );
                    assert_eq!(dispatch.reply, CoordinatorReply::Continue);
                    if dispatch.conclusion.is_some() {
                        conclusion = dispatch.conclusion;
                    }
                    replies[index] = request(&mut state, worker_id);
                }
                CoordinatorReply::NoMoreItems => {
                    no_more.insert(worker_id);
                }
                other => panic!("unexpected reply: {other:?}"),
            }
        }
    }

    assert_eq!(conclusion, Some(Conclusion::Exhausted));
    assert!(state.outcome().all_items_exhausted());
    assert!(!state.outcome().target_found());
    assert_eq!(state.items().counts().completed, 3);
}

#[test]
fn test_silent_worker_item_is_reassigned() {
    let mut state = CoordinatorState::new(WorkItemSet::new(10, None));
    let start = Utc::now();

    // 先把扇区0-4分给其他蜂群，使 A 拿到扇区5
    for worker_id in 10..15 {
        state.handle(WorkerMessage::Request { worker_id }, addr(worker_id), start);
    }
    let dispatch = state.handle(WorkerMessage::Request { worker_id: 1 }, addr(1), start);
    assert_eq!(dispatch.reply, CoordinatorReply::Search { item_id: 5 });

    // 其他蜂群保持心跳，A 保持沉默
    let later = start + chrono::Duration::seconds(14);
    for worker_id in 10..15 {
        state.handle(WorkerMessage::Heartbeat { worker_id }, addr(worker_id), later);
    }

    let released = state.sweep(start + chrono::Duration::seconds(16), chrono::Duration::seconds(15));
    assert_eq!(released.len(), 1);
    assert_eq!(released[0].worker_id, 1);
    assert_eq!(released[0].reclaimed, Some(5));
    assert_eq!(state.workers().get(1).unwrap().status, WorkerStatus::Disconnected);
    assert_eq!(state.items().get(5).unwrap().state, WorkItemState::Unassigned);

    let dispatch = state.handle(
        WorkerMessage::Request { worker_id: 2 },
        addr(2),
        start + chrono::Duration::seconds(17),
    );
    assert_eq!(dispatch.reply, CoordinatorReply::Search { item_id: 5 });

    // A 的迟到上报被拒绝，扇区仍属于 B
    assert_eq!(report(&mut state, 1, 5, false), CoordinatorReply::Denied);
    assert_eq!(state.items().assignee(5), Some(2));
}

#[test]
fn test_duplicate_report_is_idempotent() {
    let mut once = CoordinatorState::new(WorkItemSet::new(4, Some(2)));
    let mut twice = CoordinatorState::new(WorkItemSet::new(4, Some(2)));

    for state in [&mut once, &mut twice] {
        request(state, 1);
        request(state, 2);
        report(state, 1, 0, false);
    }
    assert_eq!(report(&mut twice, 1, 0, false), CoordinatorReply::Continue);

    assert_eq!(once.status_snapshot(), twice.status_snapshot());
    assert_eq!(
        once.workers().get(1).unwrap().items_completed,
        twice.workers().get(1).unwrap().items_completed
    );
}

#[test]
fn test_termination_is_monotonic() {
    let mut state = CoordinatorState::new(WorkItemSet::new(2, Some(0)));
    request(&mut state, 1);
    report(&mut state, 1, 0, true);
    assert!(state.is_terminal());

    // 之后的任何消息都不会让结果回退
    request(&mut state, 2);
    state.handle(WorkerMessage::Disconnect { worker_id: 1 }, addr(1), Utc::now());
    state.sweep(Utc::now() + chrono::Duration::hours(1), chrono::Duration::seconds(15));
    assert!(state.outcome().target_found());
    assert_eq!(state.outcome().found(), Some((0, 1)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_never_share_an_item() {
    let state = Arc::new(Mutex::new(CoordinatorState::new(WorkItemSet::new(50, None))));
    let mut handles = Vec::new();

    for worker_id in 0..100u32 {
        let state = state.clone();
        handles.push(tokio::spawn(async move {
            let reply = state.lock().await.handle(
                WorkerMessage::Request { worker_id },
                addr(worker_id),
                Utc::now(),
            );
            reply.reply
        }));
    }

    // 同时进行的存活检测不会破坏互斥
    let sweeper = {
        let state = state.clone();
        tokio::spawn(async move {
            for _ in 0..10 {
                state
                    .lock()
                    .await
                    .sweep(Utc::now(), chrono::Duration::seconds(15));
                tokio::task::yield_now().await;
            }
        })
    };

    let mut assigned = HashSet::new();
    let mut no_more = 0;
    for handle in handles {
        match handle.await.unwrap() {
            CoordinatorReply::Search { item_id } => assert!(assigned.insert(item_id)),
            CoordinatorReply::NoMoreItems => no_more += 1,
            other => panic!("unexpected reply: {other:?}"),
        }
    }
    sweeper.await.unwrap();

    assert_eq!(assigned.len(), 50);
    assert_eq!(no_more, 50);
    assert_eq!(state.lock().await.items().counts().assigned, 50);
}

#[tokio::test]
async fn test_dispatcher_loop_over_in_memory_network() {
    let network = InMemoryNetwork::new();
    let coordinator: Arc<dyn Transport> = Arc::new(network.endpoint().unwrap());
    let observers: Arc<dyn Transport> = Arc::new(network.endpoint().unwrap());
    let coordinator_addr = coordinator.local_addr().unwrap();

    let state = Arc::new(Mutex::new(CoordinatorState::new(WorkItemSet::new(2, Some(1)))));
    let fanout = Arc::new(NotificationFanout::new(
        coordinator.clone(),
        observers,
        2,
        50,
    ));
    let dispatcher = Dispatcher::new(
        coordinator,
        state.clone(),
        fanout,
        SwarmMetrics::new(),
        Duration::from_millis(20),
    );

    let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let handle = tokio::spawn(async move { dispatcher.run(shutdown_rx).await });

    let worker_a = network.endpoint().unwrap();
    let worker_b = network.endpoint().unwrap();

    async fn exchange(
        worker: &dyn Transport,
        target: SocketAddr,
        message: WorkerMessage,
    ) -> CoordinatorReply {
        worker.send_to(&encode(&message).unwrap(), target).await.unwrap();
        let datagram = worker
            .recv_from(Duration::from_secs(1))
            .await
            .unwrap()
            .expect("coordinator should reply");
        decode(&datagram.payload).unwrap()
    }

    // 无法解析的数据报被丢弃，不会有应答
    worker_a.send_to(b"garbage", coordinator_addr).await.unwrap();
    assert!(worker_a
        .recv_from(Duration::from_millis(50))
        .await
        .unwrap()
        .is_none());

    assert_eq!(
        exchange(&worker_a, coordinator_addr, WorkerMessage::Request { worker_id: 1 }).await,
        CoordinatorReply::Search { item_id: 0 }
    );
    assert_eq!(
        exchange(&worker_b, coordinator_addr, WorkerMessage::Request { worker_id: 2 }).await,
        CoordinatorReply::Search { item_id: 1 }
    );
    assert_eq!(
        exchange(&worker_a, coordinator_addr, WorkerMessage::Heartbeat { worker_id: 1 }).await,
        CoordinatorReply::HeartbeatAck
    );
    assert_eq!(
        exchange(
            &worker_b,
            coordinator_addr,
            WorkerMessage::Report {
                worker_id: 2,
                item_id: 1,
                found: true
            }
        )
        .await,
        CoordinatorReply::FoundAck
    );

    let exit = tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("dispatcher should stop after the target is found")
        .unwrap()
        .unwrap();
    assert_eq!(
        exit,
        DispatcherExit::Concluded(Conclusion::TargetFound {
            item_id: 1,
            worker_id: 2
        })
    );

    // 两个活跃蜂群都收到了终止推送
    for worker in [&worker_a, &worker_b] {
        let datagram = worker
            .recv_from(Duration::from_millis(200))
            .await
            .unwrap()
            .expect("terminal notice");
        let reply: CoordinatorReply = decode(&datagram.payload).unwrap();
        assert_eq!(reply, CoordinatorReply::TargetFound);
    }
}

#[tokio::test]
async fn test_dispatcher_stops_on_shutdown_signal() {
    let network = InMemoryNetwork::new();
    let coordinator: Arc<dyn Transport> = Arc::new(network.endpoint().unwrap());
    let observers: Arc<dyn Transport> = Arc::new(network.endpoint().unwrap());
    let state = Arc::new(Mutex::new(CoordinatorState::new(WorkItemSet::new(3, None))));
    let fanout = Arc::new(NotificationFanout::new(coordinator.clone(), observers, 3, 10));
    let dispatcher = Dispatcher::new(
        coordinator,
        state,
        fanout,
        SwarmMetrics::new(),
        Duration::from_millis(20),
    );

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let handle = tokio::spawn(async move { dispatcher.run(shutdown_rx).await });
    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown_tx.send(()).unwrap();

    let exit = tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("dispatcher should observe the shutdown signal")
        .unwrap()
        .unwrap();
    assert_eq!(exit, DispatcherExit::Shutdown);
}
