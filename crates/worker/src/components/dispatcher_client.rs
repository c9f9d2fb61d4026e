use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use swarm_core::{
    decode, send_message, CoordinatorReply, ItemId, SwarmError, SwarmResult, Transport, WorkerId,
    WorkerMessage,
};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// 协调器蜂群通道的客户端
///
/// 请求/应答建立在不可靠数据报之上：等待超时后重发，最多 `max_attempts` 次。
/// 等待期间收到的 TARGET_FOUND / SHUTDOWN 推送会直接返回给调用方。
pub struct DispatcherClient {
    worker_id: WorkerId,
    coordinator: SocketAddr,
    transport: Arc<dyn Transport>,
    reply_timeout: Duration,
    max_attempts: u32,
}

impl DispatcherClient {
    pub fn new(
        worker_id: WorkerId,
        coordinator: SocketAddr,
        transport: Arc<dyn Transport>,
        reply_timeout: Duration,
        max_attempts: u32,
    ) -> Self {
        Self {
            worker_id,
            coordinator,
            transport,
            reply_timeout,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn worker_id(&self) -> WorkerId {
        self.worker_id
    }

    /// 请求一个扇区
    pub async fn request(&self) -> SwarmResult<CoordinatorReply> {
        self.exchange(
            WorkerMessage::Request {
                worker_id: self.worker_id,
            },
            |reply| {
                matches!(
                    reply,
                    CoordinatorReply::Search { .. }
                        | CoordinatorReply::NoMoreItems
                        | CoordinatorReply::Denied
                )
            },
        )
        .await
    }

    /// 上报扇区搜索结果
    pub async fn report(&self, item_id: ItemId, found: bool) -> SwarmResult<CoordinatorReply> {
        self.exchange(
            WorkerMessage::Report {
                worker_id: self.worker_id,
                item_id,
                found,
            },
            |reply| {
                matches!(
                    reply,
                    CoordinatorReply::Continue | CoordinatorReply::FoundAck | CoordinatorReply::Denied
                )
            },
        )
        .await
    }

    /// 发送心跳，不等待确认
    pub async fn send_heartbeat(&self) -> SwarmResult<()> {
        send_message(
            self.transport.as_ref(),
            &WorkerMessage::Heartbeat {
                worker_id: self.worker_id,
            },
            self.coordinator,
        )
        .await?;
        debug!("蜂群 #{} 已发送心跳", self.worker_id);
        Ok(())
    }

    /// 通知协调器本蜂群退出并等待确认
    pub async fn disconnect(&self) -> SwarmResult<()> {
        let reply = self
            .exchange(
                WorkerMessage::Disconnect {
                    worker_id: self.worker_id,
                },
                |reply| matches!(reply, CoordinatorReply::DisconnectAck),
            )
            .await?;
        if reply == CoordinatorReply::DisconnectAck {
            info!("蜂群 #{} 已与协调器断开", self.worker_id);
        }
        Ok(())
    }

    /// 在给定时间内等待终止推送
    pub async fn wait_for_terminal(&self, wait: Duration) -> SwarmResult<Option<CoordinatorReply>> {
        self.receive_until(Instant::now() + wait, |_| false).await
    }

    async fn exchange<F>(&self, message: WorkerMessage, accept: F) -> SwarmResult<CoordinatorReply>
    where
        F: Fn(&CoordinatorReply) -> bool,
    {
        if let Some(terminal) = self.drain_stale().await? {
            return Ok(terminal);
        }

        for attempt in 1..=self.max_attempts {
            send_message(self.transport.as_ref(), &message, self.coordinator).await?;

            let deadline = Instant::now() + self.reply_timeout;
            if let Some(reply) = self.receive_until(deadline, &accept).await? {
                return Ok(reply);
            }
            warn!(
                "等待 {} 的应答超时 (第 {}/{} 次)",
                message.kind(),
                attempt,
                self.max_attempts
            );
        }

        Err(SwarmError::Unreachable(format!(
            "{} 在 {} 次尝试后仍无应答",
            self.coordinator, self.max_attempts
        )))
    }

    /// 丢弃发送新请求前已经排队的非终止应答
    ///
    /// 这些应答属于之前的交互：重发请求得到的第二个应答，或者心跳换来的 DENIED。
    /// 发送之后才迟到的旧应答仍可能被当成新请求的应答，此时协调器会以 DENIED
    /// 回应随后的越权消息，蜂群断开后重新 REQUEST 即可恢复。
    async fn drain_stale(&self) -> SwarmResult<Option<CoordinatorReply>> {
        while let Some(datagram) = self.transport.recv_from(Duration::ZERO).await? {
            if datagram.source != self.coordinator {
                continue;
            }
            match decode::<CoordinatorReply>(&datagram.payload) {
                Ok(reply) if reply.is_terminal() => return Ok(Some(reply)),
                Ok(reply) => debug!("丢弃过期应答 {:?}", reply),
                Err(e) => warn!("无法解析协调器消息: {}", e),
            }
        }
        Ok(None)
    }

    /// 接收直到截止时间，返回第一个被接受的应答或终止推送
    async fn receive_until<F>(
        &self,
        deadline: Instant,
        accept: F,
    ) -> SwarmResult<Option<CoordinatorReply>>
    where
        F: Fn(&CoordinatorReply) -> bool,
    {
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }

            let Some(datagram) = self.transport.recv_from(remaining).await? else {
                return Ok(None);
            };
            if datagram.source != self.coordinator {
                debug!("忽略来自 {} 的数据报", datagram.source);
                continue;
            }

            match decode::<CoordinatorReply>(&datagram.payload) {
                Ok(reply) if reply.is_terminal() || accept(&reply) => return Ok(Some(reply)),
                Ok(reply) => debug!("忽略应答 {:?}", reply),
                Err(e) => warn!("无法解析协调器消息: {}", e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarm_core::encode;
    use swarm_infrastructure::{InMemoryNetwork, InMemoryTransport};

    fn client(network: &InMemoryNetwork, coordinator: &InMemoryTransport) -> DispatcherClient {
        DispatcherClient::new(
            7,
            coordinator.local_addr().unwrap(),
            Arc::new(network.endpoint().unwrap()),
            Duration::from_millis(50),
            3,
        )
    }

    async fn reply_to_next(coordinator: &InMemoryTransport, replies: &[CoordinatorReply]) -> WorkerMessage {
        let datagram = coordinator
            .recv_from(Duration::from_secs(1))
            .await
            .unwrap()
            .unwrap();
        for reply in replies {
            coordinator
                .send_to(&encode(reply).unwrap(), datagram.source)
                .await
                .unwrap();
        }
        decode(&datagram.payload).unwrap()
    }

    #[tokio::test]
    async fn test_request_skips_heartbeat_ack() {
        let network = InMemoryNetwork::new();
        let coordinator = network.endpoint().unwrap();
        let client = client(&network, &coordinator);

        let (reply, received) = tokio::join!(
            client.request(),
            reply_to_next(
                &coordinator,
                &[
                    CoordinatorReply::HeartbeatAck,
                    CoordinatorReply::Search { item_id: 4 },
                ],
            )
        );
        assert_eq!(received, WorkerMessage::Request { worker_id: 7 });
        assert_eq!(reply.unwrap(), CoordinatorReply::Search { item_id: 4 });
    }

    #[tokio::test]
    async fn test_report_returns_terminal_push() {
        let network = InMemoryNetwork::new();
        let coordinator = network.endpoint().unwrap();
        let client = client(&network, &coordinator);

        let (reply, _) = tokio::join!(
            client.report(2, false),
            reply_to_next(&coordinator, &[CoordinatorReply::Shutdown])
        );
        assert_eq!(reply.unwrap(), CoordinatorReply::Shutdown);
    }

    #[tokio::test]
    async fn test_request_retries_then_fails() {
        let network = InMemoryNetwork::new();
        let coordinator = network.endpoint().unwrap();
        let client = client(&network, &coordinator);

        let result = client.request().await;
        assert!(matches!(result, Err(SwarmError::Unreachable(_))));

        // 每次尝试都重发了一次请求
        let mut attempts = 0;
        while coordinator
            .recv_from(Duration::from_millis(10))
            .await
            .unwrap()
            .is_some()
        {
            attempts += 1;
        }
        assert_eq!(attempts, 3);
    }

    #[tokio::test]
    async fn test_foreign_datagrams_are_ignored() {
        let network = InMemoryNetwork::new();
        let coordinator = network.endpoint().unwrap();
        let stranger = network.endpoint().unwrap();
        let client = client(&network, &coordinator);
        let client_addr = client.transport.local_addr().unwrap();

        stranger
            .send_to(&encode(&CoordinatorReply::TargetFound).unwrap(), client_addr)
            .await
            .unwrap();
        let pushed = client
            .wait_for_terminal(Duration::from_millis(50))
            .await
            .unwrap();
        assert_eq!(pushed, None);
    }

    #[tokio::test]
    async fn test_stale_replies_do_not_answer_new_request() {
        let network = InMemoryNetwork::new();
        let coordinator = network.endpoint().unwrap();
        let client = client(&network, &coordinator);
        let client_addr = client.transport.local_addr().unwrap();

        // 上一次 REPORT 重发换来的 CONTINUE，以及心跳换来的 DENIED
        for stale in [CoordinatorReply::Continue, CoordinatorReply::Denied] {
            coordinator
                .send_to(&encode(&stale).unwrap(), client_addr)
                .await
                .unwrap();
        }

        let (reply, received) = tokio::join!(
            client.report(5, false),
            reply_to_next(&coordinator, &[CoordinatorReply::FoundAck])
        );
        assert_eq!(
            received,
            WorkerMessage::Report {
                worker_id: 7,
                item_id: 5,
                found: false,
            }
        );
        assert_eq!(reply.unwrap(), CoordinatorReply::FoundAck);
    }

    #[tokio::test]
    async fn test_queued_terminal_push_is_kept() {
        let network = InMemoryNetwork::new();
        let coordinator = network.endpoint().unwrap();
        let client = client(&network, &coordinator);
        let client_addr = client.transport.local_addr().unwrap();

        for queued in [CoordinatorReply::HeartbeatAck, CoordinatorReply::TargetFound] {
            coordinator
                .send_to(&encode(&queued).unwrap(), client_addr)
                .await
                .unwrap();
        }

        let reply = client.request().await.unwrap();
        assert_eq!(reply, CoordinatorReply::TargetFound);
    }
}
