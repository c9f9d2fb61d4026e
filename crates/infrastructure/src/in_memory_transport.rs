use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use swarm_core::{Datagram, SwarmError, SwarmResult, Transport, MAX_DATAGRAM_SIZE};
use tokio::sync::mpsc;
use tracing::trace;

type Endpoints = HashMap<SocketAddr, mpsc::UnboundedSender<Datagram>>;

/// 内存数据报网络
///
/// 使用 Tokio channels 在同一进程内模拟 UDP：发往未绑定地址的数据报被静默丢弃，
/// 适用于测试和嵌入式场景。
#[derive(Debug, Clone)]
pub struct InMemoryNetwork {
    endpoints: Arc<Mutex<Endpoints>>,
    next_port: Arc<AtomicU16>,
}

impl Default for InMemoryNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryNetwork {
    pub fn new() -> Self {
        Self {
            endpoints: Arc::new(Mutex::new(HashMap::new())),
            next_port: Arc::new(AtomicU16::new(40_000)),
        }
    }

    /// 绑定指定地址，端口为0时自动分配
    pub fn bind(&self, addr: SocketAddr) -> SwarmResult<InMemoryTransport> {
        let mut endpoints = self.lock()?;

        let addr = if addr.port() == 0 {
            loop {
                let port = self.next_port.fetch_add(1, Ordering::Relaxed);
                let candidate = SocketAddr::new(addr.ip(), port);
                if !endpoints.contains_key(&candidate) {
                    break candidate;
                }
            }
        } else {
            addr
        };

        if endpoints.contains_key(&addr) {
            return Err(SwarmError::Transport(std::io::Error::new(
                std::io::ErrorKind::AddrInUse,
                format!("地址已被占用: {addr}"),
            )));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        endpoints.insert(addr, tx);

        Ok(InMemoryTransport {
            addr,
            network: self.clone(),
            receiver: tokio::sync::Mutex::new(rx),
        })
    }

    /// 在回环地址上绑定一个自动分配端口的端点
    pub fn endpoint(&self) -> SwarmResult<InMemoryTransport> {
        self.bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0))
    }

    fn lock(&self) -> SwarmResult<std::sync::MutexGuard<'_, Endpoints>> {
        self.endpoints
            .lock()
            .map_err(|e| SwarmError::Internal(format!("内存网络锁已损坏: {e}")))
    }

    fn deliver(&self, datagram: Datagram, target: SocketAddr) -> SwarmResult<()> {
        let endpoints = self.lock()?;
        match endpoints.get(&target) {
            Some(tx) => {
                // 接收端已释放时与 UDP 一样静默丢弃
                let _ = tx.send(datagram);
            }
            None => trace!("目标地址未绑定，丢弃数据报: {}", target),
        }
        Ok(())
    }

    fn unbind(&self, addr: &SocketAddr) {
        if let Ok(mut endpoints) = self.endpoints.lock() {
            endpoints.remove(addr);
        }
    }
}

/// 内存网络上的一个端点，释放时自动解绑
#[derive(Debug)]
pub struct InMemoryTransport {
    addr: SocketAddr,
    network: InMemoryNetwork,
    receiver: tokio::sync::Mutex<mpsc::UnboundedReceiver<Datagram>>,
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn send_to(&self, payload: &[u8], target: SocketAddr) -> SwarmResult<()> {
        if payload.len() > MAX_DATAGRAM_SIZE {
            return Err(SwarmError::DatagramTooLarge {
                size: payload.len(),
                limit: MAX_DATAGRAM_SIZE,
            });
        }
        self.network.deliver(
            Datagram {
                payload: payload.to_vec(),
                source: self.addr,
            },
            target,
        )
    }

    async fn recv_from(&self, wait: Duration) -> SwarmResult<Option<Datagram>> {
        let mut receiver = self.receiver.lock().await;
        match tokio::time::timeout(wait, receiver.recv()).await {
            Err(_) => Ok(None),
            Ok(Some(datagram)) => Ok(Some(datagram)),
            Ok(None) => Err(SwarmError::ChannelClosed(self.addr.to_string())),
        }
    }

    fn local_addr(&self) -> SwarmResult<SocketAddr> {
        Ok(self.addr)
    }
}

impl Drop for InMemoryTransport {
    fn drop(&mut self) {
        self.network.unbind(&self.addr);
    }
}
