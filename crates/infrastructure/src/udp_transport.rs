use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use swarm_core::{Datagram, SwarmResult, Transport, MAX_DATAGRAM_SIZE};
use tokio::net::UdpSocket;
use tracing::debug;

/// 基于 UDP 套接字的传输实现
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
}

impl UdpTransport {
    /// 绑定本地地址，端口为0时由系统分配
    pub async fn bind(addr: SocketAddr) -> SwarmResult<Self> {
        let socket = UdpSocket::bind(addr).await?;
        debug!("UDP 套接字已绑定: {}", socket.local_addr()?);
        Ok(Self { socket })
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn send_to(&self, payload: &[u8], target: SocketAddr) -> SwarmResult<()> {
        self.socket.send_to(payload, target).await?;
        Ok(())
    }

    async fn recv_from(&self, wait: Duration) -> SwarmResult<Option<Datagram>> {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        match tokio::time::timeout(wait, self.socket.recv_from(&mut buf)).await {
            Err(_) => Ok(None),
            Ok(Ok((len, source))) => {
                buf.truncate(len);
                Ok(Some(Datagram {
                    payload: buf,
                    source,
                }))
            }
            Ok(Err(e)) => Err(e.into()),
        }
    }

    fn local_addr(&self) -> SwarmResult<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }
}
