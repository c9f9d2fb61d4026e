use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;

use crate::SwarmResult;

/// 收到的数据报
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    pub payload: Vec<u8>,
    pub source: SocketAddr,
}

/// 数据报传输抽象接口
///
/// 不保证送达、顺序或去重，每条消息都携带发送方地址。
#[async_trait]
pub trait Transport: Send + Sync {
    /// 发送一个数据报，成功只代表已交给网络
    async fn send_to(&self, payload: &[u8], target: SocketAddr) -> SwarmResult<()>;

    /// 在给定时间内等待一个数据报，超时返回 `None`
    async fn recv_from(&self, wait: Duration) -> SwarmResult<Option<Datagram>>;

    /// 本地绑定地址
    fn local_addr(&self) -> SwarmResult<SocketAddr>;
}
