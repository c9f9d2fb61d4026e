use thiserror::Error;

/// 协调系统错误类型定义
#[derive(Debug, Error)]
pub enum SwarmError {
    #[error("传输错误: {0}")]
    Transport(#[from] std::io::Error),

    #[error("消息编解码错误: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("数据报过大: {size} 字节 (上限 {limit} 字节)")]
    DatagramTooLarge { size: usize, limit: usize },

    #[error("传输通道已关闭: {0}")]
    ChannelClosed(String),

    #[error("协调器无响应: {0}")]
    Unreachable(String),

    #[error("未知蜂群: #{0}")]
    UnknownWorker(u32),

    #[error("操作无效: {0}")]
    InvalidOperation(String),

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

impl SwarmError {
    /// 是否为可在下一条消息上恢复的稳态错误
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, SwarmError::Configuration(_) | SwarmError::ChannelClosed(_))
    }
}
