use std::net::SocketAddr;

use chrono::{DateTime, Duration, Utc};

/// 观察者信息
#[derive(Debug, Clone)]
pub struct ObserverInfo {
    pub endpoint: SocketAddr,
    pub attached_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

impl ObserverInfo {
    pub fn new(endpoint: SocketAddr, now: DateTime<Utc>) -> Self {
        Self {
            endpoint,
            attached_at: now,
            last_seen: now,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        now - self.last_seen > timeout
    }
}
