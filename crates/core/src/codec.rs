//! 传输边界上的消息编解码
//!
//! 所有消息都编码为带 `type` 标签的 JSON 数据报。协调器内部只处理解码后的枚举。

use std::net::SocketAddr;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::traits::Transport;
use crate::{SwarmError, SwarmResult};

/// UDP 单个数据报的最大有效载荷
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

/// 扇区总数上限
///
/// STATUS 快照逐个列出扇区，整份快照必须放进一个数据报。
pub const MAX_TOTAL_ITEMS: usize = 500;

/// 编码消息
pub fn encode<T: Serialize>(message: &T) -> SwarmResult<Vec<u8>> {
    let payload = serde_json::to_vec(message)?;
    if payload.len() > MAX_DATAGRAM_SIZE {
        return Err(SwarmError::DatagramTooLarge {
            size: payload.len(),
            limit: MAX_DATAGRAM_SIZE,
        });
    }
    Ok(payload)
}

/// 解码消息
pub fn decode<T: DeserializeOwned>(payload: &[u8]) -> SwarmResult<T> {
    Ok(serde_json::from_slice(payload)?)
}

/// 编码并发送消息
pub async fn send_message<T: Serialize + Sync>(
    transport: &dyn Transport,
    message: &T,
    target: SocketAddr,
) -> SwarmResult<()> {
    let payload = encode(message)?;
    transport.send_to(&payload, target).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        ControlResponse, CoordinatorReply, ItemCounts, ItemSnapshot, ObserverEvent,
        StatusSnapshot, WorkItemState, WorkerMessage,
    };

    #[test]
    fn test_decode_request() {
        let msg: WorkerMessage = decode(br#"{"type":"REQUEST","worker_id":12}"#).unwrap();
        assert_eq!(msg, WorkerMessage::Request { worker_id: 12 });
    }

    #[test]
    fn test_decode_rejects_malformed() {
        assert!(decode::<WorkerMessage>(b"REQUEST:12").is_err());
        assert!(decode::<WorkerMessage>(br#"{"type":"REQUEST"}"#).is_err());
        assert!(decode::<WorkerMessage>(br#"{"type":"LAUNCH","worker_id":1}"#).is_err());
    }

    #[test]
    fn test_decode_is_not_lenient_across_channels() {
        // 蜂群应答不能被当作蜂群请求解析
        let payload = encode(&CoordinatorReply::Continue).unwrap();
        assert!(decode::<WorkerMessage>(&payload).is_err());
    }

    #[test]
    fn test_status_snapshot_at_item_limit_fits_datagram() {
        // 每个字段都取最长的编码
        let snapshot = StatusSnapshot {
            items: ItemCounts {
                total: MAX_TOTAL_ITEMS,
                unassigned: 0,
                assigned: MAX_TOTAL_ITEMS,
                completed: 0,
            },
            workers_total: usize::MAX,
            workers_active: usize::MAX,
            workers_disconnected: usize::MAX,
            target_found: false,
            all_items_exhausted: false,
            found_item: Some(u32::MAX),
            found_by: Some(u32::MAX),
            item_details: (0..MAX_TOTAL_ITEMS as u32)
                .map(|id| ItemSnapshot {
                    id,
                    state: WorkItemState::Unassigned,
                    assigned_worker: Some(u32::MAX),
                    target_found_here: false,
                })
                .collect(),
        };

        let control = encode(&ControlResponse::Status {
            snapshot: snapshot.clone(),
        })
        .unwrap();
        assert!(control.len() <= MAX_DATAGRAM_SIZE);

        let observer = encode(&ObserverEvent::Status { snapshot }).unwrap();
        assert!(observer.len() <= MAX_DATAGRAM_SIZE);
    }

    #[test]
    fn test_encode_rejects_oversized_payload() {
        let snapshot = ItemSnapshot {
            id: 0,
            state: WorkItemState::Completed,
            assigned_worker: None,
            target_found_here: false,
        };
        let details = vec![snapshot; MAX_DATAGRAM_SIZE / 16];
        let err = encode(&details).unwrap_err();
        assert!(matches!(err, SwarmError::DatagramTooLarge { .. }));
    }
}
