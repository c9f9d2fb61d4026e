//! # 数据模型
//!
//! 定义扇区搜索协调系统的核心数据结构：扇区（工作项）、蜂群（Worker）、
//! 观察者、搜索结果以及各通道上的协议消息。
//!
//! ## 核心模型
//!
//! ### WorkItem - 扇区
//! 固定数量的可搜索单元，状态只会沿 `Unassigned → Assigned → Completed` 前进，
//! 被回收时从 `Assigned` 退回 `Unassigned`。`Completed` 是终态。
//!
//! ### WorkerInfo - 蜂群
//! 由客户端自行提供ID的Worker，记录端点、状态、当前分配和最后活跃时间。
//!
//! ### ObserverInfo - 观察者
//! 只读订阅者，接收历史事件回放与实时事件流。
//!
//! ### SearchOutcome - 搜索结果
//! 进程内唯一，`target_found` 与 `all_items_exhausted` 都只会从 false 变为 true。
//!
//! ## 状态流转
//!
//! ```text
//! Unassigned ──next_unassigned──▶ Assigned ──complete──▶ Completed
//!      ▲                              │
//!      └──────────reclaim─────────────┘
//! ```
//!
//! ## 序列化
//!
//! 所有需要上线的模型都实现了 `serde::Serialize` 和 `serde::Deserialize`，
//! 时间字段统一使用 `DateTime<Utc>`。

pub mod event;
pub mod message;
pub mod observer;
pub mod outcome;
pub mod work_item;
pub mod worker;

pub use event::*;
pub use message::*;
pub use observer::*;
pub use outcome::*;
pub use work_item::*;
pub use worker::*;

/// 扇区ID，取值范围 `[0, total_items)`
pub type ItemId = u32;

/// 蜂群ID，由客户端提供
pub type WorkerId = u32;
