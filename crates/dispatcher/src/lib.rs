//! 扇区搜索协调核心
//!
//! 扇区分配、蜂群注册、存活检测与通知广播。所有共享状态都在
//! [`state::CoordinatorState`] 中，由同一把 `tokio::sync::Mutex` 保护。

pub mod controller;
pub mod dispatcher;
pub mod liveness_monitor;
pub mod notification;
pub mod observer_service;
pub mod state;
pub mod work_items;
pub mod worker_registry;

#[cfg(test)]
pub mod test_utils;

pub use controller::{ControlService, SwarmControlService, SwarmController};
pub use dispatcher::{Dispatcher, DispatcherExit};
pub use liveness_monitor::{LivenessConfig, LivenessMonitor};
pub use notification::NotificationFanout;
pub use observer_service::ObserverService;
pub use state::{CoordinatorState, Dispatch};
pub use work_items::{CompletionOutcome, WorkItemSet};
pub use worker_registry::{Released, TouchOutcome, WorkerRegistry};
