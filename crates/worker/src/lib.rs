//! 蜂群与观察者客户端
//!
//! `WorkerService` 驱动一个蜂群完成 请求/搜索/上报 循环，并在后台发送心跳；
//! `ObserverClient` 订阅协调器的事件流。

pub mod components;
pub mod observer;
pub mod service;

pub use components::{DispatcherClient, HeartbeatManager};
pub use observer::{ObserverClient, ObserverExit};
pub use service::{WorkerExit, WorkerService};
