pub mod app_config;
pub mod dispatcher_worker;
pub mod logging;

pub use app_config::*;
pub use dispatcher_worker::*;
pub use logging::*;
