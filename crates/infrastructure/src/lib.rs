pub mod in_memory_transport;
pub mod observability;
pub mod udp_transport;

pub use in_memory_transport::{InMemoryNetwork, InMemoryTransport};
pub use observability::*;
pub use udp_transport::UdpTransport;
