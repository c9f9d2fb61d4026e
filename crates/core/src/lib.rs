pub mod codec;
pub mod errors;
pub mod models;
pub mod traits;

pub use codec::{decode, encode, send_message, MAX_DATAGRAM_SIZE, MAX_TOTAL_ITEMS};
pub use errors::*;
pub use models::*;
pub use traits::{Datagram, Transport};

/// 统一的Result类型
pub type SwarmResult<T> = std::result::Result<T, SwarmError>;
