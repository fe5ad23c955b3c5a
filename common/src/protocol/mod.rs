pub mod codec;
pub mod correlation;
pub mod message;

pub use codec::{decode, encode};
pub use correlation::{correlation_id, correlation_id_at};
pub use message::{Message, MsgType, WriteCommand};

use std::net::Ipv4Addr;

pub const UNICAST_PORT: u16 = 32100;
pub const MULTICAST_PORT: u16 = 32101;
pub const MULTICAST_ADDR: Ipv4Addr = Ipv4Addr::new(238, 0, 0, 18);
