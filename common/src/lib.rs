pub mod error;
pub mod types;
pub mod config;
pub mod encryption;
pub mod protocol;

pub use error::{HubError, Result};
pub use types::*;
pub use config::*;
pub use protocol::{Message, MsgType, WriteCommand};
