pub mod error;
pub mod token;

pub use error::TokenError;
pub use token::{derive_access_token, encrypt_ecb, SharedKey, BLOCK_SIZE};
