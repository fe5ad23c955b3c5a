use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TokenError {
    #[error("Shared key must be exactly 16 bytes, got {0}")]
    InvalidKey(usize),

    #[error("Gateway token length {0} is not a multiple of 16 bytes")]
    InvalidTokenLength(usize),
}
