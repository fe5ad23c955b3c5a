use std::net::{AddrParseError, SocketAddr};
use std::time::Duration;
use thiserror::Error;
use crate::encryption::error::TokenError;

pub type Result<T> = std::result::Result<T, HubError>;

#[derive(Error, Debug)]
pub enum HubError {
    #[error("Timeout: no reply from {addr} within {waited:?}")]
    Timeout { addr: SocketAddr, waited: Duration },
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
    #[error("Unknown device: {0}")]
    UnknownDevice(String),
    #[error("Invalid selection: {0}")]
    InvalidSelection(String),
    #[error("Invalid command: {0}")]
    InvalidCommand(String),
    #[error("Bad token length: {0}")]
    BadTokenLength(String),
    #[error("No hub found on the network")]
    NotFound,
    #[error("No access token available: {0}")]
    NoToken(String),
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl HubError {
    /// True when the hub simply did not answer, as opposed to answering badly.
    pub fn is_timeout(&self) -> bool {
        matches!(self, HubError::Timeout { .. })
    }
}

impl From<std::io::Error> for HubError {
    fn from(err: std::io::Error) -> Self {
        HubError::NetworkError(err.to_string())
    }
}

impl From<serde_json::Error> for HubError {
    fn from(err: serde_json::Error) -> Self {
        HubError::MalformedResponse(err.to_string())
    }
}

impl From<AddrParseError> for HubError {
    fn from(err: AddrParseError) -> Self {
        HubError::ConfigError(err.to_string())
    }
}

impl From<TokenError> for HubError {
    fn from(err: TokenError) -> Self {
        HubError::BadTokenLength(err.to_string())
    }
}
