//! Error types for the dmap-rs library.

use std::io;
use std::string::FromUtf8Error;

/// Result type alias for dmap-rs operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur during protocol operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("UTF-8 decoding error: {0}")]
    Utf8(#[from] FromUtf8Error),

    #[error("Invalid message code: {0}")]
    InvalidMessageCode(u32),

    #[error("Invalid share kind: {0}")]
    InvalidShareKind(u32),

    #[error("Invalid service type: {0}")]
    InvalidServiceType(String),

    #[error("Buffer underflow: needed {needed} bytes, had {available}")]
    BufferUnderflow { needed: usize, available: usize },

    #[error("Frame too large: {0} bytes")]
    FrameTooLarge(usize),

    #[error("Protocol error: {0}")]
    Protocol(String),
}

/// The discovery transport could not be started.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("mDNS daemon error: {0}")]
    Mdns(#[from] mdns_sd::Error),

    #[error("discovery error: {0}")]
    Other(String),
}

/// A session attempt did not complete. Carries the collaborator's reason.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct SessionError(pub String);

impl SessionError {
    pub fn new(reason: impl Into<String>) -> Self {
        SessionError(reason.into())
    }

    pub fn reason(&self) -> &str {
        &self.0
    }
}

impl From<Error> for SessionError {
    fn from(err: Error) -> Self {
        SessionError(err.to_string())
    }
}

impl From<io::Error> for SessionError {
    fn from(err: io::Error) -> Self {
        SessionError(err.to_string())
    }
}

/// Failures while bringing a share online.
#[derive(Debug, thiserror::Error)]
pub enum ShareError {
    #[error("Error starting server: {0}")]
    ServeFailed(String),

    #[error("Error publishing server: {0}")]
    PublishFailed(String),
}
