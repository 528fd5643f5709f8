//! Reports errors raised by a running share.

use tracing::error;

use crate::Error;

/// Every share error is fatal: the reporter logs it and hands back the error
/// that stops the loop.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorReporter;

impl ErrorReporter {
    pub fn new() -> Self {
        ErrorReporter
    }

    pub fn on_error(&self, message: &str) -> Error {
        error!("share error: {}", message);
        Error::Protocol(message.to_string())
    }
}
