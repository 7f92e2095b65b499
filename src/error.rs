//! Error types for URL processing calls.
//!
//! Per-entry failures never show up here: an unparseable URL is dropped and
//! counted. Only request-level and channel-level failures reject a call.

use thiserror::Error;

/// Call-level failures surfaced to the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessingError {
    /// The request is structurally invalid (e.g. a filter without a match string).
    #[error("Validation error: {0}")]
    Validation(String),

    /// The operation name is unknown or the processor settings are unusable.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The offload execution context failed outside the message protocol.
    #[error("Offload channel fault: {0}")]
    ChannelFault(String),

    /// The caller's wall-clock budget ran out.
    #[error("Processing exceeded the time budget of {budget_ms} ms")]
    Timeout { budget_ms: u64 },

    /// A processing task ended without producing a result.
    #[error("Internal processing error: {0}")]
    Internal(String),
}

impl ProcessingError {
    /// Request errors are deterministic: every chunk would fail the same way.
    pub fn is_request_error(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::Configuration(_))
    }
}

impl From<config::ConfigError> for ProcessingError {
    fn from(err: config::ConfigError) -> Self {
        ProcessingError::Configuration(err.to_string())
    }
}
