use std::time::Duration;

use thiserror::Error;

/// Top-level error type for the `ventlink-api` crate.
///
/// Covers every failure mode of a single device exchange: reaching the
/// device, authenticating, and making sense of what it sent back.
/// `ventlink-core` folds these into its poll outcome kinds.
#[derive(Debug, Error)]
pub enum Error {
    // ── Connection ──────────────────────────────────────────────────
    /// TCP connect failed (refused, unreachable, DNS failure).
    #[error("Cannot connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// I/O failure on an established connection (reset, broken pipe).
    #[error("Connection error: {0}")]
    Io(#[from] std::io::Error),

    /// The device closed the connection before replying.
    #[error("Device closed the connection")]
    Disconnected,

    /// The exchange did not complete in time.
    #[error("Request timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    // ── Authentication ──────────────────────────────────────────────
    /// The device rejected the request signature or identity.
    #[error("Authentication rejected by device: {message}")]
    Authentication { message: String },

    // ── Protocol ────────────────────────────────────────────────────
    /// The device answered with an error frame other than an auth failure.
    #[error("Device rejected request ({code}): {message}")]
    Rejected { code: String, message: String },

    /// A frame could not be decoded, with the raw line for debugging.
    #[error("Malformed frame: {message}")]
    Malformed { message: String, body: String },

    /// A frame exceeded the configured maximum length.
    #[error("Frame exceeds {limit} bytes")]
    FrameTooLong { limit: usize },

    /// A reply did not belong to the request just sent.
    #[error("Unexpected reply: expected {expected}, got {got}")]
    UnexpectedReply { expected: String, got: String },

    /// A status response lacked a field of the fixed reading set.
    #[error("Status response is missing field '{field}'")]
    MissingField { field: &'static str },

    /// A status field had the wrong JSON type.
    #[error("Field '{field}' has invalid type (expected {expected})")]
    InvalidType {
        field: &'static str,
        expected: &'static str,
    },

    /// A status field was outside its valid range.
    #[error("Field '{field}' out of range: {value}")]
    OutOfRange { field: &'static str, value: i64 },

    // ── Local ───────────────────────────────────────────────────────
    /// A command argument was rejected before anything was sent.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl Error {
    /// Returns `true` for failures to reach or stay connected to the device.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connect { .. } | Self::Io(_) | Self::Disconnected)
    }

    /// Returns `true` if the exchange ran out of time.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns `true` if the device refused our credentials.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }

    /// Returns `true` if the device answered with something we could not use.
    ///
    /// These point at a firmware or library mismatch rather than a network
    /// problem.
    pub fn is_protocol(&self) -> bool {
        matches!(
            self,
            Self::Rejected { .. }
                | Self::Malformed { .. }
                | Self::FrameTooLong { .. }
                | Self::UnexpectedReply { .. }
                | Self::MissingField { .. }
                | Self::InvalidType { .. }
                | Self::OutOfRange { .. }
        )
    }

    /// Returns `true` if this is a transient error worth retrying soon.
    pub fn is_transient(&self) -> bool {
        self.is_connection() || self.is_timeout()
    }
}
