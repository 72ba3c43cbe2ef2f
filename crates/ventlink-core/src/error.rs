// ── Core error types ──
//
// Consumers never see frame-level failures directly. The
// `From<ventlink_api::Error>` impl folds transport and protocol errors into
// the four poll outcome kinds the poller and setup flow reason about.

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Classification of a failed poll or command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display, strum::AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    /// Host unreachable, connection refused or reset.
    Connection,
    /// The device answered with something we cannot accept.
    Protocol,
    /// The exchange did not finish within the configured timeout.
    Timeout,
    /// The device rejected our identity or key.
    Authentication,
}

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to device at {addr}: {reason}")]
    ConnectionFailed { addr: String, reason: String },

    #[error("Device connection lost: {reason}")]
    ConnectionLost { reason: String },

    #[error("Device did not answer within {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    // ── Protocol errors ──────────────────────────────────────────────
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    #[error("Device rejected the request ({code}): {message}")]
    Rejected { code: String, message: String },

    // ── Local errors ─────────────────────────────────────────────────
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Invalid command: {message}")]
    InvalidCommand { message: String },

    #[error("Device '{device_id}' is already loaded")]
    AlreadyLoaded { device_id: String },

    #[error("Device '{device_id}' is not loaded")]
    DeviceNotFound { device_id: String },

    #[error("Poller for device '{device_id}' has stopped")]
    PollerStopped { device_id: String },
}

impl CoreError {
    /// Poll outcome kind, or `None` for errors raised before any I/O.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::ConnectionFailed { .. } | Self::ConnectionLost { .. } => {
                Some(ErrorKind::Connection)
            }
            Self::Timeout { .. } => Some(ErrorKind::Timeout),
            Self::AuthenticationFailed { .. } => Some(ErrorKind::Authentication),
            Self::Protocol { .. } | Self::Rejected { .. } => Some(ErrorKind::Protocol),
            Self::Validation(_)
            | Self::InvalidCommand { .. }
            | Self::AlreadyLoaded { .. }
            | Self::DeviceNotFound { .. }
            | Self::PollerStopped { .. } => None,
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<ventlink_api::Error> for CoreError {
    fn from(err: ventlink_api::Error) -> Self {
        use ventlink_api::Error as Api;

        match err {
            Api::Connect { addr, source } => Self::ConnectionFailed {
                addr,
                reason: source.to_string(),
            },
            Api::Io(e) => Self::ConnectionLost {
                reason: e.to_string(),
            },
            Api::Disconnected => Self::ConnectionLost {
                reason: "device closed the connection".into(),
            },
            Api::Timeout { timeout } => Self::Timeout { timeout },
            Api::Authentication { message } => Self::AuthenticationFailed { message },
            Api::Rejected { code, message } => Self::Rejected { code, message },
            Api::InvalidArgument(message) => Self::InvalidCommand { message },
            other @ (Api::Malformed { .. }
            | Api::FrameTooLong { .. }
            | Api::UnexpectedReply { .. }
            | Api::MissingField { .. }
            | Api::InvalidType { .. }
            | Api::OutOfRange { .. }) => Self::Protocol {
                message: other.to_string(),
            },
        }
    }
}

// ── Validation ───────────────────────────────────────────────────────

/// Structural problems with setup input. Never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("Invalid host '{host}': {reason}")]
    InvalidHost { host: String, reason: String },

    #[error("Port must be between 1 and 65535")]
    InvalidPort,

    #[error("Invalid {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("Key is longer than {max} bytes")]
    KeyTooLong { max: usize },

    #[error("Invalid polling setting '{field}': {reason}")]
    InvalidPolling { field: &'static str, reason: String },
}

// ── Setup ────────────────────────────────────────────────────────────

/// Outcome of a failed setup attempt, one variant per message the user
/// can act on.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("Cannot connect to the device: {0}")]
    CannotConnect(String),

    #[error("The device rejected the identity or key: {0}")]
    InvalidAuth(String),

    #[error("The device answered, but its response was not understood: {0}")]
    Protocol(String),

    #[error("The device did not answer within {0:?}")]
    Timeout(Duration),
}

impl From<CoreError> for SetupError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(v) => Self::Invalid(v),
            CoreError::Timeout { timeout } => Self::Timeout(timeout),
            CoreError::AuthenticationFailed { message } => Self::InvalidAuth(message),
            CoreError::ConnectionFailed { .. } | CoreError::ConnectionLost { .. } => {
                Self::CannotConnect(err.to_string())
            }
            other => Self::Protocol(other.to_string()),
        }
    }
}
