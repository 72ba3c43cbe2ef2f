//! CLI error types with miette diagnostics.
//!
//! Maps core, setup and config errors into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use ventlink_config::ConfigError;
use ventlink_core::{CoreError, ErrorKind, PollError, SetupError, ValidationError};

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the device: {reason}")]
    #[diagnostic(
        code(ventlink::connection_failed),
        help(
            "Check that the unit is powered, on the same network, and that\n\
             the host and port in the profile are right.\n\
             Try: ventlink devices list"
        )
    )]
    ConnectionFailed { reason: String },

    #[error("Device did not answer within {after}")]
    #[diagnostic(
        code(ventlink::timeout),
        help("Increase the timeout with --timeout or check the unit's Wi-Fi signal.")
    )]
    Timeout { after: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("The device rejected the identity or key: {message}")]
    #[diagnostic(
        code(ventlink::auth_failed),
        help(
            "Verify the pre-shared key on the unit's label.\n\
             Re-run: ventlink setup --name <profile>"
        )
    )]
    AuthFailed { message: String },

    #[error("No key configured for device '{profile}'")]
    #[diagnostic(
        code(ventlink::no_credentials),
        help(
            "Store one with: ventlink setup --name {profile}\n\
             Or set key_env in the profile and export that variable."
        )
    )]
    NoCredentials { profile: String },

    // ── Device ───────────────────────────────────────────────────────
    #[error("Device protocol error: {message}")]
    #[diagnostic(
        code(ventlink::protocol),
        help("The unit answered with something unexpected. Run with -vv for details.")
    )]
    Protocol { message: String },

    #[error("Device rejected the request ({code}): {message}")]
    #[diagnostic(code(ventlink::rejected))]
    Rejected { code: String, message: String },

    #[error("Device '{device}' is unavailable: {message}")]
    #[diagnostic(
        code(ventlink::unavailable),
        help("The first poll failed ({kind}). Run with -v to see the poller's log.")
    )]
    Unavailable {
        device: String,
        kind: ErrorKind,
        message: String,
    },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Device '{name}' not found in configuration")]
    #[diagnostic(
        code(ventlink::device_not_found),
        help(
            "Available devices: {available}\n\
             Add one with: ventlink setup"
        )
    )]
    DeviceNotFound { name: String, available: String },

    #[error("No devices configured")]
    #[diagnostic(
        code(ventlink::no_config),
        help(
            "Add one with: ventlink setup\n\
             Expected config at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error("Several devices are configured and none is selected")]
    #[diagnostic(
        code(ventlink::ambiguous_device),
        help(
            "Pick one with --device <name>, or set a default with: ventlink devices use <name>\n\
             Available devices: {available}"
        )
    )]
    AmbiguousDevice { available: String },

    #[error("Device id '{device_id}' is already configured as '{profile}'")]
    #[diagnostic(
        code(ventlink::conflict),
        help("Remove it first with: ventlink devices remove {profile}")
    )]
    Conflict { device_id: String, profile: String },

    #[error("Configuration error: {message}")]
    #[diagnostic(code(ventlink::config))]
    Config { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(ventlink::validation))]
    Validation { field: String, reason: String },

    #[error(transparent)]
    #[diagnostic(code(ventlink::validation))]
    InvalidInput(#[from] ValidationError),

    // ── Interactive ──────────────────────────────────────────────────
    #[error("Missing {field} in non-interactive mode")]
    #[diagnostic(
        code(ventlink::missing_input),
        help("Pass --{field} on the command line.")
    )]
    MissingInput { field: String },

    #[error("Destructive operation '{action}' requires confirmation")]
    #[diagnostic(
        code(ventlink::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── IO / Serialization ────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to encode output: {0}")]
    #[diagnostic(code(ventlink::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// A device whose first poll failed.
    pub fn unavailable(device: &str, err: &PollError) -> Self {
        Self::Unavailable {
            device: device.to_owned(),
            kind: err.kind,
            message: err.message.clone(),
        }
    }

    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::Unavailable { kind, .. } => match kind {
                ErrorKind::Connection => exit_code::CONNECTION,
                ErrorKind::Timeout => exit_code::TIMEOUT,
                ErrorKind::Authentication => exit_code::AUTH,
                ErrorKind::Protocol => exit_code::GENERAL,
            },
            Self::DeviceNotFound { .. } => exit_code::NOT_FOUND,
            Self::Conflict { .. } => exit_code::CONFLICT,
            Self::Validation { .. }
            | Self::InvalidInput(_)
            | Self::AmbiguousDevice { .. }
            | Self::MissingInput { .. }
            | Self::NonInteractiveRequiresYes { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

fn join_or_none(names: &[String]) -> String {
    if names.is_empty() {
        "(none)".into()
    } else {
        names.join(", ")
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { .. } | CoreError::ConnectionLost { .. } => {
                Self::ConnectionFailed {
                    reason: err.to_string(),
                }
            }
            CoreError::Timeout { timeout } => Self::Timeout {
                after: humantime::format_duration(timeout).to_string(),
            },
            CoreError::AuthenticationFailed { message } => Self::AuthFailed { message },
            CoreError::Protocol { message } => Self::Protocol { message },
            CoreError::Rejected { code, message } => Self::Rejected { code, message },
            CoreError::Validation(v) => Self::InvalidInput(v),
            CoreError::InvalidCommand { message } => Self::Validation {
                field: "command".into(),
                reason: message,
            },
            CoreError::AlreadyLoaded { device_id } => Self::Conflict {
                profile: device_id.clone(),
                device_id,
            },
            CoreError::DeviceNotFound { device_id } => Self::DeviceNotFound {
                name: device_id,
                available: String::new(),
            },
            CoreError::PollerStopped { .. } => Self::ConnectionFailed {
                reason: err.to_string(),
            },
        }
    }
}

impl From<SetupError> for CliError {
    fn from(err: SetupError) -> Self {
        match err {
            SetupError::Invalid(v) => Self::InvalidInput(v),
            SetupError::CannotConnect(reason) => Self::ConnectionFailed { reason },
            SetupError::InvalidAuth(message) => Self::AuthFailed { message },
            SetupError::Protocol(message) => Self::Protocol { message },
            SetupError::Timeout(after) => Self::Timeout {
                after: humantime::format_duration(after).to_string(),
            },
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Invalid(v) => Self::InvalidInput(v),
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::NoCredentials { profile } => Self::NoCredentials { profile },
            ConfigError::UnknownDevice { name, available } => Self::DeviceNotFound {
                name,
                available: join_or_none(&available),
            },
            ConfigError::NoDevices => Self::NoConfig {
                path: ventlink_config::config_path().display().to_string(),
            },
            ConfigError::Ambiguous { available } => Self::AmbiguousDevice {
                available: join_or_none(&available),
            },
            ConfigError::AlreadyConfigured { device_id, profile } => {
                Self::Conflict { device_id, profile }
            }
            ConfigError::Io(e) => Self::Io(e),
            other @ (ConfigError::Keyring(_)
            | ConfigError::Serialization(_)
            | ConfigError::Figment(_)) => Self::Config {
                message: other.to_string(),
            },
        }
    }
}
