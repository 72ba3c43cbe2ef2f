// ── Command API ──
//
// All writes flow through `Command`. The poller executes each one on its
// own task, between polls, so commands never share the connection with an
// in-flight fetch.

use ventlink_api::{AirflowMode, VALID_DURATIONS};

use crate::error::CoreError;

/// A command envelope sent through the command channel.
/// Contains the command and a oneshot response channel.
pub(crate) struct CommandEnvelope {
    pub command: Command,
    pub response_tx: tokio::sync::oneshot::Sender<Result<(), CoreError>>,
}

/// Every operation that can be sent to a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Switch airflow mode for a number of minutes (0 = until changed).
    SetAirflowMode { mode: AirflowMode, duration_min: u16 },
    /// Poll now instead of waiting for the next tick.
    Refresh,
}

impl Command {
    /// Reject arguments the device would refuse, before queueing.
    pub fn validate(&self) -> Result<(), CoreError> {
        match self {
            Self::SetAirflowMode { duration_min, .. }
                if !VALID_DURATIONS.contains(duration_min) =>
            {
                Err(CoreError::InvalidCommand {
                    message: format!(
                        "duration must be one of {VALID_DURATIONS:?} minutes, got {duration_min}"
                    ),
                })
            }
            _ => Ok(()),
        }
    }
}
