// ── Device status ──
//
// What the poller publishes after every poll. Consumers only ever hold
// `Arc<DeviceStatus>` and never mutate it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{CoreError, ErrorKind};
use crate::model::Snapshot;

/// Where the poller is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum PollerState {
    /// Waiting for the next scheduled poll.
    Idle,
    /// A fetch is in flight.
    Polling,
    /// Waiting out the delay after the `attempt`-th consecutive failure.
    BackingOff { attempt: u32 },
    /// Shut down. Terminal.
    Stopped,
}

/// The most recent failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PollError {
    pub kind: ErrorKind,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl PollError {
    pub(crate) fn from_error(err: &CoreError, at: DateTime<Utc>) -> Self {
        Self {
            kind: err.kind().unwrap_or(ErrorKind::Protocol),
            message: err.to_string(),
            at,
        }
    }
}

/// Everything known about one device after the latest poll.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceStatus {
    pub device_id: String,
    pub last_snapshot: Option<Arc<Snapshot>>,
    /// True iff a snapshot exists and fewer than `failure_threshold`
    /// consecutive polls have failed since.
    pub available: bool,
    pub last_error: Option<PollError>,
    pub last_success: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    /// Polls completed, successful or not.
    pub polls: u64,
    pub state: PollerState,
}

impl DeviceStatus {
    pub(crate) fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            last_snapshot: None,
            available: false,
            last_error: None,
            last_success: None,
            consecutive_failures: 0,
            polls: 0,
            state: PollerState::Idle,
        }
    }

    /// Name reported by the device in the last snapshot.
    pub fn device_name(&self) -> Option<&str> {
        self.last_snapshot.as_deref().and_then(Snapshot::device_name)
    }
}
