//! Polling and availability layer between `ventlink-api` and consumers.
//!
//! - **[`Poller`]**: one background task per device. Polls on an interval,
//!   backs off exponentially after failures, flips availability after
//!   `failure_threshold` consecutive failures, and runs commands between
//!   polls so the device never sees two requests at once.
//!
//! - **[`EntityCache`]**: read-only, wait-free view of a device's latest
//!   [`DeviceStatus`], with per-entity projection, staleness marking and a
//!   [`StatusStream`] that fires once per completed poll. Only the poller
//!   writes to it.
//!
//! - **[`Hub`]**: load/unload lifecycle for many independent devices.
//!
//! - **[`setup`]**: validate credentials and test a connection once before
//!   anything is stored.
//!
//! - **[`DeviceSource`]**: the seam between the poller and the wire. The
//!   network implementation is [`DeviceClient`].

pub mod command;
pub mod config;
pub mod convert;
pub mod error;
pub mod hub;
pub mod model;
pub mod poller;
pub mod setup;
pub mod source;
pub mod status;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use command::Command;
pub use config::{Credentials, PollerConfig};
pub use error::{CoreError, ErrorKind, SetupError, ValidationError};
pub use hub::Hub;
pub use poller::Poller;
pub use setup::{SetupReport, test_connection};
pub use source::{DeviceClient, DeviceSource};
pub use status::{DeviceStatus, PollError, PollerState};
pub use store::{EntityCache, EntityState};
pub use stream::StatusStream;

pub use model::{
    DeviceClass, Reading, ReadingValue, SENSOR_COUNT, SensorDescription, SensorKey, Snapshot, Unit,
};

// Wire-level types consumers need for commands.
pub use ventlink_api::{AirflowMode, DEFAULT_PORT, VALID_DURATIONS};
