//! Async client for the local network protocol spoken by Wi-Fi ventilation units.
//!
//! The device listens on a TCP port (47819 by default) and exchanges
//! newline-delimited JSON frames. Every request carries the device id, the
//! PSK identity, a timestamp and an HMAC-SHA256 signature keyed by the
//! pre-shared key. See [`frame`] for the exact layout.
//!
//! - **[`VentClient`]**: one connection per device, kept alive between calls
//!   and dropped after any failure. Never retries; retry policy belongs to
//!   the caller.
//! - **[`DeviceReport`]**: the fixed, range-checked reading set parsed from
//!   a status response. A report is either complete or rejected.
//! - **[`Error`]**: closed set of failure kinds, with classifiers for the
//!   caller's retry policy.

pub mod auth;
pub mod client;
pub mod error;
pub mod frame;
pub mod report;
pub mod transport;

pub use auth::PskSigner;
pub use client::{Endpoint, VentClient};
pub use error::Error;
pub use report::{AirflowMode, DeviceReport, SummerBypassMode, VALID_DURATIONS};
pub use transport::TransportConfig;

/// Default TCP port of the device's local endpoint.
pub const DEFAULT_PORT: u16 = 47819;
