// ── Setup ──
//
// One-shot check run before a device is stored: a single connection and
// read attempt, reported back, never retried.

use std::time::Duration;

use tracing::{debug, info};

use crate::config::Credentials;
use crate::error::SetupError;
use crate::model::Snapshot;
use crate::source::{DeviceClient, DeviceSource};

/// What a successful setup learned about the device.
#[derive(Debug, Clone)]
pub struct SetupReport {
    /// Human-readable entry title: the device's own name, or a name
    /// derived from its host.
    pub title: String,
    pub device_name: Option<String>,
    /// The readings taken during the check.
    pub snapshot: Snapshot,
}

/// Connect to the device described by `credentials` and read it once.
pub async fn test_connection(
    credentials: &Credentials,
    timeout: Duration,
) -> Result<SetupReport, SetupError> {
    let source = DeviceClient::new(credentials, timeout);
    let fallback = format!("Ventilation unit ({})", credentials.host());
    test_source(&source, timeout, fallback).await
}

/// [`test_connection`] against any source. The source is closed afterwards
/// whatever the outcome.
pub async fn test_source<S: DeviceSource>(
    source: &S,
    timeout: Duration,
    fallback_title: String,
) -> Result<SetupReport, SetupError> {
    let outcome = tokio::time::timeout(timeout, source.fetch_snapshot()).await;
    source.close().await;

    let snapshot = match outcome {
        Ok(result) => result?,
        Err(_) => return Err(SetupError::Timeout(timeout)),
    };

    let device_name = snapshot.device_name().map(str::to_owned);
    let title = device_name.clone().unwrap_or(fallback_title);
    info!(%title, "setup check succeeded");
    debug!(readings = snapshot.readings().len(), "setup snapshot");

    Ok(SetupReport {
        title,
        device_name,
        snapshot,
    })
}
