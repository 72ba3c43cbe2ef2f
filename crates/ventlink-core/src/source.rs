// ── Device source seam ──
//
// The poller talks to a device only through `DeviceSource`. Production uses
// `DeviceClient` (wrapping `ventlink_api::VentClient`); tests substitute
// scripted sources.

use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use tracing::debug;
use ventlink_api::{AirflowMode, Endpoint, PskSigner, TransportConfig, VentClient};

use crate::config::Credentials;
use crate::error::CoreError;
use crate::model::Snapshot;

/// Anything that can produce snapshots and accept commands for one device.
pub trait DeviceSource: Send + Sync + 'static {
    /// One authenticated read of the full reading set. No retries.
    fn fetch_snapshot(&self) -> impl Future<Output = Result<Snapshot, CoreError>> + Send;

    /// Switch the airflow mode for `duration_min` minutes.
    fn send_airflow_mode(
        &self,
        mode: AirflowMode,
        duration_min: u16,
    ) -> impl Future<Output = Result<(), CoreError>> + Send;

    /// Release the underlying connection.
    fn close(&self) -> impl Future<Output = ()> + Send;
}

/// Network-backed [`DeviceSource`].
#[derive(Debug)]
pub struct DeviceClient {
    client: VentClient,
}

impl DeviceClient {
    pub fn new(credentials: &Credentials, timeout: Duration) -> Self {
        let endpoint = Endpoint::new(credentials.host(), credentials.port());
        let signer = PskSigner::new(credentials.identity(), credentials.key().clone());
        let transport = TransportConfig::default().with_timeout(timeout);

        Self {
            client: VentClient::new(endpoint, credentials.device_id(), signer, transport),
        }
    }

    pub fn client(&self) -> &VentClient {
        &self.client
    }
}

impl DeviceSource for DeviceClient {
    async fn fetch_snapshot(&self) -> Result<Snapshot, CoreError> {
        let report = self.client.read_status().await?;
        debug!(
            device_id = self.client.device_id(),
            mode = %report.airflow_mode,
            "status report accepted"
        );
        Ok(Snapshot::from_report(&report, Utc::now()))
    }

    async fn send_airflow_mode(
        &self,
        mode: AirflowMode,
        duration_min: u16,
    ) -> Result<(), CoreError> {
        self.client.set_airflow_mode(mode, duration_min).await?;
        Ok(())
    }

    async fn close(&self) {
        self.client.close().await;
    }
}
