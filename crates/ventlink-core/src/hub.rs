// ── Multi-device hub ──
//
// Registry of running pollers keyed by device id. Devices are independent:
// each has its own task, connection and cache, and nothing is shared
// between them.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::info;

use crate::config::{Credentials, PollerConfig};
use crate::error::CoreError;
use crate::poller::Poller;
use crate::source::{DeviceClient, DeviceSource};
use crate::store::EntityCache;

/// Load/unload lifecycle for any number of devices.
#[derive(Default)]
pub struct Hub {
    devices: DashMap<String, Poller>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start polling a device over the network.
    pub fn load(
        &self,
        credentials: &Credentials,
        config: PollerConfig,
    ) -> Result<EntityCache, CoreError> {
        let source = DeviceClient::new(credentials, config.timeout);
        self.load_source(credentials.device_id(), source, config)
    }

    /// Start polling an arbitrary source. Fails if `device_id` is already
    /// loaded.
    pub fn load_source<S: DeviceSource>(
        &self,
        device_id: &str,
        source: S,
        config: PollerConfig,
    ) -> Result<EntityCache, CoreError> {
        match self.devices.entry(device_id.to_owned()) {
            Entry::Occupied(_) => Err(CoreError::AlreadyLoaded {
                device_id: device_id.to_owned(),
            }),
            Entry::Vacant(slot) => {
                let poller = Poller::spawn(device_id, source, config)?;
                let cache = poller.cache().clone();
                slot.insert(poller);
                info!(device_id, "device loaded");
                Ok(cache)
            }
        }
    }

    /// Stop a device's poller and release its connection.
    pub async fn unload(&self, device_id: &str) -> Result<(), CoreError> {
        let (_, poller) = self
            .devices
            .remove(device_id)
            .ok_or_else(|| CoreError::DeviceNotFound {
                device_id: device_id.to_owned(),
            })?;
        poller.shutdown().await;
        info!(device_id, "device unloaded");
        Ok(())
    }

    /// Unload every device.
    pub async fn unload_all(&self) {
        for device_id in self.device_ids() {
            // Concurrent unloads may have removed it already.
            let _ = self.unload(&device_id).await;
        }
    }

    pub fn poller(&self, device_id: &str) -> Option<Poller> {
        self.devices.get(device_id).map(|p| p.value().clone())
    }

    pub fn cache(&self, device_id: &str) -> Option<EntityCache> {
        self.devices.get(device_id).map(|p| p.cache().clone())
    }

    /// Loaded device ids, sorted.
    pub fn device_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.devices.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
