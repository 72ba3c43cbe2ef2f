// ── Per-device entity cache ──
//
// Wait-free reads via `ArcSwap`, push-based change notification via a
// `watch` channel. The poller is the only writer; `publish` is crate-private.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;

use crate::model::{DeviceClass, ReadingValue, SensorKey, Snapshot, Unit};
use crate::status::{DeviceStatus, PollerState};
use crate::stream::StatusStream;

/// Projection of one entity for single-value consumers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityState {
    pub unique_id: String,
    pub key: SensorKey,
    pub name: &'static str,
    pub icon: Option<&'static str>,
    pub device_class: Option<DeviceClass>,
    pub unit: Option<Unit>,
    /// Last known value; `None` until the first successful poll.
    pub value: Option<ReadingValue>,
    pub acquired_at: Option<DateTime<Utc>>,
    pub available: bool,
    /// The value is older than the cache's `stale_after`.
    pub stale: bool,
}

/// Read-only view of one device's status, cheap to clone.
#[derive(Clone)]
pub struct EntityCache {
    inner: Arc<CacheInner>,
}

struct CacheInner {
    device_id: String,
    stale_after: Duration,
    current: ArcSwap<DeviceStatus>,
    notify: watch::Sender<Arc<DeviceStatus>>,
}

impl std::fmt::Debug for EntityCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityCache")
            .field("device_id", &self.inner.device_id)
            .field("stale_after", &self.inner.stale_after)
            .finish_non_exhaustive()
    }
}

impl EntityCache {
    pub(crate) fn new(device_id: impl Into<String>, stale_after: Duration) -> Self {
        let device_id = device_id.into();
        let initial = Arc::new(DeviceStatus::new(device_id.clone()));
        let (notify, _) = watch::channel(Arc::clone(&initial));

        Self {
            inner: Arc::new(CacheInner {
                device_id,
                stale_after,
                current: ArcSwap::new(initial),
                notify,
            }),
        }
    }

    // ── Writer side (poller only) ────────────────────────────────────

    /// Replace the status wholesale and notify subscribers once.
    pub(crate) fn publish(&self, status: DeviceStatus) {
        let status = Arc::new(status);
        self.inner.current.store(Arc::clone(&status));
        // `send_modify` updates unconditionally, even with zero receivers.
        self.inner.notify.send_modify(|slot| *slot = status);
    }

    /// Record a state transition without waking subscribers.
    pub(crate) fn set_state(&self, state: PollerState) {
        let mut next = DeviceStatus::clone(&self.status());
        next.state = state;
        let next = Arc::new(next);
        self.inner.current.store(Arc::clone(&next));
        self.inner.notify.send_if_modified(|slot| {
            *slot = next;
            false
        });
    }

    // ── Reader side ──────────────────────────────────────────────────

    pub fn device_id(&self) -> &str {
        &self.inner.device_id
    }

    pub fn stale_after(&self) -> Duration {
        self.inner.stale_after
    }

    /// Current status (cheap `Arc` clone, never half-updated).
    pub fn status(&self) -> Arc<DeviceStatus> {
        self.inner.current.load_full()
    }

    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.status().last_snapshot.clone()
    }

    pub fn is_available(&self) -> bool {
        self.status().available
    }

    /// Every entity of the fixed set, as of now.
    pub fn entities(&self) -> Vec<EntityState> {
        self.entities_at(Utc::now())
    }

    pub fn entities_at(&self, now: DateTime<Utc>) -> Vec<EntityState> {
        self.entities_of_at(&self.status(), now)
    }

    /// Every entity as seen in `status`, typically one yielded by a
    /// subscription, rather than whatever the cache holds by now.
    pub fn entities_of(&self, status: &DeviceStatus) -> Vec<EntityState> {
        self.entities_of_at(status, Utc::now())
    }

    pub fn entities_of_at(&self, status: &DeviceStatus, now: DateTime<Utc>) -> Vec<EntityState> {
        SensorKey::all()
            .map(|key| self.project(status, key, now))
            .collect()
    }

    /// One entity, as of now.
    pub fn entity(&self, key: SensorKey) -> EntityState {
        self.entity_at(key, Utc::now())
    }

    pub fn entity_at(&self, key: SensorKey, now: DateTime<Utc>) -> EntityState {
        self.project(&self.status(), key, now)
    }

    /// Subscribe to status changes: one notification per completed poll.
    pub fn subscribe(&self) -> StatusStream {
        StatusStream::new(self.inner.notify.subscribe())
    }

    fn project(&self, status: &DeviceStatus, key: SensorKey, now: DateTime<Utc>) -> EntityState {
        let desc = key.description();
        let reading = status.last_snapshot.as_deref().and_then(|s| s.get(key));
        let acquired_at = reading.map(|r| r.acquired_at);

        EntityState {
            unique_id: key.unique_id(&self.inner.device_id),
            key,
            name: desc.name,
            icon: desc.icon,
            device_class: desc.device_class,
            unit: desc.unit,
            value: reading.map(|r| r.value.clone()),
            acquired_at,
            available: status.available,
            stale: acquired_at.is_some_and(|at| is_stale(at, now, self.inner.stale_after)),
        }
    }
}

fn is_stale(acquired_at: DateTime<Utc>, now: DateTime<Utc>, stale_after: Duration) -> bool {
    // Durations beyond chrono's range are never exceeded.
    chrono::Duration::from_std(stale_after).is_ok_and(|limit| now - acquired_at > limit)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use ventlink_api::{AirflowMode, DeviceReport, SummerBypassMode};

    use super::*;

    fn snapshot(at: DateTime<Utc>) -> Arc<Snapshot> {
        let report = DeviceReport {
            name: None,
            supply_rpm: 900,
            exhaust_rpm: 880,
            power_w: 11,
            extract_temp_dc: 200,
            outdoor_temp_dc: 100,
            supply_airflow: 30,
            exhaust_airflow: 29,
            external_rh: 40,
            internal_rh: 45,
            airflow_mode: AirflowMode::Normal,
            airflow_duration_min: 0,
            airflow_remaining_secs: 0,
            filter_months_remaining: 12,
            service_months_remaining: 21,
            summer_bypass_mode: SummerBypassMode::EveningFresh,
            summer_bypass_airflow: AirflowMode::Boost,
            summer_bypass_indoor_dc: 240,
            summer_bypass_outdoor_dc: 140,
        };
        Arc::new(Snapshot::from_report(&report, at))
    }

    fn available_status(at: DateTime<Utc>) -> DeviceStatus {
        DeviceStatus {
            last_snapshot: Some(snapshot(at)),
            available: true,
            last_success: Some(at),
            polls: 1,
            ..DeviceStatus::new("VA-1")
        }
    }

    #[test]
    fn empty_cache_reports_unavailable_entities() {
        let cache = EntityCache::new("VA-1", Duration::from_secs(90));
        let power = cache.entity(SensorKey::Power);

        assert_eq!(power.unique_id, "VA-1_power");
        assert!(!power.available);
        assert!(power.value.is_none());
        assert!(!power.stale);
    }

    #[test]
    fn publish_replaces_status_wholesale() {
        let cache = EntityCache::new("VA-1", Duration::from_secs(90));
        let now = Utc::now();
        cache.publish(available_status(now));

        let entities = cache.entities_at(now);
        assert_eq!(entities.len(), crate::model::SENSOR_COUNT);
        assert!(entities.iter().all(|e| e.available && e.value.is_some()));
    }

    #[test]
    fn readings_older_than_stale_after_are_marked() {
        let cache = EntityCache::new("VA-1", Duration::from_secs(90));
        let acquired = Utc::now();
        cache.publish(available_status(acquired));

        let fresh =
            cache.entity_at(SensorKey::IndoorTemp, acquired + chrono::Duration::seconds(90));
        let old = cache.entity_at(SensorKey::IndoorTemp, acquired + chrono::Duration::seconds(91));

        assert!(!fresh.stale);
        assert!(old.stale);
        assert_eq!(old.value, Some(ReadingValue::Float(20.0)));
    }

    #[test]
    fn entity_serializes_with_snake_case_tags() {
        let cache = EntityCache::new("VA-1", Duration::from_secs(90));
        let now = Utc::now();
        cache.publish(available_status(now));

        let json = serde_json::to_value(cache.entity_at(SensorKey::IndoorTemp, now)).unwrap();

        assert_eq!(json["key"], "indoor_temp");
        assert_eq!(json["unit"], "celsius");
        assert_eq!(json["device_class"], "temperature");
        assert_eq!(json["value"], 20.0);
        assert_eq!(json["stale"], false);
    }

    #[test]
    fn entities_of_projects_the_given_status_not_the_latest() {
        let cache = EntityCache::new("VA-1", Duration::from_secs(90));
        let now = Utc::now();
        let earlier = available_status(now);
        cache.publish(DeviceStatus {
            available: false,
            consecutive_failures: 3,
            ..available_status(now)
        });

        let entities = cache.entities_of_at(&earlier, now);

        assert_eq!(entities.len(), crate::model::SENSOR_COUNT);
        assert!(entities.iter().all(|e| e.available));
        assert!(cache.entities_at(now).iter().all(|e| !e.available));
    }

    #[tokio::test]
    async fn publish_notifies_but_state_change_does_not() {
        let cache = EntityCache::new("VA-1", Duration::from_secs(90));
        let mut stream = cache.subscribe();

        cache.set_state(PollerState::Polling);
        assert!(!stream.has_changed());
        assert_eq!(cache.status().state, PollerState::Polling);

        cache.publish(available_status(Utc::now()));
        let status = stream.changed().await.unwrap();
        assert!(status.available);
    }
}
