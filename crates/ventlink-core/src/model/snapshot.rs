// ── Readings and snapshots ──

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::sensor::{SensorKey, Unit};

/// Value of a single reading.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ReadingValue {
    Integer(i64),
    Float(f64),
    Enumerated(&'static str),
}

impl ReadingValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
            Self::Integer(n) => Some(*n as f64),
            Self::Float(x) => Some(*x),
            Self::Enumerated(_) => None,
        }
    }
}

impl fmt::Display for ReadingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(n) => write!(f, "{n}"),
            Self::Float(x) => write!(f, "{x:.1}"),
            Self::Enumerated(s) => f.write_str(s),
        }
    }
}

/// One typed reading taken from a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    pub key: SensorKey,
    pub value: ReadingValue,
    pub unit: Option<Unit>,
    pub acquired_at: DateTime<Utc>,
}

/// The complete reading set from one successful poll.
///
/// Holds exactly one [`Reading`] per [`SensorKey`], in key order. Built only
/// from a validated device report, so a `Snapshot` is never partial.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub(crate) device_name: Option<String>,
    pub(crate) acquired_at: DateTime<Utc>,
    pub(crate) readings: Vec<Reading>,
}

impl Snapshot {
    /// Name the user gave the unit, if it reported one.
    pub fn device_name(&self) -> Option<&str> {
        self.device_name.as_deref()
    }

    pub fn acquired_at(&self) -> DateTime<Utc> {
        self.acquired_at
    }

    pub fn readings(&self) -> &[Reading] {
        &self.readings
    }

    pub fn get(&self, key: SensorKey) -> Option<&Reading> {
        self.readings.iter().find(|r| r.key == key)
    }

    pub fn value(&self, key: SensorKey) -> Option<&ReadingValue> {
        self.get(key).map(|r| &r.value)
    }
}
