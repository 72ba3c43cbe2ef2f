// ── Sensor catalogue ──
//
// The fixed set of entities every device exposes, with display metadata.

use std::fmt;

use serde::Serialize;
use strum::{EnumCount, EnumIter, IntoEnumIterator};

/// Identifies one entity of the fixed reading set.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
    EnumIter,
    EnumCount,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SensorKey {
    SupplyRpm,
    ExhaustRpm,
    Power,
    IndoorTemp,
    OutdoorTemp,
    SupplyTemp,
    SupplyAirflow,
    ExhaustAirflow,
    ExternalHumidity,
    InternalHumidity,
    AirflowMode,
    AirflowDuration,
    AirflowRemaining,
    ManualAirflowActive,
    FilterMonthsRemaining,
    ServiceInfo,
    SummerBypassMode,
    SummerBypassAfMode,
    SummerBypassIndoorTemp,
    SummerBypassOutdoorTemp,
}

impl SensorKey {
    /// All keys in display order.
    pub fn all() -> impl Iterator<Item = Self> {
        Self::iter()
    }

    /// Stable id for this entity on a given device.
    pub fn unique_id(self, device_id: &str) -> String {
        format!("{device_id}_{self}")
    }

    pub fn description(self) -> SensorDescription {
        use DeviceClass::{Humidity, Power, Temperature};

        let (name, icon, unit, device_class) = match self {
            Self::SupplyRpm => ("Supply RPM", Some("mdi:fan"), Some(Unit::Rpm), None),
            Self::ExhaustRpm => ("Exhaust RPM", Some("mdi:fan"), Some(Unit::Rpm), None),
            Self::Power => ("Power", Some("mdi:power"), Some(Unit::Watt), Some(Power)),
            Self::IndoorTemp => (
                "Indoor Temperature",
                None,
                Some(Unit::Celsius),
                Some(Temperature),
            ),
            Self::OutdoorTemp => (
                "Outdoor Temperature",
                None,
                Some(Unit::Celsius),
                Some(Temperature),
            ),
            Self::SupplyTemp => (
                "Supply Air Temperature",
                None,
                Some(Unit::Celsius),
                Some(Temperature),
            ),
            Self::SupplyAirflow => (
                "Supply Airflow",
                Some("mdi:weather-windy"),
                Some(Unit::LitresPerSecond),
                None,
            ),
            Self::ExhaustAirflow => (
                "Exhaust Airflow",
                Some("mdi:weather-windy"),
                Some(Unit::LitresPerSecond),
                None,
            ),
            Self::ExternalHumidity => (
                "External Humidity",
                Some("mdi:cloud-percent"),
                Some(Unit::Percent),
                Some(Humidity),
            ),
            Self::InternalHumidity => (
                "Internal Humidity",
                Some("mdi:cloud-percent"),
                Some(Unit::Percent),
                Some(Humidity),
            ),
            Self::AirflowMode => ("Airflow Mode", Some("mdi:air-filter"), None, None),
            Self::AirflowDuration => (
                "Airflow Duration",
                Some("mdi:fan-clock"),
                Some(Unit::Minutes),
                None,
            ),
            Self::AirflowRemaining => (
                "Airflow Remaining",
                Some("mdi:timer"),
                Some(Unit::Seconds),
                None,
            ),
            Self::ManualAirflowActive => ("Airflow Active", Some("mdi:fan-clock"), None, None),
            Self::FilterMonthsRemaining => (
                "Filter Months Remaining",
                Some("mdi:tools"),
                Some(Unit::Months),
                None,
            ),
            Self::ServiceInfo => ("Service Info", Some("mdi:tools"), Some(Unit::Months), None),
            Self::SummerBypassMode => ("Summer Bypass Mode", Some("mdi:weather-sunny"), None, None),
            Self::SummerBypassAfMode => ("Summer Bypass Airflow Mode", Some("mdi:fan"), None, None),
            Self::SummerBypassIndoorTemp => (
                "Summer Bypass Indoor Temp",
                Some("mdi:thermometer"),
                Some(Unit::Celsius),
                None,
            ),
            Self::SummerBypassOutdoorTemp => (
                "Summer Bypass Outdoor Temp",
                Some("mdi:thermometer"),
                Some(Unit::Celsius),
                None,
            ),
        };

        SensorDescription {
            key: self,
            name,
            icon,
            unit,
            device_class,
        }
    }
}

/// Number of entities per device.
pub const SENSOR_COUNT: usize = SensorKey::COUNT;

/// Display metadata for one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SensorDescription {
    pub key: SensorKey,
    pub name: &'static str,
    pub icon: Option<&'static str>,
    pub unit: Option<Unit>,
    pub device_class: Option<DeviceClass>,
}

/// Unit of measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    Rpm,
    Watt,
    Celsius,
    LitresPerSecond,
    Percent,
    Minutes,
    Seconds,
    Months,
}

impl Unit {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Rpm => "rpm",
            Self::Watt => "W",
            Self::Celsius => "°C",
            Self::LitresPerSecond => "L/s",
            Self::Percent => "%",
            Self::Minutes => "min",
            Self::Seconds => "s",
            Self::Months => "months",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Physical quantity, for hosts that group entities by kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DeviceClass {
    Temperature,
    Humidity,
    Power,
}
