// ── API-to-domain type conversions ──
//
// Bridges the validated `ventlink_api::DeviceReport` into the canonical
// `Snapshot`. The match in `reading_value` is exhaustive over `SensorKey`,
// so adding a key without a source field fails to compile.

use chrono::{DateTime, Utc};
use ventlink_api::DeviceReport;

use crate::model::{Reading, ReadingValue, SensorKey, Snapshot};

/// Weight of the extract temperature in the derived supply temperature.
const EXTRACT_WEIGHT: f64 = 0.9;

impl Snapshot {
    /// Build the full reading set from one device report.
    pub fn from_report(report: &DeviceReport, acquired_at: DateTime<Utc>) -> Self {
        let readings = SensorKey::all()
            .map(|key| Reading {
                key,
                value: reading_value(key, report),
                unit: key.description().unit,
                acquired_at,
            })
            .collect();

        Self {
            device_name: report.name.clone(),
            acquired_at,
            readings,
        }
    }
}

fn reading_value(key: SensorKey, r: &DeviceReport) -> ReadingValue {
    match key {
        SensorKey::SupplyRpm => ReadingValue::Integer(r.supply_rpm.into()),
        SensorKey::ExhaustRpm => ReadingValue::Integer(r.exhaust_rpm.into()),
        SensorKey::Power => ReadingValue::Integer(r.power_w.into()),
        SensorKey::IndoorTemp => ReadingValue::Float(r.extract_temp_c()),
        SensorKey::OutdoorTemp => ReadingValue::Float(r.outdoor_temp_c()),
        SensorKey::SupplyTemp => {
            ReadingValue::Float(supply_temp(r.extract_temp_c(), r.outdoor_temp_c()))
        }
        SensorKey::SupplyAirflow => ReadingValue::Integer(r.supply_airflow.into()),
        SensorKey::ExhaustAirflow => ReadingValue::Integer(r.exhaust_airflow.into()),
        SensorKey::ExternalHumidity => ReadingValue::Integer(r.external_rh.into()),
        SensorKey::InternalHumidity => ReadingValue::Integer(r.internal_rh.into()),
        SensorKey::AirflowMode => ReadingValue::Enumerated(r.airflow_mode.as_str()),
        SensorKey::AirflowDuration => ReadingValue::Integer(r.airflow_duration_min.into()),
        SensorKey::AirflowRemaining => ReadingValue::Integer(r.airflow_remaining_secs.into()),
        SensorKey::ManualAirflowActive => {
            ReadingValue::Enumerated(if r.manual_airflow_active() { "active" } else { "idle" })
        }
        SensorKey::FilterMonthsRemaining => {
            ReadingValue::Integer(r.filter_months_remaining.into())
        }
        SensorKey::ServiceInfo => ReadingValue::Integer(r.service_months_remaining.into()),
        SensorKey::SummerBypassMode => ReadingValue::Enumerated(r.summer_bypass_mode.as_str()),
        SensorKey::SummerBypassAfMode => {
            ReadingValue::Enumerated(r.summer_bypass_airflow.as_str())
        }
        SensorKey::SummerBypassIndoorTemp => ReadingValue::Float(r.summer_bypass_indoor_c()),
        SensorKey::SummerBypassOutdoorTemp => ReadingValue::Float(r.summer_bypass_outdoor_c()),
    }
}

/// Estimated supply air temperature after heat recovery, in °C, rounded to
/// two decimals.
pub fn supply_temp(indoor_c: f64, outdoor_c: f64) -> f64 {
    let blended = EXTRACT_WEIGHT * indoor_c + (1.0 - EXTRACT_WEIGHT) * outdoor_c;
    (blended * 100.0).round() / 100.0
}
