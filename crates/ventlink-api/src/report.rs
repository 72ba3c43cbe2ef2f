//! The fixed status report and its validation.
//!
//! A status response is accepted only if every field below is present,
//! integral and inside its range. One bad field rejects the whole report.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Error;

/// Durations (minutes) the device accepts for a manual airflow mode.
pub const VALID_DURATIONS: [u16; 5] = [0, 15, 30, 45, 60];

// ── Airflow mode ─────────────────────────────────────────────────────

/// Ventilation mode as reported in `as_af` and written via `ar_af`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AirflowMode {
    Reset,
    Normal,
    Boost,
    Purge,
}

impl AirflowMode {
    pub const ALL: [Self; 4] = [Self::Reset, Self::Normal, Self::Boost, Self::Purge];

    pub fn code(self) -> u8 {
        match self {
            Self::Reset => 0,
            Self::Normal => 2,
            Self::Boost => 3,
            Self::Purge => 4,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Reset),
            2 => Some(Self::Normal),
            3 => Some(Self::Boost),
            4 => Some(Self::Purge),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Reset => "reset",
            Self::Normal => "normal",
            Self::Boost => "boost",
            Self::Purge => "purge",
        }
    }
}

impl fmt::Display for AirflowMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AirflowMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "unknown airflow mode '{s}' (expected reset, normal, boost or purge)"
                ))
            })
    }
}

// ── Summer bypass ────────────────────────────────────────────────────

/// Summer bypass strategy as reported in `sb_m`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummerBypassMode {
    Off,
    EveningFresh,
    NightFresh,
}

impl SummerBypassMode {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Off),
            1 => Some(Self::EveningFresh),
            2 => Some(Self::NightFresh),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::EveningFresh => "evening_fresh",
            Self::NightFresh => "night_fresh",
        }
    }
}

impl fmt::Display for SummerBypassMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Report ───────────────────────────────────────────────────────────

/// One complete status report, in device units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceReport {
    /// Name the user gave the unit, if any.
    pub name: Option<String>,
    pub supply_rpm: u16,
    pub exhaust_rpm: u16,
    /// Electrical power draw in watts.
    pub power_w: u16,
    /// Extract (indoor) air temperature in tenths of °C.
    pub extract_temp_dc: i16,
    /// Outdoor air temperature in tenths of °C.
    pub outdoor_temp_dc: i16,
    /// Supply airflow in L/s.
    pub supply_airflow: u16,
    /// Exhaust airflow in L/s.
    pub exhaust_airflow: u16,
    /// Relative humidity at the extract sensor, percent.
    pub external_rh: u8,
    /// Relative humidity at the intake sensor, percent.
    pub internal_rh: u8,
    pub airflow_mode: AirflowMode,
    /// Minutes the current manual mode was requested for.
    pub airflow_duration_min: u16,
    /// Seconds left on the current manual mode.
    pub airflow_remaining_secs: u32,
    pub filter_months_remaining: u8,
    /// Months until the next service is due.
    pub service_months_remaining: u8,
    pub summer_bypass_mode: SummerBypassMode,
    /// Airflow mode the unit switches to while bypassing.
    pub summer_bypass_airflow: AirflowMode,
    /// Indoor temperature above which bypass may open, tenths of °C.
    pub summer_bypass_indoor_dc: i16,
    /// Outdoor temperature above which bypass stays shut, tenths of °C.
    pub summer_bypass_outdoor_dc: i16,
}

impl DeviceReport {
    /// Validate a raw `rsp` payload into a report.
    pub fn from_payload(p: &Map<String, Value>) -> Result<Self, Error> {
        let name = match p.get("dname") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()).filter(|s| !s.is_empty()),
            Some(_) => {
                return Err(Error::InvalidType {
                    field: "dname",
                    expected: "string",
                });
            }
        };

        let airflow_mode = airflow(p, "as_af")?;
        let bypass_code = int(p, "sb_m", 0, 2)?;
        let summer_bypass_mode =
            SummerBypassMode::from_code(bypass_code).ok_or(Error::OutOfRange {
                field: "sb_m",
                value: bypass_code,
            })?;

        Ok(Self {
            name,
            supply_rpm: narrow(int(p, "sup_rpm", 0, 10_000)?, "sup_rpm")?,
            exhaust_rpm: narrow(int(p, "exh_rpm", 0, 10_000)?, "exh_rpm")?,
            power_w: narrow(int(p, "pwr", 0, 2_000)?, "pwr")?,
            extract_temp_dc: narrow(int(p, "exr_t", -400, 800)?, "exr_t")?,
            outdoor_temp_dc: narrow(int(p, "oda_t", -500, 800)?, "oda_t")?,
            supply_airflow: narrow(int(p, "cm_af_sup", 0, 1_000)?, "cm_af_sup")?,
            exhaust_airflow: narrow(int(p, "cm_af_exh", 0, 1_000)?, "cm_af_exh")?,
            external_rh: narrow(int(p, "exr_rh", 0, 100)?, "exr_rh")?,
            internal_rh: narrow(int(p, "itk_rh", 0, 100)?, "itk_rh")?,
            airflow_mode,
            airflow_duration_min: narrow(int(p, "ar_min", 0, 1_440)?, "ar_min")?,
            airflow_remaining_secs: narrow(int(p, "as_rsec", 0, 86_400)?, "as_rsec")?,
            filter_months_remaining: narrow(int(p, "flt_mo", 0, 120)?, "flt_mo")?,
            service_months_remaining: narrow(int(p, "svc_mo", 0, 120)?, "svc_mo")?,
            summer_bypass_mode,
            summer_bypass_airflow: airflow(p, "sb_af")?,
            summer_bypass_indoor_dc: narrow(int(p, "sb_it", -400, 800)?, "sb_it")?,
            summer_bypass_outdoor_dc: narrow(int(p, "sb_ot", -500, 800)?, "sb_ot")?,
        })
    }

    /// Whether a timed manual airflow mode is currently running.
    pub fn manual_airflow_active(&self) -> bool {
        self.airflow_mode != AirflowMode::Reset && self.airflow_remaining_secs > 0
    }

    /// Extract (indoor) temperature in °C.
    pub fn extract_temp_c(&self) -> f64 {
        f64::from(self.extract_temp_dc) / 10.0
    }

    /// Outdoor temperature in °C.
    pub fn outdoor_temp_c(&self) -> f64 {
        f64::from(self.outdoor_temp_dc) / 10.0
    }

    pub fn summer_bypass_indoor_c(&self) -> f64 {
        f64::from(self.summer_bypass_indoor_dc) / 10.0
    }

    pub fn summer_bypass_outdoor_c(&self) -> f64 {
        f64::from(self.summer_bypass_outdoor_dc) / 10.0
    }
}

fn airflow(p: &Map<String, Value>, field: &'static str) -> Result<AirflowMode, Error> {
    let code = int(p, field, 0, 4)?;
    AirflowMode::from_code(code).ok_or(Error::OutOfRange { field, value: code })
}

/// Fetch a required integer field and check `min..=max`.
fn int(p: &Map<String, Value>, field: &'static str, min: i64, max: i64) -> Result<i64, Error> {
    let value = p.get(field).ok_or(Error::MissingField { field })?;
    let n = value.as_i64().ok_or(Error::InvalidType {
        field,
        expected: "integer",
    })?;
    if (min..=max).contains(&n) {
        Ok(n)
    } else {
        Err(Error::OutOfRange { field, value: n })
    }
}

fn narrow<T: TryFrom<i64>>(n: i64, field: &'static str) -> Result<T, Error> {
    T::try_from(n).map_err(|_| Error::OutOfRange { field, value: n })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn payload() -> Map<String, Value> {
        let Value::Object(map) = json!({
            "dname": "Loft MVHR",
            "sup_rpm": 1450,
            "exh_rpm": 1380,
            "pwr": 18,
            "exr_t": 214,
            "oda_t": -25,
            "cm_af_sup": 42,
            "cm_af_exh": 40,
            "exr_rh": 55,
            "itk_rh": 61,
            "as_af": 2,
            "ar_min": 0,
            "as_rsec": 0,
            "flt_mo": 9,
            "svc_mo": 21,
            "sb_m": 1,
            "sb_af": 3,
            "sb_it": 240,
            "sb_ot": 140
        }) else {
            unreachable!()
        };
        map
    }

    #[test]
    fn parses_complete_payload() {
        let report = DeviceReport::from_payload(&payload()).unwrap();
        assert_eq!(report.name.as_deref(), Some("Loft MVHR"));
        assert_eq!(report.supply_rpm, 1450);
        assert_eq!(report.outdoor_temp_dc, -25);
        assert_eq!(report.airflow_mode, AirflowMode::Normal);
        assert_eq!(report.filter_months_remaining, 9);
    }

    #[test]
    fn temperatures_scale_from_tenths() {
        let report = DeviceReport::from_payload(&payload()).unwrap();
        assert!((report.extract_temp_c() - 21.4).abs() < 1e-9);
        assert!((report.outdoor_temp_c() + 2.5).abs() < 1e-9);
    }

    #[test]
    fn missing_field_rejects_report() {
        let mut p = payload();
        p.remove("itk_rh");
        assert!(matches!(
            DeviceReport::from_payload(&p),
            Err(Error::MissingField { field: "itk_rh" })
        ));
    }

    #[test]
    fn out_of_range_rejects_report() {
        let mut p = payload();
        p.insert("exr_rh".into(), json!(140));
        assert!(matches!(
            DeviceReport::from_payload(&p),
            Err(Error::OutOfRange { field: "exr_rh", value: 140 })
        ));
    }

    #[test]
    fn unknown_airflow_code_rejects_report() {
        let mut p = payload();
        p.insert("as_af".into(), json!(1));
        assert!(matches!(
            DeviceReport::from_payload(&p),
            Err(Error::OutOfRange { field: "as_af", value: 1 })
        ));
    }

    #[test]
    fn fractional_value_is_invalid_type() {
        let mut p = payload();
        p.insert("pwr".into(), json!(18.5));
        assert!(matches!(
            DeviceReport::from_payload(&p),
            Err(Error::InvalidType { field: "pwr", .. })
        ));
    }

    #[test]
    fn summer_bypass_fields_parse() {
        let report = DeviceReport::from_payload(&payload()).unwrap();
        assert_eq!(report.service_months_remaining, 21);
        assert_eq!(report.summer_bypass_mode, SummerBypassMode::EveningFresh);
        assert_eq!(report.summer_bypass_airflow, AirflowMode::Boost);
        assert!((report.summer_bypass_indoor_c() - 24.0).abs() < 1e-9);
        assert!((report.summer_bypass_outdoor_c() - 14.0).abs() < 1e-9);
    }

    #[test]
    fn unknown_bypass_code_rejects_report() {
        let mut p = payload();
        p.insert("sb_af".into(), json!(1));
        assert!(matches!(
            DeviceReport::from_payload(&p),
            Err(Error::OutOfRange { field: "sb_af", value: 1 })
        ));
        let mut p = payload();
        p.insert("sb_m".into(), json!(3));
        assert!(matches!(
            DeviceReport::from_payload(&p),
            Err(Error::OutOfRange { field: "sb_m", value: 3 })
        ));
    }

    #[test]
    fn manual_airflow_is_active_only_while_counting_down() {
        let mut p = payload();
        assert!(!DeviceReport::from_payload(&p).unwrap().manual_airflow_active());
        p.insert("as_af".into(), json!(3));
        p.insert("as_rsec".into(), json!(600));
        assert!(DeviceReport::from_payload(&p).unwrap().manual_airflow_active());
        p.insert("as_af".into(), json!(0));
        assert!(!DeviceReport::from_payload(&p).unwrap().manual_airflow_active());
    }

    #[test]
    fn empty_name_is_absent() {
        let mut p = payload();
        p.insert("dname".into(), json!(""));
        assert!(DeviceReport::from_payload(&p).unwrap().name.is_none());
    }

    #[test]
    fn airflow_mode_parses_case_insensitively() {
        assert_eq!("Boost".parse::<AirflowMode>().unwrap(), AirflowMode::Boost);
        assert!("turbo".parse::<AirflowMode>().is_err());
    }
}
