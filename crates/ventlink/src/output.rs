//! Output formatting: table, JSON, plain.
//!
//! Renders data in the format selected by `--output`. Table uses `tabled`,
//! structured formats use serde, plain emits one line per item.

use std::io::{self, IsTerminal, Write};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use owo_colors::OwoColorize;
use serde::Serialize;
use tabled::{Table, Tabled, settings::Style};

use ventlink_core::{DeviceStatus, EntityState, PollError, PollerState, SensorKey};

use crate::cli::{ColorMode, OutputFormat};
use crate::error::CliError;

// ── Color helpers ────────────────────────────────────────────────────

/// Determine whether color output should be enabled.
pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

fn paint(text: &str, color: bool, style: fn(&str) -> String) -> String {
    if color { style(text) } else { text.to_owned() }
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render a list of serde-serializable + tabled items in the chosen format.
pub fn render_list<T, R>(
    format: OutputFormat,
    data: &[T],
    to_row: impl Fn(&T) -> R,
    line_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: serde::Serialize,
    R: Tabled,
{
    Ok(match format {
        OutputFormat::Table => {
            let rows: Vec<R> = data.iter().map(to_row).collect();
            render_table(&rows)
        }
        OutputFormat::Json => serde_json::to_string_pretty(data)?,
        OutputFormat::JsonCompact => serde_json::to_string(data)?,
        OutputFormat::Plain => data.iter().map(&line_fn).collect::<Vec<_>>().join("\n"),
    })
}

/// Render a single serde-serializable item in the chosen format.
pub fn render_single<T>(
    format: OutputFormat,
    data: &T,
    detail_fn: impl Fn(&T) -> String,
    line_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: serde::Serialize,
{
    Ok(match format {
        OutputFormat::Table => detail_fn(data),
        OutputFormat::Json => serde_json::to_string_pretty(data)?,
        OutputFormat::JsonCompact => serde_json::to_string(data)?,
        OutputFormat::Plain => line_fn(data),
    })
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

// ── Device status ────────────────────────────────────────────────────

#[derive(Tabled)]
pub struct EntityRow {
    #[tabled(rename = "Sensor")]
    pub name: &'static str,
    #[tabled(rename = "Value")]
    pub value: String,
    #[tabled(rename = "Unit")]
    pub unit: String,
    #[tabled(rename = "State")]
    pub state: String,
}

impl EntityRow {
    pub fn new(entity: &EntityState, color: bool) -> Self {
        let state = if !entity.available {
            paint("unavailable", color, |s| s.red().to_string())
        } else if entity.stale {
            paint("stale", color, |s| s.yellow().to_string())
        } else {
            paint("ok", color, |s| s.green().to_string())
        };
        Self {
            name: entity.name,
            value: entity
                .value
                .as_ref()
                .map_or_else(|| "-".into(), ToString::to_string),
            unit: entity.unit.map(|u| u.symbol().to_owned()).unwrap_or_default(),
            state,
        }
    }
}

/// One `key=value` line per entity.
pub fn entity_line(entity: &EntityState) -> String {
    let value = entity
        .value
        .as_ref()
        .map_or_else(|| "unknown".into(), ToString::to_string);
    format!("{}={value}", entity.key)
}

/// Header lines shown above the sensor table.
pub fn status_header(name: &str, status: &DeviceStatus, color: bool) -> String {
    let title = status.device_name().unwrap_or(name);
    let availability = if status.available {
        paint("available", color, |s| s.green().to_string())
    } else {
        paint("unavailable", color, |s| s.red().bold().to_string())
    };

    let mut lines = vec![format!(
        "{} ({}) {availability}",
        paint(title, color, |s| s.bold().to_string()),
        status.device_id
    )];
    if let Some(at) = status.last_success {
        lines.push(format!("  last read   {}", at.format("%Y-%m-%d %H:%M:%S UTC")));
    }
    if status.consecutive_failures > 0 {
        lines.push(format!("  failures    {}", status.consecutive_failures));
    }
    if let Some(err) = &status.last_error {
        lines.push(format!(
            "  last error  {} ({})",
            paint(&err.message, color, |s| s.yellow().to_string()),
            err.kind
        ));
    }
    if let PollerState::BackingOff { attempt } = status.state {
        lines.push(format!("  backing off after attempt {attempt}"));
    }
    lines.join("\n")
}

/// What `status` and `watch` report per device.
#[derive(Debug, Serialize)]
pub struct DeviceView {
    pub name: String,
    pub device_id: String,
    pub device_name: Option<String>,
    pub available: bool,
    pub polls: u64,
    pub last_success: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    pub last_error: Option<PollError>,
    pub entities: Vec<EntityState>,
    #[serde(skip)]
    status: Arc<DeviceStatus>,
}

impl DeviceView {
    pub fn new(name: &str, status: Arc<DeviceStatus>, entities: Vec<EntityState>) -> Self {
        Self {
            name: name.to_owned(),
            device_id: status.device_id.clone(),
            device_name: status.device_name().map(str::to_owned),
            available: status.available,
            polls: status.polls,
            last_success: status.last_success,
            consecutive_failures: status.consecutive_failures,
            last_error: status.last_error.clone(),
            entities,
            status,
        }
    }

    pub fn status(&self) -> &DeviceStatus {
        &self.status
    }

    pub fn detail(&self, color: bool) -> String {
        status_detail(&self.name, &self.status, &self.entities, color)
    }

    /// `name key=value ...` on one line.
    pub fn line(&self) -> String {
        let mut parts = vec![self.name.clone()];
        parts.extend(self.entities.iter().map(entity_line));
        parts.join(" ")
    }
}

/// Full human-readable view of one device.
pub fn status_detail(
    name: &str,
    status: &DeviceStatus,
    entities: &[EntityState],
    color: bool,
) -> String {
    let rows: Vec<EntityRow> = entities.iter().map(|e| EntityRow::new(e, color)).collect();
    format!("{}\n{}", status_header(name, status, color), render_table(&rows))
}

/// One line of `status --all`.
#[derive(Tabled)]
pub struct StatusRow {
    #[tabled(rename = "Device")]
    pub name: String,
    #[tabled(rename = "Unit")]
    pub unit: String,
    #[tabled(rename = "State")]
    pub state: String,
    #[tabled(rename = "Indoor")]
    pub indoor: String,
    #[tabled(rename = "Humidity")]
    pub humidity: String,
    #[tabled(rename = "Airflow")]
    pub airflow: String,
}

impl StatusRow {
    pub fn new(view: &DeviceView, color: bool) -> Self {
        let reading = |key: SensorKey| {
            view.entities
                .iter()
                .find(|e| e.key == key)
                .and_then(|e| {
                    let value = e.value.as_ref()?;
                    Some(match e.unit {
                        Some(unit) => format!("{value} {unit}"),
                        None => value.to_string(),
                    })
                })
                .unwrap_or_else(|| "-".into())
        };
        let state = if view.available {
            paint("available", color, |s| s.green().to_string())
        } else {
            paint("unavailable", color, |s| s.red().to_string())
        };
        Self {
            name: view.name.clone(),
            unit: view.device_name.clone().unwrap_or_else(|| view.device_id.clone()),
            state,
            indoor: reading(SensorKey::IndoorTemp),
            humidity: reading(SensorKey::InternalHumidity),
            airflow: reading(SensorKey::AirflowMode),
        }
    }
}

// ── Configured devices ───────────────────────────────────────────────

#[derive(Tabled)]
pub struct DeviceRow {
    #[tabled(rename = "Name")]
    pub name: String,
    #[tabled(rename = "Host")]
    pub host: String,
    #[tabled(rename = "Port")]
    pub port: u16,
    #[tabled(rename = "Device ID")]
    pub device_id: String,
    #[tabled(rename = "Key")]
    pub key: &'static str,
    #[tabled(rename = "Default")]
    pub default: &'static str,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use ventlink_core::ReadingValue;

    use super::*;

    fn entity(available: bool, stale: bool) -> EntityState {
        EntityState {
            unique_id: "VA-1_indoor_temp".into(),
            key: SensorKey::IndoorTemp,
            name: "Indoor Temperature",
            icon: None,
            device_class: None,
            unit: Some(ventlink_core::Unit::Celsius),
            value: Some(ReadingValue::Float(21.4)),
            acquired_at: Some(Utc::now()),
            available,
            stale,
        }
    }

    #[test]
    fn rows_carry_entity_state_without_color() {
        assert_eq!(EntityRow::new(&entity(true, false), false).state, "ok");
        assert_eq!(EntityRow::new(&entity(true, true), false).state, "stale");
        assert_eq!(EntityRow::new(&entity(false, true), false).state, "unavailable");
        assert_eq!(EntityRow::new(&entity(true, false), false).unit, "°C");
    }

    #[test]
    fn plain_lines_use_snake_case_keys() {
        assert_eq!(entity_line(&entity(true, false)), "indoor_temp=21.4");
    }

    #[test]
    fn json_output_is_a_list() {
        let out = render_list(
            OutputFormat::JsonCompact,
            &[entity(true, false)],
            |e| EntityRow::new(e, false),
            entity_line,
        )
        .unwrap();
        assert!(out.starts_with("[{"));
        assert!(out.contains("\"key\":\"indoor_temp\""));
    }
}
