//! `ventlink airflow`: switch a unit's airflow mode.

use serde::Serialize;
use tracing::{debug, info};

use ventlink_core::{AirflowMode, Command, CoreError, EntityCache, Hub, SensorKey};

use crate::cli::{AirflowArgs, GlobalOpts};
use crate::commands::util;
use crate::config::{self, ResolvedDevice};
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize)]
struct AirflowChange {
    device: String,
    mode: AirflowMode,
    minutes: u16,
    /// Mode the unit reported after the change, if a poll completed.
    reported_mode: Option<String>,
}

pub async fn handle(args: AirflowArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mode = AirflowMode::from(args.mode);
    let command = Command::SetAirflowMode {
        mode,
        duration_min: args.minutes,
    };
    // Reject bad durations before touching config or the network.
    command.validate()?;

    let cfg = config::load(global)?;
    let target = config::single(global, &cfg)?;
    let device_id = target.credentials.device_id().to_owned();

    let hub = Hub::new();
    let cache = hub.load(&target.credentials, target.polling.clone())?;
    let result = send(&hub, &cache, &target, command).await;
    hub.unload_all().await;
    let reported_mode = result?;

    debug!(%device_id, "command acknowledged");
    info!(device = %target.name, mode = mode.as_str(), minutes = args.minutes, "airflow mode set");
    let change = AirflowChange {
        device: target.name,
        mode,
        minutes: args.minutes,
        reported_mode,
    };
    let rendered = output::render_single(
        global.output,
        &change,
        |c| {
            let until = if c.minutes == 0 {
                "until changed".to_owned()
            } else {
                format!("for {} min", c.minutes)
            };
            let reported = c
                .reported_mode
                .as_deref()
                .map(|m| format!(" (unit reports: {m})"))
                .unwrap_or_default();
            format!("✓ {}: airflow {} {until}{reported}", c.device, c.mode.as_str())
        },
        |c| c.mode.as_str().to_owned(),
    )?;
    output::print_output(&rendered, global.quiet);
    Ok(())
}

/// Wait for the first poll, send `command`, then wait for the refresh it
/// triggers. Returns the airflow mode the unit reports afterwards.
async fn send(
    hub: &Hub,
    cache: &EntityCache,
    target: &ResolvedDevice,
    command: Command,
) -> Result<Option<String>, CliError> {
    let limit = util::poll_limit(target);
    let first = util::poll_after(cache, 0, limit).await;
    if !first.available {
        return Err(match &first.last_error {
            Some(err) => CliError::unavailable(&target.name, err),
            None => CliError::Timeout {
                after: humantime::format_duration(limit).to_string(),
            },
        });
    }

    let poller = hub
        .poller(target.credentials.device_id())
        .ok_or_else(|| CoreError::DeviceNotFound {
            device_id: target.credentials.device_id().to_owned(),
        })?;
    poller.execute(command).await?;

    let status = util::poll_after(cache, first.polls, limit).await;
    Ok(status
        .last_snapshot
        .as_ref()
        .and_then(|snap| snap.value(SensorKey::AirflowMode))
        .map(ToString::to_string))
}
