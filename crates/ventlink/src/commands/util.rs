//! Shared helpers for command handlers.

use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;

use ventlink_core::{DeviceStatus, EntityCache, Hub};

use crate::config::ResolvedDevice;
use crate::error::CliError;

/// Whether prompts can be shown.
pub fn interactive() -> bool {
    std::io::stdin().is_terminal() && std::io::stderr().is_terminal()
}

/// Map a dialoguer / interactive I/O failure into CliError.
pub fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(message: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    if !interactive() {
        return Err(CliError::NonInteractiveRequiresYes {
            action: message.into(),
        });
    }
    dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(prompt_err)
}

/// Start polling every target on `hub`, in order.
pub fn load_all(hub: &Hub, targets: &[ResolvedDevice]) -> Result<Vec<EntityCache>, CliError> {
    targets
        .iter()
        .map(|t| Ok(hub.load(&t.credentials, t.polling.clone())?))
        .collect()
}

/// Wait until `cache` has published a poll numbered above `after`.
///
/// Returns the latest status if the poller goes away or `limit` passes
/// first.
pub async fn poll_after(cache: &EntityCache, after: u64, limit: Duration) -> Arc<DeviceStatus> {
    let mut stream = cache.subscribe();
    let wait = async {
        if stream.current().polls > after {
            return;
        }
        while let Some(status) = stream.changed().await {
            if status.polls > after {
                return;
            }
        }
    };
    let _ = tokio::time::timeout(limit, wait).await;
    cache.status()
}

/// Upper bound on waiting for one poll: the fetch timeout plus slack.
pub fn poll_limit(device: &ResolvedDevice) -> Duration {
    device.polling.timeout + Duration::from_secs(1)
}
