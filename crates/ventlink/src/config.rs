//! CLI configuration -- thin wrapper around `ventlink_config`.
//!
//! Adds the pieces that depend on `GlobalOpts`: the `--config` path,
//! `--device` selection and the `--timeout` override.

use std::path::PathBuf;

use ventlink_core::{Credentials, PollerConfig};

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use ventlink_config::{Config, DeviceProfile};

/// A device ready to hand to the core: validated credentials plus the
/// polling settings that apply to it.
#[derive(Debug, Clone)]
pub struct ResolvedDevice {
    pub name: String,
    pub credentials: Credentials,
    pub polling: PollerConfig,
}

pub fn path(global: &GlobalOpts) -> PathBuf {
    global.config.clone().unwrap_or_else(ventlink_config::config_path)
}

pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    Ok(ventlink_config::load_config_from(&path(global))?)
}

pub fn save(global: &GlobalOpts, cfg: &Config) -> Result<(), CliError> {
    Ok(ventlink_config::save_config_to(cfg, &path(global))?)
}

/// Resolve one named device, applying `--timeout`.
pub fn resolve(global: &GlobalOpts, cfg: &Config, name: &str) -> Result<ResolvedDevice, CliError> {
    let credentials = cfg.credentials(name)?;
    let mut polling = cfg.poller_config(name)?;
    if let Some(timeout) = global.timeout {
        polling.timeout = timeout.into();
        polling.validate()?;
    }
    Ok(ResolvedDevice {
        name: name.to_owned(),
        credentials,
        polling,
    })
}

/// The devices a command acts on: every profile with `all`, otherwise the
/// one picked by `--device` / the default.
pub fn targets(
    global: &GlobalOpts,
    cfg: &Config,
    all: bool,
) -> Result<Vec<ResolvedDevice>, CliError> {
    if all {
        if cfg.devices.is_empty() {
            return Err(ventlink_config::ConfigError::NoDevices.into());
        }
        return cfg
            .device_names()
            .iter()
            .map(|name| resolve(global, cfg, name))
            .collect();
    }
    Ok(vec![single(global, cfg)?])
}

/// The device picked by `--device`, the configured default, or the only
/// profile.
pub fn single(global: &GlobalOpts, cfg: &Config) -> Result<ResolvedDevice, CliError> {
    let name = cfg.active_device_name(global.device.as_deref())?;
    resolve(global, cfg, &name)
}
