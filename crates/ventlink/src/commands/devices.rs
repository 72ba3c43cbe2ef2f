//! `ventlink devices`: list, remove and select stored profiles.

use serde::Serialize;
use tracing::{info, warn};

use crate::cli::{DevicesArgs, DevicesCommand, GlobalOpts};
use crate::commands::util;
use crate::config::{self, Config, DeviceProfile};
use crate::error::CliError;
use crate::output::{self, DeviceRow};

#[derive(Debug, Serialize)]
struct DeviceSummary {
    name: String,
    host: String,
    port: u16,
    device_id: String,
    identity: Option<String>,
    /// `env:VAR`, `keyring` or `plaintext`.
    key: String,
    default: bool,
}

impl DeviceSummary {
    fn new(name: &str, profile: &DeviceProfile, cfg: &Config) -> Self {
        let key = match (&profile.key_env, &profile.key) {
            (Some(var), _) => format!("env:{var}"),
            (None, Some(_)) => "plaintext".into(),
            (None, None) => "keyring".into(),
        };
        Self {
            name: name.to_owned(),
            host: profile.host.clone(),
            port: profile.port,
            device_id: profile.device_id.clone(),
            identity: profile.identity.clone(),
            key,
            default: cfg.default_device.as_deref() == Some(name),
        }
    }

    fn row(&self) -> DeviceRow {
        DeviceRow {
            name: self.name.clone(),
            host: self.host.clone(),
            port: self.port,
            device_id: self.device_id.clone(),
            key: match self.key.as_str() {
                "plaintext" => "config",
                "keyring" => "keyring",
                _ => "env",
            },
            default: if self.default { "*" } else { "" },
        }
    }
}

pub fn handle(args: DevicesArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut cfg = config::load(global)?;
    match args.command {
        DevicesCommand::List => {
            let devices: Vec<DeviceSummary> = cfg
                .devices
                .iter()
                .map(|(name, profile)| DeviceSummary::new(name, profile, &cfg))
                .collect();
            let rendered = output::render_list(global.output, &devices, DeviceSummary::row, |d| {
                d.name.clone()
            })?;
            output::print_output(&rendered, global.quiet);
            Ok(())
        }

        DevicesCommand::Remove { name } => {
            // Surfaces UnknownDevice before asking.
            cfg.device(&name)?;
            if !util::confirm(&format!("Remove device '{name}'?"), global.yes)? {
                return Ok(());
            }
            cfg.remove_device(&name)?;
            if let Err(e) = ventlink_config::delete_key(&name) {
                warn!(%name, error = %e, "could not remove keyring entry");
            }
            config::save(global, &cfg)?;
            info!(%name, "device removed");
            if !global.quiet {
                eprintln!("✓ Removed '{name}'");
            }
            Ok(())
        }

        DevicesCommand::Use { name } => {
            cfg.device(&name)?;
            cfg.default_device = Some(name.clone());
            config::save(global, &cfg)?;
            if !global.quiet {
                eprintln!("✓ Default device is now '{name}'");
            }
            Ok(())
        }
    }
}
