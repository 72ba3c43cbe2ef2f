//! `ventlink setup`: validate a device, test it once, then store it.

use dialoguer::Input;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::{debug, info};

use ventlink_core::{Credentials, test_connection};

use crate::cli::{GlobalOpts, SetupArgs};
use crate::commands::util;
use crate::config::{self, DeviceProfile};
use crate::error::CliError;
use crate::output;

const DEFAULT_PROFILE: &str = "default";

/// Where the key ended up.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
enum KeyStore {
    Env,
    Keyring,
    Config,
}

#[derive(Debug, Serialize)]
struct SetupSummary {
    name: String,
    title: String,
    host: String,
    port: u16,
    device_id: String,
    key: KeyStore,
    checked: bool,
    default: bool,
}

/// A flag value, else a prompt, else an error when nobody can answer.
fn ask(
    value: Option<String>,
    field: &str,
    prompt: &str,
    default: Option<&str>,
) -> Result<String, CliError> {
    if let Some(value) = value {
        return Ok(value);
    }
    if !util::interactive() {
        return match default {
            Some(d) => Ok(d.to_owned()),
            None => Err(CliError::MissingInput { field: field.into() }),
        };
    }
    let mut input = Input::<String>::new().with_prompt(prompt);
    if let Some(d) = default {
        input = input.default(d.to_owned());
    }
    input.interact_text().map_err(util::prompt_err)
}

fn read_key(args: &SetupArgs) -> Result<SecretString, CliError> {
    if let Some(var) = &args.key_env {
        return std::env::var(var)
            .map(SecretString::from)
            .map_err(|_| CliError::Validation {
                field: "key-env".into(),
                reason: format!("environment variable {var} is not set"),
            });
    }
    if let Some(key) = &args.key {
        return Ok(SecretString::from(key.clone()));
    }
    if !util::interactive() {
        return Err(CliError::MissingInput { field: "key".into() });
    }
    rpassword::prompt_password("Device key: ")
        .map(SecretString::from)
        .map_err(util::prompt_err)
}

pub async fn handle(args: SetupArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let name = ask(args.name.clone(), "name", "Profile name", Some(DEFAULT_PROFILE))?;
    let host = ask(args.host.clone(), "host", "Device host or IP", None)?;
    let device_id = ask(args.device_id.clone(), "device-id", "Device id (from the label)", None)?;
    let key = read_key(&args)?;

    let credentials = Credentials::validate(
        &host,
        args.port,
        args.identity.as_deref(),
        key.clone(),
        &device_id,
    )?;

    let mut profile = DeviceProfile::new(credentials.host(), credentials.device_id());
    profile.port = credentials.port();
    profile.identity.clone_from(&args.identity);
    profile.key_env.clone_from(&args.key_env);

    // Catch duplicates before the network check so a conflict costs nothing.
    let mut cfg = config::load(global)?;
    let replacing = cfg.devices.contains_key(&name);
    cfg.clone().add_device(&name, profile.clone())?;
    if replacing && !util::confirm(&format!("Replace existing device '{name}'?"), global.yes)? {
        return Ok(());
    }

    let timeout = global
        .timeout
        .map_or_else(|| cfg.polling.to_poller_config().map(|p| p.timeout), |t| Ok(t.into()))?;

    let title = if args.skip_check {
        debug!(%name, "connection check skipped");
        format!("Ventilation unit ({})", credentials.host())
    } else {
        let report = test_connection(&credentials, timeout).await?;
        report.title
    };

    let store = if args.key_env.is_some() {
        KeyStore::Env
    } else if args.keyring {
        ventlink_config::store_key(&name, key.expose_secret())?;
        KeyStore::Keyring
    } else {
        profile.key = Some(key.expose_secret().to_owned());
        KeyStore::Config
    };

    cfg.add_device(&name, profile)?;
    config::save(global, &cfg)?;
    info!(%name, device_id = credentials.device_id(), "device saved");

    let summary = SetupSummary {
        default: cfg.default_device.as_deref() == Some(name.as_str()),
        name,
        title,
        host: credentials.host().to_owned(),
        port: credentials.port(),
        device_id: credentials.device_id().to_owned(),
        key: store,
        checked: !args.skip_check,
    };
    let path = config::path(global);
    let rendered = output::render_single(
        global.output,
        &summary,
        |s| {
            let mut lines = vec![format!(
                "✓ Saved '{}': {} at {}:{}",
                s.name, s.title, s.host, s.port
            )];
            if !s.checked {
                lines.push("  connection not tested (--skip-check)".into());
            }
            if s.default {
                lines.push("  default device".into());
            }
            lines.push(format!("  config {}", path.display()));
            lines.join("\n")
        },
        |s| s.name.clone(),
    )?;
    output::print_output(&rendered, global.quiet);
    Ok(())
}
