//! Shared configuration for the ventlink CLI.
//!
//! TOML device profiles, polling defaults with per-device overrides, key
//! resolution (env var + keyring + plaintext), and translation to
//! `ventlink_core::{Credentials, PollerConfig}`. Core never reads files;
//! it only receives the validated types built here.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use ventlink_core::{Credentials, DEFAULT_PORT, PollerConfig, ValidationError};

/// Keyring service name under which device keys are stored.
pub const KEYRING_SERVICE: &str = "ventlink";

/// Prefix of environment variables merged over the config file.
pub const ENV_PREFIX: &str = "VENTLINK_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("no key configured for device '{profile}'")]
    NoCredentials { profile: String },

    #[error("device '{name}' is not configured")]
    UnknownDevice { name: String, available: Vec<String> },

    #[error("no devices configured")]
    NoDevices,

    #[error("several devices configured and none selected")]
    Ambiguous { available: Vec<String> },

    #[error("device id '{device_id}' is already configured as '{profile}'")]
    AlreadyConfigured { device_id: String, profile: String },

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Device used when none is named on the command line.
    pub default_device: Option<String>,

    /// Global CLI defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Polling settings shared by every device.
    #[serde(default)]
    pub polling: Polling,

    /// Named device profiles.
    #[serde(default)]
    pub devices: BTreeMap<String, DeviceProfile>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}

/// Polling settings, in whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Polling {
    pub interval: u64,
    pub timeout: u64,
    pub failure_threshold: u32,
    pub backoff_initial: u64,
    pub backoff_max: u64,
    pub stale_after: u64,
}

impl Default for Polling {
    fn default() -> Self {
        let base = PollerConfig::default();
        Self {
            interval: base.interval.as_secs(),
            timeout: base.timeout.as_secs(),
            failure_threshold: base.failure_threshold,
            backoff_initial: base.backoff_initial.as_secs(),
            backoff_max: base.backoff_max.as_secs(),
            stale_after: base.stale_after.as_secs(),
        }
    }
}

impl Polling {
    /// These settings with every `Some` field of `overrides` applied.
    pub fn merged(self, overrides: &PollingOverrides) -> Self {
        Self {
            interval: overrides.interval.unwrap_or(self.interval),
            timeout: overrides.timeout.unwrap_or(self.timeout),
            failure_threshold: overrides.failure_threshold.unwrap_or(self.failure_threshold),
            backoff_initial: overrides.backoff_initial.unwrap_or(self.backoff_initial),
            backoff_max: overrides.backoff_max.unwrap_or(self.backoff_max),
            stale_after: overrides.stale_after.unwrap_or(self.stale_after),
        }
    }

    /// Convert to the core type and check it.
    pub fn to_poller_config(self) -> Result<PollerConfig, ConfigError> {
        let config = PollerConfig {
            interval: Duration::from_secs(self.interval),
            timeout: Duration::from_secs(self.timeout),
            failure_threshold: self.failure_threshold,
            backoff_initial: Duration::from_secs(self.backoff_initial),
            backoff_max: Duration::from_secs(self.backoff_max),
            stale_after: Duration::from_secs(self.stale_after),
        };
        config.validate()?;
        Ok(config)
    }
}

/// Per-device polling overrides. Unset fields fall back to `[polling]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct PollingOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_threshold: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backoff_initial: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backoff_max: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stale_after: Option<u64>,
}

/// One configured ventilation unit.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DeviceProfile {
    /// IP address or host name.
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Device id printed on the unit's label.
    pub device_id: String,

    /// Client identity; the device id when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,

    /// Pre-shared key (plaintext -- prefer keyring or env var).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    /// Environment variable name containing the key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_env: Option<String>,

    #[serde(default, skip_serializing_if = "is_default_overrides")]
    pub polling: PollingOverrides,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn is_default_overrides(overrides: &PollingOverrides) -> bool {
    *overrides == PollingOverrides::default()
}

impl DeviceProfile {
    pub fn new(host: impl Into<String>, device_id: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            device_id: device_id.into(),
            identity: None,
            key: None,
            key_env: None,
            polling: PollingOverrides::default(),
        }
    }
}

// ── Profile operations ──────────────────────────────────────────────

impl Config {
    /// Pick the device to act on: `explicit`, else `default_device`, else
    /// the only configured device.
    pub fn active_device_name(&self, explicit: Option<&str>) -> Result<String, ConfigError> {
        if let Some(name) = explicit.or(self.default_device.as_deref()) {
            return Ok(name.to_owned());
        }
        let mut names = self.devices.keys();
        match (names.next(), names.next()) {
            (None, _) => Err(ConfigError::NoDevices),
            (Some(only), None) => Ok(only.clone()),
            _ => Err(ConfigError::Ambiguous {
                available: self.device_names(),
            }),
        }
    }

    pub fn device(&self, name: &str) -> Result<&DeviceProfile, ConfigError> {
        self.devices.get(name).ok_or_else(|| ConfigError::UnknownDevice {
            name: name.to_owned(),
            available: self.device_names(),
        })
    }

    pub fn device_names(&self) -> Vec<String> {
        self.devices.keys().cloned().collect()
    }

    /// Store `profile` under `name`, replacing any profile of that name.
    ///
    /// Fails if a profile with a different name already points at the same
    /// device id. The first device added becomes the default.
    pub fn add_device(&mut self, name: &str, profile: DeviceProfile) -> Result<(), ConfigError> {
        let clash = self
            .devices
            .iter()
            .find(|(other, p)| {
                other.as_str() != name && p.device_id.trim() == profile.device_id.trim()
            });
        if let Some((other, _)) = clash {
            return Err(ConfigError::AlreadyConfigured {
                device_id: profile.device_id,
                profile: other.clone(),
            });
        }

        self.devices.insert(name.to_owned(), profile);
        if self.default_device.is_none() {
            self.default_device = Some(name.to_owned());
        }
        Ok(())
    }

    /// Remove a profile. Clears `default_device` if it pointed there.
    pub fn remove_device(&mut self, name: &str) -> Result<DeviceProfile, ConfigError> {
        let profile = self.devices.remove(name).ok_or_else(|| ConfigError::UnknownDevice {
            name: name.to_owned(),
            available: self.device_names(),
        })?;
        if self.default_device.as_deref() == Some(name) {
            self.default_device = None;
        }
        Ok(profile)
    }

    /// Effective polling settings for `name`.
    pub fn poller_config(&self, name: &str) -> Result<PollerConfig, ConfigError> {
        let profile = self.device(name)?;
        self.polling.merged(&profile.polling).to_poller_config()
    }

    /// Validated credentials for `name`, key resolved through the chain.
    pub fn credentials(&self, name: &str) -> Result<Credentials, ConfigError> {
        let profile = self.device(name)?;
        let key = resolve_key(profile, name)?;
        profile_to_credentials(profile, key)
    }
}

/// Validate a profile plus an already-resolved key.
pub fn profile_to_credentials(
    profile: &DeviceProfile,
    key: SecretString,
) -> Result<Credentials, ConfigError> {
    Ok(Credentials::validate(
        &profile.host,
        profile.port,
        profile.identity.as_deref(),
        key,
        &profile.device_id,
    )?)
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "ventlink", "ventlink").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("ventlink");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path`, then `VENTLINK_*` env vars (`__` separates
/// sections, e.g. `VENTLINK_POLLING__INTERVAL=10`). A missing file
/// yields the defaults.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Key resolution ──────────────────────────────────────────────────

fn keyring_user(profile_name: &str) -> String {
    format!("{profile_name}/key")
}

/// Resolve a device key: `key_env` variable, then the system keyring,
/// then plaintext in the profile.
pub fn resolve_key(
    profile: &DeviceProfile,
    profile_name: &str,
) -> Result<SecretString, ConfigError> {
    resolve_key_with(
        profile,
        profile_name,
        |var| std::env::var(var).ok(),
        |user| {
            keyring::Entry::new(KEYRING_SERVICE, user)
                .and_then(|entry| entry.get_password())
                .ok()
        },
    )
}

fn resolve_key_with(
    profile: &DeviceProfile,
    profile_name: &str,
    env: impl Fn(&str) -> Option<String>,
    keyring: impl Fn(&str) -> Option<String>,
) -> Result<SecretString, ConfigError> {
    // 1. Profile's key_env → env var lookup
    if let Some(value) = profile.key_env.as_deref().and_then(&env) {
        return Ok(SecretString::from(value));
    }

    // 2. System keyring
    if let Some(secret) = keyring(&keyring_user(profile_name)) {
        return Ok(SecretString::from(secret));
    }

    // 3. Plaintext in config
    if let Some(ref key) = profile.key {
        return Ok(SecretString::from(key.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Store a device key in the system keyring.
pub fn store_key(profile_name: &str, key: &str) -> Result<(), ConfigError> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, &keyring_user(profile_name))?;
    entry.set_password(key)?;
    Ok(())
}

/// Remove a stored key. A missing entry is not an error.
pub fn delete_key(profile_name: &str) -> Result<(), ConfigError> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, &keyring_user(profile_name))?;
    match entry.delete_credential() {
        Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    fn none(_: &str) -> Option<String> {
        None
    }

    fn profile() -> DeviceProfile {
        DeviceProfile {
            key: Some("plain".into()),
            key_env: Some("LOFT_KEY".into()),
            ..DeviceProfile::new("10.0.0.9", "VA-0042")
        }
    }

    #[test]
    fn env_var_wins_over_keyring_and_plaintext() {
        let key = resolve_key_with(
            &profile(),
            "loft",
            |var| (var == "LOFT_KEY").then(|| "from-env".to_string()),
            |_| Some("from-keyring".into()),
        )
        .unwrap();
        assert_eq!(key.expose_secret(), "from-env");
    }

    #[test]
    fn keyring_is_looked_up_per_profile() {
        let key = resolve_key_with(&profile(), "loft", none, |user| {
            (user == "loft/key").then(|| "from-keyring".to_string())
        })
        .unwrap();
        assert_eq!(key.expose_secret(), "from-keyring");
    }

    #[test]
    fn plaintext_is_the_last_resort() {
        let key = resolve_key_with(&profile(), "loft", none, none).unwrap();
        assert_eq!(key.expose_secret(), "plain");
    }

    #[test]
    fn missing_key_names_the_profile() {
        let bare = DeviceProfile::new("10.0.0.9", "VA-0042");
        let err = resolve_key_with(&bare, "loft", none, none).unwrap_err();
        assert!(matches!(err, ConfigError::NoCredentials { ref profile } if profile == "loft"));
    }

    #[test]
    fn polling_defaults_match_core_defaults() {
        let config = Polling::default().to_poller_config().unwrap();
        assert_eq!(config, PollerConfig::default());
    }
}
