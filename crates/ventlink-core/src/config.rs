// ── Runtime device configuration ──
//
// These types describe *which* device to talk to and *how* to poll it.
// They carry credential data and polling tuning, but never touch disk.
// The CLI (via `ventlink-config`) constructs them and hands them in.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use crate::error::ValidationError;

/// Upper bound on the pre-shared key length, in bytes.
pub const MAX_KEY_LEN: usize = 256;

/// Upper bound on device id and identity length.
pub const MAX_ID_LEN: usize = 64;

// ── Credentials ──────────────────────────────────────────────────────

/// Accepted connection credentials for one device.
///
/// Only constructible through [`Credentials::validate`], so holding one
/// means the input passed structural checks. Immutable afterwards.
#[derive(Debug, Clone)]
pub struct Credentials {
    host: String,
    port: u16,
    identity: String,
    key: SecretString,
    device_id: String,
}

impl Credentials {
    /// Structurally validate setup input. No network I/O.
    ///
    /// `host` may be an IPv4 literal, an IPv6 literal (bare or bracketed)
    /// or an RFC 1123 host name. `identity` defaults to `device_id`.
    pub fn validate(
        host: &str,
        port: u16,
        identity: Option<&str>,
        key: SecretString,
        device_id: &str,
    ) -> Result<Self, ValidationError> {
        let host = validate_host(host)?;
        if port == 0 {
            return Err(ValidationError::InvalidPort);
        }

        let device_id = validate_id("device_id", device_id)?;
        let identity = match identity.map(str::trim) {
            None | Some("") => device_id.clone(),
            Some(id) => validate_id("identity", id)?,
        };

        let key_len = key.expose_secret().len();
        if key_len == 0 {
            return Err(ValidationError::Empty { field: "key" });
        }
        if key_len > MAX_KEY_LEN {
            return Err(ValidationError::KeyTooLong { max: MAX_KEY_LEN });
        }

        Ok(Self {
            host,
            port,
            identity,
            key,
            device_id,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn key(&self) -> &SecretString {
        &self.key
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }
}

/// Normalize and check a host. Returns the bare form (no brackets).
fn validate_host(raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty { field: "host" });
    }

    let invalid = |reason: &str| ValidationError::InvalidHost {
        host: trimmed.to_owned(),
        reason: reason.to_owned(),
    };

    // Bare IPv6 literals are accepted; `url` wants them bracketed.
    let candidate = if trimmed.contains(':') && !trimmed.starts_with('[') {
        format!("[{trimmed}]")
    } else {
        trimmed.to_owned()
    };

    match url::Host::parse(&candidate) {
        Ok(url::Host::Ipv4(addr)) => Ok(addr.to_string()),
        Ok(url::Host::Ipv6(addr)) => Ok(addr.to_string()),
        Ok(url::Host::Domain(name)) => {
            check_hostname(&name).map_err(invalid)?;
            Ok(name)
        }
        Err(e) => Err(invalid(&e.to_string())),
    }
}

/// RFC 1123 host name rules on top of what `url` already accepts.
fn check_hostname(name: &str) -> Result<(), &'static str> {
    let name = name.strip_suffix('.').unwrap_or(name);
    if name.len() > 253 {
        return Err("host name longer than 253 characters");
    }
    for label in name.split('.') {
        if label.is_empty() || label.len() > 63 {
            return Err("each label must be 1 to 63 characters");
        }
        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err("only letters, digits and '-' are allowed");
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err("labels must not start or end with '-'");
        }
    }
    Ok(())
}

/// Device ids and identities end up in the signed request header, where
/// `|` is the field separator.
fn validate_id(field: &'static str, raw: &str) -> Result<String, ValidationError> {
    let id = raw.trim();
    if id.is_empty() {
        return Err(ValidationError::Empty { field });
    }
    if id.len() > MAX_ID_LEN {
        return Err(ValidationError::InvalidValue {
            field,
            reason: format!("longer than {MAX_ID_LEN} characters"),
        });
    }
    if let Some(bad) = id.chars().find(|c| c.is_whitespace() || c.is_control() || *c == '|') {
        return Err(ValidationError::InvalidValue {
            field,
            reason: format!("contains invalid character {bad:?}"),
        });
    }
    Ok(id.to_owned())
}

// ── Polling ──────────────────────────────────────────────────────────

/// Polling, retry and staleness tuning for one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollerConfig {
    /// Time between successful polls.
    pub interval: Duration,
    /// Upper bound on a single fetch or command.
    pub timeout: Duration,
    /// Consecutive failures after which the device is unavailable.
    pub failure_threshold: u32,
    /// Delay after the first failure; doubles per further failure.
    pub backoff_initial: Duration,
    /// Cap on the failure delay.
    pub backoff_max: Duration,
    /// Age after which a reading is marked stale.
    pub stale_after: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            timeout: Duration::from_secs(10),
            failure_threshold: 3,
            backoff_initial: Duration::from_secs(5),
            backoff_max: Duration::from_secs(60),
            stale_after: Duration::from_secs(90),
        }
    }
}

impl PollerConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let non_zero = [
            ("interval", self.interval),
            ("timeout", self.timeout),
            ("backoff_initial", self.backoff_initial),
            ("stale_after", self.stale_after),
        ];
        for (field, value) in non_zero {
            if value.is_zero() {
                return Err(ValidationError::InvalidPolling {
                    field,
                    reason: "must be greater than zero".into(),
                });
            }
        }
        if self.failure_threshold == 0 {
            return Err(ValidationError::InvalidPolling {
                field: "failure_threshold",
                reason: "must be at least 1".into(),
            });
        }
        if self.backoff_max < self.backoff_initial {
            return Err(ValidationError::InvalidPolling {
                field: "backoff_max",
                reason: "must not be smaller than backoff_initial".into(),
            });
        }
        Ok(())
    }
}
