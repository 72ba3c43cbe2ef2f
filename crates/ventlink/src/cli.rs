//! Clap derive structures for the `ventlink` CLI.
//!
//! Defines the command tree, global flags, and shared value enums.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use ventlink_core::{AirflowMode, DEFAULT_PORT};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// ventlink -- monitor and control Wi-Fi ventilation units
#[derive(Debug, Parser)]
#[command(
    name = "ventlink",
    version,
    about = "Monitor and control Wi-Fi ventilation units on the local network",
    long_about = "Talks to heat-recovery ventilation units over their local\n\
        TCP protocol: reads temperatures, humidity, fan speeds and airflow,\n\
        and switches airflow modes. Devices are stored as named profiles.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Device profile to use
    #[arg(long, short = 'd', env = "VENTLINK_DEVICE", global = true)]
    pub device: Option<String>,

    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "VENTLINK_CONFIG", global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "VENTLINK_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Per-request timeout, e.g. "5s" (overrides the configured value)
    #[arg(long, env = "VENTLINK_TIMEOUT", global = true)]
    pub timeout: Option<humantime::Duration>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Add a device: validate, test the connection once, then save
    Setup(SetupArgs),

    /// Read a device once and print its sensors
    #[command(alias = "st")]
    Status(StatusArgs),

    /// Poll devices continuously and print every update
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Switch the airflow mode
    #[command(alias = "af")]
    Airflow(AirflowArgs),

    /// Manage configured devices
    #[command(alias = "dev")]
    Devices(DevicesArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  SETUP
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct SetupArgs {
    /// Profile name (prompted for when omitted)
    #[arg(long, short = 'n')]
    pub name: Option<String>,

    /// Device IP address or host name
    #[arg(long, short = 'H')]
    pub host: Option<String>,

    /// Device TCP port
    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Device id from the unit's label
    #[arg(long)]
    pub device_id: Option<String>,

    /// Client identity (defaults to the device id)
    #[arg(long)]
    pub identity: Option<String>,

    /// Pre-shared key (prompted for when omitted)
    #[arg(long, env = "VENTLINK_KEY", hide_env_values = true)]
    pub key: Option<String>,

    /// Read the key from this environment variable at runtime instead of
    /// storing it
    #[arg(long, value_name = "VAR", conflicts_with = "keyring")]
    pub key_env: Option<String>,

    /// Store the key in the system keyring instead of the config file
    #[arg(long)]
    pub keyring: bool,

    /// Save without testing the connection first
    #[arg(long)]
    pub skip_check: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  STATUS / WATCH
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Read every configured device
    #[arg(long, short = 'a')]
    pub all: bool,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Watch every configured device
    #[arg(long, short = 'a')]
    pub all: bool,

    /// Poll interval, e.g. "10s" (overrides the configured value)
    #[arg(long, short = 'i')]
    pub interval: Option<humantime::Duration>,

    /// Exit after this many updates
    #[arg(long, short = 'c')]
    pub count: Option<u64>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  AIRFLOW
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct AirflowArgs {
    /// Airflow mode to switch to
    pub mode: ModeArg,

    /// How long the mode lasts, in minutes (0, 15, 30, 45 or 60; 0 = until changed)
    #[arg(long, short = 'm', default_value_t = 0)]
    pub minutes: u16,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ModeArg {
    /// Return to the unit's schedule
    Reset,
    Normal,
    Boost,
    Purge,
}

impl From<ModeArg> for AirflowMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Reset => Self::Reset,
            ModeArg::Normal => Self::Normal,
            ModeArg::Boost => Self::Boost,
            ModeArg::Purge => Self::Purge,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  DEVICES
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct DevicesArgs {
    #[command(subcommand)]
    pub command: DevicesCommand,
}

#[derive(Debug, Subcommand)]
pub enum DevicesCommand {
    /// List configured devices
    #[command(alias = "ls")]
    List,

    /// Remove a device profile (and its keyring entry)
    #[command(alias = "rm")]
    Remove {
        /// Profile name
        name: String,
    },

    /// Make a profile the default device
    Use {
        /// Profile name
        name: String,
    },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
