//! Configuration management.
//!
//! Settings are loaded from `config/<name>.toml` with the `config` crate and
//! deserialized into typed structs. Every field has a default, so the driver
//! is usable without a settings file; the CLI falls back to
//! [`Settings::default`] when no file is present.
//!
//! ```toml
//! log_level = "info"
//!
//! [serial]
//! baud_rate = 9600
//! write_terminator = "\r\n"
//! read_terminator = "\n"
//! query_timeout = "500ms"
//! probe_timeout = "50ms"
//!
//! [lamp]
//! settle_delay = "100ms"
//! closed_position = -400
//! max_velocity = 1000
//! poll_interval = "100ms"
//! ```

use crate::error::{LampError, Result};
use config::Config;
use serde::Deserialize;
use std::time::Duration;

/// Top-level application settings.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Settings {
    /// Default log filter for the binaries (e.g. "info", "debug").
    pub log_level: String,
    /// Serial line parameters shared by the driver and the enumerator.
    pub serial: SerialSettings,
    /// Lamp-specific behavior.
    pub lamp: LampSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            serial: SerialSettings::default(),
            lamp: LampSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from `config/<name>.toml` (default name: "default").
    pub fn new(config_name: Option<&str>) -> Result<Self> {
        let config_path = format!("config/{}", config_name.unwrap_or("default"));
        Self::from_source(config::File::with_name(&config_path))
    }

    /// Load settings from an explicit file path.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        Self::from_source(config::File::from(path))
    }

    fn from_source(source: config::File<config::FileSourceFile, config::FileFormat>) -> Result<Self> {
        let s = Config::builder()
            .add_source(source)
            .build()
            .map_err(LampError::Config)?;

        s.try_deserialize().map_err(LampError::Config)
    }
}

/// Serial line parameters.
///
/// The HL-2000-HP-232R speaks 9600 baud, 8 data bits, no parity, 1 stop
/// bit, no flow control. Both terminators are configurable because some
/// firmware revisions use a bare carriage return instead of CR/LF.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SerialSettings {
    /// Communication speed.
    pub baud_rate: u32,
    /// Terminator appended to every outgoing command line.
    pub write_terminator: String,
    /// Character that ends an incoming reply line.
    pub read_terminator: char,
    /// Overall per-query reply budget.
    #[serde(with = "humantime_serde")]
    pub query_timeout: Duration,
    /// Short budget used when probing ports during discovery.
    #[serde(with = "humantime_serde")]
    pub probe_timeout: Duration,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            write_terminator: "\r\n".to_string(),
            read_terminator: '\n',
            query_timeout: Duration::from_millis(500),
            probe_timeout: Duration::from_millis(50),
        }
    }
}

/// Lamp behavior settings.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LampSettings {
    /// Pause after each motion command; the protocol has no motion-complete
    /// acknowledgement.
    #[serde(with = "humantime_serde")]
    pub settle_delay: Duration,
    /// Shutter position treated as fully closed; `apply_initial_state`
    /// parks the shutter here and declares it home.
    pub closed_position: i32,
    /// Maximum shutter velocity, sent as `SP<n>` on connect when set.
    pub max_velocity: Option<u32>,
    /// Whether the firmware answers the `TEM` coil temperature query.
    pub supports_coil_temperature: bool,
    /// Whether the firmware answers the `GRC` driver current query.
    pub supports_driver_current: bool,
    /// Telemetry poll cadence used by the `monitor` command.
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
}

impl Default for LampSettings {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(100),
            closed_position: -400,
            max_velocity: None,
            supports_coil_temperature: true,
            supports_driver_current: true,
            poll_interval: Duration::from_millis(100),
        }
    }
}
