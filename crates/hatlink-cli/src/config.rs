//! Bridge settings – reads `~/.hatlink/config.toml`.
//!
//! Every field is optional; a missing file means defaults. `HATLINK_*`
//! environment variables override whatever the file says.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use hatlink_runtime::BridgeConfig;

/// Persisted bridge configuration stored in `~/.hatlink/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Longest wait for a control line per loop tick, in milliseconds.
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,

    /// Pause after each loop tick, in milliseconds.
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,

    /// Minimum analog delta requested from the sensor hub.
    #[serde(default = "default_analog_threshold")]
    pub analog_threshold: f64,

    /// Stop once the control channel is closed and drained.
    #[serde(default)]
    pub stop_on_eof: bool,
}

fn default_poll_timeout_ms() -> u64 {
    100
}
fn default_tick_ms() -> u64 {
    1
}
fn default_analog_threshold() -> f64 {
    0.01
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_timeout_ms: default_poll_timeout_ms(),
            tick_ms: default_tick_ms(),
            analog_threshold: default_analog_threshold(),
            stop_on_eof: false,
        }
    }
}

impl Config {
    fn validate(&self) -> Result<(), String> {
        if !self.analog_threshold.is_finite() || self.analog_threshold < 0.0 {
            return Err(format!(
                "analog_threshold must be a non-negative number, got {}",
                self.analog_threshold
            ));
        }
        Ok(())
    }
}

impl From<&Config> for BridgeConfig {
    fn from(cfg: &Config) -> Self {
        BridgeConfig {
            poll_timeout: Duration::from_millis(cfg.poll_timeout_ms),
            tick: Duration::from_millis(cfg.tick_ms),
            analog_threshold: cfg.analog_threshold,
            stop_on_eof: cfg.stop_on_eof,
        }
    }
}

/// Return the path to `~/.hatlink/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".hatlink").join("config.toml")
}

/// Load the config from disk and apply environment overrides.
/// Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    let mut cfg = load_from(&config_path())?;
    if let Some(cfg) = cfg.as_mut() {
        apply_env_overrides(cfg);
    }
    Ok(cfg)
}

/// Load the config from a specific path, without environment overrides.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    cfg.validate()
        .map_err(|e| format!("Invalid config at {}: {}", path.display(), e))?;
    Ok(Some(cfg))
}

/// Apply `HATLINK_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `HATLINK_POLL_TIMEOUT_MS` | `poll_timeout_ms` |
/// | `HATLINK_TICK_MS` | `tick_ms` |
/// | `HATLINK_ANALOG_THRESHOLD` | `analog_threshold` |
/// | `HATLINK_STOP_ON_EOF` | `stop_on_eof` |
///
/// Values that do not parse are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("HATLINK_POLL_TIMEOUT_MS")
        && let Ok(ms) = v.trim().parse::<u64>()
    {
        cfg.poll_timeout_ms = ms;
    }
    if let Ok(v) = std::env::var("HATLINK_TICK_MS")
        && let Ok(ms) = v.trim().parse::<u64>()
    {
        cfg.tick_ms = ms;
    }
    if let Ok(v) = std::env::var("HATLINK_ANALOG_THRESHOLD")
        && let Ok(t) = v.trim().parse::<f64>()
        && t.is_finite()
        && t >= 0.0
    {
        cfg.analog_threshold = t;
    }
    if let Ok(v) = std::env::var("HATLINK_STOP_ON_EOF")
        && let Some(flag) = parse_flag(&v)
    {
        cfg.stop_on_eof = flag;
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
