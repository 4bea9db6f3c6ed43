//! Fleet Configuration - fleet layout and bridge tuning as TOML values
//!
//! Every section implements `Default` with the values the dashboard ships
//! with, so an empty or missing file yields a working three-vehicle setup.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use super::defaults;
use crate::types::{Channel, VehicleId};

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "COUGARS_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "fleet_config.toml";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for one dashboard instance.
///
/// Load with `FleetConfig::load()` which searches:
/// 1. `$COUGARS_CONFIG` env var
/// 2. `./fleet_config.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FleetConfig {
    /// Fleet size and monitored channels
    #[serde(default)]
    pub fleet: FleetLayout,

    /// Telemetry ingestion queue
    #[serde(default)]
    pub ingestion: IngestionConfig,

    /// View synchronizer timing
    #[serde(default)]
    pub view: ViewConfig,

    /// Outbound command path
    #[serde(default)]
    pub commands: CommandConfig,
}

impl FleetConfig {
    /// Load configuration using the standard search order:
    /// 1. `$COUGARS_CONFIG` environment variable
    /// 2. `./fleet_config.toml` in the current working directory
    /// 3. Built-in defaults
    ///
    /// A missing file falls through to the next step. A file that exists but
    /// cannot be read or parsed is an error.
    pub fn load() -> Result<Self, ConfigError> {
        let env_path = std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from);
        Self::load_from_search_path(env_path.as_deref(), Path::new(LOCAL_CONFIG_FILE))
    }

    fn load_from_search_path(env_path: Option<&Path>, local: &Path) -> Result<Self, ConfigError> {
        if let Some(path) = env_path {
            if path.exists() {
                let config = Self::load_from_file(path)?;
                info!(path = %path.display(), vehicles = config.fleet.vehicle_count, "Loaded fleet config from {}", CONFIG_ENV_VAR);
                return Ok(config);
            }
            warn!(path = %path.display(), "{} points to non-existent file, falling back", CONFIG_ENV_VAR);
        }

        if local.exists() {
            let config = Self::load_from_file(local)?;
            info!(path = %local.display(), vehicles = config.fleet.vehicle_count, "Loaded fleet config");
            return Ok(config);
        }

        info!("No {} found: using built-in defaults", LOCAL_CONFIG_FILE);
        Ok(Self::default())
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Write the configuration to a TOML file.
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let content = self.to_toml()?;
        std::fs::write(path, content).map_err(|e| ConfigError::Io(path.to_path_buf(), e))
    }

    /// Check every section, collecting all problems before failing.
    ///
    /// A config that fails here is fatal at startup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        if self.fleet.vehicle_count == 0 {
            errors.push("fleet.vehicle_count: at least one vehicle is required".to_string());
        }
        if self.fleet.channels.is_empty() {
            errors.push("fleet.channels: at least one channel is required".to_string());
        }
        let mut seen = HashSet::new();
        for channel in &self.fleet.channels {
            if !seen.insert(*channel) {
                errors.push(format!("fleet.channels: '{channel}' is listed more than once"));
            }
        }

        if self.ingestion.bounded && self.ingestion.capacity == 0 {
            errors.push("ingestion.capacity: must be > 0 when ingestion.bounded = true".to_string());
        }

        if self.view.tick_interval_ms == 0 {
            errors.push("view.tick_interval_ms: must be > 0".to_string());
        }

        if self.commands.outbound_capacity == 0 {
            errors.push("commands.outbound_capacity: must be > 0".to_string());
        }
        if self.commands.send_timeout_ms == 0 {
            errors.push("commands.send_timeout_ms: must be > 0".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Configured vehicle ids, 1..=vehicle_count.
    pub fn vehicles(&self) -> impl Iterator<Item = VehicleId> {
        VehicleId::fleet(self.fleet.vehicle_count)
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config I/O error ({}): {}", .0.display(), .1)]
    Io(PathBuf, #[source] std::io::Error),
    #[error("Config parse error ({}): {}", .0.display(), .1)]
    Parse(PathBuf, #[source] toml::de::Error),
    #[error("Config serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),
}

// ============================================================================
// Fleet Layout
// ============================================================================

/// Which vehicles and channels the dashboard tracks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetLayout {
    /// Number of vehicles; ids run from 1 to this value.
    #[serde(default = "default_vehicle_count")]
    pub vehicle_count: u8,

    /// Status channels tracked for every vehicle, in display order.
    #[serde(default = "default_channels")]
    pub channels: Vec<Channel>,
}

fn default_vehicle_count() -> u8 {
    defaults::DEFAULT_VEHICLE_COUNT
}

fn default_channels() -> Vec<Channel> {
    Channel::DEFAULT_SET.to_vec()
}

impl Default for FleetLayout {
    fn default() -> Self {
        Self {
            vehicle_count: default_vehicle_count(),
            channels: default_channels(),
        }
    }
}

// ============================================================================
// Ingestion Config
// ============================================================================

/// Telemetry ingestion queue settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionConfig {
    /// Drop-oldest bounded queue when true, unbounded otherwise.
    #[serde(default = "default_true")]
    pub bounded: bool,

    /// Queue capacity in events (bounded mode only).
    #[serde(default = "default_ingestion_capacity")]
    pub capacity: usize,
}

fn default_true() -> bool {
    true
}

fn default_ingestion_capacity() -> usize {
    defaults::INGESTION_QUEUE_CAPACITY
}

impl IngestionConfig {
    /// Effective capacity: `None` means unbounded.
    pub const fn effective_capacity(&self) -> Option<usize> {
        if self.bounded {
            Some(self.capacity)
        } else {
            None
        }
    }
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            bounded: true,
            capacity: default_ingestion_capacity(),
        }
    }
}

// ============================================================================
// View Config
// ============================================================================

/// View synchronizer settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewConfig {
    /// Fixed redraw tick in milliseconds.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

fn default_tick_interval_ms() -> u64 {
    defaults::VIEW_TICK_INTERVAL_MS
}

impl ViewConfig {
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

// ============================================================================
// Command Config
// ============================================================================

/// Outbound command path settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandConfig {
    /// Commands that may wait for the dispatcher before emission is rejected.
    #[serde(default = "default_outbound_capacity")]
    pub outbound_capacity: usize,

    /// Bound on draining in-flight commands at shutdown (ms).
    #[serde(default = "default_drain_timeout_ms")]
    pub drain_timeout_ms: u64,

    /// Per-command sink delivery timeout (ms).
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,
}

fn default_outbound_capacity() -> usize {
    defaults::OUTBOUND_QUEUE_CAPACITY
}

fn default_drain_timeout_ms() -> u64 {
    defaults::SHUTDOWN_DRAIN_TIMEOUT_MS
}

fn default_send_timeout_ms() -> u64 {
    defaults::COMMAND_SEND_TIMEOUT_MS
}

impl CommandConfig {
    pub const fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }

    pub const fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            outbound_capacity: default_outbound_capacity(),
            drain_timeout_ms: default_drain_timeout_ms(),
            send_timeout_ms: default_send_timeout_ms(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
