//! Configuration for the jpeglink command-line client.

use std::path::Path;
use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use jpeglink_core::config::{DEFAULT_INACTIVITY_TIMEOUT, EngineConfig, TRIGGER_COMMAND};
use jpeglink_core::codec::DEFAULT_MAX_DECLARED_LEN;
use jpeglink_core::sim::SimConfig;

/// Shortest inactivity timeout accepted from a config file.
const MIN_INACTIVITY_TIMEOUT_MS: u64 = 10;

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Transfer protocol settings.
    pub link: LinkConfig,
    /// Simulated peripheral behaviour.
    pub simulator: SimulatorConfig,
    /// Where received images go.
    pub output: OutputConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Transfer protocol settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Body-phase inactivity timeout in milliseconds.
    pub inactivity_timeout_ms: u64,
    /// Literal written to the control characteristic.
    pub trigger_command: String,
    /// Reject headers declaring more than this many bytes.
    pub max_declared_len: u32,
}

/// Simulated peripheral behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Advertised name.
    pub name: String,
    /// Notification payload size in bytes.
    pub mtu: usize,
    /// Delay before each notification in milliseconds.
    pub fragment_interval_ms: u64,
    /// Bytes dropped from the end of each transfer.
    pub truncate_tail: usize,
    /// Connect attempts that fail before one succeeds.
    pub fail_first_connects: usize,
}

/// Output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Default file for a received image.
    pub path: String,
    /// Give up on a simulated session after this many seconds.
    pub session_timeout_secs: u64,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            inactivity_timeout_ms: DEFAULT_INACTIVITY_TIMEOUT.as_millis() as u64,
            trigger_command: String::from_utf8_lossy(TRIGGER_COMMAND).into_owned(),
            max_declared_len: DEFAULT_MAX_DECLARED_LEN,
        }
    }
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            name: "M5CoreS3".into(),
            mtu: 180,
            fragment_interval_ms: 5,
            truncate_tail: 0,
            fail_first_connects: 0,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: "received.jpg".into(),
            session_timeout_secs: 30,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl CliConfig {
    /// Load configuration from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Write the default configuration to a file (for bootstrapping).
    pub fn write_default(path: &Path) -> std::io::Result<()> {
        let text = toml::to_string_pretty(&Self::default()).map_err(std::io::Error::other)?;
        std::fs::write(path, text)
    }

    /// Convert link settings into an `EngineConfig`.
    pub fn to_engine_config(&self) -> EngineConfig {
        EngineConfig {
            inactivity_timeout: Duration::from_millis(
                self.link.inactivity_timeout_ms.max(MIN_INACTIVITY_TIMEOUT_MS),
            ),
            trigger_command: self.trigger_bytes(),
            max_declared_len: self.link.max_declared_len,
            ..EngineConfig::default()
        }
    }

    /// Convert simulator settings into a `SimConfig` sending `image`.
    pub fn to_sim_config(&self, image: Bytes) -> SimConfig {
        let mut sim = SimConfig::new(image);
        sim.name = self.simulator.name.clone();
        sim.mtu = self.simulator.mtu.max(1);
        sim.fragment_interval = Duration::from_millis(self.simulator.fragment_interval_ms);
        sim.truncate_tail = self.simulator.truncate_tail;
        sim.fail_first_connects = self.simulator.fail_first_connects;
        sim.trigger_command = self.trigger_bytes();
        sim
    }

    fn trigger_bytes(&self) -> Bytes {
        if self.link.trigger_command.is_empty() {
            Bytes::from_static(TRIGGER_COMMAND)
        } else {
            Bytes::from(self.link.trigger_command.clone().into_bytes())
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
