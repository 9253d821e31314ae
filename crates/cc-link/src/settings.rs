//! Link settings persisted as JSON

use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::time::Duration;

use cc_protocol::{RadioLinkConfig, RegisterEncoder, DEFAULT_CRYSTAL_HZ};
use serde::{Deserialize, Serialize};
use serialport::SerialPort;
use tracing::{debug, info};

use crate::error::LinkError;
use crate::stream::open_serial;
use crate::transport::TransportConfig;

/// Serial device, polling budgets and the radio configuration to apply
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LinkSettings {
    /// Serial device path of the bridge
    pub device: String,
    /// Serial baud rate
    pub baud_rate: u32,
    /// CC1101 crystal frequency
    pub crystal_hz: u32,
    /// Pause between read attempts, in microseconds
    pub poll_interval_us: u64,
    /// Attempt budget while waiting for the INIT acknowledgement
    pub init_attempts: u32,
    /// Attempt budget while waiting for a status reply
    pub status_attempts: u32,
    /// Radio link parameters sent on INIT
    pub radio: RadioLinkConfig,
}

impl Default for LinkSettings {
    fn default() -> Self {
        let transport = TransportConfig::default();
        Self {
            device: "/dev/ttyACM0".to_string(),
            baud_rate: 115_200,
            crystal_hz: DEFAULT_CRYSTAL_HZ,
            poll_interval_us: transport.poll_interval.as_micros() as u64,
            init_attempts: transport.init_attempts,
            status_attempts: transport.status_attempts,
            radio: RadioLinkConfig::default(),
        }
    }
}

impl LinkSettings {
    /// Get the XDG config directory for cclink
    /// Uses $XDG_CONFIG_HOME/cclink, falls back to ~/.config/cclink
    fn config_dir() -> Option<PathBuf> {
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_config);
            if path.is_absolute() {
                return Some(path.join("cclink"));
            }
        }

        dirs::home_dir().map(|h| h.join(".config").join("cclink"))
    }

    /// Default settings file path
    pub fn default_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("settings.json"))
    }

    /// Load settings from `path`
    ///
    /// A missing file yields the defaults; a malformed one is an error.
    pub fn load(path: &Path) -> Result<Self, LinkError> {
        let json = match std::fs::read_to_string(path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No settings at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };

        Ok(serde_json::from_str(&json)?)
    }

    /// Save settings to `path`, creating parent directories
    pub fn save(&self, path: &Path) -> Result<(), LinkError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        info!("Settings saved to {}", path.display());

        Ok(())
    }

    /// Register encoder for the configured crystal
    pub fn encoder(&self) -> Result<RegisterEncoder, LinkError> {
        NonZeroU32::new(self.crystal_hz)
            .map(RegisterEncoder::with_crystal)
            .ok_or_else(|| LinkError::Settings("crystal_hz must be non-zero".to_string()))
    }

    /// Polling budgets for the transport
    pub fn transport_config(&self) -> Result<TransportConfig, LinkError> {
        if self.poll_interval_us == 0 {
            return Err(LinkError::Settings(
                "poll_interval_us must be non-zero".to_string(),
            ));
        }

        Ok(TransportConfig {
            poll_interval: Duration::from_micros(self.poll_interval_us),
            init_attempts: self.init_attempts,
            status_attempts: self.status_attempts,
        })
    }

    /// Open the configured serial device
    pub fn open_port(&self) -> Result<Box<dyn SerialPort>, LinkError> {
        open_serial(&self.device, self.baud_rate)
    }
}
