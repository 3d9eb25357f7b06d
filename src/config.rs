//! # Bridge Configuration
//!
//! Serial ports, baud rates, the Modbus device address, and the meter PIN
//! live outside the protocol cores. They load from a small JSON file and
//! fall back to defaults matching the reference deployment; the CLI can
//! override individual fields.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::BridgeError;

/// Settings for one serial line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialSettings {
    pub port: String,
    pub baudrate: u32,
}

impl Default for SerialSettings {
    fn default() -> Self {
        SerialSettings {
            port: "/dev/ttyUSB0".to_string(),
            baudrate: 9600,
        }
    }
}

/// Top-level bridge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Infrared receiver carrying the meter's telemetry (8N1)
    pub telemetry: SerialSettings,
    /// RS-485 line the Modbus master polls on (8N2)
    pub fieldbus: SerialSettings,
    /// Modbus slave address this bridge answers to
    pub device_address: u8,
    /// PIN flashed at the meter by the keep-alive sequencer; empty disables
    /// PIN entry
    pub meter_pin: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        BridgeConfig {
            telemetry: SerialSettings {
                port: "/dev/ttyUSB0".to_string(),
                baudrate: 9600,
            },
            fieldbus: SerialSettings {
                port: "/dev/ttyUSB1".to_string(),
                baudrate: 9600,
            },
            device_address: 0x09,
            meter_pin: String::new(),
        }
    }
}

impl BridgeConfig {
    /// Loads a configuration from a JSON file. Missing fields take their
    /// defaults.
    pub fn load(path: &Path) -> Result<Self, BridgeError> {
        let text = fs::read_to_string(path)
            .map_err(|e| BridgeError::ConfigError(format!("{}: {e}", path.display())))?;
        serde_json::from_str(&text)
            .map_err(|e| BridgeError::ConfigError(format!("{}: {e}", path.display())))
    }
}
