//! # sml-bridge-rs - SML Smart-Meter Telemetry to Modbus RTU
//!
//! The sml-bridge-rs crate connects a utility smart meter's infrared SML
//! push telemetry to a Modbus RTU fieldbus, so that third-party automation
//! (a PLC, a home-automation Modbus integration) can poll cumulative and
//! instantaneous energy values from a meter that only ever transmits.
//!
//! ## Features
//!
//! - Streaming decoder for SML transport framing, nested list structure,
//!   and typed scalar fields, with single-byte resynchronization from any
//!   malformed input
//! - Register store mapping recognized OBIS codes to Modbus input
//!   registers, with atomic commit and a persistence policy per reading
//! - Modbus RTU slave with silence-based frame delimiting, address
//!   filtering, and the Read Input Registers transaction
//! - Shared two-variant CRC-16 engine (Modbus RTU and SML/X.25)
//! - Serial wiring for both lines on `tokio-serial`, driven by one
//!   sequential event loop
//! - Keep-alive/PIN blink sequencer for meters that need periodic optical
//!   "button presses"
//!
//! ## Usage
//!
//! ```no_run
//! use sml_bridge_rs::{init_logger, BridgeConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), sml_bridge_rs::BridgeError> {
//!     init_logger();
//!     let config = BridgeConfig::default();
//!     sml_bridge_rs::bridge::run(&config).await
//! }
//! ```
//!
//! The protocol cores are plain synchronous state machines fed one byte at
//! a time; they can just as well be driven from a custom transport:
//!
//! ```
//! use sml_bridge_rs::Bridge;
//!
//! let mut bridge = Bridge::new(0x09);
//! bridge.on_telemetry_byte(0x1B);
//! if let Some(_response) = bridge.on_fieldbus_byte(0x09, true) {
//!     // transmit after the silent interval
//! }
//! ```

pub mod bridge;
pub mod checksum;
pub mod config;
pub mod constants;
pub mod error;
pub mod keepalive;
pub mod logging;
pub mod modbus;
pub mod registers;
pub mod sml;
pub mod util;

pub use crate::error::BridgeError;
pub use crate::logging::{init_logger, log_info};

// Core bridge types
pub use bridge::Bridge;
pub use checksum::Crc16;
pub use config::{BridgeConfig, SerialSettings};
pub use keepalive::{IndicatorPin, KeepAlive};
pub use modbus::{ModbusSlave, SilenceTimer, SlaveStats};
pub use registers::RegisterStore;
pub use sml::{DecoderStats, SmlDecoder};
