//! # Bridge Error Handling
//!
//! This module defines the BridgeError enum for the ambient layer of the
//! crate: serial transport, configuration, and wiring. The protocol state
//! machines themselves never surface errors; malformed input makes them
//! resynchronize instead.

use thiserror::Error;

/// Represents the different error types that can occur in the bridge.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Indicates an error related to the serial port communication.
    #[error("Serial port error: {0}")]
    SerialPortError(String),

    /// Indicates an I/O error on an open transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Indicates a malformed or unreadable configuration file.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Indicates a transport reader task went away.
    #[error("Transport channel closed")]
    ChannelClosed,
}
