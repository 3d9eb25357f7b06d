//! # Modbus RTU Slave
//!
//! Slave-side implementation of the fieldbus the bridge answers on: silence
//! delimited RTU framing, device address filtering, the single supported
//! Read Input Registers transaction against the shared register store, and
//! checksum-protected responses.

pub mod silence;
pub mod slave;

pub use silence::SilenceTimer;
pub use slave::{ModbusSlave, SlaveStats};
