//! # Utility Modules
//!
//! Common helpers used throughout the crate: hex encoding/decoding for
//! logging and test data, and rate-limited logging for noisy protocol
//! paths.

pub mod hex;
pub mod logging;

pub use hex::{decode_hex, encode_hex, format_hex_compact, hex_to_bytes};
pub use logging::{log_frame_hex, LogThrottle};
