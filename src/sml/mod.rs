//! # SML Telemetry Decoding
//!
//! Streaming decoder for the meter's push telemetry: SML transport framing
//! (escape-delimited messages), the nested type-length element structure,
//! and the message checksum. Decoded OBIS readings are staged into the
//! shared [`RegisterStore`](crate::registers::RegisterStore) and committed
//! once the message verifies.

pub mod decoder;

pub use decoder::{DecoderStats, SmlDecoder};
