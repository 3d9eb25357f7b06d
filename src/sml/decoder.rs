//! # SML Stream Decoder
//!
//! Byte-at-a-time state machine for the meter's SML telemetry. The decoder
//! recognizes the escape-delimited message framing, walks the nested list
//! structure, assembles typed scalar fields, and keeps a running X.25
//! checksum over the stream. On a verified end of message the staged OBIS
//! readings are committed to the register store; on a checksum mismatch they
//! are discarded.
//!
//! The machine is built to survive arbitrary input: every byte either takes
//! a valid transition or forces a full reset within that same byte, so a
//! torn or corrupted stream costs at most one message and never wedges the
//! decoder.

use log::{debug, warn};

use crate::checksum::Crc16;
use crate::constants::{
    SML_BEGIN, SML_ELEMENT_BUF_LEN, SML_END, SML_ESCAPE, SML_LENGTH_MASK, SML_MAX_FILL_BYTES,
    SML_MAX_NESTING, SML_OBIS_LEVEL, SML_SCALER_POSITION, SML_TYPE_BOOLEAN, SML_TYPE_INTEGER,
    SML_TYPE_LIST, SML_TYPE_MASK, SML_TYPE_OCTET_STRING, SML_TYPE_UNSIGNED, SML_VALUE_POSITION,
};
use crate::registers::RegisterStore;
use crate::util::logging::LogThrottle;

/// Byte-stream framing state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SyncState {
    /// Counting leading escape bytes (0..=3 seen so far)
    Escape(u8),
    /// Four escapes seen; the next byte selects the begin or end path
    Delimiter,
    /// Counting begin-marker bytes (1..=3 seen so far)
    Begin(u8),
    /// End marker seen; the next byte is the trailer fill count
    Fill,
    /// Inside the message structure or its checksum trailer
    Payload,
}

/// Counters for monitoring a long-running telemetry link.
#[derive(Debug, Default, Clone, Copy)]
pub struct DecoderStats {
    pub messages_committed: u64,
    pub checksum_failures: u64,
    pub resyncs: u64,
}

/// Streaming SML decoder. Feed it one received byte at a time together with
/// the register store it stages into.
#[derive(Debug)]
pub struct SmlDecoder {
    state: SyncState,
    /// Content bytes still expected for the element being assembled
    element_remaining: u8,
    /// Bytes still expected of the 2-byte checksum trailer
    trailer_remaining: u8,
    /// Type tag of the element being assembled
    element_type: u8,
    buf: [u8; SML_ELEMENT_BUF_LEN],
    len: usize,
    /// Scale factor for the next value in the current per-reading list
    scaler: i8,
    level: usize,
    open: [u8; SML_MAX_NESTING],
    read: [u8; SML_MAX_NESTING],
    /// Checksum snapshot taken right before the trailer bytes
    msg_crc_low: u8,
    msg_crc_high: u8,
    crc: Crc16,
    stats: DecoderStats,
    throttle: LogThrottle,
}

impl SmlDecoder {
    pub fn new() -> Self {
        SmlDecoder {
            state: SyncState::Escape(0),
            element_remaining: 0,
            trailer_remaining: 0,
            element_type: 0,
            buf: [0; SML_ELEMENT_BUF_LEN],
            len: 0,
            scaler: 0,
            level: 0,
            open: [0; SML_MAX_NESTING],
            read: [0; SML_MAX_NESTING],
            msg_crc_low: 0,
            msg_crc_high: 0,
            crc: Crc16::x25(),
            stats: DecoderStats::default(),
            throttle: LogThrottle::new(1000, 5),
        }
    }

    /// Returns the decoder to the seeking-start state and discards any
    /// values staged in the store by the current message.
    pub fn reset(&mut self, store: &mut RegisterStore) {
        self.state = SyncState::Escape(0);
        self.element_remaining = 0;
        self.trailer_remaining = 0;
        self.element_type = 0;
        self.len = 0;
        self.scaler = 0;
        self.level = 0;
        self.crc.reset();
        store.reset();
    }

    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    /// Advances the machine by one received byte.
    pub fn feed(&mut self, byte: u8, store: &mut RegisterStore) {
        let entry_state = self.state;

        // The trailer bytes carry the checksum itself and are not part of it.
        if self.trailer_remaining == 0 {
            self.crc.feed(byte);
        }

        if self.element_remaining > 0 {
            if self.len >= SML_ELEMENT_BUF_LEN {
                self.resync(store);
                return;
            }
            self.buf[self.len] = byte;
            self.len += 1;
            self.element_remaining -= 1;
            if self.element_remaining == 0 {
                self.on_element(store);
                self.maybe_leave_level(store);
            }
            return;
        }

        if self.trailer_remaining > 0 {
            if self.len >= SML_ELEMENT_BUF_LEN {
                self.resync(store);
                return;
            }
            self.buf[self.len] = byte;
            self.len += 1;
            self.trailer_remaining -= 1;
            if self.trailer_remaining == 0 {
                self.on_end_of_message(store);
            }
            return;
        }

        match self.state {
            SyncState::Escape(seen) => {
                if byte == SML_ESCAPE {
                    self.state = if seen == 3 {
                        SyncState::Delimiter
                    } else {
                        SyncState::Escape(seen + 1)
                    };
                }
            }
            SyncState::Delimiter => {
                if byte == SML_BEGIN {
                    self.state = SyncState::Begin(1);
                } else if byte == SML_END {
                    self.state = SyncState::Fill;
                }
            }
            SyncState::Begin(seen) => {
                if byte == SML_BEGIN {
                    if seen == 3 {
                        debug!("SML begin of message");
                        self.state = SyncState::Payload;
                    } else {
                        self.state = SyncState::Begin(seen + 1);
                    }
                }
            }
            SyncState::Fill => {
                if byte <= SML_MAX_FILL_BYTES {
                    self.trailer_remaining = 2;
                    self.len = 0;
                    self.msg_crc_low = self.crc.low_byte();
                    self.msg_crc_high = self.crc.high_byte();
                    self.state = SyncState::Payload;
                }
            }
            SyncState::Payload => self.on_structural(byte, store),
        }

        // A byte that took no valid transition outside the payload desyncs
        // the stream; recover immediately instead of waiting for a pattern
        // that may never come.
        if self.state == entry_state && self.state != SyncState::Payload {
            self.resync(store);
        }
    }

    /// Handles one structural byte inside the message: a list header, an
    /// end-of-list marker, the start of the closing escape run, or the
    /// type-length byte of a scalar element.
    fn on_structural(&mut self, byte: u8, store: &mut RegisterStore) {
        self.element_type = byte & SML_TYPE_MASK;
        self.len = 0;

        if self.element_type == SML_TYPE_LIST {
            let children = byte & SML_LENGTH_MASK;
            if children == 0 {
                // An empty list still counts as one child of its parent.
                self.maybe_leave_level(store);
            } else if self.level < SML_MAX_NESTING - 1 {
                self.level += 1;
                self.open[self.level] = children;
                self.read[self.level] = 0;
            } else {
                self.resync(store);
            }
        } else if byte == SML_ESCAPE {
            self.state = SyncState::Escape(1);
        } else if byte == 0x00 {
            // Explicit end-of-list marker, sent as the last list element.
            self.maybe_leave_level(store);
        } else if matches!(
            self.element_type,
            SML_TYPE_OCTET_STRING | SML_TYPE_BOOLEAN | SML_TYPE_INTEGER | SML_TYPE_UNSIGNED
        ) {
            // The low nibble counts the type byte itself.
            let field_len = byte & SML_LENGTH_MASK;
            if field_len == 0 {
                self.resync(store);
                return;
            }
            self.element_remaining = field_len - 1;
            if self.element_remaining == 0 {
                self.on_element(store);
                self.maybe_leave_level(store);
            }
        } else {
            self.resync(store);
        }
    }

    /// Dispatches a completed element to its type handler.
    fn on_element(&mut self, store: &mut RegisterStore) {
        match self.element_type {
            SML_TYPE_OCTET_STRING => self.on_octet_string(store),
            SML_TYPE_INTEGER => self.on_integer(store),
            // Booleans and unsigneds are consumed structurally; all the
            // measurements of interest are signed integers.
            _ => {}
        }
    }

    /// An octet string heading a per-reading list is a candidate OBIS code.
    fn on_octet_string(&mut self, store: &mut RegisterStore) {
        if self.level == SML_OBIS_LEVEL && self.read[self.level] == 0 {
            store.present_code(&self.buf[..self.len]);
        }
    }

    /// Integers at the scaler and value positions of a per-reading list
    /// carry the measurement; everything else is ignored.
    fn on_integer(&mut self, store: &mut RegisterStore) {
        if self.level != SML_OBIS_LEVEL {
            return;
        }
        let position = self.read[self.level];
        if position == SML_SCALER_POSITION && self.len == 1 {
            self.scaler = self.buf[0] as i8;
        } else if position == SML_VALUE_POSITION {
            let mut value: i64 = if self.buf[0] >= 0x80 { -1 } else { 0 };
            for &byte in &self.buf[..self.len] {
                value = value.wrapping_shl(8).wrapping_add(i64::from(byte));
            }
            let scaled = to_scale(value, self.scaler);
            self.scaler = 0;
            store.present_value(i64::from(scaled));
        }
    }

    /// Counts a completed child on the current level and closes every level
    /// that is now complete, propagating upward.
    fn maybe_leave_level(&mut self, store: &mut RegisterStore) {
        while self.level > 0 {
            self.read[self.level] += 1;
            if self.read[self.level] == self.open[self.level] {
                self.leave_level(store);
            } else {
                break;
            }
        }
    }

    /// Closes the current list level. Leaving the OBIS level clears any
    /// pending code detection so it cannot leak into the next reading.
    fn leave_level(&mut self, store: &mut RegisterStore) {
        if self.level > 0 {
            if self.level == SML_OBIS_LEVEL {
                store.present_code(&[]);
            }
            self.level -= 1;
        }
    }

    /// Compares the snapshot checksum against the trailer and either commits
    /// or discards the staged readings, then starts fresh for the next
    /// message.
    fn on_end_of_message(&mut self, store: &mut RegisterStore) {
        if self.msg_crc_low == self.buf[0] && self.msg_crc_high == self.buf[1] {
            debug!("SML message checksum good, committing");
            self.stats.messages_committed += 1;
            store.commit();
        } else {
            if self.throttle.allow() {
                warn!(
                    "SML message checksum mismatch: expected {:02X} {:02X}, got {:02X} {:02X}",
                    self.msg_crc_low, self.msg_crc_high, self.buf[0], self.buf[1]
                );
            }
            self.stats.checksum_failures += 1;
            store.reset();
        }
        self.reset(store);
    }

    fn resync(&mut self, store: &mut RegisterStore) {
        self.stats.resyncs += 1;
        self.reset(store);
    }
}

impl Default for SmlDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Applies a decimal scale factor to a raw reading and truncates to 32 bits.
/// Negative scalers divide by ten per step, rounding the final digit half
/// away from zero.
fn to_scale(mut value: i64, mut scaler: i8) -> i32 {
    while scaler > 0 {
        value = value.wrapping_mul(10);
        scaler -= 1;
    }
    let mut remainder: i64 = 0;
    while scaler < 0 {
        remainder = value % 10;
        value /= 10;
        scaler += 1;
    }
    if value >= 0 && remainder >= 5 {
        value += 1;
    } else if value <= 0 && remainder <= -5 {
        value -= 1;
    }
    value as i32
}
