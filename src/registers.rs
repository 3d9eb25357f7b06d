//! # OBIS Register Store
//!
//! The shared data model between the SML decoder and the Modbus slave: a
//! small bank of 16-bit input registers holding the last committed value for
//! each recognized OBIS code, plus a write-side staging area so a partially
//! decoded message is never visible to the Modbus side.
//!
//! The decoder presents candidate OBIS codes and values while walking a
//! message; nothing reaches the live registers until [`RegisterStore::commit`]
//! runs after the message checksum has been verified. A failed checksum
//! discards the staging area via [`RegisterStore::reset`] instead.

use log::{debug, trace};

/// Length of a binary OBIS code without the trailing 0xFF
pub const OBIS_CODE_LEN: usize = 5;

/// Recognized OBIS codes, in register order. Each code occupies one register
/// pair (high word first).
pub const KNOWN_OBIS_CODES: [[u8; OBIS_CODE_LEN]; 3] = [
    [0x01, 0x00, 0x01, 0x08, 0x00], // 1-0:1.8.0  Positive active energy (A+) total [kWh]
    [0x01, 0x00, 0x02, 0x08, 0x00], // 1-0:2.8.0  Negative active energy (A-) total [kWh]
    [0x01, 0x00, 0x10, 0x07, 0x00], // 1-0:16.7.0 Sum active instantaneous power (A+ - A-) [kW]
];

/// Number of value registers (one pair per recognized code)
pub const OBIS_REGISTER_COUNT: usize = KNOWN_OBIS_CODES.len() * 2;

/// Registers below this index keep their last committed value when a message
/// does not carry their code; registers at or beyond it are zeroed instead.
/// The cumulative energy totals persist, the instantaneous power does not.
pub const PERSISTENT_REGISTER_COUNT: usize = 4;

/// Build identifier exposed through the two leading registers
pub const VERSION: u32 = 2025071501;

/// Register bank shared by the telemetry decoder (writer) and the Modbus
/// slave (reader).
#[derive(Debug)]
pub struct RegisterStore {
    detected: Option<usize>,
    live: [u16; OBIS_REGISTER_COUNT],
    staged: [u16; OBIS_REGISTER_COUNT],
    staged_set: [bool; OBIS_REGISTER_COUNT],
}

impl RegisterStore {
    pub fn new() -> Self {
        RegisterStore {
            detected: None,
            live: [0; OBIS_REGISTER_COUNT],
            staged: [0; OBIS_REGISTER_COUNT],
            staged_set: [false; OBIS_REGISTER_COUNT],
        }
    }

    /// Discards the staging flags and any pending code detection. Live
    /// registers are left untouched; they only change through
    /// [`RegisterStore::commit`].
    pub fn reset(&mut self) {
        self.detected = None;
        self.staged_set = [false; OBIS_REGISTER_COUNT];
    }

    /// Presents a binary OBIS code as received from the meter, e.g.
    /// `01 00 01 08 00 FF` for 1-0:1.8.0. A recognized code arms the store
    /// for the value that follows it. An empty slice, a length other than
    /// code-plus-0xFF, or an unrecognized code clears the detection.
    pub fn present_code(&mut self, bytes: &[u8]) {
        self.detected = None;
        if bytes.len() == OBIS_CODE_LEN + 1 && bytes[OBIS_CODE_LEN] == 0xFF {
            for (index, code) in KNOWN_OBIS_CODES.iter().enumerate() {
                if *code == bytes[..OBIS_CODE_LEN] {
                    trace!("OBIS code {} detected", index);
                    self.detected = Some(index);
                    break;
                }
            }
        }
    }

    /// Stages a scaled value for the most recently detected code, splitting
    /// it into the pair's high and low words. Without a prior detection this
    /// is a no-op. Each detection accepts exactly one value.
    pub fn present_value(&mut self, value: i64) {
        if let Some(code) = self.detected.take() {
            let words = value as u32;
            let rr = code * 2;
            self.staged[rr] = (words >> 16) as u16;
            self.staged_set[rr] = true;
            self.staged[rr + 1] = words as u16;
            self.staged_set[rr + 1] = true;
        }
    }

    /// Promotes staged values to the live registers. Register pairs that
    /// were not staged this cycle keep their value if persistent and drop to
    /// zero if transient, so a stale instantaneous reading never outlives
    /// the message that carried it.
    pub fn commit(&mut self) {
        for rr in 0..OBIS_REGISTER_COUNT {
            if self.staged_set[rr] {
                self.staged_set[rr] = false;
                self.live[rr] = self.staged[rr];
            } else if rr >= PERSISTENT_REGISTER_COUNT {
                self.live[rr] = 0;
            }
        }
        self.detected = None;
        debug!("register store committed: {:04X?}", self.live);
    }

    /// Total number of readable registers: two version words plus the value
    /// registers.
    pub fn register_count(&self) -> usize {
        2 + OBIS_REGISTER_COUNT
    }

    /// Reads a live register. Indices 0 and 1 expose the build version, the
    /// remainder map to the value registers (high word at the lower index).
    ///
    /// The index must be below [`RegisterStore::register_count`]; the Modbus
    /// slave validates request ranges before reading, so an out-of-range
    /// index here is a caller bug.
    pub fn read_register(&self, index: usize) -> u16 {
        match index {
            0 => (VERSION >> 16) as u16,
            1 => VERSION as u16,
            _ => self.live[index - 2],
        }
    }
}

impl Default for RegisterStore {
    fn default() -> Self {
        Self::new()
    }
}
