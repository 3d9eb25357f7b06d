//! # Modbus RTU Slave State Machine
//!
//! Receives the request stream one byte at a time, each byte tagged with the
//! silence flag supplied by the transport. A frame only starts with the
//! configured device address arriving after a quiet gap; everything else on
//! the bus is ignored until the line goes quiet again. The single supported
//! transaction is Read Input Registers (0x04) against the shared register
//! store.
//!
//! The slave never writes to the line itself: a successful dispatch returns
//! the fully framed response and the transport transmits it after honoring
//! the mandatory pre-response silent gap.

use bytes::{BufMut, BytesMut};
use log::{debug, warn};

use crate::checksum::Crc16;
use crate::constants::{
    MODBUS_ADDRESS_HIGH, MODBUS_EXCEPTION_FLAG, MODBUS_EXCEPTION_ILLEGAL_DATA_ADDRESS,
    MODBUS_EXCEPTION_ILLEGAL_FUNCTION, MODBUS_READ_INPUT_REGISTERS, MODBUS_REQUEST_LEN,
};
use crate::registers::RegisterStore;
use crate::util::logging::LogThrottle;

/// Request reception state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecvState {
    /// Not synchronized; waiting for our address after a quiet gap
    Idle,
    /// Address seen; waiting for a supported function code
    AddressMatched,
    /// Accumulating the fixed-length request frame
    Collecting,
}

/// Counters for monitoring the bus side.
#[derive(Debug, Default, Clone, Copy)]
pub struct SlaveStats {
    pub requests_served: u64,
    pub exceptions_sent: u64,
    pub crc_drops: u64,
}

/// The slave state machine for one device address.
#[derive(Debug)]
pub struct ModbusSlave {
    address: u8,
    state: RecvState,
    frame: [u8; MODBUS_REQUEST_LEN],
    received: usize,
    stats: SlaveStats,
    throttle: LogThrottle,
}

impl ModbusSlave {
    pub fn new(address: u8) -> Self {
        ModbusSlave {
            address,
            state: RecvState::Idle,
            frame: [0; MODBUS_REQUEST_LEN],
            received: 0,
            stats: SlaveStats::default(),
            throttle: LogThrottle::new(1000, 5),
        }
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn stats(&self) -> SlaveStats {
        self.stats
    }

    /// Advances the machine by one received byte. `quiet` reports whether at
    /// least the silent interval elapsed before this byte.
    ///
    /// Returns the framed response to transmit, if this byte completed a
    /// valid request. The caller must wait out the silent interval before
    /// putting the response on the line.
    pub fn on_byte(
        &mut self,
        byte: u8,
        quiet: bool,
        store: &RegisterStore,
    ) -> Option<BytesMut> {
        if quiet {
            // A quiet gap starts a new frame no matter what preceded it.
            self.state = if byte == self.address {
                RecvState::AddressMatched
            } else {
                RecvState::Idle
            };
            return None;
        }

        match self.state {
            RecvState::Idle => None,
            RecvState::AddressMatched => {
                if byte == MODBUS_READ_INPUT_REGISTERS {
                    self.state = RecvState::Collecting;
                    self.frame[0] = byte;
                    self.received = 1;
                } else {
                    self.state = RecvState::Idle;
                }
                None
            }
            RecvState::Collecting => {
                self.frame[self.received] = byte;
                self.received += 1;
                if self.received < MODBUS_REQUEST_LEN {
                    return None;
                }
                self.state = RecvState::Idle;
                if self.frame_crc_good() {
                    self.dispatch(store)
                } else {
                    self.stats.crc_drops += 1;
                    if self.throttle.allow() {
                        warn!("Modbus request CRC mismatch, frame dropped");
                    }
                    None
                }
            }
        }
    }

    /// Verifies the request CRC. The checksum covers the device address and
    /// the frame body up to the two trailing CRC bytes, low byte first.
    fn frame_crc_good(&self) -> bool {
        let mut crc = Crc16::modbus();
        crc.feed(self.address);
        crc.feed_slice(&self.frame[..MODBUS_REQUEST_LEN - 2]);
        self.frame[MODBUS_REQUEST_LEN - 2] == crc.low_byte()
            && self.frame[MODBUS_REQUEST_LEN - 1] == crc.high_byte()
    }

    /// Executes a checksum-verified request. Only Read Input Registers is
    /// implemented; everything else earns an illegal-function exception.
    fn dispatch(&mut self, store: &RegisterStore) -> Option<BytesMut> {
        let function = self.frame[0];
        if function != MODBUS_READ_INPUT_REGISTERS {
            return Some(self.exception_response(function, MODBUS_EXCEPTION_ILLEGAL_FUNCTION));
        }
        match self.read_input_registers(store) {
            Ok(response) => {
                self.stats.requests_served += 1;
                Some(response)
            }
            Err(code) => Some(self.exception_response(function, code)),
        }
    }

    /// Validates and serves a Read Input Registers request.
    fn read_input_registers(&mut self, store: &RegisterStore) -> Result<BytesMut, u8> {
        let start = self.frame[2] as usize;
        let count = self.frame[4] as usize;
        let available = store.register_count();

        if self.frame[1] != MODBUS_ADDRESS_HIGH
            || self.frame[3] != 0x00
            || start >= available
            || count == 0
            || count > available
            || start + count > available
        {
            return Err(MODBUS_EXCEPTION_ILLEGAL_DATA_ADDRESS);
        }

        debug!(
            "Read Input Registers: start={}, count={}",
            start, count
        );

        let mut response = BytesMut::with_capacity(5 + 2 * count);
        let mut crc = Crc16::modbus();
        let mut put = |buf: &mut BytesMut, byte: u8| {
            buf.put_u8(byte);
            crc.feed(byte);
        };

        put(&mut response, self.address);
        put(&mut response, MODBUS_READ_INPUT_REGISTERS);
        put(&mut response, (count << 1) as u8);
        for index in start..start + count {
            let value = store.read_register(index);
            put(&mut response, (value >> 8) as u8);
            put(&mut response, value as u8);
        }
        response.put_u8(crc.low_byte());
        response.put_u8(crc.high_byte());
        Ok(response)
    }

    /// Builds an exception response for the given request function code.
    fn exception_response(&mut self, function: u8, code: u8) -> BytesMut {
        self.stats.exceptions_sent += 1;
        debug!("Modbus exception {:#04X} for function {:#04X}", code, function);

        let mut response = BytesMut::with_capacity(5);
        let mut crc = Crc16::modbus();
        for byte in [self.address, function | MODBUS_EXCEPTION_FLAG, code] {
            response.put_u8(byte);
            crc.feed(byte);
        }
        response.put_u8(crc.low_byte());
        response.put_u8(crc.high_byte());
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_frame(slave: &mut ModbusSlave, store: &RegisterStore, frame: &[u8]) -> Option<BytesMut> {
        let mut response = None;
        for (i, &byte) in frame.iter().enumerate() {
            response = slave.on_byte(byte, i == 0, store);
        }
        response
    }

    fn request_with_crc(address: u8, body: &[u8; 5]) -> Vec<u8> {
        let mut crc = Crc16::modbus();
        crc.feed(address);
        crc.feed_slice(body);
        let mut frame = vec![address];
        frame.extend_from_slice(body);
        frame.push(crc.low_byte());
        frame.push(crc.high_byte());
        frame
    }

    #[test]
    fn foreign_address_never_reaches_dispatch() {
        let mut slave = ModbusSlave::new(0x09);
        let store = RegisterStore::new();
        let frame = request_with_crc(0x0A, &[0x04, 0x01, 0x00, 0x00, 0x03]);
        assert!(feed_frame(&mut slave, &store, &frame).is_none());
        assert_eq!(slave.stats().requests_served, 0);
        assert_eq!(slave.stats().exceptions_sent, 0);
    }

    #[test]
    fn unsupported_function_returns_to_idle_silently() {
        let mut slave = ModbusSlave::new(0x09);
        let store = RegisterStore::new();
        // Function 0x03 after an address match: no response, back to idle.
        assert!(slave.on_byte(0x09, true, &store).is_none());
        assert!(slave.on_byte(0x03, false, &store).is_none());
        for byte in [0x01, 0x00, 0x00, 0x03, 0x00, 0x00] {
            assert!(slave.on_byte(byte, false, &store).is_none());
        }
    }

    #[test]
    fn corrupted_crc_drops_frame() {
        let mut slave = ModbusSlave::new(0x09);
        let store = RegisterStore::new();
        let mut frame = request_with_crc(0x09, &[0x04, 0x01, 0x00, 0x00, 0x03]);
        let last = frame.len() - 1;
        frame[last] ^= 0xFF;
        assert!(feed_frame(&mut slave, &store, &frame).is_none());
        assert_eq!(slave.stats().crc_drops, 1);
    }

    #[test]
    fn mid_frame_address_byte_is_not_a_frame_start() {
        let mut slave = ModbusSlave::new(0x09);
        let store = RegisterStore::new();
        // Our address inside another station's traffic, without silence.
        assert!(slave.on_byte(0x09, false, &store).is_none());
        assert!(slave.on_byte(0x04, false, &store).is_none());
        assert_eq!(slave.stats().requests_served, 0);
    }

    #[test]
    fn valid_read_produces_response() {
        let mut slave = ModbusSlave::new(0x09);
        let store = RegisterStore::new();
        let frame = request_with_crc(0x09, &[0x04, 0x01, 0x00, 0x00, 0x02]);
        let response = feed_frame(&mut slave, &store, &frame).expect("response");
        assert_eq!(response[0], 0x09);
        assert_eq!(response[1], 0x04);
        assert_eq!(response[2], 0x04);
        assert_eq!(slave.stats().requests_served, 1);
    }

    #[test]
    fn zero_count_is_an_illegal_address() {
        let mut slave = ModbusSlave::new(0x09);
        let store = RegisterStore::new();
        let frame = request_with_crc(0x09, &[0x04, 0x01, 0x00, 0x00, 0x00]);
        let response = feed_frame(&mut slave, &store, &frame).expect("exception");
        assert_eq!(response[1], 0x84);
        assert_eq!(response[2], MODBUS_EXCEPTION_ILLEGAL_DATA_ADDRESS);
    }

    #[test]
    fn wrong_address_high_byte_is_rejected() {
        let mut slave = ModbusSlave::new(0x09);
        let store = RegisterStore::new();
        let frame = request_with_crc(0x09, &[0x04, 0x00, 0x00, 0x00, 0x03]);
        let response = feed_frame(&mut slave, &store, &frame).expect("exception");
        assert_eq!(response[1], 0x84);
        assert_eq!(response[2], MODBUS_EXCEPTION_ILLEGAL_DATA_ADDRESS);
    }

    #[test]
    fn tail_past_register_bank_is_rejected() {
        let mut slave = ModbusSlave::new(0x09);
        let store = RegisterStore::new();
        // start 6, count 3 exceeds the 8-register bank.
        let frame = request_with_crc(0x09, &[0x04, 0x01, 0x06, 0x00, 0x03]);
        let response = feed_frame(&mut slave, &store, &frame).expect("exception");
        assert_eq!(response[2], MODBUS_EXCEPTION_ILLEGAL_DATA_ADDRESS);
    }
}
