//! Protocol Constants
//!
//! This module defines the constants used by the SML telemetry decoder and
//! the Modbus RTU slave, based on the SML transport layer (push telemetry
//! from the meter's infrared Info-DSS interface) and the Modbus Serial Line
//! Protocol guide.

/// SML transport escape byte; four in a row open an escape sequence
pub const SML_ESCAPE: u8 = 0x1B;

/// SML begin-of-message marker byte; four after the escape run start a message
pub const SML_BEGIN: u8 = 0x01;

/// SML end-of-message marker byte, follows the trailing escape run
pub const SML_END: u8 = 0x1A;

/// Type tag mask (high nibble of an SML type-length byte)
pub const SML_TYPE_MASK: u8 = 0xF0;

/// Length mask (low nibble of an SML type-length byte)
pub const SML_LENGTH_MASK: u8 = 0x0F;

/// Type tag for octet strings
pub const SML_TYPE_OCTET_STRING: u8 = 0x00;

/// Type tag for booleans
pub const SML_TYPE_BOOLEAN: u8 = 0x40;

/// Type tag for signed integers
pub const SML_TYPE_INTEGER: u8 = 0x50;

/// Type tag for unsigned integers
pub const SML_TYPE_UNSIGNED: u8 = 0x60;

/// Type tag for lists
pub const SML_TYPE_LIST: u8 = 0x70;

/// Maximum nesting depth of SML lists the decoder tracks
pub const SML_MAX_NESTING: usize = 9;

/// Capacity of the element assembly buffer
pub const SML_ELEMENT_BUF_LEN: usize = 16;

/// Nesting level at which per-reading lists carry OBIS codes
pub const SML_OBIS_LEVEL: usize = 5;

/// Child position of the scale factor within a per-reading list
pub const SML_SCALER_POSITION: u8 = 4;

/// Child position of the measurement value within a per-reading list
pub const SML_VALUE_POSITION: u8 = 5;

/// Largest fill count accepted in the end-of-message trailer
pub const SML_MAX_FILL_BYTES: u8 = 0x03;

// ----------------------------------------------------------------------------
// Modbus RTU (slave side)
// ----------------------------------------------------------------------------

/// Read Input Registers, the single supported function code
pub const MODBUS_READ_INPUT_REGISTERS: u8 = 0x04;

/// Flag OR-ed onto the function code of an exception response
pub const MODBUS_EXCEPTION_FLAG: u8 = 0x80;

/// Exception code: illegal function
pub const MODBUS_EXCEPTION_ILLEGAL_FUNCTION: u8 = 0x01;

/// Exception code: illegal data address
pub const MODBUS_EXCEPTION_ILLEGAL_DATA_ADDRESS: u8 = 0x02;

/// Expected high byte of the register start address. The register bank is
/// exposed at Modbus addresses 256 and up.
pub const MODBUS_ADDRESS_HIGH: u8 = 0x01;

/// Request frame length after the address byte: function code, four
/// parameter bytes, two CRC bytes
pub const MODBUS_REQUEST_LEN: usize = 7;

/// Modbus RTU silent interval in microseconds. 3.5 character times; above
/// 19200 Bd the guide fixes this at 1750 us independent of the baud rate.
pub const MODBUS_SILENT_INTERVAL_MICROS: u64 = 1752;
