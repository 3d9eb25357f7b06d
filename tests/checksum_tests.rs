//! Integration tests for the two CRC-16 configurations shared by the
//! fieldbus and telemetry sides.

use sml_bridge_rs::Crc16;

#[test]
fn modbus_variant_known_request_frame() {
    // Address 0x09, Read Input Registers, start 0x0100, count 3.
    let mut crc = Crc16::modbus();
    crc.feed_slice(&[0x09, 0x04, 0x01, 0x00, 0x00, 0x03]);
    assert_eq!(crc.low_byte(), 0xB0);
    assert_eq!(crc.high_byte(), 0xBF);
}

#[test]
fn modbus_variant_known_exception_frame() {
    let mut crc = Crc16::modbus();
    crc.feed_slice(&[0x09, 0x84, 0x02]);
    assert_eq!(crc.low_byte(), 0x43);
    assert_eq!(crc.high_byte(), 0x03);
}

#[test]
fn variants_differ_on_same_input() {
    let mut a = Crc16::modbus();
    let mut b = Crc16::x25();
    a.feed_slice(b"123456789");
    b.feed_slice(b"123456789");
    assert_eq!(a.value(), 0x4B37);
    assert_eq!(b.value(), 0x906E);
}

#[test]
fn reset_is_equivalent_to_a_fresh_engine() {
    let mut reused = Crc16::x25();
    reused.feed_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
    reused.reset();
    reused.feed_slice(b"123456789");

    let mut fresh = Crc16::x25();
    fresh.feed_slice(b"123456789");

    assert_eq!(reused.value(), fresh.value());
}

#[test]
fn byte_order_matters() {
    let mut ab = Crc16::modbus();
    ab.feed(0x01);
    ab.feed(0x02);
    let mut ba = Crc16::modbus();
    ba.feed(0x02);
    ba.feed(0x01);
    assert_ne!(ab.value(), ba.value());
}
