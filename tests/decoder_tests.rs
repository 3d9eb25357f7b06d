//! Integration tests feeding complete SML datagrams through the decoder
//! and checking what becomes visible in the register store.

use sml_bridge_rs::util::hex::hex_to_bytes;
use sml_bridge_rs::{RegisterStore, SmlDecoder};

/// One reading: 1-0:1.8.0 (persistent pair), scaler 0, value 0x1234.
const MSG_ENERGY: &str =
    "1b1b1b1b010101017171717177070100010800ff0101015200531234011b1b1b1b1a0047a7";

/// One reading: 1-0:16.7.0 (transient pair), scaler -1, raw 305 -> 31.
const MSG_POWER: &str =
    "1b1b1b1b010101017171717177070100100700ff01010152ff530131011b1b1b1b1a00b023";

/// Two readings in one datagram: 1-0:1.8.0 = 42 and 1-0:16.7.0 raw 301,
/// scaler -1 -> 30.
const MSG_BOTH: &str = "1b1b1b1b010101017171717277070100010800ff010101520053002a01\
                        77070100100700ff01010152ff5400012d011b1b1b1b1a00c993";

fn feed(decoder: &mut SmlDecoder, store: &mut RegisterStore, hex: &str) {
    for byte in hex_to_bytes(hex) {
        decoder.feed(byte, store);
    }
}

#[test]
fn valid_message_commits_its_reading() {
    let mut decoder = SmlDecoder::new();
    let mut store = RegisterStore::new();

    feed(&mut decoder, &mut store, MSG_ENERGY);

    assert_eq!(decoder.stats().messages_committed, 1);
    assert_eq!(store.read_register(2), 0x0000);
    assert_eq!(store.read_register(3), 0x1234);
}

#[test]
fn scaled_reading_lands_rounded() {
    let mut decoder = SmlDecoder::new();
    let mut store = RegisterStore::new();

    feed(&mut decoder, &mut store, MSG_POWER);

    // 305 with scaler -1 rounds half away from zero to 31.
    assert_eq!(store.read_register(6), 0);
    assert_eq!(store.read_register(7), 31);
}

#[test]
fn corrupted_checksum_discards_the_whole_message() {
    let mut decoder = SmlDecoder::new();
    let mut store = RegisterStore::new();

    let mut bytes = hex_to_bytes(MSG_ENERGY);
    let last = bytes.len() - 1;
    bytes[last] ^= 0x01;
    for byte in bytes {
        decoder.feed(byte, &mut store);
    }

    assert_eq!(decoder.stats().messages_committed, 0);
    assert_eq!(decoder.stats().checksum_failures, 1);
    for index in 2..store.register_count() {
        assert_eq!(store.read_register(index), 0);
    }
}

#[test]
fn corrupted_body_never_commits() {
    let mut decoder = SmlDecoder::new();
    let mut store = RegisterStore::new();

    let mut bytes = hex_to_bytes(MSG_ENERGY);
    // Flip the trailing byte of the OBIS code element.
    bytes[19] ^= 0xFF;
    for byte in bytes {
        decoder.feed(byte, &mut store);
    }

    assert_eq!(decoder.stats().messages_committed, 0);
    assert_eq!(store.read_register(3), 0);
}

#[test]
fn transient_pair_resets_when_absent_from_next_message() {
    let mut decoder = SmlDecoder::new();
    let mut store = RegisterStore::new();

    feed(&mut decoder, &mut store, MSG_POWER);
    assert_eq!(store.read_register(7), 31);

    // The next datagram only carries the energy total.
    feed(&mut decoder, &mut store, MSG_ENERGY);
    assert_eq!(store.read_register(7), 0);
    assert_eq!(store.read_register(3), 0x1234);
}

#[test]
fn persistent_pair_survives_messages_without_it() {
    let mut decoder = SmlDecoder::new();
    let mut store = RegisterStore::new();

    feed(&mut decoder, &mut store, MSG_ENERGY);
    feed(&mut decoder, &mut store, MSG_POWER);

    // 1.8.0 was absent from the second datagram but is persistent.
    assert_eq!(store.read_register(3), 0x1234);
    assert_eq!(store.read_register(7), 31);
}

#[test]
fn one_datagram_with_two_readings() {
    let mut decoder = SmlDecoder::new();
    let mut store = RegisterStore::new();

    feed(&mut decoder, &mut store, MSG_BOTH);

    assert_eq!(decoder.stats().messages_committed, 1);
    assert_eq!(store.read_register(3), 42);
    assert_eq!(store.read_register(7), 30);
}

#[test]
fn garbage_before_a_message_does_not_prevent_decoding() {
    let mut decoder = SmlDecoder::new();
    let mut store = RegisterStore::new();

    for byte in [0x00u8, 0xFF, 0x37, 0x99, 0x42, 0x00] {
        decoder.feed(byte, &mut store);
    }
    feed(&mut decoder, &mut store, MSG_ENERGY);

    assert_eq!(decoder.stats().messages_committed, 1);
    assert_eq!(store.read_register(3), 0x1234);
    assert!(decoder.stats().resyncs > 0);
}

#[test]
fn truncated_message_costs_only_itself() {
    let mut decoder = SmlDecoder::new();
    let mut store = RegisterStore::new();

    // Break off mid-structure, then deliver two full datagrams.
    let bytes = hex_to_bytes(MSG_ENERGY);
    for &byte in &bytes[..20] {
        decoder.feed(byte, &mut store);
    }
    feed(&mut decoder, &mut store, MSG_ENERGY);
    feed(&mut decoder, &mut store, MSG_ENERGY);

    // The first full datagram may be eaten by the torn one's state, the
    // second must commit.
    assert!(decoder.stats().messages_committed >= 1);
    assert_eq!(store.read_register(3), 0x1234);
}
