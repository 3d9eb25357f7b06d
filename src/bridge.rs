//! # Bridge Wiring
//!
//! Owns the three core pieces (register store, SML decoder, Modbus slave)
//! and drives them from the two serial lines. Both byte streams funnel
//! through one event loop, so the two state machines always run strictly
//! sequentially and the register store needs no locking: the decoder is its
//! only writer and the slave its only reader.

use std::time::Instant;

use bytes::BytesMut;
use log::{error, info};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_serial::SerialPortBuilderExt;

use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::modbus::{ModbusSlave, SilenceTimer, SlaveStats};
use crate::registers::RegisterStore;
use crate::sml::{DecoderStats, SmlDecoder};
use crate::util::logging::log_frame_hex;

/// The assembled bridge core: one store, one decoder, one slave.
#[derive(Debug)]
pub struct Bridge {
    store: RegisterStore,
    decoder: SmlDecoder,
    slave: ModbusSlave,
    silence: SilenceTimer,
}

impl Bridge {
    pub fn new(device_address: u8) -> Self {
        Bridge {
            store: RegisterStore::new(),
            decoder: SmlDecoder::new(),
            slave: ModbusSlave::new(device_address),
            silence: SilenceTimer::new(),
        }
    }

    /// Feeds one byte from the meter's telemetry stream.
    pub fn on_telemetry_byte(&mut self, byte: u8) {
        self.decoder.feed(byte, &mut self.store);
    }

    /// Feeds one byte from the fieldbus, timestamped at reception. The
    /// silence flag is derived from the gap since the previous byte.
    /// Returns a response frame to transmit after the silent interval.
    pub fn on_fieldbus_byte_at(&mut self, byte: u8, at: Instant) -> Option<BytesMut> {
        let quiet = self.silence.is_quiet_at(at);
        self.silence.mark_byte_at(at);
        self.slave.on_byte(byte, quiet, &self.store)
    }

    /// Fieldbus entry point for transports that compute the silence flag
    /// themselves.
    pub fn on_fieldbus_byte(&mut self, byte: u8, quiet: bool) -> Option<BytesMut> {
        self.slave.on_byte(byte, quiet, &self.store)
    }

    /// Read-side view of the register bank.
    pub fn registers(&self) -> &RegisterStore {
        &self.store
    }

    pub fn decoder_stats(&self) -> DecoderStats {
        self.decoder.stats()
    }

    pub fn slave_stats(&self) -> SlaveStats {
        self.slave.stats()
    }
}

/// One unit of work for the sequential event loop.
enum Event {
    Telemetry(u8),
    Fieldbus(u8, Instant),
}

/// Opens both serial ports and runs the bridge until a transport fails.
///
/// The telemetry line is 8N1. The fieldbus line is 8N2: Modbus RTU requires
/// 11-bit characters, and with no parity bit that means two stop bits --
/// several master implementations refuse to talk otherwise.
pub async fn run(config: &BridgeConfig) -> Result<(), BridgeError> {
    let telemetry_port = tokio_serial::new(&config.telemetry.port, config.telemetry.baudrate)
        .data_bits(tokio_serial::DataBits::Eight)
        .stop_bits(tokio_serial::StopBits::One)
        .parity(tokio_serial::Parity::None)
        .open_native_async()
        .map_err(|e| BridgeError::SerialPortError(format!("{}: {e}", config.telemetry.port)))?;

    let fieldbus_port = tokio_serial::new(&config.fieldbus.port, config.fieldbus.baudrate)
        .data_bits(tokio_serial::DataBits::Eight)
        .stop_bits(tokio_serial::StopBits::Two)
        .parity(tokio_serial::Parity::None)
        .open_native_async()
        .map_err(|e| BridgeError::SerialPortError(format!("{}: {e}", config.fieldbus.port)))?;

    let (fieldbus_rx, mut fieldbus_tx) = tokio::io::split(fieldbus_port);
    let (events, mut inbox) = mpsc::channel::<Event>(256);

    spawn_byte_reader(telemetry_port, events.clone(), |byte, _| Event::Telemetry(byte));
    spawn_byte_reader(fieldbus_rx, events, Event::Fieldbus);

    let mut bridge = Bridge::new(config.device_address);
    let response_gap = bridge.silence.interval();

    info!(
        "bridge running: telemetry on {}, fieldbus on {} as slave {:#04X}",
        config.telemetry.port, config.fieldbus.port, config.device_address
    );

    while let Some(event) = inbox.recv().await {
        match event {
            Event::Telemetry(byte) => bridge.on_telemetry_byte(byte),
            Event::Fieldbus(byte, at) => {
                if let Some(response) = bridge.on_fieldbus_byte_at(byte, at) {
                    // Mandatory inter-frame gap before the response goes out.
                    tokio::time::sleep(response_gap).await;
                    log_frame_hex("Modbus response", &response);
                    fieldbus_tx.write_all(&response).await?;
                    fieldbus_tx.flush().await?;
                }
            }
        }
    }

    Err(BridgeError::ChannelClosed)
}

/// Forwards single bytes from a transport into the event loop, stamping
/// each with its arrival time.
fn spawn_byte_reader<R>(
    mut reader: R,
    events: mpsc::Sender<Event>,
    wrap: fn(u8, Instant) -> Event,
) where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = [0u8; 1];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    if events.send(wrap(buf[0], Instant::now())).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    error!("serial read failed: {e}");
                    break;
                }
            }
        }
    });
}
