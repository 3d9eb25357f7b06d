//! # Meter Keep-Alive Sequencer
//!
//! Some meters drop back to their short, coarse datagram format unless the
//! optical button is "pressed" periodically, and unlock the full datagram
//! only after the owner PIN has been entered by flashing a light at the
//! sensor. This module reproduces that front-panel choreography as a
//! queue-driven blink sequencer: a brief keep-alive flash on a long period,
//! and every few keep-alive periods a full PIN entry sequence.
//!
//! The sequencer has no data dependency on the protocol engines. It is
//! driven by a 100 ms tick and talks to the hardware through the
//! [`IndicatorPin`] trait, so hosts without a GPIO (or with an inverted
//! driver stage) supply their own implementation.

use std::collections::VecDeque;

use log::debug;

/// Output the sequencer flashes at the meter's light sensor.
pub trait IndicatorPin {
    /// Drives the indicator; `true` means light on.
    fn set(&mut self, on: bool);
}

/// Ticks between keep-alive flashes (1000 x 100 ms = 100 s)
const KEEP_ALIVE_TICKS: u16 = 1000;
/// Keep-alive flash duration; 200 ms proved too short in the field
const FLASH_TICKS: u16 = 3;
/// Minimum flash duration the meter reliably registers as a button press
const SHORT_PULSE_TICKS: u16 = 4;
/// Dark gap that moves the meter into PIN entry mode
const ENTRY_GAP_TICKS: u16 = 10;
/// Dark gap between the pulses of one PIN digit
const PULSE_GAP_TICKS: u16 = 3;
/// Dark gap that advances the meter to the next PIN digit
const DIGIT_GAP_TICKS: u16 = 38;
/// Keep-alive periods between PIN re-entries (12 x 100 s = 20 min)
const PIN_RESEND_PERIODS: u8 = 12;
/// Idle ticks that make the meter forget a previous PIN, ready for re-entry
const PIN_FORCE_TICKS: u16 = 1300;

/// One queued indicator phase.
#[derive(Debug, Clone, Copy)]
struct Pulse {
    on: bool,
    ticks: u16,
}

/// Queue-driven keep-alive and PIN entry sequencer.
#[derive(Debug)]
pub struct KeepAlive {
    pin_code: String,
    queue: VecDeque<Pulse>,
    /// Ticks left in the current phase
    wait: u16,
    /// Keep-alive periods since the last PIN entry
    periods: u8,
}

impl KeepAlive {
    /// Creates the sequencer. An empty PIN disables PIN entry and leaves
    /// only the periodic keep-alive flash.
    pub fn new(pin_code: &str) -> Self {
        KeepAlive {
            pin_code: pin_code.to_string(),
            queue: VecDeque::new(),
            wait: 0,
            periods: 0,
        }
    }

    /// Advances the sequencer by one 100 ms tick. `button_pressed` mirrors
    /// the physical pushbutton, which aborts the running sequence and
    /// forwards one short pulse to the meter.
    pub fn on_tick(&mut self, pin: &mut impl IndicatorPin, button_pressed: bool) {
        let mut transition = if self.wait == 0 {
            true
        } else {
            self.wait -= 1;
            self.wait == 0
        };

        if button_pressed {
            self.clear_queue();
            self.push(true, SHORT_PULSE_TICKS);
            transition = true;
        }

        if transition {
            if let Some(pulse) = self.queue.pop_front() {
                pin.set(pulse.on);
                self.wait = pulse.ticks;
            } else if self.periods < PIN_RESEND_PERIODS {
                self.periods += 1;
                self.push(false, KEEP_ALIVE_TICKS);
                self.push(true, FLASH_TICKS);
            } else {
                debug!("re-sending meter PIN");
                self.periods = 0;
                // Long dark phase first: the meter forgets a stale PIN and
                // accepts a fresh entry.
                self.push(false, PIN_FORCE_TICKS);
                self.push_pin_entry();
            }
        }
    }

    fn push(&mut self, on: bool, ticks: u16) {
        self.queue.push_back(Pulse { on, ticks });
    }

    fn clear_queue(&mut self) {
        self.queue.clear();
        self.wait = 0;
        self.periods = 0;
    }

    /// Queues the full PIN entry choreography: two pulses to enter PIN
    /// mode, then for each digit that many short pulses, digits separated
    /// by a long gap.
    fn push_pin_entry(&mut self) {
        if self.pin_code.is_empty() {
            return;
        }

        self.push(true, SHORT_PULSE_TICKS);
        self.push(false, ENTRY_GAP_TICKS);
        self.push(true, SHORT_PULSE_TICKS);
        self.push(false, ENTRY_GAP_TICKS);

        let digits: Vec<char> = self
            .pin_code
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        for digit in digits {
            let pulses = digit as u8 - b'0';
            for _ in 0..pulses {
                self.push(true, SHORT_PULSE_TICKS);
                self.push(false, PULSE_GAP_TICKS);
            }
            self.push(false, DIGIT_GAP_TICKS);
        }
    }
}
