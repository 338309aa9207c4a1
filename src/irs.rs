/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! GPIO interrupt latch.
//!
//! Hardware interrupt service routines never touch scheduler structures;
//! they only set a bit in a byte-sized latch, and cooperative code polls and
//! resets those bits at its leisure.  The single-word latch is the only
//! state shared with interrupt context, which keeps the ISR side to one
//! atomic OR.

use std::sync::atomic::{AtomicU8, Ordering};

/// When an attached pin should trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptMode {
    Low,
    High,
    Rising,
    Falling,
    Change,
}

/// Capability the runtime consumes to observe GPIO interrupts.
pub trait InterruptSource {
    /// Whether `pin` has triggered since it was last reset.
    fn triggered(&self, pin: u8) -> bool;

    /// Clears the triggered flag for `pin`.
    fn reset(&self, pin: u8);

    /// Registers interest in `pin`.  Unsupported pins are ignored.
    fn attach(&mut self, pin: u8, mode: InterruptMode);
}

/// Byte-sized trigger latch over the eight interrupt-capable pins
/// (0, 2, 4, 5, 12, 13, 14, 15).
///
/// [`PinLatch::latch`] is the ISR entry point: a single atomic OR, safe to
/// call from interrupt context.  Everything else runs cooperatively.
#[derive(Debug, Default)]
pub struct PinLatch {
    triggered: AtomicU8,
    attached: AtomicU8,
}

/// Bit position for an interrupt-capable pin, `None` for the rest.
fn pin_bit(pin: u8) -> Option<u8> {
    match pin {
        0 => Some(0x01),
        2 => Some(0x02),
        4 => Some(0x04),
        5 => Some(0x08),
        12 => Some(0x10),
        13 => Some(0x20),
        14 => Some(0x40),
        15 => Some(0x80),
        _ => None,
    }
}

impl PinLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a trigger for `pin`.  Call from the pin's ISR; triggers on
    /// pins that were never attached are dropped.
    pub fn latch(&self, pin: u8) {
        let Some(bit) = pin_bit(pin) else { return };
        if self.attached.load(Ordering::Relaxed) & bit == 0 {
            return;
        }
        self.triggered.fetch_or(bit, Ordering::Relaxed);
    }
}

impl InterruptSource for PinLatch {
    fn triggered(&self, pin: u8) -> bool {
        match pin_bit(pin) {
            Some(bit) => self.triggered.load(Ordering::Relaxed) & bit != 0,
            None => false,
        }
    }

    fn reset(&self, pin: u8) {
        if let Some(bit) = pin_bit(pin) {
            self.triggered.fetch_and(!bit, Ordering::Relaxed);
        }
    }

    fn attach(&mut self, pin: u8, _mode: InterruptMode) {
        if let Some(bit) = pin_bit(pin) {
            self.attached.fetch_or(bit, Ordering::Relaxed);
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latched_pin_reads_triggered_until_reset() {
        let mut latch = PinLatch::new();
        latch.attach(4, InterruptMode::Rising);

        assert!(!latch.triggered(4));
        latch.latch(4);
        assert!(latch.triggered(4));

        latch.reset(4);
        assert!(!latch.triggered(4));
    }

    #[test]
    fn pins_latch_independently() {
        let mut latch = PinLatch::new();
        latch.attach(0, InterruptMode::Change);
        latch.attach(15, InterruptMode::Falling);

        latch.latch(15);
        assert!(!latch.triggered(0));
        assert!(latch.triggered(15));

        latch.reset(15);
        latch.latch(0);
        assert!(latch.triggered(0));
        assert!(!latch.triggered(15));
    }

    #[test]
    fn unattached_pins_never_trigger() {
        let latch = PinLatch::new();
        latch.latch(4);
        assert!(!latch.triggered(4));
    }

    #[test]
    fn unsupported_pins_are_ignored() {
        let mut latch = PinLatch::new();
        latch.attach(7, InterruptMode::High);
        latch.latch(7);
        assert!(!latch.triggered(7));
        latch.reset(7); // no-op, must not panic
    }
}
