//! In-process pin table.
//!
//! Used by tests and benches. A bus may be built with a
//! subset of the catalogue to exercise the missing-signal path.

use surfmap_common::pins::{PIN_COUNT, Pin, PinValue};

use crate::bus::{BusError, SignalBus};

/// Pin table held in process memory.
#[derive(Debug, Clone)]
pub struct MemoryBus {
    slots: [Option<u64>; PIN_COUNT],
    commits: u64,
}

impl MemoryBus {
    /// Create a bus carrying every catalogue pin, all zeroed.
    pub fn new() -> Self {
        Self::with_pins(&Pin::ALL)
    }

    /// Create a bus carrying only the given pins.
    pub fn with_pins(pins: &[Pin]) -> Self {
        let mut slots = [None; PIN_COUNT];
        for pin in pins {
            slots[pin.slot()] = Some(PinValue::zero(pin.kind()).to_bits());
        }
        Self { slots, commits: 0 }
    }

    /// Drive an input pin from the controller side.
    ///
    /// # Panics
    /// Panics if the pin is missing or the value kind does not match; this
    /// is a test-harness convenience.
    pub fn set(&mut self, pin: Pin, value: PinValue) {
        if let Err(e) = self.preset(pin, value) {
            panic!("MemoryBus::set({pin}): {e}");
        }
    }

    /// Read a pin from the controller side.
    ///
    /// # Panics
    /// Panics if the pin is missing.
    pub fn get(&self, pin: Pin) -> PinValue {
        match self.read(pin) {
            Ok(v) => v,
            Err(e) => panic!("MemoryBus::get({pin}): {e}"),
        }
    }

    /// Number of completed ticks (`commit` calls).
    pub fn commits(&self) -> u64 {
        self.commits
    }
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalBus for MemoryBus {
    fn load_slot(&self, pin: Pin) -> Result<u64, BusError> {
        self.slots[pin.slot()].ok_or(BusError::PinMissing(pin))
    }

    fn store_slot(&mut self, pin: Pin, bits: u64) -> Result<(), BusError> {
        match self.slots[pin.slot()].as_mut() {
            Some(slot) => {
                *slot = bits;
                Ok(())
            }
            None => Err(BusError::PinMissing(pin)),
        }
    }

    fn commit(&mut self) -> Result<(), BusError> {
        self.commits += 1;
        Ok(())
    }
}
