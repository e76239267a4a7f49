//! Signal bus traits and error types.
//!
//! This module defines:
//! - `SignalBus` trait - typed access to the named pins of the bus
//! - `MachineStatus` trait - machine power state from the motion controller
//! - `BusError` enum - error types for bus operations
//! - `FixedStatus` - constant power state source
//!
//! # Write Contract
//!
//! Each pin assignment is independent and atomic from the bus's point of
//! view. There is no multi-pin transaction; readers may observe a tick's
//! writes partially applied.

use surfmap_common::pins::{Pin, PinDirection, PinKind, PinValue, PowerState};
use thiserror::Error;

/// Error types for bus operations.
#[derive(Debug, Error)]
pub enum BusError {
    /// Pin is not present on this bus.
    #[error("Signal missing on bus: {0}")]
    PinMissing(Pin),

    /// Value kind does not match the pin kind.
    #[error("Type mismatch on {pin}: pin is {expected:?}, value is {actual:?}")]
    TypeMismatch {
        /// Target pin
        pin: Pin,
        /// Kind declared by the pin catalogue
        expected: PinKind,
        /// Kind of the offered value
        actual: PinKind,
    },

    /// Pin direction does not allow writes from this side.
    #[error("Pin {pin} is not writable from this side ({direction:?} pin)")]
    NotWritable {
        /// Target pin
        pin: Pin,
        /// Catalogue direction of the pin
        direction: PinDirection,
    },

    /// Bus backing store could not be reached.
    #[error("Bus unavailable: {0}")]
    Unavailable(String),

    /// Shared segment does not match the expected layout.
    #[error("Bus layout mismatch: {0}")]
    LayoutMismatch(String),

    /// IO error
    #[error("IO error: {source}")]
    Io {
        /// Source IO error
        #[from]
        source: std::io::Error,
    },
}

/// Typed access to the compensation bus.
///
/// Implementors provide raw 64-bit slot access; the provided methods add
/// kind and direction checking on top.
pub trait SignalBus {
    /// Load the raw slot word of a pin.
    fn load_slot(&self, pin: Pin) -> Result<u64, BusError>;

    /// Store the raw slot word of a pin.
    fn store_slot(&mut self, pin: Pin, bits: u64) -> Result<(), BusError>;

    /// Direction of pins this side may `write`. The engine side writes
    /// `Out` pins.
    fn writable_direction(&self) -> PinDirection {
        PinDirection::Out
    }

    /// Called once at the end of every tick.
    fn commit(&mut self) -> Result<(), BusError> {
        Ok(())
    }

    /// Read a pin as a typed value.
    fn read(&self, pin: Pin) -> Result<PinValue, BusError> {
        Ok(PinValue::from_bits(pin.kind(), self.load_slot(pin)?))
    }

    /// Write a pin, enforcing kind and direction.
    fn write(&mut self, pin: Pin, value: PinValue) -> Result<(), BusError> {
        let direction = pin.direction();
        if direction != self.writable_direction() {
            return Err(BusError::NotWritable { pin, direction });
        }
        self.preset(pin, value)
    }

    /// Write a pin regardless of direction, enforcing kind only.
    ///
    /// Used for startup defaults on input pins (`resolution`, `method`).
    fn preset(&mut self, pin: Pin, value: PinValue) -> Result<(), BusError> {
        check_kind(pin, value)?;
        self.store_slot(pin, value.to_bits())
    }

    /// Read a `Bit` pin.
    fn read_bit(&self, pin: Pin) -> Result<bool, BusError> {
        match self.read(pin)? {
            PinValue::Bit(b) => Ok(b),
            other => Err(mismatch(pin, other)),
        }
    }

    /// Read a `Float` pin.
    fn read_float(&self, pin: Pin) -> Result<f64, BusError> {
        match self.read(pin)? {
            PinValue::Float(f) => Ok(f),
            other => Err(mismatch(pin, other)),
        }
    }

    /// Read a `S32` pin.
    fn read_s32(&self, pin: Pin) -> Result<i32, BusError> {
        match self.read(pin)? {
            PinValue::S32(v) => Ok(v),
            other => Err(mismatch(pin, other)),
        }
    }

    /// Read a `U32` pin.
    fn read_u32(&self, pin: Pin) -> Result<u32, BusError> {
        match self.read(pin)? {
            PinValue::U32(v) => Ok(v),
            other => Err(mismatch(pin, other)),
        }
    }

    /// Write a `Bit` pin.
    fn write_bit(&mut self, pin: Pin, value: bool) -> Result<(), BusError> {
        self.write(pin, PinValue::Bit(value))
    }

    /// Write a `Float` pin.
    fn write_float(&mut self, pin: Pin, value: f64) -> Result<(), BusError> {
        self.write(pin, PinValue::Float(value))
    }

    /// Write a `S32` pin.
    fn write_s32(&mut self, pin: Pin, value: i32) -> Result<(), BusError> {
        self.write(pin, PinValue::S32(value))
    }
}

/// Machine power state source (motion controller status).
pub trait MachineStatus {
    /// Poll the current power state.
    fn poll(&mut self) -> Result<PowerState, BusError>;
}

/// Power state source returning a constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FixedStatus(pub PowerState);

impl MachineStatus for FixedStatus {
    fn poll(&mut self) -> Result<PowerState, BusError> {
        Ok(self.0)
    }
}

fn check_kind(pin: Pin, value: PinValue) -> Result<(), BusError> {
    if value.kind() != pin.kind() {
        return Err(mismatch(pin, value));
    }
    Ok(())
}

fn mismatch(pin: Pin, value: PinValue) -> BusError {
    BusError::TypeMismatch {
        pin,
        expected: pin.kind(),
        actual: value.kind(),
    }
}
