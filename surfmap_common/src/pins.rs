//! Signal bus pin catalogue.
//!
//! Every signal the engine exchanges with the motion controller is listed
//! here with its bus name, direction and value kind. The catalogue order is
//! also the slot order of the shared-memory bus layout, so appending is
//! fine but reordering is a layout break (bump `BUS_LAYOUT_VERSION`).

use std::fmt;

/// Layout version of the slot table derived from [`Pin::ALL`].
pub const BUS_LAYOUT_VERSION: u32 = 1;

/// Number of pins in the catalogue.
pub const PIN_COUNT: usize = Pin::ALL.len();

/// Direction of a pin as seen from the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinDirection {
    /// Read by the engine.
    In,
    /// Written by the engine.
    Out,
}

/// Value kind carried by a pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinKind {
    /// Boolean.
    Bit,
    /// 64-bit float.
    Float,
    /// Signed 32-bit integer.
    S32,
    /// Unsigned 32-bit integer.
    U32,
}

/// A typed pin value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PinValue {
    /// Boolean value.
    Bit(bool),
    /// Float value.
    Float(f64),
    /// Signed integer value.
    S32(i32),
    /// Unsigned integer value.
    U32(u32),
}

impl PinValue {
    /// Kind of this value.
    #[inline]
    pub const fn kind(&self) -> PinKind {
        match self {
            Self::Bit(_) => PinKind::Bit,
            Self::Float(_) => PinKind::Float,
            Self::S32(_) => PinKind::S32,
            Self::U32(_) => PinKind::U32,
        }
    }

    /// Zero value for a pin kind.
    #[inline]
    pub const fn zero(kind: PinKind) -> Self {
        match kind {
            PinKind::Bit => Self::Bit(false),
            PinKind::Float => Self::Float(0.0),
            PinKind::S32 => Self::S32(0),
            PinKind::U32 => Self::U32(0),
        }
    }

    /// Encode into a 64-bit slot word.
    ///
    /// Bools are 0/1, floats are IEEE-754 bits, integers are zero-extended.
    #[inline]
    pub fn to_bits(self) -> u64 {
        match self {
            Self::Bit(b) => b as u64,
            Self::Float(f) => f.to_bits(),
            Self::S32(v) => v as u32 as u64,
            Self::U32(v) => v as u64,
        }
    }

    /// Decode a 64-bit slot word as the given kind.
    #[inline]
    pub fn from_bits(kind: PinKind, bits: u64) -> Self {
        match kind {
            PinKind::Bit => Self::Bit(bits != 0),
            PinKind::Float => Self::Float(f64::from_bits(bits)),
            PinKind::S32 => Self::S32(bits as u32 as i32),
            PinKind::U32 => Self::U32(bits as u32),
        }
    }
}

/// Signals on the compensation bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pin {
    /// Request to activate compensation.
    EnableIn,
    /// Asserted while compensation drives the output (including drain).
    EnableOut,
    /// Conversion constant published alongside `counts`.
    Scale,
    /// Compensation amount in transmit domain.
    Counts,
    /// One-tick pulse requesting a downstream integrator reset.
    Clear,
    /// Tool X position.
    XPos,
    /// Tool Y position.
    YPos,
    /// Tool Z position.
    ZPos,
    /// Height above which compensation fades out; 0 disables fading.
    FadeHeight,
    /// Grid resolution for the next (re)load.
    Resolution,
    /// Residual offset tracked downstream.
    EOffset,
    /// Downstream limit flag. Carried on the bus, not consumed.
    EOffsetLimited,
    /// Interpolation method selector (0 nearest, 1 linear, 2 cubic).
    Method,
}

impl Pin {
    /// Catalogue in slot order.
    pub const ALL: [Pin; 13] = [
        Pin::EnableIn,
        Pin::EnableOut,
        Pin::Scale,
        Pin::Counts,
        Pin::Clear,
        Pin::XPos,
        Pin::YPos,
        Pin::ZPos,
        Pin::FadeHeight,
        Pin::Resolution,
        Pin::EOffset,
        Pin::EOffsetLimited,
        Pin::Method,
    ];

    /// Pins written by the engine.
    pub const OUTPUTS: [Pin; 4] = [Pin::EnableOut, Pin::Scale, Pin::Counts, Pin::Clear];

    /// Bus name of the pin.
    pub const fn name(self) -> &'static str {
        match self {
            Pin::EnableIn => "enable-in",
            Pin::EnableOut => "enable-out",
            Pin::Scale => "scale",
            Pin::Counts => "counts",
            Pin::Clear => "clear",
            Pin::XPos => "x-pos",
            Pin::YPos => "y-pos",
            Pin::ZPos => "z-pos",
            Pin::FadeHeight => "fade-height",
            Pin::Resolution => "resolution",
            Pin::EOffset => "eoffset",
            Pin::EOffsetLimited => "eoffset-limited",
            Pin::Method => "method",
        }
    }

    pub const fn direction(self) -> PinDirection {
        match self {
            Pin::EnableOut | Pin::Scale | Pin::Counts | Pin::Clear => PinDirection::Out,
            _ => PinDirection::In,
        }
    }

    pub const fn kind(self) -> PinKind {
        match self {
            Pin::EnableIn | Pin::EnableOut | Pin::Clear | Pin::EOffsetLimited => PinKind::Bit,
            Pin::Counts => PinKind::S32,
            Pin::Method => PinKind::U32,
            Pin::Scale
            | Pin::XPos
            | Pin::YPos
            | Pin::ZPos
            | Pin::FadeHeight
            | Pin::Resolution
            | Pin::EOffset => PinKind::Float,
        }
    }

    /// Slot index in the bus layout.
    pub const fn slot(self) -> usize {
        self as usize
    }

    /// Look up a pin by bus name.
    pub fn from_name(name: &str) -> Option<Pin> {
        Pin::ALL.iter().copied().find(|p| p.name() == name)
    }
}

impl fmt::Display for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Machine power state reported by the motion controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PowerState {
    /// Machine power off (estop or disabled).
    #[default]
    Off,
    /// Machine power on.
    On,
}

impl PowerState {
    #[inline]
    pub const fn is_on(self) -> bool {
        matches!(self, PowerState::On)
    }

    /// Decode the status word. Any non-zero value is `On`.
    #[inline]
    pub const fn from_word(word: u32) -> Self {
        if word != 0 { PowerState::On } else { PowerState::Off }
    }

    #[inline]
    pub const fn to_word(self) -> u32 {
        match self {
            PowerState::Off => 0,
            PowerState::On => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn slots_follow_catalogue_order() {
        for (idx, pin) in Pin::ALL.iter().enumerate() {
            assert_eq!(pin.slot(), idx, "{pin} out of order");
        }
    }

    #[test]
    fn names_are_unique_and_resolvable() {
        let mut seen = HashSet::new();
        for pin in Pin::ALL {
            assert!(seen.insert(pin.name()));
            assert_eq!(Pin::from_name(pin.name()), Some(pin));
        }
        assert_eq!(Pin::from_name("z-offset"), None);
    }

    #[test]
    fn outputs_are_out_pins() {
        for pin in Pin::ALL {
            let is_out = Pin::OUTPUTS.contains(&pin);
            assert_eq!(pin.direction() == PinDirection::Out, is_out, "{pin}");
        }
    }

    #[test]
    fn bus_contract_kinds() {
        assert_eq!(Pin::Counts.kind(), PinKind::S32);
        assert_eq!(Pin::Method.kind(), PinKind::U32);
        assert_eq!(Pin::EOffsetLimited.kind(), PinKind::Bit);
        assert_eq!(Pin::Scale.kind(), PinKind::Float);
    }

    #[test]
    fn negative_counts_survive_slot_encoding() {
        let bits = PinValue::S32(-1234).to_bits();
        assert_eq!(bits >> 32, 0, "s32 must be zero-extended");
        assert_eq!(PinValue::from_bits(PinKind::S32, bits), PinValue::S32(-1234));
    }

    #[test]
    fn float_slot_encoding_is_exact() {
        let bits = PinValue::Float(-0.001).to_bits();
        assert_eq!(PinValue::from_bits(PinKind::Float, bits), PinValue::Float(-0.001));
    }

    #[test]
    fn power_word() {
        assert_eq!(PowerState::from_word(0), PowerState::Off);
        assert_eq!(PowerState::from_word(7), PowerState::On);
        assert_eq!(PowerState::On.to_word(), 1);
        assert!(!PowerState::default().is_on());
    }
}
