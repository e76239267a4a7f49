//! Lifecycle state machine module root.
//!
//! [`EngineState`] is the only state carried between ticks. It goes into
//! [`machine::tick`] by value and comes back out, together with a
//! [`TickReport`] describing what the tick did.

pub mod machine;

pub use machine::tick;

use std::fmt;
use surfmap_common::consts::COUNT_SCALE;
use surfmap_common::method::InterpolationMethod;
use surfmap_common::pins::Pin;
use surfmap_hal::{BusError, SignalBus};

use crate::map::LoadStamp;

/// Compensation lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LifecycleState {
    /// Log map metadata, reset load tracking. Always left after one tick.
    #[default]
    Start,
    /// Waiting for `enable-in`.
    Idle,
    /// (Re)building the grid if its inputs changed.
    LoadMap,
    /// Driving `counts` from the grid.
    Running,
    /// Zeroed output; waiting for the residual offset to drain.
    Reset,
}

impl LifecycleState {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Start => "START",
            Self::Idle => "IDLE",
            Self::LoadMap => "LOADMAP",
            Self::Running => "RUNNING",
            Self::Reset => "RESET",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// State threaded across ticks.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EngineState {
    pub state: LifecycleState,
    /// State at the previous tick; `None` before the first tick.
    pub previous: Option<LifecycleState>,
    /// Inputs of the last load attempt, successful or not.
    pub last_load: Option<LoadStamp>,
    /// Last value written to `counts`.
    pub last_counts: i32,
    /// `clear` was raised last tick and must be released.
    pub clear_raised: bool,
}

impl EngineState {
    pub const fn new() -> Self {
        Self {
            state: LifecycleState::Start,
            previous: None,
            last_load: None,
            last_counts: 0,
            clear_raised: false,
        }
    }

    /// First tick spent in the current state.
    #[inline]
    pub fn entering(&self) -> bool {
        self.previous != Some(self.state)
    }
}

/// Per-tick parameters read from the bus.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuntimeParameters {
    pub enable: bool,
    pub fade_height: f64,
    pub resolution: f64,
    pub method: InterpolationMethod,
    /// Physical offset per count; fixed.
    pub scale: f64,
}

/// Everything a tick reads, sampled once at the start of the tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickInputs {
    pub params: RuntimeParameters,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub eoffset: f64,
}

impl TickInputs {
    /// Read every consumed input pin. A missing pin is an error.
    pub fn read<B: SignalBus + ?Sized>(bus: &B) -> Result<Self, BusError> {
        Ok(Self {
            params: RuntimeParameters {
                enable: bus.read_bit(Pin::EnableIn)?,
                fade_height: bus.read_float(Pin::FadeHeight)?,
                resolution: bus.read_float(Pin::Resolution)?,
                method: InterpolationMethod::from_pin(bus.read_u32(Pin::Method)?),
                scale: COUNT_SCALE,
            },
            x: bus.read_float(Pin::XPos)?,
            y: bus.read_float(Pin::YPos)?,
            z: bus.read_float(Pin::ZPos)?,
            eoffset: bus.read_float(Pin::EOffset)?,
        })
    }
}

/// Outcome of a LOADMAP attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadOutcome {
    /// No load this tick (not in LOADMAP, or inputs unchanged).
    #[default]
    NotAttempted,
    Loaded,
    Failed,
}

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TickReport {
    /// State the tick ran in.
    pub state: LifecycleState,
    /// The tick was the first in `state`.
    pub entered: bool,
    /// Value written to `counts`, if any.
    pub counts: Option<i32>,
    pub load: LoadOutcome,
}
