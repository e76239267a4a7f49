//! Interpolation method selector shared by the CLI, the `method` pin and
//! the map loader.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Scattered-data interpolation method used to build the offset grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
#[repr(u32)]
pub enum InterpolationMethod {
    /// Value of the closest probe sample.
    Nearest = 0,
    /// Piecewise-linear over the Delaunay triangulation.
    Linear = 1,
    /// Clough–Tocher piecewise cubic (C1).
    #[default]
    Cubic = 2,
}

impl InterpolationMethod {
    /// Decode the `method` pin. Unknown values select [`Self::Cubic`].
    #[inline]
    pub const fn from_pin(value: u32) -> Self {
        match value {
            0 => Self::Nearest,
            1 => Self::Linear,
            _ => Self::Cubic,
        }
    }

    /// Encode for the `method` pin.
    #[inline]
    pub const fn to_pin(self) -> u32 {
        self as u32
    }

    /// Parse a CLI method name. Returns `None` for unrecognized names.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "nearest" => Some(Self::Nearest),
            "linear" => Some(Self::Linear),
            "cubic" => Some(Self::Cubic),
            _ => None,
        }
    }

    /// Lowercase method name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Nearest => "nearest",
            Self::Linear => "linear",
            Self::Cubic => "cubic",
        }
    }
}

impl fmt::Display for InterpolationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
