//! Prelude module for common re-exports.
//!
//! ```rust
//! use surfmap_common::prelude::*;
//! ```

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, EngineConfig, LogLevel, SharedConfig};

// ─── System Constants ───────────────────────────────────────────────
pub use crate::consts::{COUNT_SCALE, DRAIN_THRESHOLD};

// ─── Bus ────────────────────────────────────────────────────────────
pub use crate::method::InterpolationMethod;
pub use crate::pins::{Pin, PinDirection, PinKind, PinValue, PowerState};
