//! # Surfmap Engine Library
//!
//! Real-time surface-map Z compensation. A probe-sample file is
//! interpolated into a dense offset grid; a fixed-period tick loop samples
//! that grid at the current tool position and writes the offset, faded by
//! tool height, to the signal bus as an integer count.
//!
//! # Module Structure
//!
//! - [`map`] - Sample parsing, triangulation, interpolation, `MapLoader`
//! - [`sampler`] - Position → count lookup on the grid
//! - [`fade`] - Height-based attenuation
//! - [`state`] - Lifecycle state machine (`tick`)
//! - [`cycle`] - Paced tick loop with injectable clock
//! - [`config`] - Effective run settings
//! - [`error`] - Error types
//!
//! # Lifecycle
//!
//! ```text
//!  START ──► IDLE ──enable-in──► LOADMAP ──► RUNNING
//!             ▲  ▲                  ▲           │
//!             │  └── no grid ───────┤    enable-in off
//!             │                     │           ▼
//!             └──── drained ─────── RESET ◄─────┘
//!                              (re-enabled → LOADMAP)
//! ```

pub mod config;
pub mod cycle;
pub mod error;
pub mod fade;
pub mod map;
pub mod sampler;
pub mod state;

pub use crate::cycle::{Clock, CycleRunner, CycleStats, SystemClock};
pub use crate::error::{EngineError, MapLoadError};
pub use crate::map::{FileMapSource, GridSummary, InterpolatedGrid, MapLoader, MapSource};
pub use crate::state::{EngineState, LifecycleState, TickReport, tick};
