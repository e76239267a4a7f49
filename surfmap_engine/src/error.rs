//! Engine error types.
//!
//! `MapLoadError` is recoverable inside the tick loop (the previous grid is
//! kept). `EngineError` is what terminates the loop.

use std::path::PathBuf;
use surfmap_hal::BusError;
use thiserror::Error;

/// Probe-sample file could not be turned into a grid.
#[derive(Debug, Error)]
pub enum MapLoadError {
    /// File could not be read or stat'ed.
    #[error("cannot read {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A row does not hold three finite numbers.
    #[error("line {line}: {reason}")]
    Parse { line: usize, reason: String },

    /// File holds no samples.
    #[error("no probe samples in file")]
    Empty,

    /// File exceeds the configured size cap.
    #[error("file is {size} bytes, limit is {limit}")]
    TooLarge { size: u64, limit: u64 },

    /// Resolution is not a finite positive number.
    #[error("invalid resolution {0}")]
    InvalidResolution(f64),

    /// Requested grid would exceed the cell cap.
    #[error("grid of {x_steps}x{y_steps} points exceeds limit of {limit}")]
    GridTooLarge {
        x_steps: usize,
        y_steps: usize,
        limit: usize,
    },
}

/// Fatal tick-loop error.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Signal bus failure (missing signal, unreachable segment).
    #[error("bus: {0}")]
    Bus(#[from] BusError),

    /// Map load failure outside the tick loop (`--check`).
    #[error("map load: {0}")]
    MapLoad(#[from] MapLoadError),
}
