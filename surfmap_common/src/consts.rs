//! System-wide constants for the surfmap workspace.
//!
//! Single source of truth for numeric limits and defaults.

/// Physical offset represented by one transmit-domain count.
pub const COUNT_SCALE: f64 = 0.001;

/// Residual offset magnitude below which a drain is considered complete.
pub const DRAIN_THRESHOLD: f64 = 1e-4;

/// Default tick period in milliseconds.
pub const DEFAULT_TICK_PERIOD_MS: u64 = 50;

/// Default grid resolution preset on the `resolution` pin at startup.
pub const DEFAULT_RESOLUTION: f64 = 1.0;

/// Upper bound on the probe-sample file size read during LOADMAP.
pub const DEFAULT_MAX_MAP_BYTES: u64 = 8 * 1024 * 1024;

/// Upper bound on the number of cells in an interpolated grid.
pub const MAX_GRID_POINTS: usize = 4 * 1024 * 1024;

/// Default shared-memory segment name for the signal bus.
pub const DEFAULT_SEGMENT: &str = "surfmap";

/// Canonical service name used in logs.
pub const SERVICE_NAME: &str = "surfmap";
