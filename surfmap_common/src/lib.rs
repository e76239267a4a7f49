//! Surfmap Common Library
//!
//! Shared constants, the signal-bus pin catalogue and configuration loading
//! for all surfmap workspace crates.
//!
//! # Module Structure
//!
//! - [`consts`] - Numeric limits and defaults
//! - [`method`] - Interpolation method selector
//! - [`pins`] - Signal bus pin catalogue and value types
//! - [`config`] - Configuration loading traits and types
//! - [`prelude`] - Common re-exports for convenience

pub mod config;
pub mod consts;
pub mod method;
pub mod pins;
pub mod prelude;
