//! # Surfmap HAL Library
//!
//! Signal bus adapters for the compensation engine. The engine only talks
//! to the bus through the [`SignalBus`] and [`MachineStatus`] traits.
//!
//! # Module Structure
//!
//! - [`bus`] - Bus traits and error type
//! - [`memory`] - In-process pin table (tests, dry runs)
//! - [`shm`] - Shared-memory pin table shared with the motion controller
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐   SignalBus    ┌──────────────────────────────┐
//! │ surfmap_engine   │───────────────►│ ShmBus  /dev/shm/surfmap_*   │◄── controller
//! │  (tick loop)     │◄───────────────│  header | slot[0..PIN_COUNT] │
//! └──────────────────┘ MachineStatus  └──────────────────────────────┘
//! ```

#![deny(missing_docs)]

pub mod bus;
pub mod memory;
pub mod shm;

pub use crate::bus::{BusError, FixedStatus, MachineStatus, SignalBus};
pub use crate::memory::MemoryBus;
pub use crate::shm::{BusRole, ShmBus};
