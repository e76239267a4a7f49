//! Shared-memory pin table.
//!
//! The segment is a file under `/dev/shm` holding a 64-byte header followed
//! by one `AtomicU64` slot per catalogue pin. The engine creates the
//! segment and owns the output pins; the motion controller attaches as a
//! peer, drives the input pins and publishes machine power in the header.
//!
//! ```text
//! offset 0   BusHeader (magic, layout version, pin count, writer pid,
//!            machine status, heartbeat)
//! offset 64  slot[Pin::EnableIn] .. slot[Pin::Method]   (8 bytes each)
//! ```
//!
//! Every pin store is a single atomic 64-bit store, so readers never see a
//! torn value; no cross-pin consistency is provided.

use memmap2::{MmapMut, MmapOptions};
use nix::unistd::getpid;
use static_assertions::const_assert_eq;
use std::fs::OpenOptions;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use surfmap_common::pins::{BUS_LAYOUT_VERSION, PIN_COUNT, Pin, PinDirection, PowerState};
use tracing::{debug, info, warn};

use crate::bus::{BusError, MachineStatus, SignalBus};

/// Magic bytes identifying a surfmap bus segment: `"SURFMAP\0"`.
pub const BUS_MAGIC: [u8; 8] = *b"SURFMAP\0";

/// Directory holding POSIX shared-memory objects.
pub const SHM_DIR: &str = "/dev/shm";

const HEADER_SIZE: usize = std::mem::size_of::<BusHeader>();

/// Total mapped size of a bus segment.
pub const SEGMENT_SIZE: usize = HEADER_SIZE + PIN_COUNT * std::mem::size_of::<AtomicU64>();

/// Bus segment header — 64 bytes, cache-line aligned.
#[repr(C, align(64))]
pub struct BusHeader {
    /// Must be [`BUS_MAGIC`].
    pub magic: [u8; 8],
    /// Must be [`BUS_LAYOUT_VERSION`].
    pub layout_version: u32,
    /// Number of slots following the header.
    pub pin_count: u32,
    /// PID of the creating process.
    pub writer_pid: AtomicU32,
    /// Machine power word written by the controller (0 = off).
    pub machine_status: AtomicU32,
    /// Incremented by the engine once per tick.
    pub heartbeat: AtomicU64,
    _reserved: [u8; 32],
}

const_assert_eq!(std::mem::size_of::<BusHeader>(), 64);

impl BusHeader {
    fn new(writer_pid: u32) -> Self {
        Self {
            magic: BUS_MAGIC,
            layout_version: BUS_LAYOUT_VERSION,
            pin_count: PIN_COUNT as u32,
            writer_pid: AtomicU32::new(writer_pid),
            machine_status: AtomicU32::new(PowerState::Off.to_word()),
            heartbeat: AtomicU64::new(0),
            _reserved: [0; 32],
        }
    }

    fn validate(&self) -> Result<(), BusError> {
        if self.magic != BUS_MAGIC {
            return Err(BusError::LayoutMismatch("invalid magic".to_string()));
        }
        if self.layout_version != BUS_LAYOUT_VERSION {
            return Err(BusError::LayoutMismatch(format!(
                "layout version {} (expected {BUS_LAYOUT_VERSION})",
                self.layout_version
            )));
        }
        if self.pin_count as usize != PIN_COUNT {
            return Err(BusError::LayoutMismatch(format!(
                "{} pins (expected {PIN_COUNT})",
                self.pin_count
            )));
        }
        Ok(())
    }
}

/// Which side of the bus a handle represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusRole {
    /// Compensation engine: writes `Out` pins, owns the segment file.
    Engine,
    /// Motion controller side: writes `In` pins and machine status.
    Peer,
}

/// Memory-mapped bus segment.
pub struct ShmBus {
    path: PathBuf,
    role: BusRole,
    mmap: MmapMut,
}

impl ShmBus {
    /// Path of the segment file for a segment name.
    pub fn segment_path(segment: &str) -> PathBuf {
        Path::new(SHM_DIR).join(format!("surfmap_{segment}"))
    }

    /// Create (or recreate) the named segment as the engine.
    pub fn create(segment: &str) -> Result<Self, BusError> {
        Self::create_at(Self::segment_path(segment))
    }

    /// Attach to the named segment as a peer.
    pub fn attach(segment: &str) -> Result<Self, BusError> {
        Self::attach_at(Self::segment_path(segment))
    }

    /// Create a segment at an explicit path. All slots start zeroed.
    pub fn create_at(path: impl AsRef<Path>) -> Result<Self, BusError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(true)
            .mode(0o600)
            .open(&path)
            .map_err(|e| BusError::Unavailable(format!("create {}: {e}", path.display())))?;
        file.set_len(SEGMENT_SIZE as u64)?;

        // SAFETY: file is exactly SEGMENT_SIZE bytes and stays open for the
        // lifetime of the mapping.
        let mut mmap = unsafe { MmapOptions::new().len(SEGMENT_SIZE).map_mut(&file)? };

        let header = BusHeader::new(getpid().as_raw() as u32);
        // SAFETY: mapping is page-aligned and at least HEADER_SIZE bytes.
        unsafe { std::ptr::write(mmap.as_mut_ptr() as *mut BusHeader, header) };

        info!(
            "Created bus segment {} ({} pins, {} bytes)",
            path.display(),
            PIN_COUNT,
            SEGMENT_SIZE
        );
        Ok(Self {
            path,
            role: BusRole::Engine,
            mmap,
        })
    }

    /// Attach to an existing segment at an explicit path as a peer.
    pub fn attach_at(path: impl AsRef<Path>) -> Result<Self, BusError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| BusError::Unavailable(format!("attach {}: {e}", path.display())))?;

        let len = file.metadata()?.len();
        if len < SEGMENT_SIZE as u64 {
            return Err(BusError::LayoutMismatch(format!(
                "segment is {len} bytes (expected {SEGMENT_SIZE})"
            )));
        }

        // SAFETY: length checked above; file stays open for the mapping.
        let mmap = unsafe { MmapOptions::new().len(SEGMENT_SIZE).map_mut(&file)? };
        let bus = Self {
            path,
            role: BusRole::Peer,
            mmap,
        };
        bus.header().validate()?;
        debug!(
            "Attached to bus segment {} (writer pid {})",
            bus.path.display(),
            bus.writer_pid()
        );
        Ok(bus)
    }

    fn header(&self) -> &BusHeader {
        // SAFETY: mapping starts with a BusHeader written by `create_at` and
        // validated by `attach_at`; mutable fields are atomics.
        unsafe { &*(self.mmap.as_ptr() as *const BusHeader) }
    }

    fn slots(&self) -> &[AtomicU64; PIN_COUNT] {
        // SAFETY: slots start at a 64-byte offset inside a page-aligned
        // mapping of SEGMENT_SIZE bytes.
        unsafe { &*(self.mmap.as_ptr().add(HEADER_SIZE) as *const [AtomicU64; PIN_COUNT]) }
    }

    /// Side of the bus this handle represents.
    pub fn role(&self) -> BusRole {
        self.role
    }

    /// Segment file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// PID of the process that created the segment.
    pub fn writer_pid(&self) -> u32 {
        self.header().writer_pid.load(Ordering::Acquire)
    }

    /// Current engine heartbeat.
    pub fn heartbeat(&self) -> u64 {
        self.header().heartbeat.load(Ordering::Acquire)
    }

    /// Publish machine power (controller side).
    pub fn set_machine_status(&self, state: PowerState) {
        self.header()
            .machine_status
            .store(state.to_word(), Ordering::Release);
    }
}

impl SignalBus for ShmBus {
    fn load_slot(&self, pin: Pin) -> Result<u64, BusError> {
        Ok(self.slots()[pin.slot()].load(Ordering::Acquire))
    }

    fn store_slot(&mut self, pin: Pin, bits: u64) -> Result<(), BusError> {
        self.slots()[pin.slot()].store(bits, Ordering::Release);
        Ok(())
    }

    fn writable_direction(&self) -> PinDirection {
        match self.role {
            BusRole::Engine => PinDirection::Out,
            BusRole::Peer => PinDirection::In,
        }
    }

    fn commit(&mut self) -> Result<(), BusError> {
        self.header().heartbeat.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }
}

impl MachineStatus for ShmBus {
    fn poll(&mut self) -> Result<PowerState, BusError> {
        Ok(PowerState::from_word(
            self.header().machine_status.load(Ordering::Acquire),
        ))
    }
}

impl Drop for ShmBus {
    fn drop(&mut self) {
        if self.role == BusRole::Engine {
            if let Err(e) = std::fs::remove_file(&self.path) {
                warn!("Failed to remove bus segment {}: {e}", self.path.display());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_size_covers_all_slots() {
        assert_eq!(SEGMENT_SIZE, 64 + PIN_COUNT * 8);
    }

    #[test]
    fn segment_path_is_prefixed() {
        assert_eq!(
            ShmBus::segment_path("mill"),
            PathBuf::from("/dev/shm/surfmap_mill")
        );
    }

    #[test]
    fn header_validation() {
        let header = BusHeader::new(42);
        assert!(header.validate().is_ok());

        let mut bad = BusHeader::new(42);
        bad.magic = [0; 8];
        assert!(matches!(bad.validate(), Err(BusError::LayoutMismatch(_))));

        let mut bad = BusHeader::new(42);
        bad.pin_count += 1;
        assert!(matches!(bad.validate(), Err(BusError::LayoutMismatch(_))));
    }
}
