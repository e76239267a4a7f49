//! End-to-end lifecycle scenarios against a real map file and an
//! in-process bus.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::time::{Duration, SystemTime};
use surfmap_common::method::InterpolationMethod;
use surfmap_common::pins::{Pin, PinValue, PowerState};
use surfmap_engine::EngineError;
use surfmap_engine::map::{FileMapSource, MapLoader};
use surfmap_engine::state::{EngineState, LifecycleState, LoadOutcome, TickReport, tick};
use surfmap_hal::{BusError, MemoryBus};
use tempfile::TempDir;

use LifecycleState::*;

const UNIT_SQUARE: &str = "0 0 0\n1 0 1\n0 1 1\n1 1 2\n";

struct Harness {
    _dir: TempDir,
    path: std::path::PathBuf,
    st: EngineState,
    loader: MapLoader<FileMapSource>,
    bus: MemoryBus,
    power: PowerState,
}

impl Harness {
    fn new(content: &str, method: InterpolationMethod, resolution: f64) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("probe-results.txt");
        std::fs::write(&path, content).unwrap();

        let mut bus = MemoryBus::new();
        bus.set(Pin::Method, PinValue::U32(method.to_pin()));
        bus.set(Pin::Resolution, PinValue::Float(resolution));
        bus.set(Pin::EOffset, PinValue::Float(0.25));

        Self {
            loader: MapLoader::new(FileMapSource::new(&path)),
            path,
            _dir: dir,
            st: EngineState::new(),
            bus,
            power: PowerState::On,
        }
    }

    fn step(&mut self) -> TickReport {
        let (st, report) = tick(self.st, &mut self.loader, &mut self.bus, self.power).unwrap();
        self.st = st;
        report
    }

    fn set(&mut self, pin: Pin, value: PinValue) {
        self.bus.set(pin, value);
    }

    fn bit(&self, pin: Pin) -> bool {
        self.bus.get(pin) == PinValue::Bit(true)
    }

    fn counts(&self) -> i32 {
        match self.bus.get(Pin::Counts) {
            PinValue::S32(v) => v,
            other => panic!("counts is {other:?}"),
        }
    }

    /// START → IDLE, assert enable-in, tick until RUNNING has written once.
    fn run_up(&mut self) {
        self.step();
        assert_eq!(self.st.state, Idle);
        self.set(Pin::EnableIn, PinValue::Bit(true));
        self.step();
        self.step();
        assert_eq!(self.st.state, Running);
        self.step();
    }
}

fn rewrite(path: &Path, content: &str, mtime: SystemTime) {
    let mut f = OpenOptions::new()
        .write(true)
        .truncate(true)
        .open(path)
        .unwrap();
    f.write_all(content.as_bytes()).unwrap();
    f.set_modified(mtime).unwrap();
}

fn bump_mtime(path: &Path) -> SystemTime {
    let current = File::open(path).unwrap().metadata().unwrap().modified().unwrap();
    current + Duration::from_secs(10)
}

#[test]
fn test_unit_square_end_to_end_output() {
    let mut h = Harness::new(UNIT_SQUARE, InterpolationMethod::Linear, 0.5);
    h.set(Pin::XPos, PinValue::Float(0.5));
    h.set(Pin::YPos, PinValue::Float(0.5));
    h.set(Pin::FadeHeight, PinValue::Float(0.0));
    h.run_up();

    assert_eq!(h.counts(), 1000);
    assert!(h.bit(Pin::EnableOut));
    assert_eq!(h.bus.get(Pin::Scale), PinValue::Float(0.001));
}

#[test]
fn test_idle_to_running_within_two_ticks() {
    let mut h = Harness::new(UNIT_SQUARE, InterpolationMethod::Cubic, 1.0);
    h.step();
    h.step();
    assert_eq!(h.st.state, Idle);

    h.set(Pin::EnableIn, PinValue::Bit(true));
    h.step();
    assert_eq!(h.st.state, LoadMap);
    let report = h.step();
    assert_eq!(report.load, LoadOutcome::Loaded);
    assert_eq!(h.st.state, Running);
}

#[test]
fn test_disable_always_passes_through_reset() {
    let mut h = Harness::new(UNIT_SQUARE, InterpolationMethod::Linear, 1.0);
    h.run_up();
    h.set(Pin::EnableIn, PinValue::Bit(false));
    h.set(Pin::EOffset, PinValue::Float(0.0));
    h.step();
    assert_eq!(h.st.state, Reset);
    // Drained already, but RESET still runs once.
    let report = h.step();
    assert_eq!(report.state, Reset);
    assert_eq!(h.st.state, Idle);
}

#[test]
fn test_reset_drain_holds_enable_out() {
    let mut h = Harness::new(UNIT_SQUARE, InterpolationMethod::Linear, 1.0);
    h.set(Pin::XPos, PinValue::Float(1.0));
    h.run_up();
    assert_ne!(h.counts(), 0);

    h.set(Pin::EnableIn, PinValue::Bit(false));
    h.step();
    assert_eq!(h.st.state, Reset);

    // Entry tick: counts zeroed, clear raised, still enabled.
    h.step();
    assert_eq!(h.counts(), 0);
    assert!(h.bit(Pin::Clear));
    assert!(h.bit(Pin::EnableOut));

    // Draining: clear released, enable-out held.
    for eoffset in [0.2, 0.05, 0.001] {
        h.set(Pin::EOffset, PinValue::Float(eoffset));
        h.step();
        assert_eq!(h.st.state, Reset);
        assert!(!h.bit(Pin::Clear));
        assert!(h.bit(Pin::EnableOut));
    }

    h.set(Pin::EOffset, PinValue::Float(0.00005));
    h.step();
    assert_eq!(h.st.state, Idle);
    assert!(!h.bit(Pin::EnableOut));
}

#[test]
fn test_already_drained_skips_second_clear() {
    let mut h = Harness::new(UNIT_SQUARE, InterpolationMethod::Linear, 1.0);
    h.run_up();
    h.set(Pin::EnableIn, PinValue::Bit(false));
    h.set(Pin::EOffset, PinValue::Float(0.00005));
    h.step();
    assert_eq!(h.st.state, Reset);

    h.step();
    assert_eq!(h.st.state, Idle);
    assert!(!h.bit(Pin::EnableOut));
    assert!(h.bit(Pin::Clear));

    // IDLE releases the pulse and never raises it again.
    for _ in 0..3 {
        h.step();
        assert!(!h.bit(Pin::Clear));
        assert_eq!(h.st.state, Idle);
    }
}

#[test]
fn test_resolution_change_reloads_before_output() {
    let mut h = Harness::new(UNIT_SQUARE, InterpolationMethod::Linear, 1.0);
    h.set(Pin::XPos, PinValue::Float(0.5));
    h.set(Pin::YPos, PinValue::Float(0.5));
    h.run_up();
    // 1.0 grid has no line at 0.5; nearest line is 0 on both axes.
    assert_eq!(h.counts(), 0);

    h.set(Pin::Resolution, PinValue::Float(0.5));
    let report = h.step();
    assert_eq!(report.counts, None);
    assert_eq!(h.st.state, LoadMap);

    let report = h.step();
    assert_eq!(report.load, LoadOutcome::Loaded);
    h.step();
    assert_eq!(h.counts(), 1000);
}

#[test]
fn test_method_change_reloads_before_output() {
    let mut h = Harness::new(UNIT_SQUARE, InterpolationMethod::Linear, 1.0);
    h.run_up();
    h.set(Pin::Method, PinValue::U32(InterpolationMethod::Nearest.to_pin()));
    let report = h.step();
    assert_eq!(report.counts, None);
    assert_eq!(h.st.state, LoadMap);
    h.step();
    assert_eq!(
        h.loader.grid().unwrap().method(),
        InterpolationMethod::Nearest
    );
}

#[test]
fn test_power_off_writes_zero_and_keeps_enable() {
    let mut h = Harness::new(UNIT_SQUARE, InterpolationMethod::Linear, 1.0);
    h.set(Pin::XPos, PinValue::Float(1.0));
    h.set(Pin::YPos, PinValue::Float(1.0));
    h.run_up();
    assert_eq!(h.counts(), 2000);

    h.power = PowerState::Off;
    h.step();
    assert_eq!(h.counts(), 0);
    assert!(h.bit(Pin::EnableOut));
    assert_eq!(h.st.state, Running);

    h.power = PowerState::On;
    h.step();
    assert_eq!(h.counts(), 2000);
}

#[test]
fn test_fade_height_attenuates() {
    let mut h = Harness::new(UNIT_SQUARE, InterpolationMethod::Linear, 1.0);
    h.set(Pin::XPos, PinValue::Float(1.0));
    h.set(Pin::YPos, PinValue::Float(1.0));
    h.set(Pin::FadeHeight, PinValue::Float(4.0));
    h.set(Pin::ZPos, PinValue::Float(1.0));
    h.run_up();
    assert_eq!(h.counts(), 1500);

    h.set(Pin::ZPos, PinValue::Float(4.0));
    h.step();
    assert_eq!(h.counts(), 0);
}

#[test]
fn test_mtime_change_triggers_reload() {
    let mut h = Harness::new(UNIT_SQUARE, InterpolationMethod::Linear, 1.0);
    h.set(Pin::XPos, PinValue::Float(1.0));
    h.set(Pin::YPos, PinValue::Float(1.0));
    h.run_up();
    assert_eq!(h.counts(), 2000);

    let mtime = bump_mtime(&h.path);
    rewrite(&h.path, "0 0 0\n1 0 0\n0 1 0\n1 1 0.5\n", mtime);

    // Reloads happen in LOADMAP: cycle through RESET.
    h.set(Pin::EnableIn, PinValue::Bit(false));
    h.set(Pin::EOffset, PinValue::Float(0.0));
    h.step();
    h.step();
    assert_eq!(h.st.state, Idle);
    h.set(Pin::EnableIn, PinValue::Bit(true));
    h.step();
    let report = h.step();
    assert_eq!(report.load, LoadOutcome::Loaded);
    h.step();
    assert_eq!(h.counts(), 500);
}

#[test]
fn test_failed_reload_keeps_previous_grid() {
    let mut h = Harness::new(UNIT_SQUARE, InterpolationMethod::Linear, 1.0);
    h.set(Pin::XPos, PinValue::Float(1.0));
    h.set(Pin::YPos, PinValue::Float(1.0));
    h.run_up();

    let mtime = bump_mtime(&h.path);
    rewrite(&h.path, "0 0 zero\n", mtime);
    h.set(Pin::Method, PinValue::U32(InterpolationMethod::Cubic.to_pin()));
    h.step();
    let report = h.step();
    assert_eq!(report.load, LoadOutcome::Failed);
    assert_eq!(h.st.state, Running);

    h.step();
    assert_eq!(h.counts(), 2000);
    assert_eq!(h.loader.grid().unwrap().method(), InterpolationMethod::Linear);
}

#[test]
fn test_first_load_failure_returns_to_idle() {
    let mut h = Harness::new("not a map\n", InterpolationMethod::Linear, 1.0);
    h.step();
    h.set(Pin::EnableIn, PinValue::Bit(true));
    h.step();
    let report = h.step();
    assert_eq!(report.load, LoadOutcome::Failed);
    assert_eq!(report.counts, Some(0));
    assert_eq!(h.st.state, Idle);
    assert!(!h.bit(Pin::EnableOut));
    assert!(h.loader.grid().is_none());
}

#[test]
fn test_broken_map_waits_in_idle_until_fixed() {
    let mut h = Harness::new("not a map\n", InterpolationMethod::Linear, 1.0);
    h.set(Pin::XPos, PinValue::Float(1.0));
    h.set(Pin::YPos, PinValue::Float(1.0));
    h.step();
    h.set(Pin::EnableIn, PinValue::Bit(true));
    h.step();
    assert_eq!(h.step().load, LoadOutcome::Failed);

    let entries = (0..20).filter(|_| h.step().entered).count();
    assert_eq!(entries, 1);
    assert_eq!(h.st.state, Idle);

    let mtime = bump_mtime(&h.path);
    rewrite(&h.path, UNIT_SQUARE, mtime);
    h.step();
    assert_eq!(h.st.state, LoadMap);
    assert_eq!(h.step().load, LoadOutcome::Loaded);
    h.step();
    assert_eq!(h.counts(), 2000);
}

#[test]
fn test_missing_map_file_is_not_fatal() {
    let mut h = Harness::new(UNIT_SQUARE, InterpolationMethod::Linear, 1.0);
    std::fs::remove_file(&h.path).unwrap();
    h.step();
    h.set(Pin::EnableIn, PinValue::Bit(true));
    h.step();
    let report = h.step();
    assert_eq!(report.load, LoadOutcome::Failed);
    assert_eq!(h.st.state, Idle);
}

#[test]
fn test_missing_pin_is_fatal() {
    let pins: Vec<Pin> = Pin::ALL
        .into_iter()
        .filter(|p| *p != Pin::FadeHeight)
        .collect();
    let mut bus = MemoryBus::with_pins(&pins);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("m.txt");
    std::fs::write(&path, UNIT_SQUARE).unwrap();
    let mut loader = MapLoader::new(FileMapSource::new(&path));

    let err = tick(EngineState::new(), &mut loader, &mut bus, PowerState::On).unwrap_err();
    assert!(matches!(
        err,
        EngineError::Bus(BusError::PinMissing(Pin::FadeHeight))
    ));
}
