//! Fixed-period tick loop.
//!
//! Ticks are paced against absolute deadlines on an injectable [`Clock`],
//! so tick duration does not accumulate as drift. Overruns are counted and
//! logged (first 10, then every 1000th). Whatever ends the loop, the
//! outputs are zeroed before [`CycleRunner::run`] returns.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use surfmap_common::method::InterpolationMethod;
use surfmap_common::pins::{Pin, PinValue};
use surfmap_hal::{MachineStatus, SignalBus};
use tracing::{debug, error, info, warn};

use crate::error::EngineError;
use crate::map::{MapLoader, MapSource};
use crate::state::{self, EngineState, LifecycleState, TickReport};

// ─── Clock ──────────────────────────────────────────────────────────

/// Monotonic time source for the tick loop.
pub trait Clock {
    fn now(&self) -> Instant;

    /// Block until `deadline`. Returns immediately if it has passed.
    fn sleep_until(&mut self, deadline: Instant);
}

/// Wall clock backed by `std::thread::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[inline]
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep_until(&mut self, deadline: Instant) {
        let now = Instant::now();
        if deadline > now {
            std::thread::sleep(deadline - now);
        }
    }
}

// ─── Cycle Statistics ───────────────────────────────────────────────

/// O(1) per-tick timing statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleStats {
    /// Total ticks executed.
    pub cycle_count: u64,
    /// Last tick duration [ns].
    pub last_cycle_ns: u64,
    /// Minimum tick duration [ns].
    pub min_cycle_ns: u64,
    /// Maximum tick duration [ns].
    pub max_cycle_ns: u64,
    /// Running sum for average computation.
    pub sum_cycle_ns: u64,
    /// Ticks that took longer than the period.
    pub overruns: u64,
    /// Maximum wake-up latency [ns] (actual minus scheduled start).
    pub max_latency_ns: u64,
}

impl CycleStats {
    pub const fn new() -> Self {
        Self {
            cycle_count: 0,
            last_cycle_ns: 0,
            min_cycle_ns: u64::MAX,
            max_cycle_ns: 0,
            sum_cycle_ns: 0,
            overruns: 0,
            max_latency_ns: 0,
        }
    }

    #[inline]
    pub fn record(&mut self, duration: Duration, latency: Duration) {
        let duration_ns = saturating_ns(duration);
        self.cycle_count += 1;
        self.last_cycle_ns = duration_ns;
        self.min_cycle_ns = self.min_cycle_ns.min(duration_ns);
        self.max_cycle_ns = self.max_cycle_ns.max(duration_ns);
        self.sum_cycle_ns = self.sum_cycle_ns.saturating_add(duration_ns);
        self.max_latency_ns = self.max_latency_ns.max(saturating_ns(latency));
    }

    /// Average tick time [ns] (0 if no ticks).
    #[inline]
    pub fn avg_cycle_ns(&self) -> u64 {
        if self.cycle_count == 0 {
            0
        } else {
            self.sum_cycle_ns / self.cycle_count
        }
    }
}

impl Default for CycleStats {
    fn default() -> Self {
        Self::new()
    }
}

fn saturating_ns(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

// ─── Runner ─────────────────────────────────────────────────────────

/// Owns the loader, the bus and the power source, and drives
/// [`state::tick`] at a fixed period.
pub struct CycleRunner<S, B, M, C = SystemClock> {
    loader: MapLoader<S>,
    bus: B,
    status: M,
    clock: C,
    state: EngineState,
    stats: CycleStats,
    period: Duration,
}

impl<S, B, M, C> CycleRunner<S, B, M, C>
where
    S: MapSource,
    B: SignalBus,
    M: MachineStatus,
    C: Clock,
{
    pub fn new(loader: MapLoader<S>, bus: B, status: M, clock: C, period: Duration) -> Self {
        Self {
            loader,
            bus,
            status,
            clock,
            state: EngineState::new(),
            stats: CycleStats::new(),
            period,
        }
    }

    /// Preset the `resolution` and `method` inputs to their startup
    /// defaults. The controller side may override them afterwards.
    pub fn init(
        &mut self,
        resolution: f64,
        method: InterpolationMethod,
    ) -> Result<(), EngineError> {
        self.bus.preset(Pin::Resolution, PinValue::Float(resolution))?;
        self.bus.preset(Pin::Method, PinValue::U32(method.to_pin()))?;
        info!(resolution, %method, "Bus defaults preset");
        Ok(())
    }

    /// Run one tick now, without pacing.
    pub fn step(&mut self) -> Result<TickReport, EngineError> {
        let power = self.status.poll()?;
        let (next, report) = state::tick(self.state, &mut self.loader, &mut self.bus, power)?;
        self.state = next;
        Ok(report)
    }

    /// Tick every period until `running` is cleared or a tick fails.
    ///
    /// Outputs are zeroed on every exit path.
    pub fn run(&mut self, running: &AtomicBool) -> Result<(), EngineError> {
        info!(
            "Starting tick loop (period={}ms)",
            self.period.as_millis()
        );
        if detect_rt_mode() {
            info!("Running in real-time mode");
        } else {
            info!("Running in standard (non-RT) mode");
        }

        let result = self.run_loop(running);
        if let Err(e) = &result {
            error!("Tick loop failed: {e}");
        }
        let zeroed = self.shutdown();

        info!(
            "Tick loop stopped after {} ticks (overruns: {})",
            self.stats.cycle_count, self.stats.overruns
        );
        result.and(zeroed)
    }

    fn run_loop(&mut self, running: &AtomicBool) -> Result<(), EngineError> {
        let mut deadline = self.clock.now();

        while running.load(Ordering::SeqCst) {
            deadline += self.period;
            self.clock.sleep_until(deadline);
            if !running.load(Ordering::SeqCst) {
                break;
            }

            let start = self.clock.now();
            self.step()?;
            let end = self.clock.now();
            let duration = end.saturating_duration_since(start);
            self.stats
                .record(duration, start.saturating_duration_since(deadline));

            if duration > self.period {
                self.stats.overruns += 1;
                let n = self.stats.overruns;
                if n <= 10 || n % 1000 == 0 {
                    warn!(
                        "Overrun #{}: tick took {}us (period {}us)",
                        n,
                        duration.as_micros(),
                        self.period.as_micros()
                    );
                }
            }
            // Skip missed deadlines instead of bursting to catch up.
            if end > deadline + self.period {
                deadline = end;
            }

            if self.stats.cycle_count % 1000 == 0 {
                debug!(
                    "Tick loop: {} ticks, avg={}us, max={}us, overruns={}, state={}",
                    self.stats.cycle_count,
                    self.stats.avg_cycle_ns() / 1000,
                    self.stats.max_cycle_ns / 1000,
                    self.stats.overruns,
                    self.state.state
                );
            }
        }
        Ok(())
    }

    /// Zero `counts`, release `clear` and deassert `enable-out`.
    ///
    /// Every write is attempted; the first failure is returned.
    pub fn shutdown(&mut self) -> Result<(), EngineError> {
        let writes = [
            (Pin::Counts, PinValue::S32(0)),
            (Pin::Clear, PinValue::Bit(false)),
            (Pin::EnableOut, PinValue::Bit(false)),
        ];
        let mut first_err = None;
        for (pin, value) in writes {
            if let Err(e) = self.bus.write(pin, value) {
                warn!("Failed to zero {pin} on shutdown: {e}");
                first_err = first_err.or(Some(e));
            }
        }
        if let Err(e) = self.bus.commit() {
            first_err = first_err.or(Some(e));
        }
        self.state.last_counts = 0;
        self.state.clear_raised = false;
        info!("Outputs zeroed");
        match first_err {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state.state
    }

    pub fn engine_state(&self) -> &EngineState {
        &self.state
    }

    pub fn stats(&self) -> &CycleStats {
        &self.stats
    }

    pub fn loader(&self) -> &MapLoader<S> {
        &self.loader
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    pub fn status_mut(&mut self) -> &mut M {
        &mut self.status
    }
}

/// Detect if running in real-time mode by checking scheduler policy.
pub fn detect_rt_mode() -> bool {
    #[cfg(target_os = "linux")]
    {
        use libc::{SCHED_FIFO, SCHED_RR, sched_getscheduler};
        // SAFETY: sched_getscheduler(0) only queries the calling thread.
        unsafe {
            let policy = sched_getscheduler(0);
            policy == SCHED_FIFO || policy == SCHED_RR
        }
    }
    #[cfg(not(target_os = "linux"))]
    {
        false
    }
}
