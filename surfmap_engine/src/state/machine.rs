//! One tick of the compensation lifecycle.
//!
//! START → IDLE → LOADMAP → RUNNING → RESET → IDLE | LOADMAP.
//!
//! Every input is read up front, so a missing pin fails the tick before
//! anything is written. Outputs are only written by the state that owns
//! them; the `clear` pulse raised on RESET entry is released on the next
//! tick whatever the state is by then.

use surfmap_common::consts::DRAIN_THRESHOLD;
use surfmap_common::pins::{Pin, PowerState};
use surfmap_hal::SignalBus;
use tracing::{debug, error, info, warn};

use super::{EngineState, LifecycleState, LoadOutcome, TickInputs, TickReport};
use crate::error::EngineError;
use crate::map::{MapLoader, MapSource};
use crate::{fade, sampler};

/// Advance the lifecycle by one tick.
pub fn tick<S, B>(
    mut st: EngineState,
    loader: &mut MapLoader<S>,
    bus: &mut B,
    power: PowerState,
) -> Result<(EngineState, TickReport), EngineError>
where
    S: MapSource,
    B: SignalBus + ?Sized,
{
    use LifecycleState::*;

    let inputs = TickInputs::read(bus)?;
    let entering = st.entering();
    if entering {
        info!("Entering {} state", st.state);
    }
    let mut report = TickReport {
        state: st.state,
        entered: entering,
        ..TickReport::default()
    };

    if st.clear_raised {
        bus.write_bit(Pin::Clear, false)?;
        st.clear_raised = false;
    }
    st.previous = Some(st.state);

    let next = match st.state {
        Start => {
            log_source(loader);
            st.last_load = None;
            write_counts(&mut st, &mut report, bus, 0)?;
            Idle
        }

        Idle => {
            let params = inputs.params;
            // Without a grid, a failed load is only retried once its
            // inputs change.
            let failed_unchanged = loader.grid().is_none()
                && st.last_load.is_some()
                && st.last_load == Some(loader.stamp(params.method, params.resolution));
            if params.enable && !failed_unchanged {
                LoadMap
            } else {
                Idle
            }
        }

        LoadMap => {
            let params = inputs.params;
            let stamp = loader.stamp(params.method, params.resolution);
            if st.last_load != Some(stamp) {
                let source = loader.source().describe();
                report.load = match loader.load(params.method, params.resolution) {
                    Ok(summary) => {
                        info!(
                            %source,
                            method = %summary.method,
                            resolution = summary.resolution,
                            x_min = summary.bounds.x_min,
                            x_max = summary.bounds.x_max,
                            y_min = summary.bounds.y_min,
                            y_max = summary.bounds.y_max,
                            points = summary.x_points * summary.y_points,
                            samples = summary.samples,
                            fallback_cells = summary.fallback_cells,
                            "Compensation map loaded"
                        );
                        LoadOutcome::Loaded
                    }
                    Err(e) => {
                        error!(%source, "Map load failed: {e}");
                        LoadOutcome::Failed
                    }
                };
                st.last_load = Some(stamp);
            }

            if loader.grid().is_some() {
                Running
            } else {
                write_counts(&mut st, &mut report, bus, 0)?;
                Idle
            }
        }

        Running => {
            let params = inputs.params;
            let changed = st
                .last_load
                .is_none_or(|s| !s.same_params(params.method, params.resolution));
            if !params.enable {
                Reset
            } else if changed {
                debug!(method = %params.method, resolution = params.resolution, "Map parameters changed");
                LoadMap
            } else if let Some(grid) = loader.grid() {
                bus.write_bit(Pin::EnableOut, true)?;
                if power.is_on() {
                    let raw = sampler::sample(grid, inputs.x, inputs.y);
                    let counts = fade::apply(raw, fade::factor(inputs.z, params.fade_height));
                    write_counts(&mut st, &mut report, bus, counts)?;
                    bus.write_float(Pin::Scale, params.scale)?;
                } else {
                    write_counts(&mut st, &mut report, bus, 0)?;
                }
                Running
            } else {
                // RUNNING is only entered with a grid.
                warn!("No grid while running");
                LoadMap
            }
        }

        Reset => {
            if entering {
                // enable-out stays asserted so the downstream integrator
                // sees the zeroed delta and the clear.
                write_counts(&mut st, &mut report, bus, 0)?;
                bus.write_bit(Pin::Clear, true)?;
                st.clear_raised = true;
            }

            if inputs.eoffset.abs() < DRAIN_THRESHOLD {
                bus.write_bit(Pin::EnableOut, false)?;
                Idle
            } else if inputs.params.enable {
                LoadMap
            } else {
                Reset
            }
        }
    };

    st.state = next;
    bus.commit()?;
    Ok((st, report))
}

fn write_counts<B: SignalBus + ?Sized>(
    st: &mut EngineState,
    report: &mut TickReport,
    bus: &mut B,
    counts: i32,
) -> Result<(), EngineError> {
    bus.write_s32(Pin::Counts, counts)?;
    st.last_counts = counts;
    report.counts = Some(counts);
    Ok(())
}

fn log_source<S: MapSource>(loader: &MapLoader<S>) {
    let source = loader.source();
    match source.stat() {
        Ok(meta) => {
            let modified = meta
                .modified
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| d.as_secs());
            info!(
                source = %source.describe(),
                size = meta.len,
                modified_epoch_s = ?modified,
                "Map source"
            );
        }
        Err(e) => warn!(source = %source.describe(), "Cannot stat map source: {e}"),
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
