//! # Surfmap Engine Binary
//!
//! Drives Z compensation from a probe-sample height map over the
//! shared-memory signal bus.
//!
//! # Usage
//!
//! ```bash
//! # Run with cubic interpolation (default)
//! surfmap_engine probe-results.txt
//!
//! # Linear interpolation, 20 ms tick, custom segment
//! surfmap_engine probe-results.txt linear --period-ms 20 --segment mill2
//!
//! # Inspect the grid a map would produce and exit
//! surfmap_engine probe-results.txt nearest --check --json
//! ```

#![deny(warnings)]

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use surfmap_common::config::{LogLevel, load_engine_config};
use surfmap_engine::config::RunSettings;
use surfmap_engine::map::{FileMapSource, MapLoader, load_grid};
use surfmap_engine::{CycleRunner, SystemClock};
use surfmap_hal::ShmBus;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Surfmap Engine - real-time surface-map Z compensation
#[derive(Parser, Debug)]
#[command(name = "surfmap_engine")]
#[command(version)]
#[command(about = "Real-time surface-map Z compensation engine")]
#[command(long_about = None)]
struct Args {
    /// Probe-sample file (rows of `x y z`)
    map_file: PathBuf,

    /// Default interpolation method: nearest, linear or cubic
    method: Option<String>,

    /// Path to TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Shared-memory segment name (overrides config)
    #[arg(long)]
    segment: Option<String>,

    /// Tick period in milliseconds (overrides config)
    #[arg(long, value_name = "MS")]
    period_ms: Option<u64>,

    /// Load the map once, print the grid summary and exit
    #[arg(long)]
    check: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs (and the --check summary) in JSON format
    #[arg(long)]
    json: bool,
}

fn main() {
    if let Err(e) = run() {
        // Errors raised before the subscriber is installed would be lost.
        if tracing::dispatcher::has_been_set() {
            error!("FATAL: {}", e);
        } else {
            eprintln!("FATAL: {e}");
        }
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = load_engine_config(args.config.as_deref());
    let level = match &config {
        _ if args.verbose => LogLevel::Debug,
        Ok(c) => c.shared.log_level,
        Err(_) => LogLevel::Info,
    };
    setup_tracing(&args, level)?;
    let config = config?;

    info!(
        "{} engine v{} starting...",
        config.shared.service_name,
        env!("CARGO_PKG_VERSION")
    );

    let settings = RunSettings::resolve(
        &config,
        args.map_file.clone(),
        args.method.as_deref(),
        args.segment.clone(),
        args.period_ms,
    )?;

    if args.check {
        return check(&settings, args.json);
    }

    let source = FileMapSource::new(&settings.map_path).with_max_bytes(settings.max_map_bytes);
    let bus = ShmBus::create(&settings.segment)?;
    info!("Signal bus at {}", bus.path().display());
    // The controller side writes the power word into the same segment.
    let status = ShmBus::attach(&settings.segment)?;

    let mut runner = CycleRunner::new(
        MapLoader::new(source),
        bus,
        status,
        SystemClock,
        settings.period,
    );
    runner.init(settings.resolution, settings.method)?;

    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        flag.store(false, Ordering::SeqCst);
    })?;

    runner.run(&running)?;

    info!("Surfmap engine shutdown complete");
    Ok(())
}

/// `--check`: build the grid once and print its summary.
fn check(settings: &RunSettings, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let grid = load_grid(
        &settings.map_path,
        settings.method,
        settings.resolution,
        settings.max_map_bytes,
    )?;
    let s = grid.summary();
    if json {
        println!("{}", serde_json::to_string_pretty(s)?);
    } else {
        println!("map:            {}", settings.map_path.display());
        println!("samples:        {}", s.samples);
        println!(
            "bounds:         x [{}, {}]  y [{}, {}]",
            s.bounds.x_min, s.bounds.x_max, s.bounds.y_min, s.bounds.y_max
        );
        println!("grid:           {} x {}", s.x_points, s.y_points);
        println!("method:         {}", s.method);
        println!("resolution:     {}", s.resolution);
        println!("offset range:   [{:.4}, {:.4}]", s.z_min, s.z_max);
        println!("fallback cells: {}", s.fallback_cells);
    }
    Ok(())
}

/// Setup tracing subscriber based on CLI arguments and config.
fn setup_tracing(args: &Args, level: LogLevel) -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::from_default_env().add_directive(level.as_directive().parse()?);

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    Ok(())
}
