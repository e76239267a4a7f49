//! Height map loading and the dense offset grid.
//!
//! A probe-sample file becomes a [`HeightMap`] (rounded samples, integer
//! bounding box, method and resolution), which is interpolated into an
//! immutable [`InterpolatedGrid`]. [`MapLoader`] owns the current grid and
//! swaps it only when a load succeeds.

pub mod interpolate;
pub mod parse;
pub mod triangulation;

use serde::Serialize;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use surfmap_common::consts::{DEFAULT_MAX_MAP_BYTES, MAX_GRID_POINTS};
use surfmap_common::method::InterpolationMethod;

use crate::error::MapLoadError;

/// One probe measurement. X and Y are rounded to 0.1 on ingest.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeSample {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Integer bounding box of the rounded sample sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Bounds {
    pub x_min: i64,
    pub x_max: i64,
    pub y_min: i64,
    pub y_max: i64,
}

impl Bounds {
    /// Min/max of the sample coordinates, each truncated toward zero.
    ///
    /// `samples` must be non-empty.
    pub fn of(samples: &[ProbeSample]) -> Self {
        let (mut x_lo, mut x_hi) = (f64::INFINITY, f64::NEG_INFINITY);
        let (mut y_lo, mut y_hi) = (f64::INFINITY, f64::NEG_INFINITY);
        for s in samples {
            x_lo = x_lo.min(s.x);
            x_hi = x_hi.max(s.x);
            y_lo = y_lo.min(s.y);
            y_hi = y_hi.max(s.y);
        }
        Self {
            x_min: x_lo as i64,
            x_max: x_hi as i64,
            y_min: y_lo as i64,
            y_max: y_hi as i64,
        }
    }
}

/// Parsed samples plus the parameters a grid is built with.
#[derive(Debug, Clone)]
pub struct HeightMap {
    samples: Vec<ProbeSample>,
    bounds: Bounds,
    method: InterpolationMethod,
    resolution: f64,
}

impl HeightMap {
    pub fn new(
        samples: Vec<ProbeSample>,
        method: InterpolationMethod,
        resolution: f64,
    ) -> Result<Self, MapLoadError> {
        if !resolution.is_finite() || resolution <= 0.0 {
            return Err(MapLoadError::InvalidResolution(resolution));
        }
        if samples.is_empty() {
            return Err(MapLoadError::Empty);
        }
        let bounds = Bounds::of(&samples);
        Ok(Self {
            samples,
            bounds,
            method,
            resolution,
        })
    }

    pub fn samples(&self) -> &[ProbeSample] {
        &self.samples
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// Interpolate the samples over the axis cross-product.
    pub fn interpolate(&self) -> Result<InterpolatedGrid, MapLoadError> {
        let b = self.bounds;
        let x_steps = axis_steps(b.x_min, b.x_max, self.resolution);
        let y_steps = axis_steps(b.y_min, b.y_max, self.resolution);
        let too_large = MapLoadError::GridTooLarge {
            x_steps,
            y_steps,
            limit: MAX_GRID_POINTS,
        };
        match x_steps.checked_mul(y_steps) {
            Some(n) if n <= MAX_GRID_POINTS => {}
            _ => return Err(too_large),
        }

        let x = linspace(b.x_min as f64, b.x_max as f64, x_steps);
        let y = linspace(b.y_min as f64, b.y_max as f64, y_steps);
        let out = interpolate::interpolate(&self.samples, &x, &y, self.method);

        let (z_min, z_max) = out
            .values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        let summary = GridSummary {
            samples: self.samples.len(),
            bounds: b,
            x_points: x.len(),
            y_points: y.len(),
            method: self.method,
            resolution: self.resolution,
            z_min,
            z_max,
            fallback_cells: out.fallback_cells,
        };

        Ok(InterpolatedGrid {
            x,
            y,
            offsets: out.values,
            summary,
        })
    }
}

/// `floor((max - min) / resolution) + 1`, saturated to `usize`.
fn axis_steps(min: i64, max: i64, resolution: f64) -> usize {
    let span = (max - min) as f64;
    let steps = (span / resolution).floor() + 1.0;
    // Float-to-int casts saturate; the grid cap rejects the huge ones.
    steps as usize
}

/// `steps` evenly spaced points from `min` to `max` inclusive. The last
/// point is exactly `max`; one step yields `[min]`.
pub fn linspace(min: f64, max: f64, steps: usize) -> Vec<f64> {
    match steps {
        0 => Vec::new(),
        1 => vec![min],
        _ => {
            let step = (max - min) / (steps - 1) as f64;
            let mut axis: Vec<f64> = (0..steps).map(|k| min + k as f64 * step).collect();
            axis[steps - 1] = max;
            axis
        }
    }
}

/// Load statistics, logged after every successful load and printed by
/// `--check`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridSummary {
    pub samples: usize,
    pub bounds: Bounds,
    pub x_points: usize,
    pub y_points: usize,
    pub method: InterpolationMethod,
    pub resolution: f64,
    pub z_min: f64,
    pub z_max: f64,
    pub fallback_cells: usize,
}

/// Dense offset grid. Immutable once built.
#[derive(Debug, Clone)]
pub struct InterpolatedGrid {
    x: Vec<f64>,
    y: Vec<f64>,
    /// x-major: `offsets[i * y.len() + j]`.
    offsets: Vec<f64>,
    summary: GridSummary,
}

impl InterpolatedGrid {
    pub fn x_axis(&self) -> &[f64] {
        &self.x
    }

    pub fn y_axis(&self) -> &[f64] {
        &self.y
    }

    /// Offset at axis indices (i, j).
    #[inline]
    pub fn offset(&self, i: usize, j: usize) -> f64 {
        self.offsets[i * self.y.len() + j]
    }

    pub fn bounds(&self) -> Bounds {
        self.summary.bounds
    }

    pub fn method(&self) -> InterpolationMethod {
        self.summary.method
    }

    pub fn resolution(&self) -> f64 {
        self.summary.resolution
    }

    pub fn summary(&self) -> &GridSummary {
        &self.summary
    }
}

/// File metadata reported by a [`MapSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceMeta {
    pub modified: Option<SystemTime>,
    pub len: u64,
}

/// Where probe samples come from.
pub trait MapSource {
    /// Human-readable origin, for logs.
    fn describe(&self) -> String;

    /// Size and modification time.
    fn stat(&self) -> Result<SourceMeta, MapLoadError>;

    /// Read and parse every sample.
    fn read_samples(&self) -> Result<Vec<ProbeSample>, MapLoadError>;

    /// Modification time, `None` when unavailable.
    fn modified(&self) -> Option<SystemTime> {
        self.stat().ok().and_then(|m| m.modified)
    }
}

/// Probe-sample file on disk.
#[derive(Debug, Clone)]
pub struct FileMapSource {
    path: PathBuf,
    max_bytes: u64,
}

impl FileMapSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_bytes: DEFAULT_MAX_MAP_BYTES,
        }
    }

    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn unreadable(&self, source: std::io::Error) -> MapLoadError {
        MapLoadError::Unreadable {
            path: self.path.clone(),
            source,
        }
    }
}

impl MapSource for FileMapSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn stat(&self) -> Result<SourceMeta, MapLoadError> {
        let meta = std::fs::metadata(&self.path).map_err(|e| self.unreadable(e))?;
        Ok(SourceMeta {
            modified: meta.modified().ok(),
            len: meta.len(),
        })
    }

    fn read_samples(&self) -> Result<Vec<ProbeSample>, MapLoadError> {
        let file = File::open(&self.path).map_err(|e| self.unreadable(e))?;
        let size = file.metadata().map_err(|e| self.unreadable(e))?.len();
        if size > self.max_bytes {
            return Err(MapLoadError::TooLarge {
                size,
                limit: self.max_bytes,
            });
        }

        // The file may grow between stat and read.
        let mut text = String::with_capacity(size as usize);
        let read = file
            .take(self.max_bytes + 1)
            .read_to_string(&mut text)
            .map_err(|e| self.unreadable(e))?;
        if read as u64 > self.max_bytes {
            return Err(MapLoadError::TooLarge {
                size: read as u64,
                limit: self.max_bytes,
            });
        }
        parse::parse_samples(&text)
    }
}

/// Inputs of a load attempt. Any difference forces a new attempt.
#[derive(Debug, Clone, Copy)]
pub struct LoadStamp {
    pub modified: Option<SystemTime>,
    pub method: InterpolationMethod,
    pub resolution: f64,
}

impl LoadStamp {
    /// Whether the runtime parameters still match this stamp.
    pub fn same_params(&self, method: InterpolationMethod, resolution: f64) -> bool {
        self.method == method && self.resolution.to_bits() == resolution.to_bits()
    }
}

// Bitwise resolution compare: a NaN stamp equals itself, so a rejected
// NaN resolution is not retried every tick.
impl PartialEq for LoadStamp {
    fn eq(&self, other: &Self) -> bool {
        self.modified == other.modified && self.same_params(other.method, other.resolution)
    }
}

impl Eq for LoadStamp {}

/// Owns the current grid and its source.
#[derive(Debug)]
pub struct MapLoader<S = FileMapSource> {
    source: S,
    grid: Option<InterpolatedGrid>,
}

impl<S: MapSource> MapLoader<S> {
    pub fn new(source: S) -> Self {
        Self { source, grid: None }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Current grid, if any load has ever succeeded.
    pub fn grid(&self) -> Option<&InterpolatedGrid> {
        self.grid.as_ref()
    }

    /// Stamp for a load with the given parameters, taken now.
    pub fn stamp(&self, method: InterpolationMethod, resolution: f64) -> LoadStamp {
        LoadStamp {
            modified: self.source.modified(),
            method,
            resolution,
        }
    }

    /// Build a new grid. On failure the previous grid is kept.
    pub fn load(
        &mut self,
        method: InterpolationMethod,
        resolution: f64,
    ) -> Result<&GridSummary, MapLoadError> {
        let grid = build_grid(self.source.read_samples()?, method, resolution)?;
        Ok(self.grid.insert(grid).summary())
    }
}

/// Interpolate parsed samples into a grid.
pub fn build_grid(
    samples: Vec<ProbeSample>,
    method: InterpolationMethod,
    resolution: f64,
) -> Result<InterpolatedGrid, MapLoadError> {
    HeightMap::new(samples, method, resolution)?.interpolate()
}

/// One-shot load from a path.
pub fn load_grid(
    path: impl Into<PathBuf>,
    method: InterpolationMethod,
    resolution: f64,
    max_bytes: u64,
) -> Result<InterpolatedGrid, MapLoadError> {
    let source = FileMapSource::new(path).with_max_bytes(max_bytes);
    build_grid(source.read_samples()?, method, resolution)
}
