//! File-backed map loading: parsing, grid geometry, interpolation methods
//! and the loader's keep-last-good behavior.

use std::io::{Seek, SeekFrom, Write};
use surfmap_common::method::InterpolationMethod;
use surfmap_engine::map::{Bounds, FileMapSource, MapLoader, MapSource, load_grid};
use surfmap_engine::{MapLoadError, sampler};
use tempfile::NamedTempFile;

const LIMIT: u64 = 1024 * 1024;

fn map_file(content: &str) -> NamedTempFile {
    let mut f = NamedTempFile::new().unwrap();
    f.write_all(content.as_bytes()).unwrap();
    f.flush().unwrap();
    f
}

fn unit_square() -> NamedTempFile {
    map_file("0 0 0\n1 0 1\n0 1 1\n1 1 2\n")
}

#[test]
fn test_unit_square_linear_center() {
    let f = unit_square();
    let grid = load_grid(f.path(), InterpolationMethod::Linear, 0.5, LIMIT).unwrap();
    assert_eq!(grid.x_axis(), &[0.0, 0.5, 1.0]);
    assert_eq!(grid.y_axis(), &[0.0, 0.5, 1.0]);
    assert!((grid.offset(1, 1) - 1.0).abs() < 1e-9);
    assert_eq!(sampler::sample(&grid, 0.5, 0.5), 1000);
}

#[test]
fn test_unit_square_cubic_center() {
    // z = x + y is linear, so cubic reproduces it.
    let f = unit_square();
    let grid = load_grid(f.path(), InterpolationMethod::Cubic, 0.5, LIMIT).unwrap();
    assert_eq!(sampler::sample(&grid, 0.5, 0.5), 1000);
    assert_eq!(sampler::sample(&grid, 1.0, 0.5), 1500);
}

#[test]
fn test_bounds_and_axes() {
    let f = map_file("-2 3 0.1\n4 -1 0.2\n1 1 0.3\n0 5 0.4\n");
    let grid = load_grid(f.path(), InterpolationMethod::Nearest, 0.75, LIMIT).unwrap();
    assert_eq!(
        grid.bounds(),
        Bounds {
            x_min: -2,
            x_max: 4,
            y_min: -1,
            y_max: 5
        }
    );
    for axis in [grid.x_axis(), grid.y_axis()] {
        assert!(axis.windows(2).all(|w| w[0] < w[1]));
    }
    // floor(6 / 0.75) + 1
    assert_eq!(grid.x_axis().len(), 9);
    assert_eq!(*grid.x_axis().first().unwrap(), -2.0);
    assert_eq!(*grid.x_axis().last().unwrap(), 4.0);
}

#[test]
fn test_xy_rounded_on_ingest() {
    let f = map_file("0.04 0.04 0\n2.96 0 0\n0 3.04 0\n");
    let grid = load_grid(f.path(), InterpolationMethod::Nearest, 1.0, LIMIT).unwrap();
    // 2.96 → 3.0, 3.04 → 3.0
    assert_eq!(grid.bounds().x_max, 3);
    assert_eq!(grid.bounds().y_max, 3);
}

#[test]
fn test_nearest_method() {
    let f = map_file("0 0 0.001\n4 0 0.002\n");
    let grid = load_grid(f.path(), InterpolationMethod::Nearest, 1.0, LIMIT).unwrap();
    assert_eq!(grid.x_axis().len(), 5);
    assert_eq!(grid.y_axis().len(), 1);
    assert_eq!(sampler::sample(&grid, 1.0, 0.0), 1);
    assert_eq!(sampler::sample(&grid, 3.0, 0.0), 2);
    // Equidistant: first sample in file order.
    assert_eq!(grid.offset(2, 0), 0.001);
}

#[test]
fn test_hull_gaps_use_nearest() {
    // Right triangle: the (2, 2) corner lies outside the hull.
    let f = map_file("0 0 0\n2 0 0.002\n0 2 0.004\n");
    let grid = load_grid(f.path(), InterpolationMethod::Cubic, 1.0, LIMIT).unwrap();
    assert!(grid.summary().fallback_cells > 0);
    for i in 0..grid.x_axis().len() {
        for j in 0..grid.y_axis().len() {
            assert!(grid.offset(i, j).is_finite());
        }
    }
}

#[test]
fn test_malformed_row() {
    let f = map_file("0 0 0\n1 x 1\n");
    let err = load_grid(f.path(), InterpolationMethod::Linear, 1.0, LIMIT).unwrap_err();
    assert!(matches!(err, MapLoadError::Parse { line: 2, .. }));
}

#[test]
fn test_empty_file() {
    let f = map_file("\n# nothing\n");
    let err = load_grid(f.path(), InterpolationMethod::Linear, 1.0, LIMIT).unwrap_err();
    assert!(matches!(err, MapLoadError::Empty));
}

#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_grid(
        dir.path().join("absent.txt"),
        InterpolationMethod::Linear,
        1.0,
        LIMIT,
    )
    .unwrap_err();
    assert!(matches!(err, MapLoadError::Unreadable { .. }));
}

#[test]
fn test_too_large_file() {
    let f = unit_square();
    let err = load_grid(f.path(), InterpolationMethod::Linear, 1.0, 8).unwrap_err();
    assert!(matches!(err, MapLoadError::TooLarge { limit: 8, .. }));
}

#[test]
fn test_loader_keeps_last_good_grid() {
    let mut f = unit_square();
    let mut loader = MapLoader::new(FileMapSource::new(f.path()).with_max_bytes(LIMIT));
    assert!(loader.grid().is_none());
    loader.load(InterpolationMethod::Linear, 0.5).unwrap();

    f.as_file_mut().set_len(0).unwrap();
    f.seek(SeekFrom::Start(0)).unwrap();
    f.write_all(b"garbage\n").unwrap();
    f.flush().unwrap();
    assert!(loader.load(InterpolationMethod::Linear, 0.25).is_err());

    let grid = loader.grid().unwrap();
    assert_eq!(grid.resolution(), 0.5);
    assert_eq!(grid.method(), InterpolationMethod::Linear);
}

#[test]
fn test_source_stat() {
    let f = unit_square();
    let source = FileMapSource::new(f.path());
    let meta = source.stat().unwrap();
    assert_eq!(meta.len, 24);
    assert!(source.modified().is_some());
    assert_eq!(source.describe(), f.path().display().to_string());
}
