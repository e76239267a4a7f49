//! Binary entry points: `--check` output and fatal startup errors.

use std::process::{Command, Output};
use tempfile::tempdir;

fn run_cli(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_surfmap_engine"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

fn combined(out: &Output) -> String {
    let mut text = String::from_utf8_lossy(&out.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&out.stderr));
    text
}

#[test]
fn check_prints_json_summary() {
    let dir = tempdir().unwrap();
    let map = dir.path().join("probe-results.txt");
    std::fs::write(&map, "0 0 0\n1 0 1\n0 1 1\n1 1 2\n").unwrap();

    let out = run_cli(&[map.to_str().unwrap(), "linear", "--check", "--json"]);
    assert_eq!(out.status.code(), Some(0));
    let text = combined(&out);
    assert!(text.contains("\"method\": \"linear\""), "{text}");
    assert!(text.contains("\"fallback_cells\": 0"), "{text}");
}

#[test]
fn check_on_broken_map_is_fatal() {
    let dir = tempdir().unwrap();
    let map = dir.path().join("probe-results.txt");
    std::fs::write(&map, "0 0 zero\n").unwrap();

    let out = run_cli(&[map.to_str().unwrap(), "--check"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(combined(&out).contains("FATAL"));
}

#[test]
fn missing_config_file_reports_fatal() {
    let dir = tempdir().unwrap();
    let map = dir.path().join("probe-results.txt");
    let config = dir.path().join("absent.toml");

    let out = run_cli(&[
        map.to_str().unwrap(),
        "--config",
        config.to_str().unwrap(),
        "--check",
    ]);
    assert_eq!(out.status.code(), Some(1));
    let text = combined(&out);
    assert!(text.contains("FATAL"), "{text}");
    assert!(text.contains("Configuration file not found"), "{text}");
}
