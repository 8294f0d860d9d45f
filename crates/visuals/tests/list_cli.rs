use std::fs;
use std::process::Command;

use tempfile::TempDir;

#[test]
fn list_prints_catalog_and_seeds_live_edit() {
    let root = TempDir::new().unwrap();
    let config_dir = root.path().join("config");
    let data_dir = root.path().join("data");

    let output = Command::new(env!("CARGO_BIN_EXE_visuals"))
        .env("VISUALS_CONFIG_DIR", &config_dir)
        .env("VISUALS_DATA_DIR", &data_dir)
        .arg("list")
        .output()
        .expect("failed to run visuals list");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for name in ["life", "smooth-life", "pong", "turtle", "mandelbrot", "julia", "live-edit", "noop"] {
        assert!(stdout.contains(name), "missing {name} in:\n{stdout}");
    }
    assert!(data_dir.join("live-edit/live.frag").exists());
}

#[test]
fn invalid_config_fails_before_opening_a_window() {
    let root = TempDir::new().unwrap();
    let config_dir = root.path().join("config");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(config_dir.join("config.toml"), "version = 2\n").unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_visuals"))
        .env("VISUALS_CONFIG_DIR", &config_dir)
        .env("VISUALS_DATA_DIR", root.path().join("data"))
        .arg("list")
        .output()
        .expect("failed to run visuals list");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unsupported config version"), "{stderr}");
}
