use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

fn alphawar() -> Command {
    Command::cargo_bin("alphawar").unwrap()
}

/// Package counter column, then `channels` copies of a 10 Hz tone mixed with a
/// weaker 20 Hz tone
fn recording(seconds: usize, rate: usize, channels: usize) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
    writeln!(file, "# counter + {} channels", channels).unwrap();
    for i in 0..seconds * rate {
        let t = i as f64 / rate as f64;
        let v = 2.0 * (2.0 * std::f64::consts::PI * 10.0 * t).sin()
            + (2.0 * std::f64::consts::PI * 20.0 * t).sin();
        let mut line = (i % 256).to_string();
        for _ in 0..channels {
            line.push_str(&format!("\t{}", v));
        }
        writeln!(file, "{}", line).unwrap();
    }
    file
}

// =============================================================================
// GENERAL
// =============================================================================

#[test]
fn test_no_args_shows_help() {
    alphawar()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage:"));
}

#[test]
fn test_version_flag() {
    alphawar()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("alphawar"));
}

#[test]
fn test_help_lists_subcommands() {
    alphawar()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("scan"))
        .stdout(predicate::str::contains("play"))
        .stdout(predicate::str::contains("analyze"));
}

// =============================================================================
// CONFIG SUBCOMMAND
// =============================================================================

#[test]
fn test_config_json_from_file() {
    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    write!(file, r#"{{"epoch_seconds": 1.5, "feature_mode": "norm"}}"#).unwrap();

    let output = alphawar()
        .arg("config")
        .arg("--config")
        .arg(file.path())
        .arg("--json")
        .assert()
        .success();

    let stdout = String::from_utf8(output.get_output().stdout.clone()).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(parsed["epoch_seconds"], 1.5);
    assert_eq!(parsed["feature_mode"], "norm");
    assert_eq!(parsed["bound"], 600.0);
    assert_eq!(parsed["players"].as_array().unwrap().len(), 2);
}

#[test]
fn test_config_rejects_invalid_file() {
    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    write!(file, r#"{{"step": -1}}"#).unwrap();

    alphawar()
        .arg("config")
        .arg("--config")
        .arg(file.path())
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("step"));
}

// =============================================================================
// ANALYZE SUBCOMMAND
// =============================================================================

#[test]
fn test_analyze_json() {
    let file = recording(4, 200, 4);

    let output = alphawar()
        .arg("analyze")
        .arg("--file")
        .arg(file.path())
        .args(["--rate", "200", "--channels", "4", "--json"])
        .assert()
        .success();

    let stdout = String::from_utf8(output.get_output().stdout.clone()).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(parsed["samples_per_epoch"], 400);
    assert_eq!(parsed["mode"], "betaAlpha");
    let epochs = parsed["epochs"].as_array().unwrap();
    assert_eq!(epochs.len(), 2);
    for epoch in epochs {
        let feature = epoch["feature"].as_f64().unwrap();
        assert!((feature - 0.25).abs() < 1e-6, "feature {}", feature);
    }
}

#[test]
fn test_analyze_table() {
    let file = recording(2, 250, 4);

    alphawar()
        .arg("analyze")
        .arg("--file")
        .arg(file.path())
        .args(["--rate", "250", "--channels", "4", "--mode", "max", "--epoch", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("EPOCH"))
        .stdout(predicate::str::contains("Mean feature"));
}

#[test]
fn test_analyze_unknown_mode() {
    let file = recording(1, 250, 4);

    alphawar()
        .arg("analyze")
        .arg("--file")
        .arg(file.path())
        .args(["--rate", "250", "--mode", "theta"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("feature mode"));
}

#[test]
fn test_analyze_too_few_columns() {
    let file = recording(1, 250, 4);

    alphawar()
        .arg("analyze")
        .arg("--file")
        .arg(file.path())
        .args(["--rate", "250", "--channels", "8"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("columns"));
}

#[test]
fn test_analyze_missing_file() {
    alphawar()
        .arg("analyze")
        .args(["--file", "/nonexistent/recording.txt", "--rate", "250"])
        .assert()
        .failure()
        .code(2);
}

// =============================================================================
// PLAY SUBCOMMAND
// =============================================================================

#[test]
fn test_play_synthetic_round() {
    alphawar()
        .arg("play")
        .args(["--epoch", "0.2", "--step", "100", "--bound", "50", "--rounds", "1"])
        .timeout(std::time::Duration::from_secs(30))
        .assert()
        .success()
        .stdout(predicate::str::contains("won by"))
        .stdout(predicate::str::contains("Final score"));
}

#[test]
fn test_play_playback_json() {
    // playback defaults to the Cyton layout: 8 channels at 250 Hz
    let file = recording(2, 250, 8);

    let output = alphawar()
        .arg("play")
        .arg("--file1")
        .arg(file.path())
        .args(["--epoch", "0.2", "--step", "100", "--bound", "50", "--json"])
        .timeout(std::time::Duration::from_secs(30))
        .assert()
        .success();

    let stdout = String::from_utf8(output.get_output().stdout.clone()).unwrap();
    let last = stdout.lines().last().unwrap();
    let parsed: serde_json::Value = serde_json::from_str(last).unwrap();
    assert_eq!(parsed["status"]["type"], "Won");
}

#[test]
fn test_play_physical_board_without_driver() {
    alphawar()
        .arg("play")
        .args(["--board1", "cyton", "--port1", "/dev/ttyUSB9"])
        .timeout(std::time::Duration::from_secs(30))
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("Handshake failed"));
}

#[test]
fn test_play_without_dongles_is_device_error() {
    // no dongle in the build environment: the scan leaves both players unassigned
    alphawar()
        .arg("play")
        .args(["--board1", "cyton", "--board2", "cyton"])
        .timeout(std::time::Duration::from_secs(30))
        .assert()
        .failure()
        .code(3);
}

#[test]
fn test_play_invalid_mode() {
    alphawar()
        .arg("play")
        .args(["--mode", "theta"])
        .assert()
        .failure()
        .code(2);
}
