//! CLI tests for the pll command
//!
//! Every test runs with a temporary HOME and workspace so user
//! configuration never leaks in.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get a Command for the pll binary, isolated in `temp`
#[allow(deprecated)]
fn pll(temp: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("pll").expect("Failed to find pll binary");
    cmd.env("HOME", temp.path())
        .env_remove("PLL_WORKERS")
        .env_remove("PLL_WORKSPACE")
        .env_remove("RUST_LOG")
        .arg("--workspace")
        .arg(temp.path());
    cmd
}

fn temp() -> TempDir {
    TempDir::new().expect("Failed to create temp dir")
}

// ============================================================================
// Help and Version Tests
// ============================================================================

#[test]
fn test_help_shows_all_commands() {
    let temp = temp();
    pll(&temp)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("plan"))
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("config"))
        .stdout(predicate::str::contains("--workers"))
        .stdout(predicate::str::contains("--quiet"));
}

#[test]
fn test_version_flag() {
    let temp = temp();
    pll(&temp)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("pll"));
}

// ============================================================================
// Plan Command Tests
// ============================================================================

#[test]
fn test_plan_balanced_layout() {
    let temp = temp();
    pll(&temp)
        .args(["plan", "--rows", "10", "--partitions", "3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("partition 0: offset 0, length 4"))
        .stdout(predicate::str::contains("partition 1: offset 4, length 3"))
        .stdout(predicate::str::contains("partition 2: offset 7, length 3"));
}

#[test]
fn test_plan_json() {
    let temp = temp();
    let output = pll(&temp)
        .args(["plan", "--rows", "7", "--partitions", "4", "--json"])
        .output()
        .expect("Failed to run pll");
    assert!(output.status.success());

    let report: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("Invalid JSON output");
    let lengths: Vec<u64> = report["partitions"]
        .as_array()
        .expect("partitions array")
        .iter()
        .map(|p| p["length"].as_u64().expect("length"))
        .collect();
    assert_eq!(report["rows"], 7);
    assert_eq!(lengths, vec![2, 2, 2, 1]);
}

#[test]
fn test_plan_rejects_zero_partitions_for_rows() {
    let temp = temp();
    pll(&temp)
        .args(["plan", "--rows", "5", "--partitions", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "At least one partition is required to represent a non-empty list",
        ));
}

#[test]
fn test_plan_rejects_negative_partitions() {
    let temp = temp();
    pll(&temp)
        .args(["plan", "--rows", "0", "--partitions", "-1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be negative"));
}

#[test]
fn test_plan_empty_without_partitions() {
    let temp = temp();
    pll(&temp)
        .args(["plan", "--rows", "0", "--partitions", "0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Layout of 0 rows into 0 partitions"));
}

// ============================================================================
// Run Command Tests
// ============================================================================

#[test]
fn test_run_reports_sizes_and_recomputes() {
    let temp = temp();
    pll(&temp)
        .args([
            "--quiet",
            "--workers",
            "2",
            "run",
            "--rows",
            "20",
            "--partitions",
            "4",
            "--modulo",
            "4",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Partitions: 4"))
        .stdout(predicate::str::contains("Partition sizes: [3, 2, 3, 2]"))
        .stdout(predicate::str::contains("Elements: 10"))
        .stdout(predicate::str::contains("Recomputed after eviction: ok"));
}

#[test]
fn test_run_uses_configured_partitions() {
    let temp = temp();
    std::fs::create_dir_all(temp.path().join(".pll")).expect("config dir");
    std::fs::write(
        temp.path().join(".pll").join("config.toml"),
        "[runner]\nworkers = 2\ndefault_partitions = 5\n",
    )
    .expect("write config");

    pll(&temp)
        .args(["-q", "run", "--rows", "12", "--modulo", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Partitions: 5"))
        .stdout(predicate::str::contains("Elements: 12"));
}

#[test]
fn test_run_rejects_zero_modulo() {
    let temp = temp();
    pll(&temp)
        .args(["run", "--rows", "10", "--modulo", "0"])
        .assert()
        .failure();
}

// ============================================================================
// Config Command Tests
// ============================================================================

#[test]
fn test_config_show_defaults() {
    let temp = temp();
    pll(&temp)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[runner]"))
        .stdout(predicate::str::contains("thread_name_prefix = \"pll-worker\""))
        .stdout(predicate::str::contains("[logging]"));
}

#[test]
fn test_config_show_applies_workers_flag() {
    let temp = temp();
    pll(&temp)
        .args(["--workers", "7", "config", "show", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"workers\": 7"));
}

#[test]
fn test_config_init_creates_local_file() {
    let temp = temp();
    pll(&temp)
        .args(["-q", "config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));

    let path = temp.path().join(".pll").join("config.toml");
    assert!(path.exists());
    let content = std::fs::read_to_string(path).expect("read config");
    assert!(content.contains("[runner]"));
}

#[test]
fn test_invalid_config_is_reported() {
    let temp = temp();
    std::fs::create_dir_all(temp.path().join(".pll")).expect("config dir");
    std::fs::write(
        temp.path().join(".pll").join("config.toml"),
        "[logging]\nlevel = \"chatty\"\n",
    )
    .expect("write config");

    pll(&temp)
        .args(["config", "show"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("logging.level"));
}
