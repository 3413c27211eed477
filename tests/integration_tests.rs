//! Integration tests for the parbatch CLI

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn parbatch() -> Command {
    let mut cmd = Command::cargo_bin("parbatch").unwrap();
    // Keep host env from leaking into the effective configuration
    for key in ["PARBATCH_PARALLELISM", "PARBATCH_CHUNK_SIZE", "PARBATCH_STRATEGY", "PARBATCH_SHUTDOWN_GRACE_SECS"] {
        cmd.env_remove(key);
    }
    cmd
}

#[test]
fn test_cli_help() {
    parbatch()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("bench"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_cli_version() {
    parbatch()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_invalid_subcommand() {
    parbatch()
        .arg("invalid-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_config_shows_custom_file() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("batch.toml");
    fs::write(&config_path, "parallelism = 3\nchunk_size = 250\nstrategy = \"static\"\n").unwrap();

    parbatch()
        .current_dir(temp_dir.path())
        .arg("config")
        .arg("--config")
        .arg(&config_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("parallelism = 3"))
        .stdout(predicate::str::contains("chunk_size = 250"))
        .stdout(predicate::str::contains("strategy = \"static\""))
        .stdout(predicate::str::contains("shutdown_grace_secs = 300"));
}

#[test]
fn test_config_json_format() {
    let temp_dir = TempDir::new().unwrap();
    parbatch()
        .current_dir(temp_dir.path())
        .env("HOME", temp_dir.path())
        .args(["config", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"chunk_size\": 1000"))
        .stdout(predicate::str::contains("\"strategy\": \"dynamic\""));
}

#[test]
fn test_config_env_override() {
    let temp_dir = TempDir::new().unwrap();
    parbatch()
        .current_dir(temp_dir.path())
        .env("HOME", temp_dir.path())
        .env("PARBATCH_CHUNK_SIZE", "42")
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("chunk_size = 42"));
}

#[test]
fn test_config_rejects_invalid_chunk_size() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("bad.toml");
    fs::write(&config_path, "chunk_size = 0\n").unwrap();

    parbatch()
        .current_dir(temp_dir.path())
        .arg("config")
        .arg("--config")
        .arg(&config_path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("chunk"));
}

#[test]
fn test_bench_small_run() {
    let temp_dir = TempDir::new().unwrap();
    parbatch()
        .current_dir(temp_dir.path())
        .args(["bench", "--items", "2000", "--parallelism", "2", "--chunk-size", "100", "--strategy", "static", "--work", "5"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Speedup"))
        .stdout(predicate::str::contains("Processed 2000 items"));
}

#[test]
fn test_bench_warns_when_workers_outnumber_chunks() {
    let temp_dir = TempDir::new().unwrap();
    parbatch()
        .current_dir(temp_dir.path())
        .args(["bench", "--items", "100", "--parallelism", "4", "--chunk-size", "100", "--work", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Only 1 chunks for 4 workers"));
}

#[test]
fn test_bench_rejects_zero_parallelism() {
    let temp_dir = TempDir::new().unwrap();
    parbatch()
        .current_dir(temp_dir.path())
        .args(["bench", "--items", "10", "--parallelism", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("parallelism"));
}

#[test]
fn test_bench_rejects_unknown_strategy() {
    parbatch()
        .args(["bench", "--strategy", "priority"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("priority"));
}

#[test]
fn test_quiet_bench_prints_nothing() {
    let temp_dir = TempDir::new().unwrap();
    parbatch()
        .current_dir(temp_dir.path())
        .args(["-q", "bench", "--items", "100", "--work", "1"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}
