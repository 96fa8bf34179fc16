//! End-to-end tests for the p2pctl binary.

use std::io::Write;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::NamedTempFile;

/// p2pctl with logging silenced and no stray P2PSTREAM_* overrides.
fn p2pctl() -> Command {
    let mut cmd = Command::cargo_bin("p2pctl").unwrap();
    cmd.env("RUST_LOG", "off");
    for var in [
        "P2PSTREAM_WRITER",
        "P2PSTREAM_READER",
        "P2PSTREAM_ENABLE_ON_CREATE",
        "P2PSTREAM_FLUSH_MS",
        "P2PSTREAM_WAIT_MS",
        "P2PSTREAM_TEARDOWN_ON_FATAL",
        "P2PSTREAM_FIFO_DEPTH",
        "P2PSTREAM_LOG_LEVEL",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

fn config_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn run_prints_each_step_and_final_state() {
    p2pctl()
        .args(["run", "create", "enable", "state"])
        .assert()
        .success()
        .stdout(predicate::str::contains("create -> ok [created]"))
        .stdout(predicate::str::contains("enable -> ok [enabled]"))
        .stdout(predicate::str::contains("final state: enabled"));
}

#[test]
fn illegal_step_is_reported_not_fatal() {
    p2pctl()
        .args(["run", "disable"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "disable -> error: cannot disable while stream is uninitialized",
        ));
}

#[test]
fn strict_fails_on_any_error() {
    p2pctl()
        .args(["run", "--strict", "create", "link", "link"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("1 of 3 steps failed"));
}

#[test]
fn fatal_fault_tears_stream_down() {
    p2pctl()
        .args(["run", "create-enabled", "fault:disable:-5", "disable"])
        .assert()
        .success()
        .stdout(predicate::str::contains("disable -> error: disable failed with driver status -5"))
        .stdout(predicate::str::contains("final state: uninitialized"));
}

#[test]
fn json_output_uses_config_file() {
    let file = config_file("[simulator]\nfifo_depth = 16\n");

    let output = p2pctl()
        .arg("--config")
        .arg(file.path())
        .args(["run", "--json", "create", "attr:reader-capacity"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let lines: Vec<serde_json::Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();

    assert_eq!(lines.len(), 3);
    assert_eq!(lines[1]["step"], "attr:reader-capacity");
    assert_eq!(lines[1]["value"], 16);
    assert_eq!(lines[2]["final_state"], "created");
}

#[test]
fn unknown_step_is_a_usage_error() {
    p2pctl()
        .args(["run", "reboot"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown step 'reboot'"));
}

#[test]
fn demo_walks_through_lifecycle() {
    p2pctl()
        .arg("demo")
        .assert()
        .success()
        .stdout(predicate::str::contains("initial: created=false linked=false enabled=false"))
        .stdout(predicate::str::contains("enable -> true: created=true linked=true enabled=true"))
        .stdout(predicate::str::contains("destroy -> true: created=false linked=false enabled=false"));
}

#[test]
fn config_shows_file_values_and_source() {
    let file = config_file("[stream]\nreader_endpoint = 9\n");

    p2pctl()
        .arg("config")
        .arg("--config")
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("reader_endpoint = 9"))
        .stdout(predicate::str::contains(format!("# file: {}", file.path().display())));
}

#[test]
fn missing_config_file_fails() {
    p2pctl()
        .args(["--config", "/nonexistent/p2pstream.toml", "demo"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read config file"));
}
