//! CLI end-to-end tests
//!
//! Tests for the hlsgrab command-line interface, using a shell script in
//! place of ffmpeg where an engine is needed.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::path::Path;
use std::process::Command;
use tempfile::tempdir;

/// Get a command for the hlsgrab binary
#[allow(deprecated)]
fn hlsgrab_cmd() -> Command {
    let mut cmd = Command::cargo_bin("hlsgrab").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd
}

#[cfg(unix)]
fn fake_engine(dir: &Path, body: &str) -> std::path::PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("ffmpeg");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

#[test]
fn test_cli_no_args_shows_usage() {
    hlsgrab_cmd()
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_help_flag() {
    hlsgrab_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("hlsgrab"))
        .stdout(predicate::str::contains("--segment"))
        .stdout(predicate::str::contains("Exit codes"));
}

#[test]
fn test_cli_version_flag() {
    hlsgrab_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("hlsgrab"));
}

#[test]
fn test_cli_invalid_segment_duration() {
    hlsgrab_cmd()
        .args(["https://x/y.m3u8", "--segment", "ten minutes"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("ten minutes"));
}

#[test]
fn test_cli_segment_format_requires_segment() {
    hlsgrab_cmd()
        .args(["https://x/y.m3u8", "-F", "part_%03d.mp4"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--segment"));
}

#[test]
fn test_cli_bad_segment_pattern() {
    hlsgrab_cmd()
        .args(["https://x/y.m3u8", "-s", "60", "-F", "part.mp4"])
        .assert()
        .code(2);
}

#[test]
fn test_cli_filename_with_directory() {
    let dir = tempdir().unwrap();
    hlsgrab_cmd()
        .args(["https://x/y.m3u8", "-f", "a/b.mp4", "-o"])
        .arg(dir.path())
        .assert()
        .code(2)
        .stderr(predicate::str::contains("directory separators"));
}

#[test]
fn test_cli_invalid_settings_file() {
    let dir = tempdir().unwrap();
    let settings = dir.path().join("settings.json");
    std::fs::write(&settings, "{ not json").unwrap();

    hlsgrab_cmd()
        .args(["https://x/y.m3u8", "--config"])
        .arg(&settings)
        .arg("-o")
        .arg(dir.path())
        .assert()
        .code(2)
        .stderr(predicate::str::contains("settings.json"));
}

#[test]
fn test_cli_engine_not_found() {
    let dir = tempdir().unwrap();
    let empty = tempdir().unwrap();

    hlsgrab_cmd()
        .env("PATH", empty.path())
        .args(["https://x/y.m3u8", "-o"])
        .arg(dir.path())
        .assert()
        .code(3)
        .stderr(predicate::str::contains("ffmpeg"));
}

#[cfg(unix)]
#[test]
fn test_cli_stream_ends_naturally() {
    let dir = tempdir().unwrap();
    let bin = tempdir().unwrap();
    let engine = fake_engine(bin.path(), "echo 'out_time_us=1000000'\nexit 0");

    hlsgrab_cmd()
        .args(["https://x/y.m3u8", "-f", "show.ts", "-o"])
        .arg(dir.path())
        .arg("-p")
        .arg(&engine)
        .assert()
        .success()
        .stderr(predicate::str::contains("Stream capture completed"))
        .stderr(predicate::str::contains("show.ts"))
        .stderr(predicate::str::contains("Total recording time"));
}

#[cfg(unix)]
#[test]
fn test_cli_engine_crash() {
    let dir = tempdir().unwrap();
    let bin = tempdir().unwrap();
    let engine = fake_engine(bin.path(), "echo 'Server returned 403 Forbidden' >&2\nexit 1");

    hlsgrab_cmd()
        .args(["https://x/y.m3u8", "-o"])
        .arg(dir.path())
        .arg("-p")
        .arg(&engine)
        .assert()
        .code(4)
        .stderr(predicate::str::contains("403 Forbidden"));
}

#[cfg(unix)]
#[test]
fn test_cli_engine_found_on_path() {
    let dir = tempdir().unwrap();
    let bin = tempdir().unwrap();
    fake_engine(bin.path(), "exit 0");

    hlsgrab_cmd()
        .env("PATH", bin.path())
        .args(["https://x/y.m3u8", "-s", "1:00", "-o"])
        .arg(dir.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("Stream segments saved to"));
}

#[cfg(unix)]
#[test]
fn test_cli_non_m3u8_url_warns() {
    let dir = tempdir().unwrap();
    let bin = tempdir().unwrap();
    let engine = fake_engine(bin.path(), "exit 0");

    hlsgrab_cmd()
        .args(["https://x/live", "-o"])
        .arg(dir.path())
        .arg("-p")
        .arg(&engine)
        .assert()
        .success()
        .stderr(predicate::str::contains("doesn't appear to be an m3u8"));
}
