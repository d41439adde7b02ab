#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};
use std::time::Duration;

use tempfile::TempDir;

const COOPERATIVE: &str = r#"#!/bin/sh
conf="${1#--conf=}"
if [ "$2" = "stop" ]; then
    touch "$conf.stop"
    exit 0
fi
while [ ! -f "$conf.stop" ]; do
    sleep 0.05
done
rm -f "$conf.stop"
"#;

const EXITS_EARLY: &str = r#"#!/bin/sh
if [ "$2" = "stop" ]; then
    exit 0
fi
exit 3
"#;

fn fake_server(dir: &TempDir, script: &str) -> PathBuf {
    let path = dir.path().join("divvyd");
    std::fs::write(&path, script).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn stop_test(dir: &TempDir, args: &[&str]) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_stop-test"));
    cmd.args(args)
        .arg("--no-progress")
        .current_dir(dir.path())
        .env_remove("ABORT_TESTS_ON_STALL")
        .stdin(Stdio::null());
    cmd
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn prints_usage_without_a_range() {
    let dir = tempfile::tempdir().unwrap();
    let output = stop_test(&dir, &[]).output().unwrap();

    assert!(output.status.success(), "{output:?}");
    assert!(stdout(&output).contains("usage: stop-test i,j"), "{output:?}");
}

#[test]
fn bad_range_fails() {
    let dir = tempfile::tempdir().unwrap();
    let output = stop_test(&dir, &["10,5"]).output().unwrap();

    assert!(!output.status.success(), "{output:?}");
}

#[test]
fn server_exiting_early_fails_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let server = fake_server(&dir, EXITS_EARLY);
    let conf = dir.path().join("divvyd.cfg");

    let output = stop_test(
        &dir,
        &["1,3", server.to_str().unwrap(), conf.to_str().unwrap()],
    )
    .output()
    .unwrap();

    assert_eq!(output.status.code(), Some(1), "{output:?}");
    assert!(stdout(&output).contains("Test will take ~4 seconds"), "{output:?}");
}

#[test]
fn repeat_over_an_empty_range_finishes() {
    let dir = tempfile::tempdir().unwrap();
    let server = fake_server(&dir, EXITS_EARLY);
    let conf = dir.path().join("divvyd.cfg");

    let output = stop_test(
        &dir,
        &[
            "4,4",
            server.to_str().unwrap(),
            conf.to_str().unwrap(),
            "--repeat",
        ],
    )
    .output()
    .unwrap();

    assert!(output.status.success(), "{output:?}");
    assert!(stdout(&output).contains("Test will take ~0 seconds"), "{output:?}");
}

#[test]
fn repeat_starts_the_range_again() {
    let dir = tempfile::tempdir().unwrap();
    let server = fake_server(&dir, COOPERATIVE);
    let conf = dir.path().join("divvyd.cfg");

    let mut child = stop_test(
        &dir,
        &[
            "1,2",
            server.to_str().unwrap(),
            conf.to_str().unwrap(),
            "--repeat",
        ],
    )
    .stdout(Stdio::piped())
    .stderr(Stdio::null())
    .spawn()
    .unwrap();

    std::thread::sleep(Duration::from_millis(3500));
    child.kill().unwrap();
    // Release the server left running by the killed sweep.
    std::fs::write(dir.path().join("divvyd.cfg.stop"), "").unwrap();
    let output = child.wait_with_output().unwrap();

    let passes = stdout(&output).matches("\"alive_for\": 1").count();
    assert!(passes >= 2, "expected at least two passes: {output:?}");
}
