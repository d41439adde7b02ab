#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use harness_core::prelude::ShutdownHandle;
use pretty_assertions::assert_eq;
use stop_test::{HarnessError, PassOutcome, RunRecord, Sweep, SweepConfig, SweepRange};
use tempfile::TempDir;

/// Runs until a stop command for the same config leaves a marker file next to the config.
const COOPERATIVE: &str = r#"#!/bin/sh
conf="${1#--conf=}"
if [ "$2" = "stop" ]; then
    touch "$conf.stop"
    exit 0
fi
echo "started with $*"
while [ ! -f "$conf.stop" ]; do
    sleep 0.05
done
rm -f "$conf.stop"
echo "stopping" >&2
"#;

const EXITS_EARLY: &str = r#"#!/bin/sh
if [ "$2" = "stop" ]; then
    exit 0
fi
exit 3
"#;

/// Ignores stop, but gives up on its own eventually so no process outlives the test for long.
const IGNORES_STOP: &str = r#"#!/bin/sh
if [ "$2" = "stop" ]; then
    exit 0
fi
exec sleep 10
"#;

/// Exits as soon as it is stopped, but leaves a background process holding its output open.
const LEAVES_OUTPUT_OPEN: &str = r#"#!/bin/sh
conf="${1#--conf=}"
if [ "$2" = "stop" ]; then
    touch "$conf.stop"
    exit 0
fi
while [ ! -f "$conf.stop" ]; do
    sleep 0.05
done
rm -f "$conf.stop"
sleep 1 &
exit 0
"#;

fn fake_server(dir: &TempDir, script: &str) -> PathBuf {
    let path = dir.path().join("divvyd");
    std::fs::write(&path, script).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn config(dir: &TempDir, server: &Path, low: u64, high: u64) -> SweepConfig {
    SweepConfig::new(
        SweepRange::new(low, high).unwrap(),
        server.to_path_buf(),
        dir.path().join("divvyd.cfg"),
    )
}

fn args(dir: &TempDir, flags: &[&str]) -> Vec<String> {
    let mut args = vec![format!(
        "--conf={}",
        dir.path().join("divvyd.cfg").display()
    )];
    args.extend(flags.iter().map(|f| f.to_string()));
    args
}

#[tokio::test(flavor = "multi_thread")]
async fn cooperative_server_is_stopped_for_each_n() {
    let dir = tempfile::tempdir().unwrap();
    let server = fake_server(&dir, COOPERATIVE);
    let sweep = Sweep::new(config(&dir, &server, 0, 3), ShutdownHandle::new());

    let records = match sweep.run_pass().await.unwrap() {
        PassOutcome::Completed(records) => records,
        other => panic!("expected a completed pass, got {other:?}"),
    };

    let without_timing = records
        .iter()
        .map(|r| (r.args.clone(), r.alive_for))
        .collect::<Vec<_>>();
    assert_eq!(
        without_timing,
        vec![
            (args(&dir, &["--fg", "--net"]), 0),
            (args(&dir, &[]), 1),
            (args(&dir, &["--fg"]), 2),
        ]
    );
    for record in &records {
        let stop_took = record.stop_took.expect("every run was stopped");
        assert!(stop_took >= 0.0 && stop_took < 5.0, "{record:?}");
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn stop_is_timed_until_output_closes() {
    let dir = tempfile::tempdir().unwrap();
    let server = fake_server(&dir, LEAVES_OUTPUT_OPEN);
    let sweep = Sweep::new(config(&dir, &server, 1, 2), ShutdownHandle::new());

    let records = match sweep.run_pass().await.unwrap() {
        PassOutcome::Completed(records) => records,
        other => panic!("expected a completed pass, got {other:?}"),
    };

    assert_eq!(records.len(), 1);
    let stop_took = records[0].stop_took.expect("the run was stopped");
    assert!(stop_took >= 0.9, "stop was timed before output closed: {stop_took}");
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_range_launches_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let sweep = Sweep::new(
        config(&dir, Path::new("/nonexistent/divvyd"), 4, 4),
        ShutdownHandle::new(),
    );

    assert_eq!(
        sweep.run_pass().await.unwrap(),
        PassOutcome::Completed(Vec::new())
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn server_exiting_before_stop_ends_the_sweep() {
    let dir = tempfile::tempdir().unwrap();
    let server = fake_server(&dir, EXITS_EARLY);
    let sweep = Sweep::new(config(&dir, &server, 1, 3), ShutdownHandle::new());

    match sweep.run_pass().await {
        Err(HarnessError::ExitedBeforeStop { alive_for, status }) => {
            assert_eq!(alive_for, 1);
            assert_eq!(status.code(), Some(3));
        }
        other => panic!("expected an early exit, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn stalled_stop_ends_the_sweep_when_watchdog_is_on() {
    let dir = tempfile::tempdir().unwrap();
    let server = fake_server(&dir, IGNORES_STOP);
    let mut config = config(&dir, &server, 0, 2);
    config.abort_on_stall = true;
    config.stall_timeout = Duration::from_secs(1);
    let sweep = Sweep::new(config, ShutdownHandle::new());

    match sweep.run_pass().await {
        Err(HarnessError::Stalled { alive_for, waited }) => {
            assert_eq!(alive_for, 0);
            assert_eq!(waited, Duration::from_secs(1));
        }
        other => panic!("expected a stall, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_server_fails_to_spawn() {
    let dir = tempfile::tempdir().unwrap();
    let sweep = Sweep::new(
        config(&dir, &dir.path().join("missing"), 0, 1),
        ShutdownHandle::new(),
    );

    assert!(matches!(
        sweep.run_pass().await,
        Err(HarnessError::Spawn { .. })
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn shutdown_keeps_records_collected_so_far() {
    let dir = tempfile::tempdir().unwrap();
    let server = fake_server(&dir, COOPERATIVE);
    let handle = ShutdownHandle::new();
    let sweep = Sweep::new(config(&dir, &server, 1, 30), handle.clone());

    let trigger = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(1500)).await;
        handle.shutdown();
    });
    let outcome = sweep.run_pass().await.unwrap();
    trigger.await.unwrap();

    match outcome {
        PassOutcome::Interrupted(records) => {
            assert_eq!(records.len(), 2, "{records:?}");
            assert!(records[0].stop_took.is_some());
            assert_eq!(
                records[1],
                RunRecord {
                    args: args(&dir, &["--fg"]),
                    alive_for: 2,
                    stop_took: None,
                }
            );
        }
        other => panic!("expected an interrupted pass, got {other:?}"),
    }

    // The interrupted server is left running, stop it so it does not outlive the test.
    std::fs::write(dir.path().join("divvyd.cfg.stop"), "").unwrap();
}
