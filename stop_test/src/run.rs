use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use harness_core::prelude::DelegatedShutdownListener;
use serde::Serialize;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

use crate::error::HarnessError;
use crate::sweep::{start_args, stop_args, SweepConfig};

/// The result of leaving one server running for `alive_for` seconds and then stopping it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunRecord {
    pub args: Vec<String>,
    pub alive_for: u64,
    /// Seconds from issuing the stop command until the server exited and closed its output.
    /// Unset when the run never finished stopping.
    pub stop_took: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Stopped(RunRecord),
    /// The sweep was interrupted while the server was running. The server is left alone.
    Interrupted(RunRecord),
}

/// State of the run in progress.
#[derive(Debug)]
pub struct RunContext {
    pub n: u64,
    pub record: RunRecord,
}

impl RunContext {
    pub fn new(config: &SweepConfig, n: u64) -> Self {
        Self {
            n,
            record: RunRecord {
                args: start_args(&config.conf_path, n),
                alive_for: n,
                stop_took: None,
            },
        }
    }

    pub fn args(&self) -> &[String] {
        &self.record.args
    }
}

enum AliveFor {
    Elapsed,
    Exited(std::io::Result<ExitStatus>),
    Interrupted,
}

/// Launch the server, leave it running for `n` seconds, stop it and time how long it takes to go
/// away.
pub async fn run_once(
    config: &SweepConfig,
    n: u64,
    listener: &mut DelegatedShutdownListener,
) -> Result<RunOutcome, HarnessError> {
    let mut ctx = RunContext::new(config, n);
    log::info!(
        "Launching {} {}",
        config.server_path.display(),
        ctx.args().join(" ")
    );

    let mut child = Command::new(&config.server_path)
        .args(ctx.args())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| HarnessError::Spawn {
            path: config.server_path.clone(),
            source,
        })?;
    let closed = drain_output(&mut child);

    let alive = tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(n)) => AliveFor::Elapsed,
        status = child.wait() => AliveFor::Exited(status),
        _ = listener.wait_for_shutdown() => AliveFor::Interrupted,
    };
    match alive {
        AliveFor::Elapsed => {}
        AliveFor::Exited(status) => {
            let status = status.map_err(HarnessError::Wait)?;
            return Err(HarnessError::ExitedBeforeStop {
                alive_for: n,
                status,
            });
        }
        AliveFor::Interrupted => {
            log::info!("Interrupted after launching with {}", ctx.args().join(" "));
            return Ok(RunOutcome::Interrupted(ctx.record));
        }
    }

    let stop_issued = Instant::now();
    issue_stop(config)?;

    let exited = async {
        let status = child.wait().await;
        if let Err(e) = closed.await {
            log::warn!("Output of divvyd was not drained: {e}");
        }
        status
    };
    let status = if config.abort_on_stall {
        let waited = tokio::time::timeout(config.stall_timeout, exited).await;
        match waited {
            Ok(status) => status,
            Err(_) => {
                log::error!(
                    "divvyd has stalled, {:?} after stop was issued it is still running with {}",
                    config.stall_timeout,
                    ctx.args().join(" ")
                );
                if let Err(e) = child.start_kill() {
                    log::warn!("Failed to kill the stalled divvyd: {e}");
                }
                return Err(HarnessError::Stalled {
                    alive_for: n,
                    waited: config.stall_timeout,
                });
            }
        }
    } else {
        exited.await
    }
    .map_err(HarnessError::Wait)?;

    let stop_took = stop_issued.elapsed().as_secs_f64();
    log::debug!("divvyd exited with {status} after {stop_took:.3}s");
    ctx.record.stop_took = Some(stop_took);

    Ok(RunOutcome::Stopped(ctx.record))
}

/// Read everything the server writes and throw it away. The returned task finishes once both
/// streams are closed.
fn drain_output(child: &mut Child) -> JoinHandle<()> {
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    tokio::spawn(async move {
        let out = async {
            if let Some(mut stdout) = stdout {
                if let Err(e) = tokio::io::copy(&mut stdout, &mut tokio::io::sink()).await {
                    log::trace!("stdout closed with error: {e}");
                }
            }
        };
        let err = async {
            if let Some(mut stderr) = stderr {
                if let Err(e) = tokio::io::copy(&mut stderr, &mut tokio::io::sink()).await {
                    log::trace!("stderr closed with error: {e}");
                }
            }
        };
        tokio::join!(out, err);
    })
}

/// Ask the server to stop. The stop command is not waited for, its exit status is only logged.
fn issue_stop(config: &SweepConfig) -> Result<(), HarnessError> {
    let args = stop_args(&config.conf_path);
    log::debug!("Stopping with {}", args.join(" "));

    let mut stop = Command::new(&config.server_path)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(HarnessError::Stop)?;

    tokio::spawn(async move {
        match stop.wait().await {
            Ok(status) => log::debug!("Stop command exited with {status}"),
            Err(e) => log::debug!("Stop command could not be waited for: {e}"),
        }
    });

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sweep::SweepRange;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    #[test]
    fn context_starts_with_launch_args() {
        let config = SweepConfig::new(
            SweepRange::new(0, 10).unwrap(),
            PathBuf::from("build/divvyd"),
            PathBuf::from("divvyd.cfg"),
        );
        let ctx = RunContext::new(&config, 4);
        assert_eq!(ctx.n, 4);
        assert_eq!(
            ctx.record,
            RunRecord {
                args: vec!["--conf=divvyd.cfg".to_string(), "--fg".to_string()],
                alive_for: 4,
                stop_took: None,
            }
        );
    }

    #[test]
    fn record_serialises_with_null_stop_took() {
        let record = RunRecord {
            args: vec!["--conf=divvyd.cfg".to_string()],
            alive_for: 1,
            stop_took: None,
        };
        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            serde_json::json!({"args": ["--conf=divvyd.cfg"], "alive_for": 1, "stop_took": null})
        );
    }
}
