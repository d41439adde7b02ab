//! Runs a standalone divvyd server as a [`Child`] process, one per scenario.

use std::{path::PathBuf, process::Stdio, time::Duration};

use anyhow::{anyhow, Context};
use harness_runner::prelude::HarnessResult;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    process::{Child, Command},
    time::timeout,
};

/// How long a server gets to exit after being asked to stop before it is killed.
const STOP_GRACE: Duration = Duration::from_secs(10);

/// Where and how to start a standalone server.
#[derive(Debug, Clone)]
pub struct DivvydConfig {
    /// The path to the `divvyd` binary.
    pub bin_path: PathBuf,

    /// The server configuration file, passed as `--conf=<path>`.
    pub conf_path: PathBuf,

    /// Server output is logged under `divvyd::<log_name>`.
    pub log_name: Option<String>,
}

impl DivvydConfig {
    fn conf_arg(&self) -> String {
        format!("--conf={}", self.conf_path.display())
    }

    pub(crate) fn start_args(&self) -> Vec<String> {
        vec![
            self.conf_arg(),
            "--standalone".to_string(),
            "--start".to_string(),
        ]
    }

    pub(crate) fn stop_args(&self) -> Vec<String> {
        vec![self.conf_arg(), "stop".to_string()]
    }

    fn log_target(&self) -> String {
        match &self.log_name {
            Some(name) => format!("divvyd::{name}"),
            None => "divvyd".to_string(),
        }
    }
}

/// Holds the [`Child`] process running the server. The process is killed if this is dropped
/// without calling [`DivvydRunner::stop`].
#[derive(Debug)]
pub struct DivvydRunner {
    config: DivvydConfig,
    handle: Child,
}

impl DivvydRunner {
    /// Start a fresh standalone server. Readiness is not waited for here, the caller should retry
    /// connecting.
    pub async fn run(config: &DivvydConfig) -> HarnessResult<Self> {
        log::info!(
            "Running a standalone divvyd server with config '{}'",
            config.conf_path.display()
        );
        let mut handle = Command::new(&config.bin_path)
            .args(config.start_args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| {
                format!(
                    "Failed to run divvyd server '{}'",
                    config.bin_path.display()
                )
            })?;

        let log_target = config.log_target();
        let stdout = handle
            .stdout
            .take()
            .context("Failed to get stdout for the running divvyd server")?;
        let stderr = handle
            .stderr
            .take()
            .context("Failed to get stderr for the running divvyd server")?;

        let target = log_target.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                log::info!(target: &target, "{line}");
            }
        });
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                log::warn!(target: &log_target, "{line}");
            }
        });

        Ok(Self {
            config: config.clone(),
            handle,
        })
    }

    /// Ask the server to stop with its own `stop` command, killing it if it has not exited after
    /// a grace period.
    pub async fn stop(mut self) -> HarnessResult<()> {
        log::debug!("Stopping divvyd server");
        let status = Command::new(&self.config.bin_path)
            .args(self.config.stop_args())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .context("Failed to run the divvyd stop command")?;
        log::debug!("divvyd stop command exited with {status}");

        match timeout(STOP_GRACE, self.handle.wait()).await {
            Ok(exit) => {
                let exit = exit.context("Failed to wait for the divvyd server to exit")?;
                log::info!("divvyd server exited with {exit}");
                Ok(())
            }
            Err(_) => {
                log::warn!("divvyd server did not stop within {STOP_GRACE:?}, killing it");
                self.handle
                    .kill()
                    .await
                    .map_err(|e| anyhow!("Failed to kill the divvyd server: {e}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn config() -> DivvydConfig {
        DivvydConfig {
            bin_path: PathBuf::from("divvyd"),
            conf_path: PathBuf::from("/etc/divvyd.cfg"),
            log_name: Some("set RequireAuth".to_string()),
        }
    }

    #[test]
    fn standalone_arguments() {
        assert_eq!(
            config().start_args(),
            vec!["--conf=/etc/divvyd.cfg", "--standalone", "--start"]
        );
        assert_eq!(config().stop_args(), vec!["--conf=/etc/divvyd.cfg", "stop"]);
    }

    #[test]
    fn log_target_includes_name() {
        assert_eq!(config().log_target(), "divvyd::set RequireAuth");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stops_a_cooperative_server() {
        use std::os::unix::fs::PermissionsExt as _;

        let dir = tempfile::TempDir::new().unwrap();
        let script = dir.path().join("divvyd");
        std::fs::write(
            &script,
            "#!/bin/sh\nconf=\"${1#--conf=}\"\nif [ \"$2\" = \"stop\" ]; then touch \"$conf.stop\"; exit 0; fi\nrm -f \"$conf.stop\"\nwhile [ ! -f \"$conf.stop\" ]; do sleep 0.05; done\n",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let config = DivvydConfig {
            bin_path: script,
            conf_path: dir.path().join("divvyd.cfg"),
            log_name: None,
        };
        let runner = DivvydRunner::run(&config).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        runner.stop().await.unwrap();
    }
}
