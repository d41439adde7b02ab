use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

/// Ways a run can go wrong. Each of them ends the whole sweep.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// The server went away on its own before the stop command was sent.
    #[error("divvyd exited by itself after less than {alive_for} seconds, before stop was issued ({status})")]
    ExitedBeforeStop { alive_for: u64, status: ExitStatus },
    /// The server was asked to stop but did not finish in time.
    #[error("divvyd has stalled, still running {waited:?} after stop was issued")]
    Stalled { alive_for: u64, waited: Duration },
    #[error("failed to launch '{}'", path.display())]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to issue the stop command")]
    Stop(#[source] std::io::Error),
    #[error("failed to wait for divvyd to exit")]
    Wait(#[source] std::io::Error),
}
