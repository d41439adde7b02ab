use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use harness_core::prelude::ShutdownHandle;

use crate::cli::StopTestCli;
use crate::error::HarnessError;
use crate::progress::start_progress;
use crate::run::{run_once, RunOutcome, RunRecord};

/// When this variable is present, with any value, a run that does not stop in time ends the sweep.
pub const ABORT_TESTS_ON_STALL_ENV: &str = "ABORT_TESTS_ON_STALL";

pub const DEFAULT_STALL_TIMEOUT: Duration = Duration::from_secs(30);

/// The seconds a server is left running for, one run per value in `[low, high)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepRange {
    low: u64,
    high: u64,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RangeError {
    #[error("range must be two integers separated by a comma, like `5,10`")]
    Format,
    #[error("[{0}] is not a whole number of seconds")]
    NotANumber(String),
    #[error("range start {low} is after its end {high}")]
    Reversed { low: u64, high: u64 },
}

impl SweepRange {
    pub fn new(low: u64, high: u64) -> Result<Self, RangeError> {
        if low > high {
            return Err(RangeError::Reversed { low, high });
        }
        Ok(Self { low, high })
    }

    pub fn low(&self) -> u64 {
        self.low
    }

    pub fn high(&self) -> u64 {
        self.high
    }

    pub fn len(&self) -> u64 {
        self.high - self.low
    }

    pub fn is_empty(&self) -> bool {
        self.low == self.high
    }

    pub fn iter(&self) -> std::ops::Range<u64> {
        self.low..self.high
    }
}

impl FromStr for SweepRange {
    type Err = RangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse = |part: &str| {
            part.trim()
                .parse::<u64>()
                .map_err(|_| RangeError::NotANumber(part.to_string()))
        };
        match s.split(',').collect::<Vec<_>>().as_slice() {
            [low, high] => Self::new(parse(low)?, parse(high)?),
            _ => Err(RangeError::Format),
        }
    }
}

impl fmt::Display for SweepRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.low, self.high)
    }
}

/// Arguments to launch the server for a run of `n` seconds.
pub fn start_args(conf: &Path, n: u64) -> Vec<String> {
    let mut args = vec![format!("--conf={}", conf.display())];
    if n % 2 == 0 {
        args.push("--fg".to_string());
    }
    if n % 3 == 0 {
        args.push("--net".to_string());
    }
    args
}

/// Arguments that ask the server using `conf` to stop.
pub fn stop_args(conf: &Path) -> Vec<String> {
    vec![format!("--conf={}", conf.display()), "stop".to_string()]
}

/// Estimated seconds for one pass: the time every server is left running plus half a second per
/// run to stop it.
pub fn time_takes(range: &SweepRange) -> f64 {
    if range.is_empty() {
        return 0.0;
    }
    let runs = u128::from(range.len());
    let ends = u128::from(range.low) + u128::from(range.high - 1);
    // One of the two factors is even, halving it first keeps the product within u128.
    let alive = if runs % 2 == 0 {
        runs / 2 * ends
    } else {
        runs * (ends / 2)
    };
    alive as f64 + 0.5 * runs as f64
}

/// Everything a sweep needs, taken from the command line and the environment.
#[derive(Debug, Clone)]
pub struct SweepConfig {
    pub range: SweepRange,
    pub server_path: PathBuf,
    pub conf_path: PathBuf,
    /// End the sweep when a server has not stopped `stall_timeout` after being asked to.
    pub abort_on_stall: bool,
    pub stall_timeout: Duration,
    /// Start again from the bottom of the range after each pass, until interrupted.
    pub repeat: bool,
    pub show_progress: bool,
}

impl SweepConfig {
    pub fn new(range: SweepRange, server_path: PathBuf, conf_path: PathBuf) -> Self {
        Self {
            range,
            server_path,
            conf_path,
            abort_on_stall: false,
            stall_timeout: DEFAULT_STALL_TIMEOUT,
            repeat: false,
            show_progress: false,
        }
    }

    pub fn from_cli(cli: &StopTestCli, range: SweepRange, server_path: PathBuf) -> Self {
        Self {
            abort_on_stall: std::env::var_os(ABORT_TESTS_ON_STALL_ENV).is_some(),
            stall_timeout: Duration::from_secs(cli.stall_timeout),
            repeat: cli.repeat,
            show_progress: !cli.no_progress,
            ..Self::new(range, server_path, cli.conf_path.clone())
        }
    }
}

/// How a pass over the range ended.
#[derive(Debug, Clone, PartialEq)]
pub enum PassOutcome {
    /// Every run in the range finished.
    Completed(Vec<RunRecord>),
    /// The sweep was asked to stop. Holds the records collected until then, including the
    /// unfinished one.
    Interrupted(Vec<RunRecord>),
}

#[derive(Debug)]
pub struct Sweep {
    config: SweepConfig,
    shutdown_handle: ShutdownHandle,
}

impl Sweep {
    pub fn new(config: SweepConfig, shutdown_handle: ShutdownHandle) -> Self {
        Self {
            config,
            shutdown_handle,
        }
    }

    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    /// Run the server once for every value in the range, lowest first.
    pub async fn run_pass(&self) -> Result<PassOutcome, HarnessError> {
        let mut records = Vec::new();
        let progress = self
            .config
            .show_progress
            .then(|| start_progress(self.config.range.len()));
        let mut listener = self.shutdown_handle.new_listener();

        for n in self.config.range.iter() {
            if listener.should_shutdown() {
                return Ok(PassOutcome::Interrupted(records));
            }
            if let Some(pb) = &progress {
                pb.set_message(format!("alive for {n}s"));
            }

            match run_once(&self.config, n, &mut listener).await {
                Ok(RunOutcome::Stopped(record)) => records.push(record),
                Ok(RunOutcome::Interrupted(record)) => {
                    records.push(record);
                    return Ok(PassOutcome::Interrupted(records));
                }
                Err(e) => {
                    if let Some(pb) = &progress {
                        pb.abandon();
                    }
                    return Err(e);
                }
            }

            if let Some(pb) = &progress {
                pb.inc(1);
            }
        }

        if let Some(pb) = progress {
            pb.finish_and_clear();
        }
        Ok(PassOutcome::Completed(records))
    }
}
