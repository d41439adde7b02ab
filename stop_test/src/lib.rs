mod cli;
mod error;
mod progress;
mod run;
mod server_path;
mod sweep;

pub use cli::{StopTestCli, USAGE};
pub use error::HarnessError;
pub use run::{run_once, RunContext, RunOutcome, RunRecord};
pub use server_path::resolve_server_path;
pub use sweep::{
    start_args, stop_args, time_takes, PassOutcome, RangeError, Sweep, SweepConfig, SweepRange,
    ABORT_TESTS_ON_STALL_ENV, DEFAULT_STALL_TIMEOUT,
};
