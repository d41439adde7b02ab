use std::path::PathBuf;

use clap::Parser;

/// Printed when no range is given.
pub const USAGE: &str = "\
usage: stop-test i,j [divvyd_path] [divvyd_conf]

Launch divvyd and stop it after n seconds for all n in [i, j).
For every even n also pass --fg to divvyd.
For every n where (n % 3) == 0 also pass --net to divvyd.

Examples:
    stop-test 5,10
    stop-test 1,4 build/clang.debug/divvyd
    stop-test 1,4 ../divvyd ../divvyd.cfg

Set ABORT_TESTS_ON_STALL to end the sweep when divvyd does not stop in time.";

#[derive(Parser, Debug, Clone)]
#[command(about, long_about = None, disable_help_subcommand = true)]
pub struct StopTestCli {
    /// The range of seconds to leave divvyd running for, as `i,j` covering `[i, j)`.
    pub range: Option<String>,

    /// The divvyd executable. A bare name is looked up on the PATH.
    #[clap(default_value = "build/divvyd")]
    pub server_path: String,

    /// The config file passed to every launch and stop.
    #[clap(default_value = "divvyd.cfg")]
    pub conf_path: PathBuf,

    /// Seconds to wait for divvyd to exit after stop, when `ABORT_TESTS_ON_STALL` is set.
    #[clap(long, default_value = "30")]
    pub stall_timeout: u64,

    /// Start the range again after each pass, until interrupted.
    #[clap(long, default_value = "false")]
    pub repeat: bool,

    /// Do not show a progress bar on the CLI.
    #[clap(long, default_value = "false")]
    pub no_progress: bool,
}
