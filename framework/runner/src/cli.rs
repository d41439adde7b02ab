use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(about, long_about = None)]
pub struct ScenarioSuiteCli {
    /// A connection string for the server to test.
    ///
    /// Use a `ws://` URL to talk to a running server, or `memory://` to run the scenarios against
    /// the in-memory ledger.
    #[clap(short, long, default_value = "ws://127.0.0.1:6006")]
    pub connection_string: String,

    /// Only run scenarios whose name contains this text.
    #[clap(long)]
    pub filter: Option<String>,

    /// Do not show a progress bar on the CLI.
    ///
    /// This is recommended for CI/CD environments where the progress bar isn't being looked at by anyone and is just adding noise to the logs.
    #[clap(long, default_value = "false")]
    pub no_progress: bool,

    /// Do not print the scenario and operation summary tables at the end of the run.
    #[clap(long, default_value = "false")]
    pub no_summary: bool,
}

impl ScenarioSuiteCli {
    /// A CLI configuration for running against `connection_string` without any terminal output
    /// beyond logging. Useful when driving suites from tests.
    pub fn quiet(connection_string: impl Into<String>) -> Self {
        Self {
            connection_string: connection_string.into(),
            filter: None,
            no_progress: true,
            no_summary: true,
        }
    }
}
