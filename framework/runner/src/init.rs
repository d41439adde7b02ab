use crate::cli::ScenarioSuiteCli;
use clap::Parser;

/// Initialise the CLI and logging for a scenario binary.
pub fn init() -> ScenarioSuiteCli {
    env_logger::init();

    ScenarioSuiteCli::parse()
}
