use std::process::ExitCode;

use divvyd_harness_runner::prelude::*;

fn main() -> HarnessResult<ExitCode> {
    let cli = init();

    let no_divvy = run(no_divvy::no_divvy_suite(cli.clone()))?;
    let default_divvy = run(no_divvy::default_divvy_suite(cli))?;
    Ok(if no_divvy.is_success() && default_divvy.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
