use std::process::ExitCode;

use divvyd_harness_runner::prelude::*;

fn main() -> HarnessResult<ExitCode> {
    let cli = init();

    let report = run(account_set::suite(cli))?;
    Ok(if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
