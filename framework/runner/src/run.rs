use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use harness_core::prelude::{ShutdownSignalError, SuiteAbortError};
use harness_instruments::Reporter;

use crate::context::{RunnerContext, ScenarioContext, UserValuesConstraint};
use crate::definition::{ScenarioDefinition, SuiteDefinition, SuiteDefinitionBuilder};
use crate::executor::Executor;
use crate::progress::start_progress;
use crate::report::{ScenarioOutcome, ScenarioReport, SuiteReport};
use crate::shutdown::start_shutdown_listener;

/// Run every selected scenario of the suite, in order, and report what happened to each.
///
/// A failing scenario does not stop the suite. The suite is only cut short by a
/// [SuiteAbortError] from a hook or step, or by a shutdown signal; the scenarios after that point
/// are reported as skipped.
pub fn run<SV: UserValuesConstraint>(
    definition: SuiteDefinitionBuilder<SV>,
) -> anyhow::Result<SuiteReport> {
    let definition = definition.build()?;

    log::info!("Running suite: {}", definition.name);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create Tokio runtime")?;
    let shutdown_handle = start_shutdown_listener(&runtime);
    let executor = Arc::new(Executor::new(runtime, shutdown_handle.clone()));
    let reporter = Arc::new(Reporter::new(!definition.cli.no_summary));
    let runner_context = Arc::new(RunnerContext::new(
        executor,
        reporter.clone(),
        shutdown_handle.clone(),
        definition.cli.connection_string.clone(),
    ));

    let selected = definition.selected_scenarios().collect::<Vec<_>>();
    if selected.is_empty() {
        log::warn!("No scenarios selected in suite {}", definition.name);
    }

    let progress = (!definition.cli.no_progress)
        .then(|| start_progress(&definition.name, selected.len()));

    let mut suite_report = SuiteReport::new(definition.name.clone());
    let mut stop_listener = shutdown_handle.new_listener();
    let mut abort_reason: Option<String> = None;

    for scenario in selected {
        if abort_reason.is_none() && stop_listener.should_shutdown() {
            abort_reason = Some("shutdown requested".to_string());
        }

        let report = match &abort_reason {
            Some(reason) => ScenarioReport {
                name: scenario.name.clone(),
                outcome: ScenarioOutcome::Skipped {
                    reason: reason.clone(),
                },
                duration: Default::default(),
            },
            None => {
                if let Some(pb) = &progress {
                    pb.set_message(scenario.name.clone());
                }
                let (report, abort) = run_scenario(&definition, scenario, runner_context.clone());
                abort_reason = abort;
                report
            }
        };

        if let Some(pb) = &progress {
            pb.inc(1);
        }
        suite_report.scenarios.push(report);
    }

    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    if !definition.cli.no_summary {
        suite_report.print_summary();
        reporter.finalize();
    }

    Ok(suite_report)
}

/// Run one scenario: setup, steps, then teardown no matter what happened before it.
///
/// Returns the report and, if the failure means the rest of the suite cannot run, the reason.
fn run_scenario<SV: UserValuesConstraint>(
    definition: &SuiteDefinition<SV>,
    scenario: &ScenarioDefinition<SV>,
    runner_context: Arc<RunnerContext>,
) -> (ScenarioReport, Option<String>) {
    log::info!("Running scenario: {}", scenario.name);

    let started = Instant::now();
    let shutdown_listener = runner_context.executor().shutdown_listener();
    let mut context = ScenarioContext::<SV>::new(
        runner_context,
        scenario.name.clone(),
        shutdown_listener,
    );

    let mut outcome = ScenarioOutcome::Passed;
    let mut abort_reason = None;

    let setup_result = match definition.setup_fn {
        Some(setup_fn) => setup_fn(&mut context),
        None => Ok(()),
    };

    match setup_result {
        Ok(()) => {
            if let Err(failure) = scenario.steps.run(&mut context) {
                abort_reason = abort_reason_for(failure.error());
                outcome = ScenarioOutcome::Failed {
                    step: failure.label().to_string(),
                    error: format!("{:#}", failure.error()),
                };
            }
        }
        Err(e) => {
            abort_reason = abort_reason_for(&e);
            outcome = ScenarioOutcome::Failed {
                step: "setup".to_string(),
                error: format!("{e:#}"),
            };
        }
    }

    if let Some(teardown_fn) = definition.teardown_fn {
        // Don't let a failed teardown hide the scenario outcome, the hook is documented as 'best effort'.
        if let Err(e) = teardown_fn(&mut context) {
            log::error!("Teardown failed for scenario {}: {:?}", scenario.name, e);
        }
    }

    match &outcome {
        ScenarioOutcome::Failed { step, error } => {
            log::error!("Scenario {} failed at '{}': {}", scenario.name, step, error)
        }
        _ => log::info!("Scenario {} passed", scenario.name),
    }

    let report = ScenarioReport {
        name: scenario.name.clone(),
        outcome,
        duration: started.elapsed(),
    };

    (report, abort_reason)
}

fn abort_reason_for(error: &anyhow::Error) -> Option<String> {
    if let Some(abort) = error.downcast_ref::<SuiteAbortError>() {
        Some(abort.reason().to_string())
    } else if error.is::<ShutdownSignalError>() {
        Some("shutdown requested".to_string())
    } else {
        None
    }
}
