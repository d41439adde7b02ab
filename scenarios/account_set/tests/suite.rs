use divvyd_harness_runner::prelude::*;
use pretty_assertions::assert_eq;

#[test]
fn every_scenario_passes_against_the_in_memory_ledger() {
    let report = run(account_set::suite(ScenarioSuiteCli::quiet("memory://"))).unwrap();

    let outcomes = report
        .scenarios
        .iter()
        .map(|s| (s.name.as_str(), s.outcome.clone()))
        .collect::<Vec<_>>();
    assert_eq!(
        outcomes,
        vec![
            ("null AccountSet", ScenarioOutcome::Passed),
            ("set RequireDestTag", ScenarioOutcome::Passed),
            ("set RequireAuth", ScenarioOutcome::Passed),
            ("set DisallowXDV", ScenarioOutcome::Passed),
            ("RequireAuth with trust lines", ScenarioOutcome::Passed),
        ]
    );
    assert!(report.is_success());
}

#[test]
fn filter_selects_matching_scenarios() {
    let mut cli = ScenarioSuiteCli::quiet("memory://");
    cli.filter = Some("RequireAuth".to_string());

    let report = run(account_set::suite(cli)).unwrap();

    let names = report
        .scenarios
        .iter()
        .map(|s| s.name.as_str())
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["set RequireAuth", "RequireAuth with trust lines"]);
    assert!(report.is_success());
}

#[test]
fn unreachable_server_fails_setup() {
    let report = run(account_set::suite(ScenarioSuiteCli::quiet(
        "ws://127.0.0.1:1",
    )))
    .unwrap();

    assert!(!report.is_success());
    match &report.scenarios[0].outcome {
        ScenarioOutcome::Failed { step, error } => {
            assert_eq!(step, "setup");
            assert!(error.contains("Unable to connect"), "{error}");
        }
        other => panic!("expected setup failure, got {other:?}"),
    }
}

#[test]
fn binary_exit_code_follows_the_report() {
    let passing = std::process::Command::new(env!("CARGO_BIN_EXE_account_set"))
        .args(["--connection-string", "memory://", "--no-progress", "--no-summary"])
        .status()
        .unwrap();
    assert!(passing.success(), "{passing}");

    let failing = std::process::Command::new(env!("CARGO_BIN_EXE_account_set"))
        .args([
            "--connection-string",
            "ws://127.0.0.1:1",
            "--no-progress",
            "--no-summary",
        ])
        .status()
        .unwrap();
    assert_eq!(failing.code(), Some(1));
}
