use divvyd_harness_runner::prelude::*;
use pretty_assertions::assert_eq;

fn suite(name: &str) -> SuiteDefinitionBuilder<DivvydScenarioContext> {
    SuiteDefinitionBuilder::new(name, ScenarioSuiteCli::quiet("memory://"))
        .use_setup(connect_remote)
        .use_teardown(disconnect_remote)
}

fn assert_all_passed(report: &SuiteReport) {
    for scenario in &report.scenarios {
        assert_eq!(
            scenario.outcome,
            ScenarioOutcome::Passed,
            "scenario {}",
            scenario.name
        );
    }
}

#[test]
fn root_account_is_registered_on_connect() {
    let report = run(suite("root_account_is_registered_on_connect").add_scenario(
        "root",
        StepChain::<DivvydScenarioContext>::series().step("root has no flags", |ctx, _| {
            let flags = account_flags(ctx, ROOT_ACCOUNT, LedgerSelector::Current)?;
            anyhow::ensure!(flags.is_empty(), "unexpected flags {flags:?}");
            Ok(())
        }),
    ))
    .unwrap();

    assert_all_passed(&report);
}

#[test]
fn created_accounts_are_funded_with_default_divvy() {
    let report = run(
        suite("created_accounts_are_funded_with_default_divvy")
            .add_scenario(
                "default options",
                StepChain::<DivvydScenarioContext>::series()
                    .step("create accounts", |ctx, _| {
                        create_accounts(
                            ctx,
                            ROOT_ACCOUNT,
                            "10000.0",
                            &["alice", "bob"],
                            AccountOptions::default(),
                        )
                    })
                    .step("check DefaultDivvy", |ctx, _| {
                        for name in ["alice", "bob"] {
                            let flags = account_flags(ctx, name, LedgerSelector::Validated)?;
                            anyhow::ensure!(
                                flags.contains(AccountRootFlags::DEFAULT_DIVVY),
                                "{name} is missing DefaultDivvy"
                            );
                        }
                        Ok(())
                    }),
            )
            .add_scenario(
                "without default divvy",
                StepChain::<DivvydScenarioContext>::series()
                    .step("create accounts", |ctx, _| {
                        create_accounts(
                            ctx,
                            ROOT_ACCOUNT,
                            "10000.0",
                            &["carol"],
                            AccountOptions {
                                default_divvy: false,
                            },
                        )
                    })
                    .step("check flags", |ctx, _| {
                        let flags = account_flags(ctx, "carol", LedgerSelector::Validated)?;
                        anyhow::ensure!(flags.is_empty(), "unexpected flags {flags:?}");
                        Ok(())
                    }),
            ),
    )
    .unwrap();

    assert_all_passed(&report);
}

#[test]
fn credit_limits_open_trust_lines() {
    let report = run(suite("credit_limits_open_trust_lines").add_scenario(
        "lines",
        StepChain::<DivvydScenarioContext>::series()
            .step("create accounts", |ctx, _| {
                create_accounts(
                    ctx,
                    ROOT_ACCOUNT,
                    "10000.0",
                    &["alice", "bob"],
                    AccountOptions::default(),
                )
            })
            .step("set credit limits", |ctx, _| {
                credit_limits(ctx, &[("bob", "100/USD/alice")])
            })
            .step("check both sides", |ctx, _| {
                let bob = account_lines(ctx, "bob", None, LedgerSelector::Validated)?;
                anyhow::ensure!(bob.len() == 1, "bob has {} lines", bob.len());
                anyhow::ensure!(bob[0].limit == 100.0, "bob limit is {}", bob[0].limit);
                anyhow::ensure!(bob[0].account == address(ctx, "alice")?);

                let alice = account_lines(ctx, "alice", Some("bob"), LedgerSelector::Validated)?;
                anyhow::ensure!(alice[0].limit_peer == 100.0);
                Ok(())
            }),
    ))
    .unwrap();

    assert_all_passed(&report);
}

#[test]
fn validated_queries_only_see_accepted_ledgers() {
    let report = run(suite("validated_queries_only_see_accepted_ledgers").add_scenario(
        "stale validated state",
        StepChain::<DivvydScenarioContext>::series()
            .step("create accounts", |ctx, _| {
                create_accounts(
                    ctx,
                    ROOT_ACCOUNT,
                    "10000.0",
                    &["alice"],
                    AccountOptions::default(),
                )
            })
            .step("submit without accepting", |ctx, _| {
                let tx = Transaction::trust_set(
                    address(ctx, ROOT_ACCOUNT)?,
                    amount(ctx, "100/USD/alice")?,
                );
                let result = submit(ctx, tx)?;
                anyhow::ensure!(result.is_success(), "TrustSet returned {result}");
                Ok(())
            })
            .step("validated ledger has no line yet", |ctx, _| {
                let validated = account_lines(ctx, ROOT_ACCOUNT, None, LedgerSelector::Validated)?;
                anyhow::ensure!(validated.is_empty());
                let current = account_lines(ctx, ROOT_ACCOUNT, None, LedgerSelector::Current)?;
                anyhow::ensure!(current.len() == 1);
                Ok(())
            })
            .step("accept and check again", |ctx, _| {
                ledger_accept(ctx)?;
                let validated = account_lines(ctx, ROOT_ACCOUNT, None, LedgerSelector::Validated)?;
                anyhow::ensure!(validated.len() == 1);
                Ok(())
            }),
    ))
    .unwrap();

    assert_all_passed(&report);
}

#[test]
fn failing_fixture_reports_the_step_label() {
    let report = run(suite("failing_fixture_reports_the_step_label").add_scenario(
        "unknown issuer",
        StepChain::<DivvydScenarioContext>::series()
            .step("create accounts", |ctx, _| {
                create_accounts(
                    ctx,
                    ROOT_ACCOUNT,
                    "10000.0",
                    &["alice"],
                    AccountOptions::default(),
                )
            })
            .step("trust an account that was never created", |ctx, _| {
                credit_limits(ctx, &[("alice", "100/USD/nobody")])
            })
            .step("unreachable", |_ctx, _| {
                panic!("steps after a failure must not run")
            }),
    ))
    .unwrap();

    match &report.scenarios[0].outcome {
        ScenarioOutcome::Failed { step, error } => {
            assert_eq!(step, "trust an account that was never created");
            assert!(error.contains("nobody"), "{error}");
        }
        other => panic!("expected a failure, got {other:?}"),
    }
}

#[test]
fn each_scenario_gets_a_fresh_ledger() {
    let report = run(
        suite("each_scenario_gets_a_fresh_ledger")
            .add_scenario(
                "first",
                StepChain::<DivvydScenarioContext>::series().step("open a line", |ctx, _| {
                    create_accounts(
                        ctx,
                        ROOT_ACCOUNT,
                        "10000.0",
                        &["alice"],
                        AccountOptions::default(),
                    )?;
                    credit_limits(ctx, &[(ROOT_ACCOUNT, "100/USD/alice")])
                }),
            )
            .add_scenario(
                "second",
                StepChain::<DivvydScenarioContext>::series().step("no lines", |ctx, _| {
                    let lines = account_lines(ctx, ROOT_ACCOUNT, None, LedgerSelector::Current)?;
                    anyhow::ensure!(lines.is_empty(), "found {} lines", lines.len());
                    anyhow::ensure!(ctx.get().accounts().get("alice").is_none());
                    Ok(())
                }),
            ),
    )
    .unwrap();

    assert_all_passed(&report);
}
