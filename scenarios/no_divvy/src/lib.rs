//! NoDivvy on trust lines, and the DefaultDivvy account setting that decides it for new lines.

use anyhow::{ensure, Context};
use divvyd_harness_runner::prelude::*;

type Chain = StepChain<DivvydScenarioContext>;

pub fn no_divvy_suite(cli: ScenarioSuiteCli) -> SuiteDefinitionBuilder<DivvydScenarioContext> {
    SuiteDefinitionBuilder::new("NoDivvy", cli)
        .use_setup(connect_remote)
        .use_teardown(disconnect_remote)
        .add_scenario("set and clear NoDivvy", set_and_clear())
        .add_scenario(
            "set NoDivvy on line with negative balance",
            negative_balance(),
        )
        .add_scenario("pairwise NoDivvy", pairwise())
}

pub fn default_divvy_suite(cli: ScenarioSuiteCli) -> SuiteDefinitionBuilder<DivvydScenarioContext> {
    SuiteDefinitionBuilder::new("Default divvy", cli)
        .use_setup(connect_remote)
        .use_teardown(disconnect_remote)
        .add_scenario(
            "Set default divvy on account, check new trustline",
            default_divvy_new_line(),
        )
}

fn first_line(
    ctx: &mut DivvydContext,
    account: &str,
    peer: Option<&str>,
    ledger: LedgerSelector,
) -> HarnessResult<TrustLine> {
    account_lines(ctx, account, peer, ledger)?
        .into_iter()
        .next()
        .with_context(|| format!("{account} has no trust lines"))
}

fn trust_set(
    ctx: &DivvydContext,
    account: &str,
    limit: &str,
    flag: Option<TrustSetTxFlag>,
) -> HarnessResult<Transaction> {
    let tx = Transaction::trust_set(address(ctx, account)?, amount(ctx, limit)?);
    Ok(match flag {
        Some(flag) => tx.with_trust_set_flag(flag),
        None => tx,
    })
}

fn create_alice_bob_carol(ctx: &mut DivvydContext) -> HarnessResult<()> {
    create_accounts(
        ctx,
        ROOT_ACCOUNT,
        "10000.0",
        &["alice", "bob", "carol"],
        AccountOptions::default(),
    )
}

fn bob_and_carol_limits(ctx: &mut DivvydContext) -> HarnessResult<()> {
    credit_limits(ctx, &[("bob", "100/USD/alice"), ("carol", "100/USD/bob")])
}

fn set_and_clear() -> Chain {
    Chain::series()
        .step("Create accounts.", |ctx, _| {
            create_accounts(
                ctx,
                ROOT_ACCOUNT,
                "10000.0",
                &["alice"],
                AccountOptions::default(),
            )
        })
        .step("Check a non-existent credit limit", |ctx, _| {
            match divvy_balance(ctx, "alice", ROOT_ACCOUNT, "USD", LedgerSelector::Current)? {
                Ok(entry) => anyhow::bail!("expected no line, found {entry:?}"),
                Err(e) => {
                    ensure!(e.category() == "remoteError", "unexpected error {e}");
                    ensure!(
                        e.subcategory() == Some("entryNotFound"),
                        "unexpected error {e}"
                    );
                    Ok(())
                }
            }
        })
        .step("Create a credit limit with NoDivvy flag", |ctx, _| {
            let tx = trust_set(
                ctx,
                ROOT_ACCOUNT,
                "100/USD/alice",
                Some(TrustSetTxFlag::SetNoDivvy),
            )?;
            submit_transaction(ctx, tx)
        })
        .step("Check no-divvy sender", |ctx, _| {
            let line = first_line(ctx, ROOT_ACCOUNT, None, LedgerSelector::Validated)?;
            ensure!(line.no_divvy);
            Ok(())
        })
        .step("Check no-divvy destination", |ctx, _| {
            let line = first_line(ctx, "alice", None, LedgerSelector::Validated)?;
            ensure!(line.no_divvy_peer);
            Ok(())
        })
        .step("Create a credit limit with ClearNoDivvy flag", |ctx, _| {
            let tx = trust_set(
                ctx,
                ROOT_ACCOUNT,
                "100/USD/alice",
                Some(TrustSetTxFlag::ClearNoDivvy),
            )?;
            submit_transaction(ctx, tx)
        })
        .step("Check no-divvy cleared sender", |ctx, _| {
            let line = first_line(ctx, ROOT_ACCOUNT, None, LedgerSelector::Validated)?;
            ensure!(!line.no_divvy);
            Ok(())
        })
        .step("Check no-divvy cleared destination", |ctx, _| {
            let line = first_line(ctx, "alice", None, LedgerSelector::Validated)?;
            ensure!(!line.no_divvy_peer);
            Ok(())
        })
}

/// NoDivvy cannot be set by an account that owes on the line. The request still succeeds, the flag
/// is just not applied, so rippling keeps working.
fn negative_balance() -> Chain {
    Chain::series()
        .step("Create accounts", |ctx, _| create_alice_bob_carol(ctx))
        .step("Set credit limits", |ctx, _| bob_and_carol_limits(ctx))
        .step("Payment", |ctx, _| {
            let tx = Transaction::payment(
                address(ctx, "alice")?,
                address(ctx, "carol")?,
                amount(ctx, "50/USD/carol")?,
            )
            .with_build_path(true);
            submit_transaction(ctx, tx)
        })
        .step("Set NoDivvy alice", |ctx, _| {
            let tx = trust_set(ctx, "alice", "100/USD/bob", Some(TrustSetTxFlag::SetNoDivvy))?;
            submit_transaction(ctx, tx)
        })
        .step("Set NoDivvy carol", |ctx, _| {
            let tx = trust_set(ctx, "bob", "100/USD/carol", Some(TrustSetTxFlag::SetNoDivvy))?;
            submit_transaction(ctx, tx)
        })
        .step("Find path alice > carol", |ctx, _| {
            let paths = path_find(ctx, "alice", "carol", "1/USD/carol", &["USD"])?;
            ensure!(
                paths.alternatives.len() == 1,
                "expected one alternative, found {}",
                paths.alternatives.len()
            );
            Ok(())
        })
        .step("Check alice line", |ctx, _| {
            let lines = account_lines(ctx, "alice", None, LedgerSelector::Current)?;
            ensure!(lines.len() == 1, "alice has {} lines", lines.len());
            ensure!(!lines[0].no_divvy, "NoDivvy was set on a line in debt");
            Ok(())
        })
}

/// With NoDivvy on both of bob's lines, value cannot ripple through bob.
fn pairwise() -> Chain {
    Chain::series()
        .step("Create accounts", |ctx, _| create_alice_bob_carol(ctx))
        .step("Set credit limits", |ctx, _| bob_and_carol_limits(ctx))
        .step("Set NoDivvy alice", |ctx, _| {
            let tx = trust_set(ctx, "bob", "100/USD/alice", Some(TrustSetTxFlag::SetNoDivvy))?;
            submit_transaction(ctx, tx)
        })
        .step("Set NoDivvy carol", |ctx, _| {
            let tx = trust_set(ctx, "bob", "100/USD/carol", Some(TrustSetTxFlag::SetNoDivvy))?;
            submit_transaction(ctx, tx)
        })
        .step("Find path alice > carol", |ctx, _| {
            let paths = path_find(ctx, "alice", "carol", "1/USD/carol", &["USD"])?;
            ensure!(
                paths.alternatives.is_empty(),
                "expected no alternatives, found {}",
                paths.alternatives.len()
            );
            Ok(())
        })
        .step("Payment", |ctx, _| {
            let tx = Transaction::payment(
                address(ctx, "alice")?,
                address(ctx, "carol")?,
                amount(ctx, "1/USD/carol")?,
            )
            .with_build_path(true);
            let result = submit_and_accept(ctx, tx)?;
            ensure!(
                result == EngineResult::TecPathDry,
                "expected tecPATH_DRY, got {result}"
            );
            Ok(())
        })
}

fn default_divvy_new_line() -> Chain {
    Chain::series()
        .step("Create accounts", |ctx, _| {
            create_accounts(
                ctx,
                ROOT_ACCOUNT,
                "10000.0",
                &["alice", "bob"],
                AccountOptions {
                    default_divvy: false,
                },
            )
        })
        .step("Set DefaultDivvy on bob", |ctx, _| {
            let tx = Transaction::account_set(address(ctx, "bob")?)
                .with_set_flag(AccountFlag::DefaultDivvy);
            submit_transaction(ctx, tx)
        })
        .step("Trust alice", |ctx, _| {
            let tx = trust_set(ctx, ROOT_ACCOUNT, "100/USD/alice", None)?;
            submit_transaction(ctx, tx)
        })
        .step("Trust bob", |ctx, _| {
            let tx = trust_set(ctx, ROOT_ACCOUNT, "100/USD/bob", None)?;
            submit_transaction(ctx, tx)
        })
        .step("Check root line to alice", |ctx, _| {
            let line = first_line(ctx, ROOT_ACCOUNT, Some("alice"), LedgerSelector::Current)?;
            ensure!(line.no_divvy_peer, "Trustline should have no_divvy_peer set");
            Ok(())
        })
        .step("Check alice line to root", |ctx, _| {
            let line = first_line(ctx, "alice", Some(ROOT_ACCOUNT), LedgerSelector::Current)?;
            ensure!(line.no_divvy, "Trustline should have no_divvy set");
            Ok(())
        })
        .step("Check root line to bob", |ctx, _| {
            let line = first_line(ctx, ROOT_ACCOUNT, Some("bob"), LedgerSelector::Current)?;
            ensure!(!line.no_divvy, "Trustline should not have no_divvy set");
            Ok(())
        })
        .step("Check bob line to root", |ctx, _| {
            let line = first_line(ctx, "bob", Some(ROOT_ACCOUNT), LedgerSelector::Current)?;
            ensure!(!line.no_divvy_peer, "Trustline should not have no_divvy_peer set");
            Ok(())
        })
}
