//! Account flags set and cleared with AccountSet transactions.

use anyhow::ensure;
use divvyd_harness_runner::prelude::*;

type Chain<T = ()> = StepChain<DivvydScenarioContext, T>;

pub fn suite(cli: ScenarioSuiteCli) -> SuiteDefinitionBuilder<DivvydScenarioContext> {
    SuiteDefinitionBuilder::new(env!("CARGO_PKG_NAME"), cli)
        .use_setup(connect_remote)
        .use_teardown(disconnect_remote)
        .add_scenario("null AccountSet", null_account_set())
        .add_scenario(
            "set RequireDestTag",
            flag_round_trip(
                "RequireDestTag",
                AccountSetTxFlag::RequireDestTag,
                AccountSetTxFlag::OptionalDestTag,
                AccountRootFlags::REQUIRE_DEST_TAG,
            ),
        )
        .add_scenario(
            "set RequireAuth",
            flag_round_trip(
                "RequireAuth",
                AccountSetTxFlag::RequireAuth,
                AccountSetTxFlag::OptionalAuth,
                AccountRootFlags::REQUIRE_AUTH,
            ),
        )
        .add_scenario(
            "set DisallowXDV",
            flag_round_trip(
                "DisallowXDV",
                AccountSetTxFlag::DisallowXdv,
                AccountSetTxFlag::AllowXdv,
                AccountRootFlags::DISALLOW_XDV,
            ),
        )
        .add_scenario("RequireAuth with trust lines", require_auth_with_owned_lines())
}

fn root_account_set(ctx: &DivvydContext) -> HarnessResult<Transaction> {
    Ok(Transaction::account_set(address(ctx, ROOT_ACCOUNT)?))
}

fn null_account_set() -> Chain {
    Chain::series()
        .step("Send null AccountSet", |ctx, _| {
            let tx = root_account_set(ctx)?;
            let result = submit_and_accept(ctx, tx)?;
            ensure!(result.is_success(), "engine result {result}");
            Ok(())
        })
        .step("Check account flags", |ctx, _| {
            let flags = account_flags(ctx, ROOT_ACCOUNT, LedgerSelector::Validated)?;
            ensure!(flags.bits() == 0, "flags are {:#x}", flags.bits());
            Ok(())
        })
}

/// Set a flag, check it, clear it and check it is gone. Each submit is accepted into a validated
/// ledger and passes its engine result on to the check after it.
fn flag_round_trip(
    name: &str,
    set: AccountSetTxFlag,
    clear: AccountSetTxFlag,
    ledger_flag: AccountRootFlags,
) -> Chain<Option<EngineResult>> {
    Chain::waterfall()
        .step(format!("Set {name}."), move |ctx, _| {
            let tx = root_account_set(ctx)?.with_account_set_flag(set);
            Ok(Some(submit_and_accept(ctx, tx)?))
        })
        .step(format!("Check {name}"), move |ctx, submitted| {
            expect_success(submitted)?;
            let flags = account_flags(ctx, ROOT_ACCOUNT, LedgerSelector::Validated)?;
            ensure!(flags.contains(ledger_flag), "flag missing, flags are {flags:?}");
            Ok(None)
        })
        .step(format!("Clear {name}."), move |ctx, _| {
            let tx = root_account_set(ctx)?.with_account_set_flag(clear);
            Ok(Some(submit_and_accept(ctx, tx)?))
        })
        .step(format!("Check No {name}"), move |ctx, submitted| {
            expect_success(submitted)?;
            let flags = account_flags(ctx, ROOT_ACCOUNT, LedgerSelector::Validated)?;
            ensure!(!flags.contains(ledger_flag), "flag still set, flags are {flags:?}");
            Ok(None)
        })
}

fn expect_success(submitted: Option<EngineResult>) -> HarnessResult<()> {
    match submitted {
        Some(result) if result.is_success() => Ok(()),
        Some(result) => anyhow::bail!("submit returned {result}"),
        None => anyhow::bail!("nothing was submitted"),
    }
}

fn require_auth_with_owned_lines() -> Chain {
    Chain::series()
        .step("Create accounts", |ctx, _| {
            create_accounts(
                ctx,
                ROOT_ACCOUNT,
                "10000.0",
                &["alice"],
                AccountOptions::default(),
            )
        })
        .step("Set credit limits", |ctx, _| {
            credit_limits(ctx, &[(ROOT_ACCOUNT, "100/USD/alice")])
        })
        .step("Set RequireAuth.", |ctx, _| {
            let tx = root_account_set(ctx)?.with_account_set_flag(AccountSetTxFlag::RequireAuth);
            let result = submit_and_accept(ctx, tx)?;
            ensure!(
                result == EngineResult::TecOwners,
                "expected tecOWNERS, got {result}"
            );
            Ok(())
        })
        .step("Check No RequireAuth", |ctx, _| {
            let flags = account_flags(ctx, ROOT_ACCOUNT, LedgerSelector::Validated)?;
            ensure!(!flags.contains(AccountRootFlags::REQUIRE_AUTH));
            Ok(())
        })
}
