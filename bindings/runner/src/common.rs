use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use divvyd_client_instrumented::prelude::{
    connect, handle_remote_err, AccountFlag, AccountRootFlags, Amount, DivvyStateEntry,
    DivvydRemote, EngineResult, LedgerSelector, PathFindResult, RemoteError, Transaction,
    TrustLine,
};
use harness_runner::prelude::{HarnessResult, HookResult, ScenarioContext};

use crate::accounts::{AccountKeys, ROOT_ACCOUNT};
use crate::bin_path::divvyd_path;
use crate::context::DivvydScenarioContext;
use crate::divvyd_runner::{DivvydConfig, DivvydRunner};

/// When set, a fresh standalone server is started with this config file for every scenario.
pub const DIVVYD_CONF_ENV: &str = "DIVVYD_CONF";
/// The secret of the funded root account.
pub const DIVVYD_ROOT_SECRET_ENV: &str = "DIVVYD_ROOT_SECRET";
const DEFAULT_ROOT_SECRET: &str = "masterpassphrase";

const CONNECT_ATTEMPTS: u32 = 40;
const CONNECT_RETRY_DELAY: Duration = Duration::from_millis(250);

pub type DivvydContext = ScenarioContext<DivvydScenarioContext>;

/// Setup hook that gets a scenario ready to talk to a server.
///
/// Method:
/// - If `DIVVYD_CONF` is set, starts a standalone server for this scenario, see
///   [run_divvyd_server].
/// - Connects to the connection string from the runner context, retrying while a freshly started
///   server comes up.
/// - Registers the root account under the name `root`, using `DIVVYD_ROOT_SECRET` or the default
///   genesis passphrase.
pub fn connect_remote(ctx: &mut DivvydContext) -> HookResult {
    let started_server = run_divvyd_server(ctx)?;

    let connection_string = ctx.runner_context().get_connection_string().to_string();
    let reporter = ctx.runner_context().reporter();
    let root_secret =
        env::var(DIVVYD_ROOT_SECRET_ENV).unwrap_or_else(|_| DEFAULT_ROOT_SECRET.to_string());
    let attempts = if started_server { CONNECT_ATTEMPTS } else { 1 };

    let (remote, root) = ctx
        .runner_context()
        .executor()
        .execute_in_place(async move {
            log::debug!("Connecting to divvyd: {connection_string}");
            let mut attempt = 1;
            let remote = loop {
                match connect(&connection_string, reporter.clone()).await {
                    Ok(remote) => break remote,
                    Err(e) if attempt < attempts => {
                        log::trace!("Connection attempt {attempt} failed: {e:#}");
                        attempt += 1;
                        tokio::time::sleep(CONNECT_RETRY_DELAY).await;
                    }
                    Err(e) => {
                        return Err(e.context("Unable to connect to divvyd, is a server running?"))
                    }
                }
            };

            let root = remote
                .wallet_propose(Some(&root_secret))
                .await
                .map_err(handle_remote_err)
                .context("Unable to recover the root account keys")?;
            Ok((remote, root))
        })?;

    log::debug!("Root account is {}", root.account_id);
    let value = ctx.get_mut();
    value.remote = Some(remote);
    value.accounts.insert(ROOT_ACCOUNT, root);

    Ok(())
}

/// Teardown hook that closes the connection and stops the server started by [connect_remote], if
/// there is one.
pub fn disconnect_remote(ctx: &mut DivvydContext) -> HookResult {
    let remote = ctx.get_mut().remote.take();
    let runner = ctx.get_mut().divvyd_runner.take();

    ctx.runner_context()
        .executor()
        .execute_in_place(async move {
            if let Some(remote) = remote {
                if let Err(e) = remote.disconnect().await {
                    log::warn!("Failed to close the connection cleanly: {e}");
                }
            }
            if let Some(runner) = runner {
                runner.stop().await?;
            }
            Ok(())
        })
}

/// Start a standalone server for the current scenario if `DIVVYD_CONF` is set, storing the running
/// process in the scenario value. Returns whether a server was started.
pub fn run_divvyd_server(ctx: &mut DivvydContext) -> HarnessResult<bool> {
    let conf_path = match env::var(DIVVYD_CONF_ENV) {
        Ok(path) if !path.is_empty() => PathBuf::from(path),
        _ => {
            log::info!("'{DIVVYD_CONF_ENV}' not set so assuming a server is running externally");
            return Ok(false);
        }
    };
    if !conf_path.exists() {
        bail!(
            "'{DIVVYD_CONF_ENV}={}' but that file doesn't exist",
            conf_path.display()
        );
    }

    let config = DivvydConfig {
        bin_path: divvyd_path()?,
        conf_path,
        log_name: Some(ctx.scenario_name().to_string()),
    };
    let runner = ctx
        .runner_context()
        .executor()
        .execute_in_place(async move { DivvydRunner::run(&config).await })?;
    ctx.get_mut().divvyd_runner = Some(runner);

    Ok(true)
}

/// Options for [create_accounts].
#[derive(Debug, Clone, Copy)]
pub struct AccountOptions {
    /// Set DefaultDivvy on each new account, so trust lines other accounts open to it allow
    /// rippling.
    pub default_divvy: bool,
}

impl Default for AccountOptions {
    fn default() -> Self {
        Self {
            default_divvy: true,
        }
    }
}

/// Create and fund an account for each name, paying `amount` from `funder`.
///
/// Every transaction is accepted into a validated ledger before the next account is created.
pub fn create_accounts(
    ctx: &mut DivvydContext,
    funder: &str,
    amount: &str,
    names: &[&str],
    options: AccountOptions,
) -> HarnessResult<()> {
    let funder = address(ctx, funder)?;
    let amount = self::amount(ctx, amount)?;

    for name in names {
        let remote = remote(ctx)?;
        let keys: AccountKeys = ctx
            .runner_context()
            .executor()
            .execute_in_place(async move {
                remote
                    .wallet_propose(None)
                    .await
                    .map(AccountKeys::from)
                    .map_err(handle_remote_err)
            })
            .with_context(|| format!("Could not create keys for [{name}]"))?;
        log::debug!("Account {name} is {}", keys.address);
        ctx.get_mut().accounts.insert(*name, keys.clone());

        submit_transaction(
            ctx,
            Transaction::payment(funder.as_str(), keys.address.as_str(), amount.clone()),
        )
        .with_context(|| format!("Could not fund [{name}]"))?;

        if options.default_divvy {
            submit_transaction(
                ctx,
                Transaction::account_set(keys.address.as_str())
                    .with_set_flag(AccountFlag::DefaultDivvy),
            )
            .with_context(|| format!("Could not set DefaultDivvy on [{name}]"))?;
        }
    }

    Ok(())
}

/// Open a trust line for each `(account, "limit/currency/issuer")` pair.
pub fn credit_limits(ctx: &mut DivvydContext, limits: &[(&str, &str)]) -> HarnessResult<()> {
    for (account, limit) in limits {
        let tx = Transaction::trust_set(address(ctx, account)?, amount(ctx, limit)?);
        submit_transaction(ctx, tx)
            .with_context(|| format!("Could not set credit limit {limit} for [{account}]"))?;
    }
    Ok(())
}

/// Submit a transaction, signed with the secret of its account, without accepting a ledger.
pub fn submit(ctx: &mut DivvydContext, tx: Transaction) -> HarnessResult<EngineResult> {
    let remote = remote(ctx)?;
    let secret = ctx
        .get()
        .accounts
        .secret_for_address(tx.account())?
        .to_string();

    let submitted = ctx
        .runner_context()
        .executor()
        .execute_in_place(async move {
            remote
                .submit(&tx, &secret)
                .await
                .map_err(handle_remote_err)
        })?;
    log::debug!(
        "Submitted, engine result {} {}",
        submitted.engine_result,
        submitted.engine_result_message
    );

    Ok(submitted.engine_result)
}

/// Submit a transaction and accept the ledger, whatever the engine result. Returns the result.
pub fn submit_and_accept(ctx: &mut DivvydContext, tx: Transaction) -> HarnessResult<EngineResult> {
    let result = submit(ctx, tx)?;
    ledger_accept(ctx)?;
    Ok(result)
}

/// Submit a transaction that must succeed and accept the ledger.
pub fn submit_transaction(ctx: &mut DivvydContext, tx: Transaction) -> HarnessResult<()> {
    let kind = tx.transaction_type();
    let result = submit(ctx, tx)?;
    if !result.is_success() {
        bail!("{kind} failed with {result}");
    }
    ledger_accept(ctx)
}

pub fn ledger_accept(ctx: &mut DivvydContext) -> HarnessResult<()> {
    let remote = remote(ctx)?;
    ctx.runner_context()
        .executor()
        .execute_in_place(async move { remote.ledger_accept().await.map_err(handle_remote_err) })
}

/// The address of a named account.
pub fn address(ctx: &DivvydContext, name: &str) -> HarnessResult<String> {
    ctx.get().accounts.address(name)
}

/// Parse an amount such as `"100/USD/alice"`, resolving the issuer name.
pub fn amount(ctx: &DivvydContext, amount: &str) -> HarnessResult<Amount> {
    ctx.get().accounts.amount(amount)
}

pub fn account_flags(
    ctx: &mut DivvydContext,
    account: &str,
    ledger: LedgerSelector,
) -> HarnessResult<AccountRootFlags> {
    let remote = remote(ctx)?;
    let account = address(ctx, account)?;
    ctx.runner_context()
        .executor()
        .execute_in_place(async move {
            remote
                .account_flags(&account, ledger)
                .await
                .map_err(handle_remote_err)
        })
}

pub fn account_lines(
    ctx: &mut DivvydContext,
    account: &str,
    peer: Option<&str>,
    ledger: LedgerSelector,
) -> HarnessResult<Vec<TrustLine>> {
    let remote = remote(ctx)?;
    let account = address(ctx, account)?;
    let peer = peer.map(|p| address(ctx, p)).transpose()?;
    ctx.runner_context()
        .executor()
        .execute_in_place(async move {
            remote
                .account_lines(&account, peer.as_deref(), ledger)
                .await
                .map_err(handle_remote_err)
        })
}

/// Read the line state between two accounts.
///
/// The outer result fails when the request could not be made at all. The inner result carries the
/// server's answer, so a step can check for `entryNotFound`.
pub fn divvy_balance(
    ctx: &mut DivvydContext,
    account: &str,
    issuer: &str,
    currency: &str,
    ledger: LedgerSelector,
) -> HarnessResult<Result<DivvyStateEntry, RemoteError>> {
    let remote = remote(ctx)?;
    let account = address(ctx, account)?;
    let issuer = address(ctx, issuer)?;
    let currency = currency.to_string();
    ctx.runner_context()
        .executor()
        .execute_in_place(async move {
            match remote
                .divvy_balance(&account, &issuer, &currency, ledger)
                .await
            {
                Err(e @ RemoteError::Remote { .. }) => Ok(Err(e)),
                Err(e) => Err(handle_remote_err(e)),
                Ok(entry) => Ok(Ok(entry)),
            }
        })
}

pub fn path_find(
    ctx: &mut DivvydContext,
    source: &str,
    destination: &str,
    destination_amount: &str,
    source_currencies: &[&str],
) -> HarnessResult<PathFindResult> {
    let remote = remote(ctx)?;
    let source = address(ctx, source)?;
    let destination = address(ctx, destination)?;
    let destination_amount = amount(ctx, destination_amount)?;
    let source_currencies = source_currencies
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>();

    ctx.runner_context()
        .executor()
        .execute_in_place(async move {
            let currencies = source_currencies
                .iter()
                .map(String::as_str)
                .collect::<Vec<_>>();
            remote
                .path_find(&source, &destination, &destination_amount, &currencies)
                .await
                .map_err(handle_remote_err)
        })
}

fn remote(ctx: &DivvydContext) -> HarnessResult<DivvydRemote> {
    ctx.get().remote().cloned()
}
