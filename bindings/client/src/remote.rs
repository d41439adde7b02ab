use std::future::Future;
use std::sync::Arc;

use harness_instruments::{report_operation, OperationRecord, Reporter};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::error::{RemoteError, RemoteResult};
use crate::in_memory::InMemoryLedger;
use crate::transport::Transport;
use crate::types::{
    AccountRootFlags, Amount, DivvyStateEntry, LedgerSelector, LineStateFlags, PathFindResult,
    SubmitResult, Transaction, TrustLine, Wallet,
};
use crate::websocket::WebsocketTransport;

/// A connection to a server, with every request timed into the [Reporter].
#[derive(Clone)]
pub struct DivvydRemoteInstrumented {
    transport: Arc<dyn Transport>,
    reporter: Arc<Reporter>,
}

impl std::fmt::Debug for DivvydRemoteInstrumented {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DivvydRemote").finish()
    }
}

/// Connect using a connection string: `ws://host:port` for a running server and `memory://` for a
/// fresh in-memory ledger. TLS is not supported, so `wss://` is refused.
pub async fn connect(
    connection_string: &str,
    reporter: Arc<Reporter>,
) -> anyhow::Result<DivvydRemoteInstrumented> {
    let url = url::Url::parse(connection_string).map_err(|e| {
        anyhow::anyhow!("Invalid connection string [{connection_string}]: {e}")
    })?;

    let transport: Arc<dyn Transport> = match url.scheme() {
        "memory" => Arc::new(InMemoryLedger::new()),
        "wss" => anyhow::bail!(
            "TLS connections are not supported, connect to [{url}] over ws:// instead"
        ),
        "ws" => Arc::new(
            WebsocketTransport::connect(&url)
                .await
                .map_err(|e| anyhow::anyhow!("Could not connect to {url}: {e}"))?,
        ),
        other => anyhow::bail!("Unsupported connection scheme [{other}]"),
    };

    Ok(DivvydRemoteInstrumented::new(transport, reporter))
}

impl DivvydRemoteInstrumented {
    pub fn new(transport: Arc<dyn Transport>, reporter: Arc<Reporter>) -> Self {
        Self {
            transport,
            reporter,
        }
    }

    async fn instrumented<T, F>(&self, operation_id: &str, fut: F) -> RemoteResult<T>
    where
        F: Future<Output = RemoteResult<T>>,
    {
        let record = OperationRecord::new(operation_id);
        let response = fut.await;
        report_operation(&self.reporter, record, &response);
        response
    }

    /// Send a request and unwrap the `result` of a success envelope.
    async fn call(&self, command: &str, params: Value) -> RemoteResult<Value> {
        let envelope = self.transport.request(command, params).await?;
        match envelope.get("status").and_then(Value::as_str) {
            Some("success") => envelope
                .get("result")
                .cloned()
                .ok_or_else(|| RemoteError::Decode(format!("{command} response has no result"))),
            Some("error") => Err(RemoteError::from_envelope(&envelope)),
            _ => Err(RemoteError::Decode(format!(
                "{command} response has no status: {envelope}"
            ))),
        }
    }

    async fn call_typed<T: DeserializeOwned>(
        &self,
        command: &str,
        params: Value,
    ) -> RemoteResult<T> {
        let result = self.call(command, params).await?;
        serde_json::from_value(result)
            .map_err(|e| RemoteError::Decode(format!("{command} response: {e}")))
    }

    /// Generate keys for a new account, or recover the keys behind `passphrase`.
    pub async fn wallet_propose(&self, passphrase: Option<&str>) -> RemoteResult<Wallet> {
        let params = match passphrase {
            Some(passphrase) => json!({ "passphrase": passphrase }),
            None => json!({}),
        };
        self.instrumented("wallet_propose", self.call_typed("wallet_propose", params))
            .await
    }

    /// Submit a transaction for the server to sign with `secret`. The result is the tentative one
    /// reported when the transaction is submitted.
    pub async fn submit(&self, tx: &Transaction, secret: &str) -> RemoteResult<SubmitResult> {
        let mut params = json!({
            "secret": secret,
            "tx_json": tx.to_tx_json(),
        });
        if tx.build_path() {
            params["build_path"] = Value::Bool(true);
        }

        self.instrumented("submit", self.call_typed("submit", params))
            .await
    }

    /// Close the open ledger so that everything submitted so far is validated.
    pub async fn ledger_accept(&self) -> RemoteResult<()> {
        self.instrumented("ledger_accept", async {
            self.call("ledger_accept", json!({})).await.map(|_| ())
        })
        .await
    }

    pub async fn account_flags(
        &self,
        account: &str,
        ledger: LedgerSelector,
    ) -> RemoteResult<AccountRootFlags> {
        self.instrumented("account_flags", async {
            let info = self
                .call(
                    "account_info",
                    json!({ "account": account, "ledger_index": ledger.as_str() }),
                )
                .await?;
            info.pointer("/account_data/Flags")
                .and_then(Value::as_u64)
                .map(|flags| AccountRootFlags::from_bits_retain(flags as u32))
                .ok_or_else(|| RemoteError::Decode("account_info has no Flags".to_string()))
        })
        .await
    }

    pub async fn account_lines(
        &self,
        account: &str,
        peer: Option<&str>,
        ledger: LedgerSelector,
    ) -> RemoteResult<Vec<TrustLine>> {
        self.instrumented("account_lines", async {
            let mut params = json!({ "account": account, "ledger_index": ledger.as_str() });
            if let Some(peer) = peer {
                params["peer"] = peer.into();
            }

            let mut result = self.call("account_lines", params).await?;
            serde_json::from_value(result["lines"].take())
                .map_err(|e| RemoteError::Decode(format!("account_lines response: {e}")))
        })
        .await
    }

    /// Read the line state between two accounts. Fails with `entryNotFound` when there is no line.
    pub async fn divvy_balance(
        &self,
        account: &str,
        issuer: &str,
        currency: &str,
        ledger: LedgerSelector,
    ) -> RemoteResult<DivvyStateEntry> {
        self.instrumented("divvy_balance", async {
            let result = self
                .call(
                    "ledger_entry",
                    json!({
                        "divvy_state": {
                            "accounts": [account, issuer],
                            "currency": currency,
                        },
                        "ledger_index": ledger.as_str(),
                    }),
                )
                .await?;

            let flags = result
                .pointer("/node/Flags")
                .and_then(Value::as_u64)
                .map(|flags| LineStateFlags::from_bits_retain(flags as u32))
                .unwrap_or_default();
            let balance = result
                .pointer("/node/Balance")
                .ok_or_else(|| RemoteError::Decode("line state has no Balance".to_string()))
                .and_then(Amount::from_json)?;
            let Amount::Issued { value, .. } = balance else {
                return Err(RemoteError::Decode(
                    "line state balance is not an issued amount".to_string(),
                ));
            };

            Ok(DivvyStateEntry {
                flags,
                balance: value,
            })
        })
        .await
    }

    /// Ask for ways `source` could deliver `destination_amount` to `destination`, spending one of
    /// `source_currencies`.
    pub async fn path_find(
        &self,
        source: &str,
        destination: &str,
        destination_amount: &Amount,
        source_currencies: &[&str],
    ) -> RemoteResult<PathFindResult> {
        let currencies = source_currencies
            .iter()
            .map(|currency| json!({ "currency": currency }))
            .collect::<Vec<_>>();

        self.instrumented(
            "path_find",
            self.call_typed(
                "divvy_path_find",
                json!({
                    "source_account": source,
                    "destination_account": destination,
                    "destination_amount": destination_amount.to_json(),
                    "source_currencies": currencies,
                }),
            ),
        )
        .await
    }

    pub async fn disconnect(&self) -> RemoteResult<()> {
        self.transport.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::in_memory::{GENESIS_ADDRESS, GENESIS_PASSPHRASE};
    use crate::types::{AccountSetTxFlag, EngineResult, TrustSetTxFlag};

    async fn remote() -> (DivvydRemoteInstrumented, Arc<Reporter>) {
        let reporter = Arc::new(Reporter::new(true));
        (connect("memory://", reporter.clone()).await.unwrap(), reporter)
    }

    #[tokio::test]
    async fn rejects_unknown_scheme() {
        let err = connect("http://localhost:5005", Arc::new(Reporter::disabled()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Unsupported connection scheme"));
    }

    #[tokio::test]
    async fn refuses_tls_before_connecting() {
        let err = connect("wss://127.0.0.1:1", Arc::new(Reporter::disabled()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("TLS connections are not supported"), "{err}");
    }

    #[tokio::test]
    async fn account_set_round_trip() {
        let (remote, reporter) = remote().await;
        let tx = Transaction::account_set(GENESIS_ADDRESS)
            .with_account_set_flag(AccountSetTxFlag::RequireDestTag);

        let submitted = remote.submit(&tx, GENESIS_PASSPHRASE).await.unwrap();
        assert_eq!(submitted.engine_result, EngineResult::TesSuccess);

        let flags = remote
            .account_flags(GENESIS_ADDRESS, LedgerSelector::Current)
            .await
            .unwrap();
        assert!(flags.contains(AccountRootFlags::REQUIRE_DEST_TAG));

        let operations = reporter
            .summary()
            .into_iter()
            .map(|s| s.operation_id)
            .collect::<Vec<_>>();
        assert!(operations.contains(&"submit".to_string()));
        assert!(operations.contains(&"account_flags".to_string()));
    }

    #[tokio::test]
    async fn missing_line_is_not_found() {
        let (remote, _) = remote().await;
        let wallet = remote.wallet_propose(None).await.unwrap();

        let err = remote
            .divvy_balance(
                &wallet.account_id,
                GENESIS_ADDRESS,
                "USD",
                LedgerSelector::Current,
            )
            .await
            .unwrap_err();
        assert_eq!(err.category(), "remoteError");
        assert_eq!(err.subcategory(), Some("entryNotFound"));
    }

    #[tokio::test]
    async fn trust_line_is_visible_from_both_sides() {
        let (remote, _) = remote().await;
        let wallet = remote.wallet_propose(None).await.unwrap();
        let fund = Transaction::payment(
            GENESIS_ADDRESS,
            &wallet.account_id,
            "1000".parse().unwrap(),
        );
        remote.submit(&fund, GENESIS_PASSPHRASE).await.unwrap();

        let trust = Transaction::trust_set(
            GENESIS_ADDRESS,
            Amount::issued(100.0, "USD", wallet.account_id.as_str()),
        )
        .with_trust_set_flag(TrustSetTxFlag::SetNoDivvy);
        let submitted = remote.submit(&trust, GENESIS_PASSPHRASE).await.unwrap();
        assert_eq!(submitted.engine_result, EngineResult::TesSuccess);
        remote.ledger_accept().await.unwrap();

        let root_lines = remote
            .account_lines(GENESIS_ADDRESS, None, LedgerSelector::Validated)
            .await
            .unwrap();
        assert_eq!(root_lines.len(), 1);
        assert_eq!(root_lines[0].limit, 100.0);
        assert!(root_lines[0].no_divvy);

        let peer_lines = remote
            .account_lines(
                &wallet.account_id,
                Some(GENESIS_ADDRESS),
                LedgerSelector::Validated,
            )
            .await
            .unwrap();
        assert_eq!(peer_lines[0].limit_peer, 100.0);
        assert!(peer_lines[0].no_divvy_peer);

        let entry = remote
            .divvy_balance(
                GENESIS_ADDRESS,
                &wallet.account_id,
                "USD",
                LedgerSelector::Validated,
            )
            .await
            .unwrap();
        assert_eq!(entry.balance, 0.0);
        assert!(entry
            .flags
            .intersects(LineStateFlags::LOW_NO_DIVVY | LineStateFlags::HIGH_NO_DIVVY));
    }

    #[tokio::test]
    async fn disconnected_remote_reports_closed() {
        let (remote, _) = remote().await;
        remote.disconnect().await.unwrap();
        assert_eq!(
            remote.ledger_accept().await.unwrap_err(),
            RemoteError::Closed
        );
    }
}
