mod ledger;

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use crate::error::{RemoteError, RemoteResult};
use crate::transport::Transport;
use crate::types::{Amount, LineStateFlags, Transaction};
use ledger::{LedgerState, LineKey};

/// Address of the account holding every native unit when the ledger starts.
pub const GENESIS_ADDRESS: &str = "rHb9CJAWyB4rj91VRWn96DkukG4bwdtyTh";
/// Passphrase that unlocks the genesis account.
pub const GENESIS_PASSPHRASE: &str = "masterpassphrase";

const GENESIS_DROPS: u64 = 100_000_000_000_000_000;
const ADDRESS_ALPHABET: [char; 58] = [
    'r', 'p', 's', 'h', 'n', 'a', 'f', '3', '9', 'w', 'B', 'U', 'D', 'N', 'E', 'G', 'H', 'J', 'K',
    'L', 'M', '4', 'P', 'Q', 'R', 'S', 'T', '7', 'V', 'W', 'X', 'Y', 'Z', '2', 'b', 'c', 'd', 'e',
    'C', 'g', '6', '5', 'j', 'k', 'm', '8', 'o', 'F', 'q', 'i', '1', 't', 'u', 'v', 'A', 'x', 'y',
    'z',
];
/// The issuer shown on the balance of a line state, which belongs to neither side.
const NO_ACCOUNT: &str = "rrrrrrrrrrrrrrrrrrrrBZbvji";

/// A standalone ledger kept in memory, answering the same requests as a real server. It is a test
/// fixture for running the scenarios without a server and only follows the rules they check.
///
/// Submitted transactions are applied to the open ledger straight away. Queries against the
/// `validated` or `closed` ledger only see what the last `ledger_accept` finalised.
#[derive(Debug)]
pub struct InMemoryLedger {
    inner: Mutex<Inner>,
}

#[derive(Debug)]
struct Inner {
    open: LedgerState,
    validated: LedgerState,
    ledger_index: u64,
    /// Secret to address.
    secrets: HashMap<String, String>,
    closed: bool,
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryLedger {
    pub fn new() -> Self {
        let genesis = LedgerState::genesis(GENESIS_ADDRESS, GENESIS_DROPS);
        Self {
            inner: Mutex::new(Inner {
                open: genesis.clone(),
                validated: genesis,
                ledger_index: 2,
                secrets: HashMap::from([(
                    GENESIS_PASSPHRASE.to_string(),
                    GENESIS_ADDRESS.to_string(),
                )]),
                closed: false,
            }),
        }
    }
}

#[async_trait]
impl Transport for InMemoryLedger {
    async fn request(&self, command: &str, params: Value) -> RemoteResult<Value> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(RemoteError::Closed);
        }
        log::trace!("in-memory request {command}: {params}");

        let response = match command {
            "wallet_propose" => inner.wallet_propose(&params),
            "submit" => inner.submit(&params),
            "ledger_accept" => inner.ledger_accept(),
            "account_info" => inner.account_info(&params),
            "account_lines" => inner.account_lines(&params),
            "ledger_entry" => inner.ledger_entry(&params),
            "divvy_path_find" => inner.path_find(&params),
            _ => Err(RemoteError::remote("unknownCmd", "Unknown method.")),
        };

        Ok(match response {
            Ok(result) => json!({
                "status": "success",
                "type": "response",
                "result": result,
            }),
            Err(RemoteError::Remote { error, message }) => json!({
                "status": "error",
                "type": "response",
                "error": error,
                "error_message": message,
            }),
            Err(other) => return Err(other),
        })
    }

    async fn close(&self) -> RemoteResult<()> {
        self.inner.lock().closed = true;
        Ok(())
    }
}

fn invalid_params(message: impl Into<String>) -> RemoteError {
    RemoteError::remote("invalidParams", message)
}

fn str_param<'a>(params: &'a Value, name: &str) -> RemoteResult<&'a str> {
    params
        .get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| invalid_params(format!("Missing field '{name}'.")))
}

fn account_not_found() -> RemoteError {
    RemoteError::remote("actNotFound", "Account not found.")
}

fn random_key(prefix: char, len: usize) -> String {
    format!("{prefix}{}", nanoid::nanoid!(len, &ADDRESS_ALPHABET))
}

impl Inner {
    fn ledger(&self, params: &Value) -> RemoteResult<&LedgerState> {
        match params.get("ledger_index").and_then(Value::as_str) {
            None | Some("current") => Ok(&self.open),
            Some("validated" | "closed") => Ok(&self.validated),
            Some(other) => Err(invalid_params(format!("Unknown ledger [{other}]."))),
        }
    }

    fn wallet_propose(&mut self, params: &Value) -> RemoteResult<Value> {
        let (account_id, master_seed) = match params.get("passphrase").and_then(Value::as_str) {
            Some(GENESIS_PASSPHRASE) => (GENESIS_ADDRESS.to_string(), GENESIS_PASSPHRASE.to_string()),
            Some(_) => {
                return Err(invalid_params(
                    "Only the genesis passphrase is known to this ledger.",
                ))
            }
            None => (random_key('r', 33), random_key('s', 28)),
        };
        self.secrets
            .insert(master_seed.clone(), account_id.clone());

        Ok(json!({
            "account_id": account_id,
            "master_seed": master_seed,
        }))
    }

    fn submit(&mut self, params: &Value) -> RemoteResult<Value> {
        let secret = str_param(params, "secret")?;
        let tx_json = params
            .get("tx_json")
            .ok_or_else(|| invalid_params("Missing field 'tx_json'."))?;
        let build_path = params
            .get("build_path")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let tx = Transaction::from_tx_json(tx_json, build_path)
            .map_err(|e| invalid_params(e.to_string()))?;

        if self.secrets.get(secret).map(String::as_str) != Some(tx.account()) {
            return Err(RemoteError::remote("badSecret", "Secret does not match account."));
        }

        let engine_result = self.open.apply(&tx);
        log::debug!(
            "in-memory {} from {} -> {engine_result}",
            tx.transaction_type(),
            tx.account()
        );

        Ok(json!({
            "engine_result": engine_result.as_str(),
            "engine_result_message": "",
            "tx_json": tx.to_tx_json(),
        }))
    }

    fn ledger_accept(&mut self) -> RemoteResult<Value> {
        self.validated = self.open.clone();
        self.ledger_index += 1;
        Ok(json!({ "ledger_current_index": self.ledger_index }))
    }

    fn account_info(&self, params: &Value) -> RemoteResult<Value> {
        let account = str_param(params, "account")?;
        let root = self
            .ledger(params)?
            .account(account)
            .ok_or_else(account_not_found)?;

        Ok(json!({
            "account_data": {
                "Account": account,
                "Balance": root.balance_drops.to_string(),
                "Flags": root.flags.bits(),
                "Sequence": root.sequence,
            },
        }))
    }

    fn account_lines(&self, params: &Value) -> RemoteResult<Value> {
        let account = str_param(params, "account")?;
        let peer = params.get("peer").and_then(Value::as_str);
        let ledger = self.ledger(params)?;
        if ledger.account(account).is_none() {
            return Err(account_not_found());
        }

        let lines = ledger
            .lines_of(account, peer)
            .into_iter()
            .map(|view| {
                json!({
                    "account": view.peer,
                    "balance": view.balance.to_string(),
                    "currency": view.currency,
                    "limit": view.own.limit.to_string(),
                    "limit_peer": view.peer_side.limit.to_string(),
                    "no_divvy": view.own.no_divvy,
                    "no_divvy_peer": view.peer_side.no_divvy,
                })
            })
            .collect::<Vec<_>>();

        Ok(json!({ "account": account, "lines": lines }))
    }

    fn ledger_entry(&self, params: &Value) -> RemoteResult<Value> {
        let state = params
            .get("divvy_state")
            .ok_or_else(|| invalid_params("Only divvy_state entries are supported."))?;
        let accounts = state
            .get("accounts")
            .and_then(Value::as_array)
            .and_then(|a| match a.as_slice() {
                [a, b] => Some((a.as_str()?, b.as_str()?)),
                _ => None,
            })
            .ok_or_else(|| invalid_params("divvy_state needs two accounts."))?;
        let currency = str_param(state, "currency")?;

        let (key, line) = self
            .ledger(params)?
            .line(accounts.0, accounts.1, currency)
            .ok_or_else(|| RemoteError::remote("entryNotFound", "Entry not found."))?;
        let LineKey { low, high, .. } = key;

        let mut flags = LineStateFlags::empty();
        flags.set(LineStateFlags::LOW_NO_DIVVY, line.low.no_divvy);
        flags.set(LineStateFlags::HIGH_NO_DIVVY, line.high.no_divvy);

        Ok(json!({
            "node": {
                "LedgerEntryType": "DivvyState",
                "Flags": flags.bits(),
                "Balance": Amount::issued(line.balance, currency, NO_ACCOUNT).to_json(),
                "LowLimit": Amount::issued(line.low.limit, currency, low.as_str()).to_json(),
                "HighLimit": Amount::issued(line.high.limit, currency, high.as_str()).to_json(),
            },
        }))
    }

    fn path_find(&self, params: &Value) -> RemoteResult<Value> {
        let source = str_param(params, "source_account")?;
        let destination = str_param(params, "destination_account")?;
        let amount = params
            .get("destination_amount")
            .ok_or_else(|| invalid_params("Missing field 'destination_amount'."))
            .and_then(|a| Amount::from_json(a).map_err(|e| invalid_params(e.to_string())))?;
        let Amount::Issued {
            value, currency, ..
        } = &amount
        else {
            // Native payments never need a path.
            return Ok(json!({ "alternatives": [] }));
        };

        let ledger = self.ledger(params)?;
        if ledger.account(source).is_none() {
            return Err(RemoteError::remote("srcActNotFound", "Source account not found."));
        }

        let wanted = params
            .get("source_currencies")
            .and_then(Value::as_array)
            .map(|list| {
                list.iter()
                    .filter_map(|c| c.get("currency").and_then(Value::as_str))
                    .any(|c| c == currency)
            })
            .unwrap_or(true);
        if !wanted {
            return Ok(json!({ "alternatives": [] }));
        }

        let paths = ledger.find_paths(source, destination, currency, *value);
        let alternatives = if paths.is_empty() {
            vec![]
        } else {
            let paths_computed = paths
                .iter()
                .filter(|path| path.len() > 2)
                .map(|path| {
                    path[1..path.len() - 1]
                        .iter()
                        .map(|account| json!({ "account": account, "currency": currency }))
                        .collect::<Vec<_>>()
                })
                .collect::<Vec<_>>();
            vec![json!({
                "source_amount": Amount::issued(*value, currency.as_str(), source).to_json(),
                "paths_computed": paths_computed,
            })]
        };

        Ok(json!({
            "source_account": source,
            "destination_account": destination,
            "alternatives": alternatives,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    async fn result(ledger: &InMemoryLedger, command: &str, params: Value) -> Value {
        let envelope = ledger.request(command, params).await.unwrap();
        assert_eq!(envelope["status"], "success", "{envelope}");
        envelope["result"].clone()
    }

    #[tokio::test]
    async fn genesis_account_is_funded() {
        let ledger = InMemoryLedger::new();
        let info = result(&ledger, "account_info", json!({ "account": GENESIS_ADDRESS })).await;
        assert_eq!(info["account_data"]["Flags"], 0);
        assert_eq!(
            info["account_data"]["Balance"],
            GENESIS_DROPS.to_string().as_str()
        );
    }

    #[tokio::test]
    async fn unknown_command_is_an_error_envelope() {
        let ledger = InMemoryLedger::new();
        let envelope = ledger.request("server_info", json!({})).await.unwrap();
        assert_eq!(envelope["status"], "error");
        assert_eq!(envelope["error"], "unknownCmd");
    }

    #[tokio::test]
    async fn validated_ledger_lags_until_accept() {
        let ledger = InMemoryLedger::new();
        let wallet = result(&ledger, "wallet_propose", json!({})).await;
        let address = wallet["account_id"].as_str().unwrap();

        let submitted = result(
            &ledger,
            "submit",
            json!({
                "secret": GENESIS_PASSPHRASE,
                "tx_json": Transaction::payment(GENESIS_ADDRESS, address, "100".parse().unwrap())
                    .to_tx_json(),
            }),
        )
        .await;
        assert_eq!(submitted["engine_result"], "tesSUCCESS");

        let validated = ledger
            .request(
                "account_info",
                json!({ "account": address, "ledger_index": "validated" }),
            )
            .await
            .unwrap();
        assert_eq!(validated["error"], "actNotFound");

        result(&ledger, "ledger_accept", json!({})).await;
        let validated = result(
            &ledger,
            "account_info",
            json!({ "account": address, "ledger_index": "validated" }),
        )
        .await;
        assert_eq!(validated["account_data"]["Balance"], "100000000");
    }

    #[tokio::test]
    async fn submit_with_wrong_secret_is_rejected() {
        let ledger = InMemoryLedger::new();
        let envelope = ledger
            .request(
                "submit",
                json!({
                    "secret": "snotTheRightOne",
                    "tx_json": Transaction::account_set(GENESIS_ADDRESS).to_tx_json(),
                }),
            )
            .await
            .unwrap();
        assert_eq!(envelope["error"], "badSecret");
    }

    #[tokio::test]
    async fn closed_ledger_refuses_requests() {
        let ledger = InMemoryLedger::new();
        ledger.close().await.unwrap();
        assert_eq!(
            ledger.request("ledger_accept", json!({})).await,
            Err(RemoteError::Closed)
        );
    }
}
