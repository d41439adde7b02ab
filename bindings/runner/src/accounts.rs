use std::collections::BTreeMap;

use anyhow::{bail, Context};
use divvyd_client_instrumented::prelude::{Amount, Wallet};

/// Name of the funded account every ledger starts with.
pub const ROOT_ACCOUNT: &str = "root";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountKeys {
    pub address: String,
    pub secret: String,
}

impl From<Wallet> for AccountKeys {
    fn from(wallet: Wallet) -> Self {
        Self {
            address: wallet.account_id,
            secret: wallet.master_seed,
        }
    }
}

/// Maps the names scenarios use for accounts, like `alice`, to their keys.
///
/// Anything that is not a known name is treated as an address, so steps can mix the two.
#[derive(Debug, Default, Clone)]
pub struct AccountBook {
    accounts: BTreeMap<String, AccountKeys>,
}

impl AccountBook {
    pub fn insert(&mut self, name: impl Into<String>, keys: impl Into<AccountKeys>) {
        self.accounts.insert(name.into(), keys.into());
    }

    pub fn get(&self, name: &str) -> Option<&AccountKeys> {
        self.accounts.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.accounts.keys().map(String::as_str)
    }

    /// The address for `name_or_address`.
    pub fn address(&self, name_or_address: &str) -> anyhow::Result<String> {
        if let Some(keys) = self.accounts.get(name_or_address) {
            return Ok(keys.address.clone());
        }
        if looks_like_address(name_or_address) {
            return Ok(name_or_address.to_string());
        }
        bail!("Unknown account [{name_or_address}], create it with 'create_accounts' first")
    }

    /// The secret of the account with this address.
    pub fn secret_for_address(&self, address: &str) -> anyhow::Result<&str> {
        self.accounts
            .values()
            .find(|keys| keys.address == address)
            .map(|keys| keys.secret.as_str())
            .with_context(|| format!("No secret known for account [{address}]"))
    }

    /// Parse an amount such as `"100/USD/alice"`, replacing an issuer name with its address.
    pub fn amount(&self, amount: &str) -> anyhow::Result<Amount> {
        let parsed = amount
            .parse::<Amount>()
            .with_context(|| format!("Invalid amount [{amount}]"))?;
        match parsed.issuer() {
            Some(issuer) => {
                let address = self.address(issuer)?;
                Ok(parsed.with_issuer(address))
            }
            None => Ok(parsed),
        }
    }
}

fn looks_like_address(value: &str) -> bool {
    value.starts_with('r') && (25..=35).contains(&value.len())
}
