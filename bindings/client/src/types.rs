//! Typed views of the requests and responses exchanged with the server.
//!
//! The server speaks untyped JSON. Everything in here is decoded at the boundary so that scenario
//! code only ever compares enums, bitsets and plain records.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};

use crate::error::RemoteError;

pub const DROPS_PER_XDV: f64 = 1_000_000.0;

/// An amount of the native currency or of an issued currency.
#[derive(Debug, Clone, PartialEq)]
pub enum Amount {
    Native {
        drops: u64,
    },
    Issued {
        value: f64,
        currency: String,
        issuer: String,
    },
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AmountParseError {
    #[error("amount [{0}] is not a number")]
    InvalidValue(String),
    #[error("amount [{0}] must be `value` or `value/currency/issuer`")]
    InvalidFormat(String),
    #[error("native amount [{0}] must not be negative")]
    NegativeNative(String),
}

impl FromStr for Amount {
    type Err = AmountParseError;

    /// Parses `"10000.0"` as a native amount in XDV and `"100/USD/alice"` as an issued amount.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = s.split('/').collect::<Vec<_>>();
        let parse_value = |v: &str| {
            v.trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| AmountParseError::InvalidValue(s.to_string()))
        };

        match parts.as_slice() {
            [value] => {
                let value = parse_value(value)?;
                if value < 0.0 {
                    return Err(AmountParseError::NegativeNative(s.to_string()));
                }
                Ok(Amount::Native {
                    drops: (value * DROPS_PER_XDV).round() as u64,
                })
            }
            [value, currency, issuer] if !currency.is_empty() && !issuer.is_empty() => {
                Ok(Amount::Issued {
                    value: parse_value(value)?,
                    currency: currency.to_string(),
                    issuer: issuer.to_string(),
                })
            }
            _ => Err(AmountParseError::InvalidFormat(s.to_string())),
        }
    }
}

impl Amount {
    pub fn issued(value: f64, currency: impl Into<String>, issuer: impl Into<String>) -> Self {
        Amount::Issued {
            value,
            currency: currency.into(),
            issuer: issuer.into(),
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self, Amount::Native { .. })
    }

    pub fn currency(&self) -> &str {
        match self {
            Amount::Native { .. } => "XDV",
            Amount::Issued { currency, .. } => currency,
        }
    }

    pub fn issuer(&self) -> Option<&str> {
        match self {
            Amount::Native { .. } => None,
            Amount::Issued { issuer, .. } => Some(issuer),
        }
    }

    /// Replace the issuer of an issued amount. Native amounts are returned unchanged.
    pub fn with_issuer(self, new_issuer: impl Into<String>) -> Self {
        match self {
            Amount::Issued {
                value, currency, ..
            } => Amount::Issued {
                value,
                currency,
                issuer: new_issuer.into(),
            },
            native => native,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Amount::Native { drops } => Value::String(drops.to_string()),
            Amount::Issued {
                value,
                currency,
                issuer,
            } => json!({
                "currency": currency,
                "issuer": issuer,
                "value": value.to_string(),
            }),
        }
    }

    pub fn from_json(value: &Value) -> Result<Self, RemoteError> {
        match value {
            Value::String(drops) => drops
                .parse::<u64>()
                .map(|drops| Amount::Native { drops })
                .map_err(|_| RemoteError::Decode(format!("invalid native amount [{drops}]"))),
            Value::Object(fields) => {
                let field = |name: &str| {
                    fields
                        .get(name)
                        .and_then(Value::as_str)
                        .ok_or_else(|| RemoteError::Decode(format!("amount is missing [{name}]")))
                };
                let value = field("value")?;
                Ok(Amount::Issued {
                    value: value
                        .parse()
                        .map_err(|_| RemoteError::Decode(format!("invalid amount [{value}]")))?,
                    currency: field("currency")?.to_string(),
                    issuer: field("issuer")?.to_string(),
                })
            }
            other => Err(RemoteError::Decode(format!("invalid amount {other}"))),
        }
    }
}

/// `Flags` values understood by an AccountSet transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountSetTxFlag {
    RequireDestTag,
    OptionalDestTag,
    RequireAuth,
    OptionalAuth,
    DisallowXdv,
    AllowXdv,
}

impl AccountSetTxFlag {
    pub const fn bits(self) -> u32 {
        match self {
            AccountSetTxFlag::RequireDestTag => 0x0001_0000,
            AccountSetTxFlag::OptionalDestTag => 0x0002_0000,
            AccountSetTxFlag::RequireAuth => 0x0004_0000,
            AccountSetTxFlag::OptionalAuth => 0x0008_0000,
            AccountSetTxFlag::DisallowXdv => 0x0010_0000,
            AccountSetTxFlag::AllowXdv => 0x0020_0000,
        }
    }
}

/// `Flags` values understood by a TrustSet transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustSetTxFlag {
    SetNoDivvy,
    ClearNoDivvy,
}

impl TrustSetTxFlag {
    pub const fn bits(self) -> u32 {
        match self {
            TrustSetTxFlag::SetNoDivvy => 0x0002_0000,
            TrustSetTxFlag::ClearNoDivvy => 0x0004_0000,
        }
    }
}

/// Account flags set or cleared through the `SetFlag` / `ClearFlag` fields of an AccountSet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountFlag {
    RequireDest,
    RequireAuth,
    DisallowXdv,
    DefaultDivvy,
}

impl AccountFlag {
    pub const fn value(self) -> u32 {
        match self {
            AccountFlag::RequireDest => 1,
            AccountFlag::RequireAuth => 2,
            AccountFlag::DisallowXdv => 3,
            AccountFlag::DefaultDivvy => 8,
        }
    }

    pub fn from_value(value: u32) -> Option<Self> {
        match value {
            1 => Some(AccountFlag::RequireDest),
            2 => Some(AccountFlag::RequireAuth),
            3 => Some(AccountFlag::DisallowXdv),
            8 => Some(AccountFlag::DefaultDivvy),
            _ => None,
        }
    }

    /// The ledger flag this setting controls.
    pub const fn ledger_flag(self) -> AccountRootFlags {
        match self {
            AccountFlag::RequireDest => AccountRootFlags::REQUIRE_DEST_TAG,
            AccountFlag::RequireAuth => AccountRootFlags::REQUIRE_AUTH,
            AccountFlag::DisallowXdv => AccountRootFlags::DISALLOW_XDV,
            AccountFlag::DefaultDivvy => AccountRootFlags::DEFAULT_DIVVY,
        }
    }
}

bitflags::bitflags! {
    /// The `Flags` field of an account root ledger entry.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct AccountRootFlags: u32 {
        const REQUIRE_DEST_TAG = 0x0002_0000;
        const REQUIRE_AUTH = 0x0004_0000;
        const DISALLOW_XDV = 0x0008_0000;
        const DEFAULT_DIVVY = 0x0080_0000;
    }
}

/// A transaction, with accounts already resolved to addresses.
#[derive(Debug, Clone, PartialEq)]
pub enum Transaction {
    AccountSet {
        account: String,
        flags: u32,
        set_flag: Option<AccountFlag>,
        clear_flag: Option<AccountFlag>,
    },
    TrustSet {
        account: String,
        limit: Amount,
        flags: u32,
    },
    Payment {
        account: String,
        destination: String,
        amount: Amount,
        build_path: bool,
    },
}

impl Transaction {
    pub fn account_set(account: impl Into<String>) -> Self {
        Transaction::AccountSet {
            account: account.into(),
            flags: 0,
            set_flag: None,
            clear_flag: None,
        }
    }

    pub fn trust_set(account: impl Into<String>, limit: Amount) -> Self {
        Transaction::TrustSet {
            account: account.into(),
            limit,
            flags: 0,
        }
    }

    pub fn payment(
        account: impl Into<String>,
        destination: impl Into<String>,
        amount: Amount,
    ) -> Self {
        Transaction::Payment {
            account: account.into(),
            destination: destination.into(),
            amount,
            build_path: false,
        }
    }

    pub fn account(&self) -> &str {
        match self {
            Transaction::AccountSet { account, .. }
            | Transaction::TrustSet { account, .. }
            | Transaction::Payment { account, .. } => account,
        }
    }

    pub fn transaction_type(&self) -> &'static str {
        match self {
            Transaction::AccountSet { .. } => "AccountSet",
            Transaction::TrustSet { .. } => "TrustSet",
            Transaction::Payment { .. } => "Payment",
        }
    }

    /// Add an AccountSet flag. Ignored for other transaction types.
    pub fn with_account_set_flag(mut self, flag: AccountSetTxFlag) -> Self {
        if let Transaction::AccountSet { flags, .. } = &mut self {
            *flags |= flag.bits();
        }
        self
    }

    /// Add a TrustSet flag. Ignored for other transaction types.
    pub fn with_trust_set_flag(mut self, flag: TrustSetTxFlag) -> Self {
        if let Transaction::TrustSet { flags, .. } = &mut self {
            *flags |= flag.bits();
        }
        self
    }

    pub fn with_set_flag(mut self, flag: AccountFlag) -> Self {
        if let Transaction::AccountSet { set_flag, .. } = &mut self {
            *set_flag = Some(flag);
        }
        self
    }

    pub fn with_clear_flag(mut self, flag: AccountFlag) -> Self {
        if let Transaction::AccountSet { clear_flag, .. } = &mut self {
            *clear_flag = Some(flag);
        }
        self
    }

    /// Ask the server to find a path for a payment. Ignored for other transaction types.
    pub fn with_build_path(mut self, enabled: bool) -> Self {
        if let Transaction::Payment { build_path, .. } = &mut self {
            *build_path = enabled;
        }
        self
    }

    pub fn build_path(&self) -> bool {
        matches!(self, Transaction::Payment { build_path: true, .. })
    }

    pub fn to_tx_json(&self) -> Value {
        match self {
            Transaction::AccountSet {
                account,
                flags,
                set_flag,
                clear_flag,
            } => {
                let mut tx = json!({
                    "TransactionType": "AccountSet",
                    "Account": account,
                    "Flags": flags,
                });
                if let Some(flag) = set_flag {
                    tx["SetFlag"] = json!(flag.value());
                }
                if let Some(flag) = clear_flag {
                    tx["ClearFlag"] = json!(flag.value());
                }
                tx
            }
            Transaction::TrustSet {
                account,
                limit,
                flags,
            } => json!({
                "TransactionType": "TrustSet",
                "Account": account,
                "LimitAmount": limit.to_json(),
                "Flags": flags,
            }),
            Transaction::Payment {
                account,
                destination,
                amount,
                ..
            } => json!({
                "TransactionType": "Payment",
                "Account": account,
                "Destination": destination,
                "Amount": amount.to_json(),
            }),
        }
    }

    /// Decode a `tx_json` object. `build_path` is not part of the transaction itself and comes
    /// from the enclosing submit request.
    pub fn from_tx_json(tx: &Value, build_path: bool) -> Result<Self, RemoteError> {
        let string_field = |name: &str| {
            tx.get(name)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| RemoteError::Decode(format!("transaction is missing [{name}]")))
        };
        let flags = tx.get("Flags").and_then(Value::as_u64).unwrap_or(0) as u32;
        let account_flag = |name: &str| -> Result<Option<AccountFlag>, RemoteError> {
            match tx.get(name).and_then(Value::as_u64) {
                None => Ok(None),
                Some(value) => AccountFlag::from_value(value as u32)
                    .map(Some)
                    .ok_or_else(|| RemoteError::Decode(format!("unknown {name} [{value}]"))),
            }
        };
        let amount_field = |name: &str| {
            tx.get(name)
                .ok_or_else(|| RemoteError::Decode(format!("transaction is missing [{name}]")))
                .and_then(Amount::from_json)
        };

        match string_field("TransactionType")?.as_str() {
            "AccountSet" => Ok(Transaction::AccountSet {
                account: string_field("Account")?,
                flags,
                set_flag: account_flag("SetFlag")?,
                clear_flag: account_flag("ClearFlag")?,
            }),
            "TrustSet" => Ok(Transaction::TrustSet {
                account: string_field("Account")?,
                limit: amount_field("LimitAmount")?,
                flags,
            }),
            "Payment" => Ok(Transaction::Payment {
                account: string_field("Account")?,
                destination: string_field("Destination")?,
                amount: amount_field("Amount")?,
                build_path,
            }),
            other => Err(RemoteError::Decode(format!(
                "unsupported transaction type [{other}]"
            ))),
        }
    }
}

/// The tentative result of applying a transaction, as reported when it is submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineResult {
    TesSuccess,
    TecPathDry,
    TecNoDst,
    TecNoLineRedundant,
    TecUnfundedPayment,
    TecOwners,
    TemDstIsSrc,
    TemBadAmount,
    TemBadLimit,
    TemInvalidFlag,
    Other(String),
}

impl EngineResult {
    pub fn as_str(&self) -> &str {
        match self {
            EngineResult::TesSuccess => "tesSUCCESS",
            EngineResult::TecPathDry => "tecPATH_DRY",
            EngineResult::TecNoDst => "tecNO_DST",
            EngineResult::TecNoLineRedundant => "tecNO_LINE_REDUNDANT",
            EngineResult::TecUnfundedPayment => "tecUNFUNDED_PAYMENT",
            EngineResult::TecOwners => "tecOWNERS",
            EngineResult::TemDstIsSrc => "temDST_IS_SRC",
            EngineResult::TemBadAmount => "temBAD_AMOUNT",
            EngineResult::TemBadLimit => "temBAD_LIMIT",
            EngineResult::TemInvalidFlag => "temINVALID_FLAG",
            EngineResult::Other(code) => code,
        }
    }

    pub fn is_success(&self) -> bool {
        *self == EngineResult::TesSuccess
    }
}

impl From<&str> for EngineResult {
    fn from(code: &str) -> Self {
        match code {
            "tesSUCCESS" => EngineResult::TesSuccess,
            "tecPATH_DRY" => EngineResult::TecPathDry,
            "tecNO_DST" => EngineResult::TecNoDst,
            "tecNO_LINE_REDUNDANT" => EngineResult::TecNoLineRedundant,
            "tecUNFUNDED_PAYMENT" => EngineResult::TecUnfundedPayment,
            "tecOWNERS" => EngineResult::TecOwners,
            "temDST_IS_SRC" => EngineResult::TemDstIsSrc,
            "temBAD_AMOUNT" => EngineResult::TemBadAmount,
            "temBAD_LIMIT" => EngineResult::TemBadLimit,
            "temINVALID_FLAG" => EngineResult::TemInvalidFlag,
            other => EngineResult::Other(other.to_string()),
        }
    }
}

impl fmt::Display for EngineResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EngineResult {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = String::deserialize(deserializer)?;
        Ok(EngineResult::from(code.as_str()))
    }
}

/// The "submitted" event of a transaction.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitResult {
    pub engine_result: EngineResult,
    #[serde(default)]
    pub engine_result_message: String,
}

/// A trust line as seen from the account that was queried.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TrustLine {
    /// The account on the other side of the line.
    pub account: String,
    #[serde(deserialize_with = "de_value_string")]
    pub balance: f64,
    pub currency: String,
    #[serde(deserialize_with = "de_value_string")]
    pub limit: f64,
    #[serde(deserialize_with = "de_value_string")]
    pub limit_peer: f64,
    /// NoDivvy is set on the queried account's side of the line.
    #[serde(default)]
    pub no_divvy: bool,
    /// NoDivvy is set on the other account's side of the line.
    #[serde(default)]
    pub no_divvy_peer: bool,
}

bitflags::bitflags! {
    /// The `Flags` field of a line state entry. The low and high sides are the two accounts of
    /// the line ordered by address.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct LineStateFlags: u32 {
        const LOW_NO_DIVVY = 0x0010_0000;
        const HIGH_NO_DIVVY = 0x0020_0000;
    }
}

/// The raw line state entry between two accounts.
#[derive(Debug, Clone, PartialEq)]
pub struct DivvyStateEntry {
    pub flags: LineStateFlags,
    /// Balance from the point of view of the low account.
    pub balance: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PathStep {
    #[serde(default)]
    pub account: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PathAlternative {
    #[serde(default)]
    pub paths_computed: Vec<Vec<PathStep>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PathFindResult {
    #[serde(default)]
    pub alternatives: Vec<PathAlternative>,
}

/// Keys for a new account, as produced by `wallet_propose`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Wallet {
    pub account_id: String,
    pub master_seed: String,
}

/// Which version of the ledger a query reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LedgerSelector {
    /// The open ledger, including transactions that are not finalised yet.
    #[default]
    Current,
    /// The most recently closed ledger.
    Closed,
    /// The most recently validated ledger.
    Validated,
}

impl LedgerSelector {
    pub fn as_str(self) -> &'static str {
        match self {
            LedgerSelector::Current => "current",
            LedgerSelector::Closed => "closed",
            LedgerSelector::Validated => "validated",
        }
    }
}

impl fmt::Display for LedgerSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn de_value_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let raw = String::deserialize(deserializer)?;
    raw.parse().map_err(serde::de::Error::custom)
}
