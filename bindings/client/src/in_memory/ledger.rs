//! Account and trust line state of the in-memory ledger, and the rules for applying transactions
//! to it.
//!
//! This is a test fixture, not a ledger. It only knows the handful of rules the scenarios observe:
//! account flags, RequireAuth refused while lines are owned, NoDivvy and DefaultDivvy on lines, and
//! payments that ripple through at most one account. Anything else is accepted without checks.

use std::collections::BTreeMap;

use crate::types::{
    AccountFlag, AccountRootFlags, AccountSetTxFlag, Amount, EngineResult, TrustSetTxFlag,
    Transaction,
};

#[derive(Debug, Clone, Default)]
pub(super) struct AccountRoot {
    pub balance_drops: u64,
    pub flags: AccountRootFlags,
    pub sequence: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub(super) struct LineKey {
    pub low: String,
    pub high: String,
    pub currency: String,
}

impl LineKey {
    pub fn new(a: &str, b: &str, currency: &str) -> Self {
        let (low, high) = if a < b { (a, b) } else { (b, a) };
        Self {
            low: low.to_string(),
            high: high.to_string(),
            currency: currency.to_string(),
        }
    }
}

/// One side of a trust line.
#[derive(Debug, Clone, Default, PartialEq)]
pub(super) struct LineSide {
    /// How much of the other account's IOUs this side accepts.
    pub limit: f64,
    pub no_divvy: bool,
}

#[derive(Debug, Clone, Default)]
pub(super) struct LineState {
    /// Positive when the high account owes the low account.
    pub balance: f64,
    pub low: LineSide,
    pub high: LineSide,
}

/// A trust line as seen from one of its two accounts.
#[derive(Debug, Clone, PartialEq)]
pub(super) struct LineView {
    pub peer: String,
    pub currency: String,
    /// Positive when the peer owes the viewing account.
    pub balance: f64,
    pub own: LineSide,
    pub peer_side: LineSide,
}

impl LineState {
    fn side(&self, key: &LineKey, account: &str) -> &LineSide {
        if key.low == account {
            &self.low
        } else {
            &self.high
        }
    }

    fn side_mut(&mut self, key: &LineKey, account: &str) -> &mut LineSide {
        if key.low == account {
            &mut self.low
        } else {
            &mut self.high
        }
    }

    fn balance_for(&self, key: &LineKey, account: &str) -> f64 {
        if key.low == account {
            self.balance
        } else {
            -self.balance
        }
    }

    /// Move `amount` of value from `from` to `to`: `to` now holds `amount` more of `from`'s IOUs.
    fn transfer(&mut self, key: &LineKey, from: &str, amount: f64) {
        if key.low == from {
            self.balance -= amount;
        } else {
            self.balance += amount;
        }
    }
}

/// A complete copy of the ledger state. The open and the validated ledger are each one of these.
#[derive(Debug, Clone, Default)]
pub(super) struct LedgerState {
    pub accounts: BTreeMap<String, AccountRoot>,
    pub lines: BTreeMap<LineKey, LineState>,
}

impl LedgerState {
    pub fn genesis(root: &str, drops: u64) -> Self {
        let mut state = Self::default();
        state.accounts.insert(
            root.to_string(),
            AccountRoot {
                balance_drops: drops,
                flags: AccountRootFlags::empty(),
                sequence: 1,
            },
        );
        state
    }

    pub fn account(&self, address: &str) -> Option<&AccountRoot> {
        self.accounts.get(address)
    }

    pub fn line(&self, a: &str, b: &str, currency: &str) -> Option<(&LineKey, &LineState)> {
        self.lines.get_key_value(&LineKey::new(a, b, currency))
    }

    /// Every line of `account`, optionally only those shared with `peer`.
    pub fn lines_of(&self, account: &str, peer: Option<&str>) -> Vec<LineView> {
        self.lines
            .iter()
            .filter(|(key, _)| key.low == account || key.high == account)
            .filter_map(|(key, line)| {
                let other = if key.low == account {
                    &key.high
                } else {
                    &key.low
                };
                if peer.is_some_and(|p| p != other) {
                    return None;
                }
                Some(LineView {
                    peer: other.clone(),
                    currency: key.currency.clone(),
                    balance: line.balance_for(key, account),
                    own: line.side(key, account).clone(),
                    peer_side: line.side(key, other).clone(),
                })
            })
            .collect()
    }

    /// Lines the account is responsible for keeping in the ledger.
    fn owner_count(&self, account: &str) -> usize {
        self.lines_of(account, None)
            .iter()
            .filter(|view| view.own.limit != 0.0 || view.own.no_divvy)
            .count()
    }

    pub fn apply(&mut self, tx: &Transaction) -> EngineResult {
        if !self.accounts.contains_key(tx.account()) {
            return EngineResult::Other("terNO_ACCOUNT".to_string());
        }
        let result = match tx {
            Transaction::AccountSet {
                account,
                flags,
                set_flag,
                clear_flag,
            } => self.apply_account_set(account, *flags, *set_flag, *clear_flag),
            Transaction::TrustSet {
                account,
                limit,
                flags,
            } => self.apply_trust_set(account, limit, *flags),
            Transaction::Payment {
                account,
                destination,
                amount,
                build_path,
            } => self.apply_payment(account, destination, amount, *build_path),
        };

        // Claimed results still consume a sequence number.
        if result.is_success() || result.as_str().starts_with("tec") {
            if let Some(account) = self.accounts.get_mut(tx.account()) {
                account.sequence += 1;
            }
        }
        result
    }

    fn apply_account_set(
        &mut self,
        account: &str,
        flags: u32,
        set_flag: Option<AccountFlag>,
        clear_flag: Option<AccountFlag>,
    ) -> EngineResult {
        let has = |flag: AccountSetTxFlag| flags & flag.bits() != 0;

        let mut to_set = AccountRootFlags::empty();
        let mut to_clear = AccountRootFlags::empty();
        let pairs = [
            (
                AccountSetTxFlag::RequireDestTag,
                AccountSetTxFlag::OptionalDestTag,
                AccountRootFlags::REQUIRE_DEST_TAG,
            ),
            (
                AccountSetTxFlag::RequireAuth,
                AccountSetTxFlag::OptionalAuth,
                AccountRootFlags::REQUIRE_AUTH,
            ),
            (
                AccountSetTxFlag::DisallowXdv,
                AccountSetTxFlag::AllowXdv,
                AccountRootFlags::DISALLOW_XDV,
            ),
        ];
        for (set, clear, ledger_flag) in pairs {
            if has(set) {
                to_set.insert(ledger_flag);
            }
            if has(clear) {
                to_clear.insert(ledger_flag);
            }
        }
        if let Some(flag) = set_flag {
            to_set.insert(flag.ledger_flag());
        }
        if let Some(flag) = clear_flag {
            to_clear.insert(flag.ledger_flag());
        }

        if to_set.contains(AccountRootFlags::REQUIRE_AUTH) && self.owner_count(account) > 0 {
            return EngineResult::TecOwners;
        }

        let Some(root) = self.accounts.get_mut(account) else {
            return EngineResult::Other("terNO_ACCOUNT".to_string());
        };
        root.flags.insert(to_set);
        root.flags.remove(to_clear);
        EngineResult::TesSuccess
    }

    fn apply_trust_set(&mut self, account: &str, limit: &Amount, flags: u32) -> EngineResult {
        let Amount::Issued {
            value,
            currency,
            issuer,
        } = limit
        else {
            return EngineResult::TemBadLimit;
        };
        let Some(peer) = self.accounts.get(issuer) else {
            return EngineResult::TecNoDst;
        };
        let peer_default_divvy = peer.flags.contains(AccountRootFlags::DEFAULT_DIVVY);

        let set_no_divvy = flags & TrustSetTxFlag::SetNoDivvy.bits() != 0;
        let clear_no_divvy = flags & TrustSetTxFlag::ClearNoDivvy.bits() != 0;

        let key = LineKey::new(account, issuer, currency);
        match self.lines.get_mut(&key) {
            Some(line) => {
                let balance = line.balance_for(&key, account);
                let side = line.side_mut(&key, account);
                side.limit = *value;
                // NoDivvy can only be set while the setter is not in debt on the line.
                if set_no_divvy && balance >= 0.0 {
                    side.no_divvy = true;
                } else if clear_no_divvy {
                    side.no_divvy = false;
                }
                EngineResult::TesSuccess
            }
            None => {
                let mut line = LineState::default();
                *line.side_mut(&key, account) = LineSide {
                    limit: *value,
                    no_divvy: set_no_divvy,
                };
                *line.side_mut(&key, issuer) = LineSide {
                    limit: 0.0,
                    no_divvy: !peer_default_divvy,
                };
                self.lines.insert(key, line);
                EngineResult::TesSuccess
            }
        }
    }

    fn apply_payment(
        &mut self,
        source: &str,
        destination: &str,
        amount: &Amount,
        build_path: bool,
    ) -> EngineResult {
        match amount {
            Amount::Native { drops } => self.pay_native(source, destination, *drops),
            Amount::Issued {
                value, currency, ..
            } => {
                let path = self
                    .find_paths(source, destination, currency, *value)
                    .into_iter()
                    .find(|path| build_path || path.len() == 2);
                match path {
                    Some(path) => {
                        for hop in path.windows(2) {
                            let key = LineKey::new(&hop[0], &hop[1], currency);
                            if let Some(line) = self.lines.get_mut(&key) {
                                line.transfer(&key, &hop[0], *value);
                            }
                        }
                        EngineResult::TesSuccess
                    }
                    None => EngineResult::TecPathDry,
                }
            }
        }
    }

    fn pay_native(&mut self, source: &str, destination: &str, drops: u64) -> EngineResult {
        if drops == 0 {
            return EngineResult::TemBadAmount;
        }
        match self.accounts.get_mut(source) {
            Some(from) if from.balance_drops >= drops => from.balance_drops -= drops,
            Some(_) => return EngineResult::TecUnfundedPayment,
            None => return EngineResult::Other("terNO_ACCOUNT".to_string()),
        }
        let to = self
            .accounts
            .entry(destination.to_string())
            .or_insert_with(|| AccountRoot {
                sequence: 1,
                ..Default::default()
            });
        to.balance_drops += drops;
        EngineResult::TesSuccess
    }

    /// How much more of `from`'s IOUs `to` accepts on their shared line.
    fn capacity(&self, from: &str, to: &str, currency: &str) -> f64 {
        match self.line(from, to, currency) {
            Some((key, line)) => line.side(key, to).limit - line.balance_for(key, to),
            None => 0.0,
        }
    }

    /// An account in the middle of a path lets value through unless it has NoDivvy set on both
    /// adjoining lines.
    fn can_ripple(&self, previous: &str, through: &str, next: &str, currency: &str) -> bool {
        let no_divvy_towards = |other: &str| {
            self.line(through, other, currency)
                .is_some_and(|(key, line)| line.side(key, through).no_divvy)
        };
        !(no_divvy_towards(previous) && no_divvy_towards(next))
    }

    /// Routes of trust lines from `source` to `destination` that can carry `value`: the direct
    /// line first, then every route through one other account.
    pub fn find_paths(
        &self,
        source: &str,
        destination: &str,
        currency: &str,
        value: f64,
    ) -> Vec<Vec<String>> {
        let mut found = Vec::new();
        if self.capacity(source, destination, currency) >= value {
            found.push(vec![source.to_string(), destination.to_string()]);
        }
        for view in self.lines_of(source, None) {
            let through = view.peer;
            if view.currency != currency || through == destination {
                continue;
            }
            if self.capacity(source, &through, currency) >= value
                && self.capacity(&through, destination, currency) >= value
                && self.can_ripple(source, &through, destination, currency)
            {
                found.push(vec![source.to_string(), through, destination.to_string()]);
            }
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROOT: &str = "rRoot";

    fn ledger_with(accounts: &[&str]) -> LedgerState {
        let mut ledger = LedgerState::genesis(ROOT, 1_000_000_000);
        for account in accounts {
            ledger.accounts.insert(
                account.to_string(),
                AccountRoot {
                    balance_drops: 1_000,
                    flags: AccountRootFlags::DEFAULT_DIVVY,
                    sequence: 1,
                },
            );
        }
        ledger
    }

    fn trust(ledger: &mut LedgerState, account: &str, limit: &str, flags: u32) -> EngineResult {
        let limit = limit.parse().unwrap();
        ledger.apply(&Transaction::TrustSet {
            account: account.to_string(),
            limit,
            flags,
        })
    }

    fn pay(ledger: &mut LedgerState, from: &str, to: &str, amount: &str) -> EngineResult {
        ledger.apply(
            &Transaction::payment(from, to, amount.parse().unwrap()).with_build_path(true),
        )
    }

    #[test]
    fn trust_in_unknown_account_fails() {
        let mut ledger = ledger_with(&[]);
        assert_eq!(
            trust(&mut ledger, ROOT, "10/USD/nobody", 0),
            EngineResult::TecNoDst
        );
        assert!(ledger.lines.is_empty());
    }

    #[test]
    fn payment_ripples_through_intermediate() {
        let mut ledger = ledger_with(&["alice", "bob", "carol"]);
        trust(&mut ledger, "bob", "100/USD/alice", 0);
        trust(&mut ledger, "carol", "100/USD/bob", 0);

        assert_eq!(
            pay(&mut ledger, "alice", "carol", "50/USD/carol"),
            EngineResult::TesSuccess
        );
        assert_eq!(ledger.lines_of("alice", None)[0].balance, -50.0);
        assert_eq!(ledger.lines_of("carol", None)[0].balance, 50.0);
    }

    #[test]
    fn no_divvy_on_one_side_of_intermediate_still_ripples() {
        let mut ledger = ledger_with(&["alice", "bob", "carol"]);
        trust(&mut ledger, "bob", "100/USD/alice", 0);
        trust(&mut ledger, "carol", "100/USD/bob", 0);
        trust(&mut ledger, "bob", "100/USD/alice", TrustSetTxFlag::SetNoDivvy.bits());

        assert_eq!(ledger.find_paths("alice", "carol", "USD", 1.0).len(), 1);
    }

    #[test]
    fn no_divvy_on_both_sides_blocks_rippling() {
        let mut ledger = ledger_with(&["alice", "bob", "carol"]);
        trust(&mut ledger, "bob", "100/USD/alice", 0);
        trust(&mut ledger, "carol", "100/USD/bob", 0);
        trust(&mut ledger, "bob", "100/USD/alice", TrustSetTxFlag::SetNoDivvy.bits());
        trust(&mut ledger, "bob", "100/USD/carol", TrustSetTxFlag::SetNoDivvy.bits());

        assert!(ledger.find_paths("alice", "carol", "USD", 1.0).is_empty());
        assert_eq!(
            pay(&mut ledger, "alice", "carol", "1/USD/carol"),
            EngineResult::TecPathDry
        );
    }

    #[test]
    fn no_divvy_is_not_set_while_in_debt() {
        let mut ledger = ledger_with(&["alice", "bob", "carol"]);
        trust(&mut ledger, "bob", "100/USD/alice", 0);
        trust(&mut ledger, "carol", "100/USD/bob", 0);
        pay(&mut ledger, "alice", "carol", "50/USD/carol");

        assert_eq!(
            trust(&mut ledger, "alice", "100/USD/bob", TrustSetTxFlag::SetNoDivvy.bits()),
            EngineResult::TesSuccess
        );
        let line = &ledger.lines_of("alice", None)[0];
        assert!(!line.own.no_divvy);
        assert_eq!(line.own.limit, 100.0);
    }

    #[test]
    fn new_line_peer_side_follows_default_divvy() {
        let mut ledger = ledger_with(&["bob"]);
        ledger.accounts.insert("alice".to_string(), AccountRoot::default());
        trust(&mut ledger, ROOT, "100/USD/alice", 0);
        trust(&mut ledger, ROOT, "100/USD/bob", 0);

        let alice = &ledger.lines_of(ROOT, Some("alice"))[0];
        assert!(!alice.own.no_divvy);
        assert!(alice.peer_side.no_divvy);
        let bob = &ledger.lines_of(ROOT, Some("bob"))[0];
        assert!(!bob.peer_side.no_divvy);
    }

    #[test]
    fn require_auth_with_owned_lines_fails() {
        let mut ledger = ledger_with(&["alice"]);
        trust(&mut ledger, ROOT, "100/USD/alice", 0);

        let tx = Transaction::account_set(ROOT)
            .with_account_set_flag(AccountSetTxFlag::RequireAuth);
        assert_eq!(ledger.apply(&tx), EngineResult::TecOwners);

        let tx = Transaction::account_set("alice")
            .with_account_set_flag(AccountSetTxFlag::RequireAuth);
        assert_eq!(ledger.apply(&tx), EngineResult::TesSuccess);
    }

    #[test]
    fn payment_without_build_path_needs_a_direct_line() {
        let mut ledger = ledger_with(&["alice", "bob", "carol"]);
        trust(&mut ledger, "bob", "100/USD/alice", 0);
        trust(&mut ledger, "carol", "100/USD/bob", 0);

        let tx = Transaction::payment("alice", "carol", "1/USD/carol".parse().unwrap());
        assert_eq!(ledger.apply(&tx), EngineResult::TecPathDry);
        let tx = Transaction::payment("alice", "bob", "1/USD/alice".parse().unwrap());
        assert_eq!(ledger.apply(&tx), EngineResult::TesSuccess);
    }

    #[test]
    fn native_payment_creates_destination() {
        let mut ledger = ledger_with(&[]);
        assert_eq!(
            pay(&mut ledger, ROOT, "rNew", "0.5"),
            EngineResult::TesSuccess
        );
        assert_eq!(ledger.account("rNew").unwrap().balance_drops, 500_000);
        assert_eq!(
            pay(&mut ledger, "rNew", ROOT, "1"),
            EngineResult::TecUnfundedPayment
        );
    }
}
