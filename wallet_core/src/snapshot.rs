//! The locally mirrored view of one account's ledger state.

use stakeflow_types::{Account, FaucetState, Field, FieldSet, StakePosition, Timestamp, TokenAmount};

/// A freshly read value for one snapshot field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldValue {
    WalletBalance(TokenAmount),
    StakePosition(StakePosition),
    PendingRewards(TokenAmount),
    Allowance(TokenAmount),
    Faucet(FaucetState),
}

impl FieldValue {
    pub fn field(&self) -> Field {
        match self {
            Self::WalletBalance(_) => Field::WalletBalance,
            Self::StakePosition(_) => Field::StakePosition,
            Self::PendingRewards(_) => Field::PendingRewards,
            Self::Allowance(_) => Field::Allowance,
            Self::Faucet(_) => Field::Faucet,
        }
    }
}

/// Read-only mirror of the ledger for a subscribed account.
///
/// A field is `None` until its first successful read. Once known, a field is
/// only ever replaced by a newer read; failed reads leave it untouched.
/// `as_of` advances strictly with every published change.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snapshot {
    account: Account,
    wallet_balance: Option<TokenAmount>,
    stake_position: Option<StakePosition>,
    pending_rewards: Option<TokenAmount>,
    allowance: Option<TokenAmount>,
    faucet: Option<FaucetState>,
    as_of_millis: u64,
}

impl Snapshot {
    pub(crate) fn new(account: Account, as_of_millis: u64) -> Self {
        Self {
            account,
            wallet_balance: None,
            stake_position: None,
            pending_rewards: None,
            allowance: None,
            faucet: None,
            as_of_millis,
        }
    }

    pub(crate) fn set(&mut self, value: FieldValue) {
        match value {
            FieldValue::WalletBalance(v) => self.wallet_balance = Some(v),
            FieldValue::StakePosition(v) => self.stake_position = Some(v),
            FieldValue::PendingRewards(v) => self.pending_rewards = Some(v),
            FieldValue::Allowance(v) => self.allowance = Some(v),
            FieldValue::Faucet(v) => self.faucet = Some(v),
        }
    }

    pub(crate) fn stamp(&mut self, as_of_millis: u64) {
        self.as_of_millis = as_of_millis;
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    pub fn wallet_balance(&self) -> Option<TokenAmount> {
        self.wallet_balance
    }

    pub fn stake_position(&self) -> Option<StakePosition> {
        self.stake_position
    }

    pub fn pending_rewards(&self) -> Option<TokenAmount> {
        self.pending_rewards
    }

    pub fn allowance(&self) -> Option<TokenAmount> {
        self.allowance
    }

    pub fn faucet(&self) -> Option<FaucetState> {
        self.faucet
    }

    /// Staked amount, treating an unknown position as nothing staked.
    pub fn staked(&self) -> TokenAmount {
        self.stake_position.map(|p| p.amount).unwrap_or(TokenAmount::ZERO)
    }

    /// When the last change was published, in milliseconds since the Unix epoch.
    pub fn as_of_millis(&self) -> u64 {
        self.as_of_millis
    }

    pub fn as_of(&self) -> Timestamp {
        Timestamp::from_millis(self.as_of_millis)
    }

    /// Fields that have been read successfully at least once.
    pub fn known_fields(&self) -> FieldSet {
        let mut known = FieldSet::EMPTY;
        if self.wallet_balance.is_some() {
            known.insert(Field::WalletBalance);
        }
        if self.stake_position.is_some() {
            known.insert(Field::StakePosition);
        }
        if self.pending_rewards.is_some() {
            known.insert(Field::PendingRewards);
        }
        if self.allowance.is_some() {
            known.insert(Field::Allowance);
        }
        if self.faucet.is_some() {
            known.insert(Field::Faucet);
        }
        known
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account() -> Account {
        Account::parse("0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa").unwrap()
    }

    #[test]
    fn starts_unknown() {
        let snap = Snapshot::new(account(), 7);
        assert!(snap.known_fields().is_empty());
        assert_eq!(snap.wallet_balance(), None);
        assert_eq!(snap.staked(), TokenAmount::ZERO);
        assert_eq!(snap.as_of_millis(), 7);
    }

    #[test]
    fn set_replaces_only_its_own_field() {
        let mut snap = Snapshot::new(account(), 0);
        snap.set(FieldValue::WalletBalance(TokenAmount::from_whole(5)));
        snap.set(FieldValue::Allowance(TokenAmount::from_whole(1)));
        snap.set(FieldValue::WalletBalance(TokenAmount::from_whole(9)));

        assert_eq!(snap.wallet_balance(), Some(TokenAmount::from_whole(9)));
        assert_eq!(snap.allowance(), Some(TokenAmount::from_whole(1)));
        assert_eq!(
            snap.known_fields(),
            FieldSet::EMPTY.with(Field::WalletBalance).with(Field::Allowance)
        );
    }

    #[test]
    fn value_knows_its_field() {
        for value in [
            FieldValue::PendingRewards(TokenAmount::ZERO),
            FieldValue::StakePosition(StakePosition::default()),
        ] {
            let mut snap = Snapshot::new(account(), 0);
            snap.set(value);
            assert!(snap.known_fields().contains(value.field()));
        }
    }
}
