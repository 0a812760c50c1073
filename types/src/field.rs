//! The account-scoped ledger fields mirrored in a snapshot.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One independently polled snapshot field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    WalletBalance,
    StakePosition,
    PendingRewards,
    Allowance,
    Faucet,
}

impl Field {
    pub const ALL: [Field; 5] = [
        Field::WalletBalance,
        Field::StakePosition,
        Field::PendingRewards,
        Field::Allowance,
        Field::Faucet,
    ];

    const fn bit(self) -> u8 {
        1 << self as u8
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WalletBalance => "wallet_balance",
            Self::StakePosition => "stake_position",
            Self::PendingRewards => "pending_rewards",
            Self::Allowance => "allowance",
            Self::Faucet => "faucet",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A small set of [`Field`]s, iterated in declaration order.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FieldSet(u8);

impl FieldSet {
    pub const EMPTY: Self = Self(0);
    pub const ALL: Self = Self(0b1_1111);

    pub const fn with(self, field: Field) -> Self {
        Self(self.0 | field.bit())
    }

    pub fn insert(&mut self, field: Field) {
        self.0 |= field.bit();
    }

    pub fn remove(&mut self, field: Field) {
        self.0 &= !field.bit();
    }

    pub fn contains(&self, field: Field) -> bool {
        self.0 & field.bit() != 0
    }

    pub fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn iter(&self) -> impl Iterator<Item = Field> + '_ {
        Field::ALL.into_iter().filter(|f| self.contains(*f))
    }
}

impl FromIterator<Field> for FieldSet {
    fn from_iter<I: IntoIterator<Item = Field>>(iter: I) -> Self {
        iter.into_iter().fold(Self::EMPTY, Self::with)
    }
}

impl fmt::Debug for FieldSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_contains_every_field() {
        assert_eq!(FieldSet::ALL.len(), Field::ALL.len());
        assert!(Field::ALL.iter().all(|f| FieldSet::ALL.contains(*f)));
    }

    #[test]
    fn iterates_in_declaration_order() {
        let set: FieldSet = [Field::Faucet, Field::WalletBalance].into_iter().collect();
        let fields: Vec<_> = set.iter().collect();
        assert_eq!(fields, vec![Field::WalletBalance, Field::Faucet]);
    }

    #[test]
    fn duplicate_insert_is_noop() {
        let mut set = FieldSet::EMPTY;
        set.insert(Field::Allowance);
        set.insert(Field::Allowance);
        assert_eq!(set.len(), 1);
        assert!(!set.contains(Field::PendingRewards));
    }
}
