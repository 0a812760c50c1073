//! Ledger account addresses (`0x` + 20 hex-encoded bytes).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TypesError;

/// An account on the ledger, always stored in lowercase `0x…` form.
///
/// Used both for user accounts and for contract addresses (token, staking).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Account(String);

impl Account {
    /// The standard prefix for all addresses.
    pub const PREFIX: &'static str = "0x";

    /// Number of raw bytes behind an address.
    pub const BYTES: usize = 20;

    /// Parse and normalise an address string.
    pub fn parse(raw: &str) -> Result<Self, TypesError> {
        let trimmed = raw.trim();
        let body = trimmed
            .strip_prefix(Self::PREFIX)
            .or_else(|| trimmed.strip_prefix("0X"))
            .ok_or_else(|| TypesError::InvalidAccount(format!("missing 0x prefix: {trimmed}")))?;

        let bytes = hex::decode(body)
            .map_err(|e| TypesError::InvalidAccount(format!("{trimmed}: {e}")))?;
        if bytes.len() != Self::BYTES {
            return Err(TypesError::InvalidAccount(format!(
                "{trimmed}: expected {} bytes, got {}",
                Self::BYTES,
                bytes.len()
            )));
        }

        Ok(Self(format!("{}{}", Self::PREFIX, hex::encode(bytes))))
    }

    /// Return the raw address string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Account {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Account {
    type Error = TypesError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<Account> for String {
    fn from(account: Account) -> Self {
        account.0
    }
}

/// The contract addresses a session talks to.
///
/// The staking contract is also the spender that token approvals target, and
/// the faucet is served by the token contract.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contracts {
    pub token: Account,
    pub staking: Account,
}
