//! Transaction bookkeeping: handles, kinds, statuses and receipts.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::TypesError;
use crate::time::Timestamp;

/// Opaque identifier the ledger hands back for a submitted write
/// (a transaction hash on EVM-style chains).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxHandle(String);

impl TxHandle {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The ledger write a transaction performs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxKind {
    Approve,
    Stake,
    Unstake,
    Claim,
    FaucetClaim,
}

impl TxKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Stake => "stake",
            Self::Unstake => "unstake",
            Self::Claim => "claim",
            Self::FaucetClaim => "faucet_claim",
        }
    }
}

impl fmt::Display for TxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxStatus {
    Pending,
    Confirmed,
    Failed,
}

impl TxStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// What the ledger reports once a transaction has been mined.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub status: TxStatus,
    pub block_timestamp: Timestamp,
    /// Revert reason, when the ledger provides one.
    #[serde(default)]
    pub detail: Option<String>,
}

/// A submitted transaction whose status settles exactly once.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    handle: TxHandle,
    kind: TxKind,
    status: TxStatus,
}

impl Transaction {
    /// A freshly submitted, pending transaction.
    pub fn new(handle: TxHandle, kind: TxKind) -> Self {
        Self {
            handle,
            kind,
            status: TxStatus::Pending,
        }
    }

    pub fn handle(&self) -> &TxHandle {
        &self.handle
    }

    pub fn kind(&self) -> TxKind {
        self.kind
    }

    pub fn status(&self) -> TxStatus {
        self.status
    }

    /// Move into a terminal status. A second settlement is refused, so the
    /// first terminal status is final.
    pub fn settle(&mut self, status: TxStatus) -> Result<(), TypesError> {
        if self.status.is_terminal() {
            return Err(TypesError::AlreadyTerminal {
                handle: self.handle.clone(),
                status: self.status,
            });
        }
        if !status.is_terminal() {
            return Err(TypesError::NotTerminal(self.handle.clone()));
        }
        self.status = status;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settles_exactly_once() {
        let mut tx = Transaction::new(TxHandle::new("0x01"), TxKind::Stake);
        assert_eq!(tx.status(), TxStatus::Pending);
        tx.settle(TxStatus::Confirmed).unwrap();
        assert!(matches!(
            tx.settle(TxStatus::Failed),
            Err(TypesError::AlreadyTerminal { status: TxStatus::Confirmed, .. })
        ));
        assert_eq!(tx.status(), TxStatus::Confirmed);
    }

    #[test]
    fn pending_is_not_a_settlement() {
        let mut tx = Transaction::new(TxHandle::new("0x02"), TxKind::Claim);
        assert!(matches!(tx.settle(TxStatus::Pending), Err(TypesError::NotTerminal(_))));
        assert_eq!(tx.status(), TxStatus::Pending);
    }
}
