use thiserror::Error;

use stakeflow_ledger::LedgerError;
use stakeflow_types::{AmountError, Field, TokenAmount, TxHandle};

use crate::flow::FlowKind;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Malformed or non-positive amount; nothing was submitted.
    #[error("invalid amount: {0}")]
    Validation(#[from] AmountError),

    /// The faucet is not claimable yet; nothing was submitted.
    #[error("faucet cooldown active: {remaining_secs}s remaining")]
    CooldownActive { remaining_secs: u64 },

    #[error("transaction rejected by signer: {0}")]
    TransactionRejected(String),

    #[error("transaction reverted: {0}")]
    TransactionReverted(String),

    #[error("ledger unreachable: {0}")]
    Network(String),

    #[error("confirmation of {handle} timed out after {waited_secs}s")]
    Timeout { handle: TxHandle, waited_secs: u64 },

    #[error("an approval for this stake is still pending")]
    ApprovalPending,

    #[error("a {0} flow is already in progress")]
    FlowBusy(FlowKind),

    #[error("no account subscribed")]
    NotSubscribed,

    #[error("{0} has not been read from the ledger yet")]
    FieldUnavailable(Field),

    #[error("insufficient wallet balance: need {needed}, have {available}")]
    InsufficientBalance {
        needed: TokenAmount,
        available: TokenAmount,
    },

    #[error("insufficient allowance: need {needed}, have {available}")]
    InsufficientAllowance {
        needed: TokenAmount,
        available: TokenAmount,
    },

    #[error("flow abandoned")]
    Abandoned,

    #[error("subscription failed: {0}")]
    SubscriptionFailed(String),

    #[error("flow task failed: {0}")]
    TaskFailed(String),

    #[error("config error: {0}")]
    Config(String),
}

impl CoreError {
    /// Whether the caller may reasonably start a fresh flow for the same intent.
    /// Nothing is ever retried automatically.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout { .. })
    }
}

impl From<LedgerError> for CoreError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Rejected(msg) => Self::TransactionRejected(msg),
            LedgerError::Reverted(msg) => Self::TransactionReverted(msg),
            LedgerError::Network(msg) => Self::Network(msg),
            LedgerError::Timeout {
                handle,
                waited_secs,
            } => Self::Timeout {
                handle,
                waited_secs,
            },
            LedgerError::InvalidResponse(msg) => Self::Network(format!("invalid ledger response: {msg}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_errors_map_onto_the_taxonomy() {
        assert_eq!(
            CoreError::from(LedgerError::Rejected("denied".into())),
            CoreError::TransactionRejected("denied".into())
        );
        assert_eq!(
            CoreError::from(LedgerError::Reverted("low balance".into())),
            CoreError::TransactionReverted("low balance".into())
        );
        assert!(matches!(
            CoreError::from(LedgerError::InvalidResponse("junk".into())),
            CoreError::Network(_)
        ));
    }

    #[test]
    fn only_transport_failures_are_retryable() {
        let timeout = CoreError::from(LedgerError::Timeout {
            handle: TxHandle::new("0x01"),
            waited_secs: 120,
        });
        assert!(timeout.is_retryable());
        assert!(CoreError::Network("down".into()).is_retryable());
        assert!(!CoreError::TransactionReverted("no".into()).is_retryable());
        assert!(!CoreError::Validation(AmountError::Zero).is_retryable());
    }
}
