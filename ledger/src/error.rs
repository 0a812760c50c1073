use thiserror::Error;

use stakeflow_types::TxHandle;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// The signer declined to sign or send the transaction.
    #[error("transaction rejected by signer: {0}")]
    Rejected(String),

    /// The ledger executed and rejected the transaction.
    #[error("transaction reverted: {0}")]
    Reverted(String),

    /// The ledger could not be reached.
    #[error("ledger unreachable: {0}")]
    Network(String),

    /// The confirmation wait exceeded the client's timeout.
    #[error("no receipt for {handle} after {waited_secs}s")]
    Timeout { handle: TxHandle, waited_secs: u64 },

    /// The ledger answered with something the client could not interpret.
    #[error("invalid ledger response: {0}")]
    InvalidResponse(String),
}

impl LedgerError {
    /// Whether repeating the same request later can plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout { .. })
    }
}
