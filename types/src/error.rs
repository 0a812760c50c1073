//! Error types shared across crates.

use thiserror::Error;

use crate::tx::{TxHandle, TxStatus};

/// Why a decimal amount string was rejected.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("amount is empty")]
    Empty,

    #[error("amount must not be negative: {0}")]
    Negative(String),

    #[error("amount is not a decimal number: {0}")]
    NotANumber(String),

    #[error("amount has {found} fractional digits, at most {max} allowed")]
    TooManyFractionalDigits { found: usize, max: u32 },

    #[error("amount must be greater than zero")]
    Zero,

    #[error("amount does not fit in 128 bits of raw units")]
    Overflow,
}

/// Common error type for the stakeflow types.
#[derive(Debug, Error)]
pub enum TypesError {
    #[error("invalid account address: {0}")]
    InvalidAccount(String),

    #[error(transparent)]
    Amount(#[from] AmountError),

    #[error("transaction {handle} already settled as {status:?}")]
    AlreadyTerminal { handle: TxHandle, status: TxStatus },

    #[error("transaction {0} cannot settle into a non-terminal status")]
    NotTerminal(TxHandle),
}
