//! Ledger-side positions read for an account.

use crate::amount::TokenAmount;
use crate::time::Timestamp;

/// An account's staked amount and when the current stake began.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StakePosition {
    pub amount: TokenAmount,
    pub start_time: Timestamp,
}

/// Faucet bookkeeping for an account.
///
/// `last_claimed_at` is [`Timestamp::EPOCH`] for an account that never claimed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FaucetState {
    pub last_claimed_at: Timestamp,
    pub cooldown_secs: u64,
    pub claim_amount: TokenAmount,
}

