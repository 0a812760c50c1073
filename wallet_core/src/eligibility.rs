//! Time-gated eligibility and advisory reward projections.
//!
//! Everything here is a pure function of a snapshot and the current time.
//! Projections are illustrative only; the ledger's pending rewards are the
//! sole authoritative figure.

use stakeflow_types::{FaucetState, Timestamp, TokenAmount};

use crate::Snapshot;

/// Basis points in 100%.
pub const BPS_DENOMINATOR: u128 = 10_000;

pub const DAYS_PER_YEAR: u128 = 365;

/// Seconds until the faucet can be claimed again, or 0 if claimable now.
pub fn faucet_remaining(faucet: &FaucetState, now: Timestamp) -> u64 {
    next_claim_at(faucet).as_secs().saturating_sub(now.as_secs())
}

pub fn can_claim(faucet: &FaucetState, now: Timestamp) -> bool {
    faucet_remaining(faucet, now) == 0
}

/// The first instant at which a claim is accepted.
pub fn next_claim_at(faucet: &FaucetState) -> Timestamp {
    faucet.last_claimed_at.saturating_add_secs(faucet.cooldown_secs)
}

/// `staked * rate / 365`, with the rate in basis points, rounded down.
///
/// The division is split so the intermediate product cannot overflow for
/// any realistic stake.
pub fn projected_daily_reward(staked: TokenAmount, annual_rate_bps: u32) -> TokenAmount {
    let denom = BPS_DENOMINATOR * DAYS_PER_YEAR;
    let bps = u128::from(annual_rate_bps);
    let (quot, rem) = (staked.raw() / denom, staked.raw() % denom);
    TokenAmount::new(quot.saturating_mul(bps).saturating_add(rem * bps / denom))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FaucetEligibility {
    pub can_claim: bool,
    pub remaining_secs: u64,
    pub next_claim_at: Timestamp,
    pub claim_amount: TokenAmount,
}

impl FaucetEligibility {
    pub fn from_state(faucet: &FaucetState, now: Timestamp) -> Self {
        let remaining_secs = faucet_remaining(faucet, now);
        Self {
            can_claim: remaining_secs == 0,
            remaining_secs,
            next_claim_at: next_claim_at(faucet),
            claim_amount: faucet.claim_amount,
        }
    }
}

/// Everything the presentation layer needs to enable or explain actions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Eligibility {
    /// `None` until the faucet state has been read.
    pub faucet: Option<FaucetEligibility>,
    /// `None` until the stake position has been read.
    pub projected_daily_reward: Option<TokenAmount>,
}

pub fn evaluate(snapshot: &Snapshot, now: Timestamp, annual_rate_bps: u32) -> Eligibility {
    Eligibility {
        faucet: snapshot
            .faucet()
            .map(|f| FaucetEligibility::from_state(&f, now)),
        projected_daily_reward: snapshot
            .stake_position()
            .map(|p| projected_daily_reward(p.amount, annual_rate_bps)),
    }
}
