//! Plain-text rendering of snapshots and outcomes.

use stakeflow_types::{Timestamp, TokenAmount};
use stakeflow_utils::format_duration;
use stakeflow_wallet_core::{Eligibility, OperationOutcome, OutcomeKind, Snapshot};

const PLACES: u32 = 4;

fn amount(value: Option<TokenAmount>) -> String {
    value
        .map(|a| a.to_fixed(PLACES))
        .unwrap_or_else(|| "unknown".to_string())
}

pub fn status(snapshot: &Snapshot, eligibility: Option<&Eligibility>, now: Timestamp) -> String {
    let mut lines = vec![
        format!("account      {}", snapshot.account()),
        format!("wallet       {}", amount(snapshot.wallet_balance())),
    ];
    match snapshot.stake_position() {
        Some(p) if !p.amount.is_zero() => lines.push(format!(
            "staked       {} (for {})",
            p.amount.to_fixed(PLACES),
            format_duration(p.start_time.elapsed_since(now))
        )),
        Some(p) => lines.push(format!("staked       {}", p.amount.to_fixed(PLACES))),
        None => lines.push("staked       unknown".to_string()),
    }
    lines.push(format!("rewards      {}", amount(snapshot.pending_rewards())));
    lines.push(format!("allowance    {}", amount(snapshot.allowance())));

    let faucet = eligibility.and_then(|e| e.faucet);
    lines.push(match faucet {
        Some(f) if f.can_claim => format!("faucet       claimable ({} tokens)", f.claim_amount),
        Some(f) => format!(
            "faucet       next claim in {}",
            format_duration(f.remaining_secs)
        ),
        None => "faucet       unknown".to_string(),
    });
    if let Some(daily) = eligibility.and_then(|e| e.projected_daily_reward) {
        lines.push(format!("daily (est.) {}", daily.to_fixed(PLACES)));
    }
    lines.join("\n")
}

/// One line per snapshot update, for `watch`.
pub fn ticker(snapshot: &Snapshot) -> String {
    format!(
        "[{}] wallet={} staked={} rewards={}",
        snapshot.as_of(),
        amount(snapshot.wallet_balance()),
        snapshot.staked().to_fixed(PLACES),
        amount(snapshot.pending_rewards()),
    )
}

pub fn outcome(outcome: &OperationOutcome) -> String {
    let marker = match outcome.kind {
        OutcomeKind::Success => "ok",
        OutcomeKind::Failure => "failed",
    };
    match &outcome.tx {
        Some(tx) => format!("{marker}: {} (tx {tx})", outcome.message),
        None => format!("{marker}: {}", outcome.message),
    }
}
