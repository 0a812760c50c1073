use proptest::prelude::*;

use stakeflow_types::{FaucetState, Timestamp, TokenAmount};
use stakeflow_wallet_core::eligibility::{can_claim, faucet_remaining, projected_daily_reward};

fn faucet(last: u64, cooldown: u64) -> FaucetState {
    FaucetState {
        last_claimed_at: Timestamp::new(last),
        cooldown_secs: cooldown,
        claim_amount: TokenAmount::from_whole(1),
    }
}

proptest! {
    /// Remaining cooldown never grows as time moves forward.
    #[test]
    fn remaining_is_non_increasing(
        last in 0u64..4_000_000_000,
        cooldown in 0u64..100_000_000,
        now in 0u64..4_000_000_000,
        step in 0u64..100_000_000,
    ) {
        let f = faucet(last, cooldown);
        let earlier = faucet_remaining(&f, Timestamp::new(now));
        let later = faucet_remaining(&f, Timestamp::new(now + step));
        prop_assert!(later <= earlier);
    }

    /// Claimable exactly when nothing remains, and from then on.
    #[test]
    fn claimable_once_cooldown_elapses(last in 0u64..4_000_000_000, cooldown in 1u64..100_000_000) {
        let f = faucet(last, cooldown);
        prop_assert!(!can_claim(&f, Timestamp::new(last + cooldown - 1)));
        prop_assert!(can_claim(&f, Timestamp::new(last + cooldown)));
        prop_assert_eq!(faucet_remaining(&f, Timestamp::new(last)), cooldown);
    }

    /// The daily projection never exceeds the exact rational value.
    #[test]
    fn projection_is_floor_of_exact(raw in 0u128..(u64::MAX as u128) * 1_000, bps in 0u32..100_000) {
        let projected = projected_daily_reward(TokenAmount::new(raw), bps).raw();
        let exact = raw * bps as u128 / (10_000 * 365);
        prop_assert_eq!(projected, exact);
    }
}
