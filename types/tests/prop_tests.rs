use proptest::prelude::*;

use stakeflow_types::{Field, FieldSet, Timestamp, TokenAmount};

proptest! {
    /// Display output parses back to the identical raw amount.
    #[test]
    fn amount_display_parse_roundtrip(raw in any::<u128>()) {
        let amount = TokenAmount::new(raw);
        let parsed = TokenAmount::parse_decimal(&amount.to_string()).unwrap();
        prop_assert_eq!(parsed, amount);
    }

    /// Any whole-and-fraction pair parses to whole * 10^18 + fraction.
    #[test]
    fn amount_parse_is_exact(whole in 0u64..1_000_000_000, frac in 0u64..1_000_000) {
        let input = format!("{whole}.{frac:06}");
        let parsed = TokenAmount::parse_decimal(&input).unwrap();
        let expected = whole as u128 * TokenAmount::SCALE + frac as u128 * 1_000_000_000_000;
        prop_assert_eq!(parsed.raw(), expected);
    }

    /// to_fixed never reports more than the exact value.
    #[test]
    fn to_fixed_truncates(raw in any::<u64>(), places in 0u32..=18) {
        let amount = TokenAmount::new(raw as u128);
        let shown = TokenAmount::parse_decimal(&amount.to_fixed(places)).unwrap();
        prop_assert!(shown <= amount);
    }

    /// has_expired flips exactly once as `now` crosses start + duration.
    #[test]
    fn expiry_is_monotonic(start in 0u64..1_000_000, duration in 0u64..1_000_000, now in 0u64..3_000_000) {
        let t = Timestamp::new(start);
        if t.has_expired(duration, Timestamp::new(now)) {
            prop_assert!(t.has_expired(duration, Timestamp::new(now + 1)));
        }
    }

    /// A field set built from any subset contains exactly that subset.
    #[test]
    fn field_set_membership(mask in 0u8..32) {
        let chosen: Vec<Field> = Field::ALL
            .iter()
            .enumerate()
            .filter(|(i, _)| mask & (1 << i) != 0)
            .map(|(_, f)| *f)
            .collect();
        let set: FieldSet = chosen.iter().copied().collect();
        prop_assert_eq!(set.len(), chosen.len());
        prop_assert_eq!(set.iter().collect::<Vec<_>>(), chosen);
    }
}
