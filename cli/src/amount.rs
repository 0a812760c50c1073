//! Amount arguments for `stake` and `unstake`.

use std::convert::Infallible;
use std::str::FromStr;

use stakeflow_wallet_core::{CoreError, FlowKind, StakingSession};

/// Either a typed decimal amount or `max`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AmountArg {
    Max,
    Exact(String),
}

impl AmountArg {
    /// The decimal amount to submit. `max` becomes the whole wallet balance
    /// for a stake and the whole staked amount for an unstake.
    pub fn resolve(self, session: &StakingSession, kind: FlowKind) -> Result<String, CoreError> {
        match self {
            Self::Exact(amount) => Ok(amount),
            Self::Max => {
                let amount = match kind {
                    FlowKind::Unstake => session.max_unstake()?,
                    _ => session.max_stake()?,
                };
                tracing::debug!(%kind, %amount, "resolved max amount");
                Ok(amount.to_string())
            }
        }
    }
}

impl FromStr for AmountArg {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("max") {
            Ok(Self::Max)
        } else {
            Ok(Self::Exact(s.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_is_case_insensitive() {
        assert_eq!("max".parse::<AmountArg>().unwrap(), AmountArg::Max);
        assert_eq!(" MAX ".parse::<AmountArg>().unwrap(), AmountArg::Max);
    }

    #[test]
    fn anything_else_is_passed_through_for_validation() {
        assert_eq!(
            "12.5".parse::<AmountArg>().unwrap(),
            AmountArg::Exact("12.5".into())
        );
        assert_eq!(
            "maximum".parse::<AmountArg>().unwrap(),
            AmountArg::Exact("maximum".into())
        );
    }
}
