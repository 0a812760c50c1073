//! Fixed-point token amounts.
//!
//! Amounts are represented as raw integers (u128) scaled by 10^18 to avoid
//! floating-point errors. One whole token is [`TokenAmount::SCALE`] raw units.
//! Parsing and formatting work on decimal strings digit by digit, so a value
//! never passes through a float.

use std::fmt;
use std::str::FromStr;

use crate::error::AmountError;

/// A non-negative token amount in raw units (10^-18 of a whole token).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TokenAmount(u128);

impl TokenAmount {
    pub const ZERO: Self = Self(0);

    /// Number of fractional decimal digits.
    pub const DECIMALS: u32 = 18;

    /// Raw units per whole token.
    pub const SCALE: u128 = 10u128.pow(Self::DECIMALS);

    pub const fn new(raw: u128) -> Self {
        Self(raw)
    }

    /// A whole number of tokens.
    pub fn from_whole(tokens: u64) -> Self {
        Self(tokens as u128 * Self::SCALE)
    }

    pub fn raw(&self) -> u128 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    pub fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// Parse a non-negative decimal string such as `"12.5"`, `"40"` or `".25"`.
    ///
    /// Surrounding whitespace is ignored. At most 18 fractional digits are
    /// accepted; signs, exponents and thousands separators are not.
    pub fn parse_decimal(input: &str) -> Result<Self, AmountError> {
        let s = input.trim();
        if s.is_empty() {
            return Err(AmountError::Empty);
        }
        if s.starts_with('-') {
            return Err(AmountError::Negative(s.to_string()));
        }

        let (whole, frac) = s.split_once('.').unwrap_or((s, ""));
        let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if (whole.is_empty() && frac.is_empty()) || !all_digits(whole) || !all_digits(frac) {
            return Err(AmountError::NotANumber(s.to_string()));
        }
        if frac.len() > Self::DECIMALS as usize {
            return Err(AmountError::TooManyFractionalDigits {
                found: frac.len(),
                max: Self::DECIMALS,
            });
        }

        // Digits are validated above, so a parse failure can only be overflow.
        let whole_raw: u128 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| AmountError::Overflow)?
        };
        let frac_raw: u128 = if frac.is_empty() {
            0
        } else {
            format!("{frac:0<width$}", width = Self::DECIMALS as usize)
                .parse()
                .map_err(|_| AmountError::Overflow)?
        };

        whole_raw
            .checked_mul(Self::SCALE)
            .and_then(|w| w.checked_add(frac_raw))
            .map(Self)
            .ok_or(AmountError::Overflow)
    }

    /// Parse a strictly positive decimal amount. Used for every user-entered
    /// stake/unstake amount.
    pub fn parse_positive(input: &str) -> Result<Self, AmountError> {
        let amount = Self::parse_decimal(input)?;
        if amount.is_zero() {
            return Err(AmountError::Zero);
        }
        Ok(amount)
    }

    /// Format with exactly `places` fractional digits, truncating (never rounding up).
    pub fn to_fixed(&self, places: u32) -> String {
        let places = places.min(Self::DECIMALS);
        let whole = self.0 / Self::SCALE;
        if places == 0 {
            return whole.to_string();
        }
        let frac = (self.0 % Self::SCALE) / 10u128.pow(Self::DECIMALS - places);
        format!("{whole}.{frac:0width$}", width = places as usize)
    }
}

/// Shortest exact decimal form: `12.5`, `40`, `0.000000000000000001`.
impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / Self::SCALE;
        let frac = self.0 % Self::SCALE;
        if frac == 0 {
            return write!(f, "{whole}");
        }
        let digits = format!("{frac:0width$}", width = Self::DECIMALS as usize);
        write!(f, "{whole}.{}", digits.trim_end_matches('0'))
    }
}

impl FromStr for TokenAmount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_decimal(s)
    }
}
