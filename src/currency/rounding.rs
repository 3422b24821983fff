use super::Currency;
use crate::wallet::Amount;

use rust_decimal::RoundingStrategy;
use std::collections::HashSet;

/// Precision of every currency that has a minor unit (cents and the like).
pub const MINOR_UNIT_DECIMALS: u32 = 2;

/// Maps a currency to the number of decimal places used both for
/// calculations and for display.
///
/// Currencies without a minor subdivision use 0 decimal places, every other
/// currency uses `MINOR_UNIT_DECIMALS`.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundingPolicy {
    zero_decimal: HashSet<Currency>,
}

impl RoundingPolicy {
    pub fn new(zero_decimal: impl IntoIterator<Item = Currency>) -> Self {
        Self {
            zero_decimal: zero_decimal.into_iter().collect(),
        }
    }

    pub fn decimals_of(&self, currency: &Currency) -> u32 {
        if self.zero_decimal.contains(currency) {
            0
        } else {
            MINOR_UNIT_DECIMALS
        }
    }

    /// Round half-up (away from zero on a tie) at the currency's precision.
    ///
    /// `Decimal::round_dp` would use banker's rounding, which is not what
    /// people expect to see on a wallet balance.
    pub fn round(&self, amount: Amount, currency: &Currency) -> Amount {
        amount.round_dp_with_strategy(
            self.decimals_of(currency),
            RoundingStrategy::MidpointAwayFromZero,
        )
    }
}

impl Default for RoundingPolicy {
    fn default() -> Self {
        Self::new([Currency::new("VND"), Currency::new("JPY")])
    }
}
