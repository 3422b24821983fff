use super::{Currency, NumberFormat, RateSource, RateTable, RoundingPolicy};
use crate::wallet::{Amount, WalletId};

use rust_decimal::Decimal;
use thiserror::Error;

/// Rates are normalized to this many significant digits before use.
///
/// The normalized rate is both the one multiplied and the one displayed, so
/// the annotation never shows a different number than the one applied.
pub const RATE_SIGNIFICANT_DIGITS: u32 = 10;

#[derive(Debug, Error, PartialEq)]
pub enum ConversionError {
    #[error("converting {amount} {from} to {to} overflows")]
    Overflow {
        amount: Amount,
        from: Currency,
        to: Currency,
    },

    #[error("balance of wallet {0} would overflow")]
    BalanceOverflow(WalletId),
}

/// An amount expressed in another currency. Derived on demand, never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionResult {
    pub final_currency: Currency,

    /// The source amount converted and rounded at `final_currency` precision.
    pub amount: Amount,

    pub rate_used: Decimal,
    pub rate_source: RateSource,

    /// Human readable rate, e.g. `1 USD = 24,350 VND`.
    pub rate_annotation: String,
}

/// Converts amounts between currencies, with the rounding policy, rate table
/// and number format of an engine configuration.
#[derive(Debug, Clone, Copy)]
pub struct Converter<'a> {
    rounding: &'a RoundingPolicy,
    rates: &'a RateTable,
    format: &'a NumberFormat,
}

impl<'a> Converter<'a> {
    pub fn new(rounding: &'a RoundingPolicy, rates: &'a RateTable, format: &'a NumberFormat) -> Self {
        Self {
            rounding,
            rates,
            format,
        }
    }

    pub fn rounding(&self) -> &RoundingPolicy {
        self.rounding
    }

    pub fn convert(
        &self,
        amount: Amount,
        from: &Currency,
        to: &Currency,
    ) -> Result<ConversionResult, ConversionError> {
        // Nothing to convert: the amount is kept as is, so same-currency
        // operations never drift because of rounding.
        if from == to {
            return Ok(ConversionResult {
                final_currency: to.clone(),
                amount,
                rate_used: Decimal::ONE,
                rate_source: RateSource::Identity,
                rate_annotation: self.annotate(from, to, Decimal::ONE, RateSource::Identity),
            });
        }

        let rate = self.rates.rate(from, to);
        if rate.source == RateSource::Fallback {
            log::warn!("no exchange rate configured for {} -> {}, using parity", from, to);
        }

        let rate_used = normalize_rate(rate.value);
        let raw = amount
            .checked_mul(rate_used)
            .ok_or_else(|| ConversionError::Overflow {
                amount,
                from: from.clone(),
                to: to.clone(),
            })?;

        Ok(ConversionResult {
            final_currency: to.clone(),
            amount: self.rounding.round(raw, to),
            rate_used,
            rate_source: rate.source,
            rate_annotation: self.annotate(from, to, rate_used, rate.source),
        })
    }

    fn annotate(&self, from: &Currency, to: &Currency, rate: Decimal, source: RateSource) -> String {
        let annotation = format!("1 {} = {} {}", from, self.format.format(rate), to);
        match source {
            RateSource::Fallback => format!("{} (rate unknown, treated as parity)", annotation),
            _ => annotation,
        }
    }
}

fn normalize_rate(rate: Decimal) -> Decimal {
    rate.round_sf(RATE_SIGNIFICANT_DIGITS)
        .unwrap_or(rate)
        .normalize()
}
