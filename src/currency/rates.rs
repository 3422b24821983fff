use super::Currency;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum RateError {
    #[error("rate {rate} for {from} -> {to} must be positive")]
    NotPositive {
        from: Currency,
        to: Currency,
        rate: Decimal,
    },

    /// Only one direction of a pair is stored, the other one is derived.
    #[error("{to} -> {from} is already configured, {from} -> {to} is derived from it")]
    InverseConfigured { from: Currency, to: Currency },

    #[error("a currency always converts to itself at 1 ({0})")]
    SameCurrency(Currency),

    #[error("malformed rate table: {0}")]
    Csv(String),
}

impl From<csv::Error> for RateError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err.to_string())
    }
}

/// Where a resolved rate comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateSource {
    /// Both currencies are the same.
    Identity,

    /// The pair is stored in the table, in this direction.
    Configured,

    /// The opposite direction is stored, the rate is its inverse.
    Inverse,

    /// Nothing is configured for this pair: the rate is unknown and treated
    /// as parity.
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rate {
    pub value: Decimal,
    pub source: RateSource,
}

impl Rate {
    const fn parity(source: RateSource) -> Self {
        Self {
            value: Decimal::ONE,
            source,
        }
    }
}

/// Static lookup table of exchange rates.
///
/// For a pair (A, B), only `A -> B` is ever stored. `B -> A` is computed as
/// `1 / rate(A, B)` on every lookup, so both directions can't drift apart.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateTable {
    rates: HashMap<(Currency, Currency), Decimal>,
}

impl RateTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the rate for `from -> to`.
    pub fn insert(&mut self, from: Currency, to: Currency, rate: Decimal) -> Result<(), RateError> {
        if from == to {
            return Err(RateError::SameCurrency(from));
        }

        if rate <= Decimal::ZERO {
            return Err(RateError::NotPositive { from, to, rate });
        }

        if self.rates.contains_key(&(to.clone(), from.clone())) {
            return Err(RateError::InverseConfigured { from, to });
        }

        self.rates.insert((from, to), rate);
        Ok(())
    }

    pub fn with_rate(mut self, from: &str, to: &str, rate: Decimal) -> Result<Self, RateError> {
        self.insert(Currency::new(from), Currency::new(to), rate)?;
        Ok(self)
    }

    pub(crate) fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn rate(&self, from: &Currency, to: &Currency) -> Rate {
        if from == to {
            return Rate::parity(RateSource::Identity);
        }

        if let Some(rate) = self.rates.get(&(from.clone(), to.clone())) {
            return Rate {
                value: *rate,
                source: RateSource::Configured,
            };
        }

        // Stored rates are strictly positive, so the division can't fail.
        if let Some(rate) = self.rates.get(&(to.clone(), from.clone())) {
            return Rate {
                value: Decimal::ONE / *rate,
                source: RateSource::Inverse,
            };
        }

        Rate::parity(RateSource::Fallback)
    }

    /// Load a table from CSV, with a `from,to,rate` header.
    ///
    /// The whole table is rejected on the first bad row: a half-loaded rate
    /// table would silently convert some pairs at parity.
    pub fn from_csv(input: impl std::io::Read) -> Result<Self, RateError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(std::io::BufReader::new(input));

        let mut table = Self::new();
        for record in reader.deserialize::<RateRecord>() {
            let record = record?;
            table.insert(
                Currency::new(&record.from),
                Currency::new(&record.to),
                record.rate,
            )?;
        }

        log::debug!("loaded {} exchange rates", table.len());
        Ok(table)
    }

    /// The rates shipped with the engine.
    pub(crate) fn builtin() -> Self {
        let mut rates = HashMap::new();
        rates.insert((Currency::new("USD"), Currency::new("VND")), dec!(24350));

        Self { rates }
    }
}

#[derive(Debug, Deserialize)]
struct RateRecord {
    from: String,
    to: String,
    rate: Decimal,
}
