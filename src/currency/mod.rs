//! Everything needed to move an amount from one currency to another:
//! rounding precision per currency, a static rate table, locale formatting
//! and the conversion calculator that ties them together.

mod conversion;
mod format;
mod rates;
mod rounding;

pub use conversion::{ConversionError, ConversionResult, Converter, RATE_SIGNIFICANT_DIGITS};
pub use format::NumberFormat;
pub use rates::{Rate, RateError, RateSource, RateTable};
pub use rounding::{RoundingPolicy, MINOR_UNIT_DECIMALS};

use serde::{Deserialize, Serialize};
use std::fmt;

/// ISO-like currency code, e.g. `USD` or `VND`.
///
/// Codes are normalized on creation (trimmed, ASCII upper case), so `" usd"`
/// and `"USD"` are the same currency.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Currency(String);

impl Currency {
    pub fn new(code: &str) -> Self {
        Self(code.trim().to_ascii_uppercase())
    }

    pub fn code(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Currency {
    fn from(code: &str) -> Self {
        Self::new(code)
    }
}

impl From<String> for Currency {
    fn from(code: String) -> Self {
        Self::new(&code)
    }
}

impl From<Currency> for String {
    fn from(currency: Currency) -> Self {
        currency.0
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[test]
fn test_currency_is_normalized() {
    for raw in vec!["USD", "usd", "  Usd ", "uSD\t"] {
        assert_eq!(Currency::new("USD"), Currency::from(raw));
    }
    assert_eq!("VND", Currency::from("vnd".to_string()).code());
}
