use crate::currency::{Converter, NumberFormat, RateTable, RoundingPolicy};

use std::time::Duration;

/// How long the merge progress indicator takes to fill up.
pub const DEFAULT_MERGE_PROGRESS: Duration = Duration::from_secs(2);

/// Static configuration shared by every wizard.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub rounding: RoundingPolicy,
    pub rates: RateTable,
    pub number_format: NumberFormat,

    /// Purely presentational: the indicator paces the wait, it doesn't
    /// report real progress from the persistence side.
    pub merge_progress: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rounding: RoundingPolicy::default(),
            rates: RateTable::builtin(),
            number_format: NumberFormat::default(),
            merge_progress: DEFAULT_MERGE_PROGRESS,
        }
    }
}

impl EngineConfig {
    pub fn with_rates(mut self, rates: RateTable) -> Self {
        self.rates = rates;
        self
    }

    pub fn with_number_format(mut self, number_format: NumberFormat) -> Self {
        self.number_format = number_format;
        self
    }

    pub fn converter(&self) -> Converter<'_> {
        Converter::new(&self.rounding, &self.rates, &self.number_format)
    }
}
