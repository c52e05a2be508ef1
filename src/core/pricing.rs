//! Session pricing - maps (duration, level) to a credit amount.
//!
//! The table is a plain value passed into the session state machine, so tests
//! and deployments can supply their own prices. Combinations missing from the
//! table are charged the fallback price.

use crate::{
    entities::{SessionDuration, SessionLevel},
    errors::{Error, Result},
};
use std::collections::HashMap;

/// Price charged for any combination the table does not list
pub const DEFAULT_FALLBACK_PRICE: i64 = 5;

/// Credit price lookup for sessions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceTable {
    prices: HashMap<(SessionDuration, SessionLevel), i64>,
    fallback: i64,
}

impl PriceTable {
    /// Creates an empty table that charges `fallback` for everything.
    pub fn new(fallback: i64) -> Result<Self> {
        Self {
            prices: HashMap::new(),
            fallback: DEFAULT_FALLBACK_PRICE,
        }
        .with_fallback(fallback)
    }

    /// Replaces the price charged for unlisted combinations.
    pub fn with_fallback(mut self, fallback: i64) -> Result<Self> {
        if fallback <= 0 {
            return Err(Error::Config {
                message: format!("Fallback session price must be positive, got {fallback}"),
            });
        }
        self.fallback = fallback;
        Ok(self)
    }

    /// The platform's standard price list.
    #[must_use]
    pub fn standard() -> Self {
        use SessionDuration::{Ninety, Sixty, TwoHours};
        use SessionLevel::{Advanced, Beginner, Intermediate};

        let prices = HashMap::from([
            ((Sixty, Beginner), 5),
            ((Sixty, Intermediate), 7),
            ((Sixty, Advanced), 9),
            ((Ninety, Beginner), 7),
            ((Ninety, Intermediate), 9),
            ((Ninety, Advanced), 12),
            ((TwoHours, Beginner), 10),
            ((TwoHours, Intermediate), 12),
            ((TwoHours, Advanced), 15),
        ]);

        Self {
            prices,
            fallback: DEFAULT_FALLBACK_PRICE,
        }
    }

    /// Sets the price for one combination, replacing any previous entry.
    pub fn set_price(
        &mut self,
        duration: SessionDuration,
        level: SessionLevel,
        credits: i64,
    ) -> Result<()> {
        if credits <= 0 {
            return Err(Error::Config {
                message: format!(
                    "Price for {} minutes/{level:?} must be positive, got {credits}",
                    duration.minutes()
                ),
            });
        }
        self.prices.insert((duration, level), credits);
        Ok(())
    }

    /// Credits charged for a session of this duration and level.
    #[must_use]
    pub fn price_for(&self, duration: SessionDuration, level: SessionLevel) -> i64 {
        self.prices
            .get(&(duration, level))
            .copied()
            .unwrap_or(self.fallback)
    }

    /// Price used for combinations without an entry
    #[must_use]
    pub const fn fallback(&self) -> i64 {
        self.fallback
    }

    /// Number of explicitly priced combinations
    #[must_use]
    pub fn len(&self) -> usize {
        self.prices.len()
    }

    /// True when every combination uses the fallback price
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

impl Default for PriceTable {
    fn default() -> Self {
        Self::standard()
    }
}
