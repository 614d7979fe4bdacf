//! Price feed capability.
//!
//! The Treasury never talks to a concrete oracle. It asks an injected
//! [`PriceOracle`] for the latest answer of the feed registered for a
//! collateral asset, so tests and simulations can plug in deterministic prices.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::utils::crypto::Address;
use crate::utils::math::format_units;
use crate::utils::validation::validate_decimals;

// ═══════════════════════════════════════════════════════════════════════════════
// PRICE DATA
// ═══════════════════════════════════════════════════════════════════════════════

/// A single price answer: `value / 10^decimals` units of account per whole asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceData {
    /// Raw answer
    pub value: u128,
    /// Decimals of `value`
    pub decimals: u8,
    /// Unix timestamp when the answer was recorded
    pub timestamp: u64,
}

impl PriceData {
    /// Create a new price answer
    pub fn new(value: u128, decimals: u8, timestamp: u64) -> Self {
        Self {
            value,
            decimals,
            timestamp,
        }
    }

    /// A one-dollar answer with 8 decimals, the usual stablecoin feed format
    pub fn one_dollar(timestamp: u64) -> Self {
        Self::new(100_000_000, 8, timestamp)
    }

    /// Check if price is fresh
    pub fn is_fresh(&self, current_time: u64, max_age: u64) -> bool {
        self.age(current_time) <= max_age
    }

    /// Get age of price in seconds
    pub fn age(&self, current_time: u64) -> u64 {
        current_time.saturating_sub(self.timestamp)
    }

    /// Format price for display
    pub fn format_price(&self) -> String {
        format_units(self.value, self.decimals)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ORACLE CAPABILITY
// ═══════════════════════════════════════════════════════════════════════════════

/// Read access to price feeds
pub trait PriceOracle {
    /// Latest answer of the feed at `feed`
    fn latest_price(&self, feed: &Address) -> Result<PriceData>;
}

impl<T: PriceOracle + ?Sized> PriceOracle for Box<T> {
    fn latest_price(&self, feed: &Address) -> Result<PriceData> {
        (**self).latest_price(feed)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// STATIC ORACLE
// ═══════════════════════════════════════════════════════════════════════════════

/// In-memory oracle with operator-set answers
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticPriceOracle {
    feeds: BTreeMap<Address, PriceData>,
}

impl StaticPriceOracle {
    /// Create an oracle with no feeds
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style feed registration (decimals are checked when the answer is fetched)
    pub fn with_feed(mut self, feed: Address, price: PriceData) -> Self {
        self.feeds.insert(feed, price);
        self
    }

    /// Set (or replace) the answer of a feed
    pub fn set_price(&mut self, feed: Address, price: PriceData) -> Result<()> {
        validate_decimals(price.decimals, "price decimals")?;
        self.feeds.insert(feed, price);
        Ok(())
    }

    /// Take a feed offline
    pub fn remove_feed(&mut self, feed: &Address) -> Option<PriceData> {
        self.feeds.remove(feed)
    }

    /// Number of configured feeds
    pub fn feed_count(&self) -> usize {
        self.feeds.len()
    }
}

impl PriceOracle for StaticPriceOracle {
    fn latest_price(&self, feed: &Address) -> Result<PriceData> {
        self.feeds
            .get(feed)
            .copied()
            .ok_or_else(|| Error::OracleUnavailable(format!("no answer from feed {}", feed)))
    }
}
