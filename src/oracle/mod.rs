//! Oracle module for collateral price feeds.
//!
//! Prices come from an external capability; this crate only defines the
//! [`PriceOracle`] seam and a deterministic in-memory implementation.
//!
//! ## Usage
//!
//! ```rust
//! use clearn::oracle::{PriceData, PriceOracle, StaticPriceOracle};
//! use clearn::utils::crypto::Address;
//!
//! let feed = Address::from_label("usdc-usd");
//! let oracle = StaticPriceOracle::new().with_feed(feed, PriceData::one_dollar(0));
//! assert_eq!(oracle.latest_price(&feed).unwrap().decimals, 8);
//! ```

pub mod price_feed;

pub use price_feed::*;
