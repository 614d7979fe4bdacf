//! Collateral Treasury.
//!
//! The Treasury whitelists collateral assets against price feeds, values
//! deposits through the oracle and mints CLEARN for them. Collateral is never
//! held here: deposits are forwarded to the yield source and redemptions are
//! pulled back from it through a pre-approved allowance.
//!
//! ## Conversion
//!
//! ```text
//! credit = amount * price / 10^(asset_decimals + price_decimals - credit_decimals)
//! asset  = credit * 10^(asset_decimals + price_decimals - credit_decimals) / price
//! ```
//!
//! Both directions floor, so a deposit followed by a full redemption never
//! returns more collateral than went in.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::ledger::{Amount, Ledger};
use crate::core::token::{CreditToken, NOT_OWNER};
use crate::error::{Error, Result};
use crate::oracle::{PriceData, PriceOracle};
use crate::utils::constants::MAX_DECIMALS;
use crate::utils::crypto::Address;
use crate::utils::math::*;
use crate::utils::validation::*;

/// Revert reason for a zero deposit or redemption
pub const ZERO_DEPOSIT: &str = "Deposit must be more than 0";

/// Revert reason for a redemption worth less than one collateral base unit
pub const DUST_REDEMPTION: &str = "Redemption too small";

/// Revert reason for a deposit worth less than one CLEARN base unit
pub const DUST_DEPOSIT: &str = "Deposit too small";

// ═══════════════════════════════════════════════════════════════════════════════
// ASSET INFO
// ═══════════════════════════════════════════════════════════════════════════════

/// Per-asset Treasury configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetInfo {
    /// Oracle feed pricing the asset; `None` means not depositable
    pub price_feed: Option<Address>,
}

impl AssetInfo {
    /// Asset is depositable iff a feed is set
    pub fn is_depositable(&self) -> bool {
        self.price_feed.is_some()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PRICING CONTEXT
// ═══════════════════════════════════════════════════════════════════════════════

/// Oracle access for a single Treasury call
#[derive(Clone, Copy)]
pub struct Pricing<'a> {
    /// Injected price capability
    pub oracle: &'a dyn PriceOracle,
    /// Current execution time
    pub now: u64,
    /// Staleness bound, if any
    pub max_age: Option<u64>,
}

impl<'a> Pricing<'a> {
    /// Pricing without a staleness bound
    pub fn new(oracle: &'a dyn PriceOracle, now: u64) -> Self {
        Self {
            oracle,
            now,
            max_age: None,
        }
    }

    /// Reject answers older than `max_age` seconds
    pub fn with_max_age(mut self, max_age: Option<u64>) -> Self {
        self.max_age = max_age;
        self
    }

    /// Fetch a usable answer from `feed` for an asset with `asset_decimals`.
    ///
    /// Any oracle failure, a zero answer, an answer whose decimals cannot be
    /// combined with the asset's, or a stale answer is `OracleUnavailable`.
    pub fn fetch(&self, feed: &Address, asset_decimals: u8) -> Result<PriceData> {
        let price = self.oracle.latest_price(feed).map_err(|e| match e {
            Error::OracleUnavailable(_) => e,
            other => Error::OracleUnavailable(format!("feed {}: {}", feed, other)),
        })?;

        if price.value == 0 {
            return Err(Error::OracleUnavailable(format!(
                "feed {} returned a non-positive price",
                feed
            )));
        }
        if asset_decimals as u32 + price.decimals as u32 > MAX_DECIMALS as u32 {
            return Err(Error::OracleUnavailable(format!(
                "feed {} reports {} decimals, too many for a {}-decimal asset",
                feed, price.decimals, asset_decimals
            )));
        }
        if let Some(max_age) = self.max_age {
            if !price.is_fresh(self.now, max_age) {
                return Err(Error::OracleUnavailable(format!(
                    "feed {} answer is {}s old (max {}s)",
                    feed,
                    price.age(self.now),
                    max_age
                )));
            }
        }
        Ok(price)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONVERSIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Value `amount` of collateral in CLEARN base units
pub fn collateral_to_credit(
    amount: Amount,
    asset_decimals: u8,
    price: &PriceData,
    credit_decimals: u8,
) -> Result<Amount> {
    let value = safe_mul(amount, price.value)?;
    rescale(
        value,
        asset_decimals as u32 + price.decimals as u32,
        credit_decimals as u32,
    )
}

/// Collateral base units redeemable for `credit` CLEARN base units
pub fn credit_to_collateral(
    credit: Amount,
    asset_decimals: u8,
    price: &PriceData,
    credit_decimals: u8,
) -> Result<Amount> {
    let scaled = rescale(
        credit,
        credit_decimals as u32,
        asset_decimals as u32 + price.decimals as u32,
    )?;
    safe_div(scaled, price.value)
}

// ═══════════════════════════════════════════════════════════════════════════════
// RECEIPTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Outcome of a successful deposit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositReceipt {
    /// Collateral asset
    pub asset: Address,
    /// Collateral pulled from the depositor
    pub collateral_amount: Amount,
    /// CLEARN minted to the depositor
    pub credit_amount: Amount,
    /// Price used for the valuation
    pub price: PriceData,
}

/// Outcome of a successful redemption
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawReceipt {
    /// Collateral asset
    pub asset: Address,
    /// CLEARN burned from the redeemer
    pub credit_amount: Amount,
    /// Collateral returned from the yield source
    pub collateral_amount: Amount,
    /// Price used for the valuation
    pub price: PriceData,
}

// ═══════════════════════════════════════════════════════════════════════════════
// TREASURY
// ═══════════════════════════════════════════════════════════════════════════════

/// The collateral Treasury
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Treasury {
    /// Treasury account (holds the minter role and collateral allowances)
    address: Address,
    /// Owner allowed to manage the whitelist
    owner: Address,
    /// Yield source receiving and returning collateral
    yield_source: Address,
    /// Decimals of the CLEARN token this Treasury mints
    credit_decimals: u8,
    /// Known collateral assets
    assets: BTreeMap<Address, AssetInfo>,
}

impl Treasury {
    /// Create a Treasury for `credit` forwarding collateral to `yield_source`
    pub fn new(address: Address, owner: Address, credit: &CreditToken, yield_source: Address) -> Result<Self> {
        validate_address(&address, "treasury")?;
        validate_address(&yield_source, "yield_source")?;
        Ok(Self {
            address,
            owner,
            yield_source,
            credit_decimals: credit.decimals(),
            assets: BTreeMap::new(),
        })
    }

    /// Treasury account
    pub fn address(&self) -> Address {
        self.address
    }

    /// Owner account
    pub fn owner(&self) -> Address {
        self.owner
    }

    /// Yield source account
    pub fn yield_source(&self) -> Address {
        self.yield_source
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // WHITELIST
    // ═══════════════════════════════════════════════════════════════════════════

    /// Whitelist `asset` priced by `price_feed` (owner only, overwrites)
    pub fn add_token_info(&mut self, caller: &Address, asset: Address, price_feed: Address) -> Result<()> {
        require_caller(caller, &self.owner, NOT_OWNER)?;
        validate_address(&asset, "asset")?;
        validate_address(&price_feed, "price_feed")?;

        self.assets.insert(
            asset,
            AssetInfo {
                price_feed: Some(price_feed),
            },
        );
        Ok(())
    }

    /// Clear the price feed of `asset`, making it non-depositable (owner only)
    pub fn remove_token_info(&mut self, caller: &Address, asset: &Address) -> Result<()> {
        require_caller(caller, &self.owner, NOT_OWNER)?;
        self.assets.entry(*asset).or_default().price_feed = None;
        Ok(())
    }

    /// Price feed registered for `asset`
    pub fn price_feed(&self, asset: &Address) -> Option<Address> {
        self.assets.get(asset).and_then(|info| info.price_feed)
    }

    /// True iff `asset` has an active price feed
    pub fn depositable_tokens(&self, asset: &Address) -> bool {
        self.assets
            .get(asset)
            .map(AssetInfo::is_depositable)
            .unwrap_or(false)
    }

    /// All currently depositable assets
    pub fn whitelisted_assets(&self) -> Vec<Address> {
        self.assets
            .iter()
            .filter(|(_, info)| info.is_depositable())
            .map(|(asset, _)| *asset)
            .collect()
    }

    fn active_feed(&self, asset: &Address) -> Result<Address> {
        self.price_feed(asset)
            .ok_or_else(|| Error::AssetNotWhitelisted(asset.to_string()))
    }

    /// Request checks that need no ledger: positive amount, active feed.
    /// Returns the feed to price `asset` with.
    pub fn admit(&self, asset: &Address, amount: Amount) -> Result<Address> {
        require_positive(amount, ZERO_DEPOSIT)?;
        self.active_feed(asset)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // QUOTES
    // ═══════════════════════════════════════════════════════════════════════════

    /// CLEARN minted for depositing `amount` of `asset`
    pub fn quote_deposit(
        &self,
        asset: &Address,
        asset_decimals: u8,
        amount: Amount,
        pricing: &Pricing<'_>,
    ) -> Result<(Amount, PriceData)> {
        let price = pricing.fetch(&self.active_feed(asset)?, asset_decimals)?;
        let credit = collateral_to_credit(amount, asset_decimals, &price, self.credit_decimals)?;
        Ok((credit, price))
    }

    /// Collateral returned for redeeming `credit_amount` CLEARN into `asset`
    pub fn quote_withdraw(
        &self,
        asset: &Address,
        asset_decimals: u8,
        credit_amount: Amount,
        pricing: &Pricing<'_>,
    ) -> Result<(Amount, PriceData)> {
        let price = pricing.fetch(&self.active_feed(asset)?, asset_decimals)?;
        let collateral =
            credit_to_collateral(credit_amount, asset_decimals, &price, self.credit_decimals)?;
        Ok((collateral, price))
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // DEPOSIT / WITHDRAW
    // ═══════════════════════════════════════════════════════════════════════════

    /// Deposit `amount` of collateral and mint its CLEARN value to the caller.
    ///
    /// `collateral` is the ledger of `asset`. The caller must have approved
    /// the Treasury for at least `amount`.
    pub fn deposit(
        &self,
        caller: Address,
        asset: &Address,
        amount: Amount,
        collateral: &mut Ledger,
        credit: &mut CreditToken,
        pricing: &Pricing<'_>,
    ) -> Result<DepositReceipt> {
        let feed = self.admit(asset, amount)?;
        require_balance(collateral.balance_of(&caller), amount)?;
        require_allowance(collateral.allowance(&caller, &self.address), amount)?;

        let price = pricing.fetch(&feed, collateral.decimals)?;
        let credit_amount =
            collateral_to_credit(amount, collateral.decimals, &price, self.credit_decimals)?;
        require_positive(credit_amount, DUST_DEPOSIT)?;

        collateral.transfer_from(self.address, caller, self.yield_source, amount)?;
        credit.mint(&self.address, caller, credit_amount)?;

        Ok(DepositReceipt {
            asset: *asset,
            collateral_amount: amount,
            credit_amount,
            price,
        })
    }

    /// Burn `credit_amount` CLEARN from the caller and return its collateral
    /// value in `asset` from the yield source.
    pub fn withdraw(
        &self,
        caller: Address,
        asset: &Address,
        credit_amount: Amount,
        collateral: &mut Ledger,
        credit: &mut CreditToken,
        pricing: &Pricing<'_>,
    ) -> Result<WithdrawReceipt> {
        let feed = self.admit(asset, credit_amount)?;
        require_balance(credit.balance_of(&caller), credit_amount)?;

        let price = pricing.fetch(&feed, collateral.decimals)?;
        let collateral_amount =
            credit_to_collateral(credit_amount, collateral.decimals, &price, self.credit_decimals)?;
        require_positive(collateral_amount, DUST_REDEMPTION)?;
        require_allowance(
            collateral.allowance(&self.yield_source, &self.address),
            collateral_amount,
        )?;

        collateral.transfer_from(self.address, self.yield_source, caller, collateral_amount)?;
        credit.burn(&self.address, caller, credit_amount)?;

        Ok(WithdrawReceipt {
            asset: *asset,
            credit_amount,
            collateral_amount,
            price,
        })
    }
}
