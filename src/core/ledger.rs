//! Fungible asset ledger.
//!
//! The standard balance / allowance ledger shared by every asset in the
//! protocol: collateral assets such as USDC are plain `Ledger`s and the
//! CLEARN credit token wraps one behind its minter check.
//!
//! Every mutating call validates completely before it writes, so a failed
//! call never leaves a partial debit behind.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::Result;
use crate::utils::crypto::Address;
use crate::utils::math::*;
use crate::utils::validation::*;

/// Base-unit amount of any asset
pub type Amount = u128;

/// Allowance value treated as unlimited (never decremented)
pub const UNLIMITED_ALLOWANCE: Amount = Amount::MAX;

// ═══════════════════════════════════════════════════════════════════════════════
// LEDGER
// ═══════════════════════════════════════════════════════════════════════════════

/// Balance and allowance bookkeeping for one fungible asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    /// Asset name
    pub name: String,
    /// Asset symbol
    pub symbol: String,
    /// Decimal places of the base unit
    pub decimals: u8,
    /// Total supply in base units
    total_supply: Amount,
    /// Non-zero balances by account
    balances: BTreeMap<Address, Amount>,
    /// owner -> spender -> remaining allowance
    allowances: BTreeMap<Address, BTreeMap<Address, Amount>>,
}

impl Ledger {
    /// Create an empty ledger
    pub fn new(name: impl Into<String>, symbol: impl Into<String>, decimals: u8) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into(),
            decimals,
            total_supply: 0,
            balances: BTreeMap::new(),
            allowances: BTreeMap::new(),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // QUERIES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Get total supply
    pub fn total_supply(&self) -> Amount {
        self.total_supply
    }

    /// Get balance of an account
    pub fn balance_of(&self, account: &Address) -> Amount {
        self.balances.get(account).copied().unwrap_or(0)
    }

    /// Remaining amount `spender` may pull from `owner`
    pub fn allowance(&self, owner: &Address, spender: &Address) -> Amount {
        self.allowances
            .get(owner)
            .and_then(|spenders| spenders.get(spender))
            .copied()
            .unwrap_or(0)
    }

    /// Number of accounts holding a non-zero balance
    pub fn holder_count(&self) -> usize {
        self.balances.len()
    }

    /// All non-zero balances (for auditing)
    pub fn balances(&self) -> &BTreeMap<Address, Amount> {
        &self.balances
    }

    /// Verify supply invariant (total_supply == sum of all balances)
    pub fn verify_supply_invariant(&self) -> bool {
        self.balances
            .values()
            .try_fold(0u128, |acc, b| acc.checked_add(*b))
            .map(|sum| sum == self.total_supply)
            .unwrap_or(false)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // TRANSFERS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Set the allowance `spender` may pull from `owner` (overwrites)
    pub fn approve(&mut self, owner: Address, spender: Address, amount: Amount) -> Result<()> {
        validate_address(&spender, "spender")?;
        let spenders = self.allowances.entry(owner).or_default();
        if amount == 0 {
            spenders.remove(&spender);
            if spenders.is_empty() {
                self.allowances.remove(&owner);
            }
        } else {
            spenders.insert(spender, amount);
        }
        Ok(())
    }

    /// Move `amount` from `from` to `to`
    pub fn transfer(&mut self, from: Address, to: Address, amount: Amount) -> Result<()> {
        validate_address(&to, "recipient")?;
        let from_balance = self.balance_of(&from);
        require_balance(from_balance, amount)?;

        if from == to || amount == 0 {
            return Ok(());
        }

        let to_balance = safe_add(self.balance_of(&to), amount)?;
        self.set_balance(from, from_balance - amount);
        self.set_balance(to, to_balance);
        Ok(())
    }

    /// Move `amount` from `from` to `to` on behalf of `spender`, consuming allowance
    pub fn transfer_from(
        &mut self,
        spender: Address,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<()> {
        let allowance = self.allowance(&from, &spender);
        require_allowance(allowance, amount)?;

        self.transfer(from, to, amount)?;

        if allowance != UNLIMITED_ALLOWANCE {
            self.approve(from, spender, allowance - amount)?;
        }
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // SUPPLY
    // ═══════════════════════════════════════════════════════════════════════════

    /// Create `amount` new units for `to`
    pub fn mint(&mut self, to: Address, amount: Amount) -> Result<()> {
        validate_address(&to, "recipient")?;
        let new_supply = safe_add(self.total_supply, amount)?;
        let new_balance = safe_add(self.balance_of(&to), amount)?;

        self.set_balance(to, new_balance);
        self.total_supply = new_supply;
        Ok(())
    }

    /// Destroy `amount` units held by `from`
    pub fn burn(&mut self, from: Address, amount: Amount) -> Result<()> {
        let balance = self.balance_of(&from);
        require_balance(balance, amount)?;

        self.set_balance(from, balance - amount);
        self.total_supply = safe_sub(self.total_supply, amount)?;
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // INTERNAL
    // ═══════════════════════════════════════════════════════════════════════════

    fn set_balance(&mut self, account: Address, balance: Amount) {
        if balance == 0 {
            self.balances.remove(&account);
        } else {
            self.balances.insert(account, balance);
        }
    }
}
