//! CLEARN credit token.
//!
//! This module implements the supply-controlled credit token:
//! - A single mutable minting authority, reassignable by the owner
//! - Minting and burning restricted to that authority
//! - Standard transfer / allowance operations for holders

use serde::{Deserialize, Serialize};

use crate::core::ledger::{Amount, Ledger};
use crate::error::{Error, Result};
use crate::utils::constants::*;
use crate::utils::crypto::Address;
use crate::utils::validation::*;

/// Revert reason for mint/burn from anyone but the minter
pub const NOT_MINTER: &str = "Not minter";

/// Revert reason for owner-only calls
pub const NOT_OWNER: &str = "Ownable: caller is not the owner";

// ═══════════════════════════════════════════════════════════════════════════════
// CREDIT TOKEN
// ═══════════════════════════════════════════════════════════════════════════════

/// The CLEARN credit token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditToken {
    /// Deployer; the only account allowed to reassign the minter
    owner: Address,
    /// Current minting authority, unset until the owner assigns one
    minter: Option<Address>,
    /// Backing balance ledger
    ledger: Ledger,
}

impl CreditToken {
    /// Create a new CLEARN token owned by `owner`, with no minter
    pub fn new(owner: Address) -> Self {
        Self::with_decimals(owner, CREDIT_DECIMALS)
    }

    /// Create a token with non-standard decimals
    pub fn with_decimals(owner: Address, decimals: u8) -> Self {
        Self {
            owner,
            minter: None,
            ledger: Ledger::new(CREDIT_NAME, CREDIT_SYMBOL, decimals),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // AUTHORITY
    // ═══════════════════════════════════════════════════════════════════════════

    /// Owner of the token
    pub fn owner(&self) -> Address {
        self.owner
    }

    /// Current minter, if any
    pub fn minter(&self) -> Option<Address> {
        self.minter
    }

    /// Assign the minting authority (owner only, overwrites unconditionally)
    pub fn set_minter(&mut self, caller: &Address, new_minter: Address) -> Result<()> {
        require_caller(caller, &self.owner, NOT_OWNER)?;
        validate_address(&new_minter, "minter")?;
        self.minter = Some(new_minter);
        Ok(())
    }

    fn require_minter(&self, caller: &Address) -> Result<()> {
        match self.minter {
            Some(minter) if minter == *caller => Ok(()),
            _ => Err(Error::Unauthorized(NOT_MINTER.into())),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // SUPPLY MANAGEMENT
    // ═══════════════════════════════════════════════════════════════════════════

    /// Credit `amount` new CLEARN to `to` (minter only)
    pub fn mint(&mut self, caller: &Address, to: Address, amount: Amount) -> Result<()> {
        self.require_minter(caller)?;
        self.ledger.mint(to, amount)
    }

    /// Debit `amount` CLEARN from `from` and destroy it (minter only)
    pub fn burn(&mut self, caller: &Address, from: Address, amount: Amount) -> Result<()> {
        self.require_minter(caller)?;
        self.ledger.burn(from, amount)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // HOLDER OPERATIONS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Transfer from the caller's own balance
    pub fn transfer(&mut self, caller: Address, to: Address, amount: Amount) -> Result<()> {
        self.ledger.transfer(caller, to, amount)
    }

    /// Let `spender` pull up to `amount` from the caller
    pub fn approve(&mut self, caller: Address, spender: Address, amount: Amount) -> Result<()> {
        self.ledger.approve(caller, spender, amount)
    }

    /// Pull `amount` from `from` to `to` using the caller's allowance
    pub fn transfer_from(
        &mut self,
        caller: Address,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<()> {
        self.ledger.transfer_from(caller, from, to, amount)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // QUERIES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Get total supply
    pub fn total_supply(&self) -> Amount {
        self.ledger.total_supply()
    }

    /// Get balance of an account
    pub fn balance_of(&self, account: &Address) -> Amount {
        self.ledger.balance_of(account)
    }

    /// Remaining allowance of `spender` over `owner`
    pub fn allowance(&self, owner: &Address, spender: &Address) -> Amount {
        self.ledger.allowance(owner, spender)
    }

    /// Decimal places
    pub fn decimals(&self) -> u8 {
        self.ledger.decimals
    }

    /// Token symbol
    pub fn symbol(&self) -> &str {
        &self.ledger.symbol
    }

    /// Number of holders
    pub fn holder_count(&self) -> usize {
        self.ledger.holder_count()
    }

    /// Verify supply invariant (total_supply == sum of all balances)
    pub fn verify_supply_invariant(&self) -> bool {
        self.ledger.verify_supply_invariant()
    }
}
