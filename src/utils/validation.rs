//! Input validation utilities for the Clearn protocol.
//!
//! This module provides validation functions to ensure inputs meet
//! protocol requirements before any state is touched.

use crate::error::{Error, Result};
use crate::utils::constants::MAX_DECIMALS;
use crate::utils::crypto::Address;

// ═══════════════════════════════════════════════════════════════════════════════
// AMOUNT VALIDATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Validate that an amount is non-zero; `reason` becomes the error message
pub fn require_positive(amount: u128, reason: &str) -> Result<()> {
    if amount == 0 {
        return Err(Error::InvalidAmount(reason.to_string()));
    }
    Ok(())
}

/// Validate that `available` covers `required` as a ledger balance
pub fn require_balance(available: u128, required: u128) -> Result<()> {
    if available < required {
        return Err(Error::InsufficientBalance {
            required,
            available,
        });
    }
    Ok(())
}

/// Validate that `available` covers `required` as a spending allowance
pub fn require_allowance(available: u128, required: u128) -> Result<()> {
    if available < required {
        return Err(Error::InsufficientAllowance {
            required,
            available,
        });
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// AUTHORIZATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Validate that `caller` is the stored authority
pub fn require_caller(caller: &Address, authority: &Address, reason: &str) -> Result<()> {
    if caller != authority {
        return Err(Error::Unauthorized(reason.to_string()));
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// PARAMETER VALIDATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Validate a decimals value fits the u128 fixed-point model
pub fn validate_decimals(decimals: u8, name: &str) -> Result<()> {
    if decimals > MAX_DECIMALS {
        return Err(Error::InvalidParameter {
            name: name.to_string(),
            reason: format!("{} decimals exceeds maximum {}", decimals, MAX_DECIMALS),
        });
    }
    Ok(())
}

/// Validate that an address is set
pub fn validate_address(address: &Address, name: &str) -> Result<()> {
    if address.is_zero() {
        return Err(Error::InvalidParameter {
            name: name.to_string(),
            reason: "zero address".into(),
        });
    }
    Ok(())
}
