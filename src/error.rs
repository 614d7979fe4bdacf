//! Error types for the Clearn protocol.
//!
//! Every error is a rejection of the whole operation: the state machine
//! restores the pre-call state before surfacing any of these to the caller.

use thiserror::Error;

/// Result type alias for Clearn operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the Clearn protocol
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // ═══════════════════════════════════════════════════════════════════
    // Authorization Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Caller lacks the required role (owner, minter, yield distributor)
    #[error("Not authorized: {0}")]
    Unauthorized(String),

    // ═══════════════════════════════════════════════════════════════════
    // Ledger Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Zero or otherwise out-of-domain amount
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Source account lacks the balance for the requested debit
    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance {
        /// Required amount
        required: u128,
        /// Available balance
        available: u128,
    },

    /// Spender lacks the pre-authorized allowance for the requested pull
    #[error("Insufficient allowance: required {required}, available {available}")]
    InsufficientAllowance {
        /// Required amount
        required: u128,
        /// Granted allowance
        available: u128,
    },

    // ═══════════════════════════════════════════════════════════════════
    // Staking Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Withdrawal exceeds the staker's recorded stake
    #[error("Insufficient stake: required {required}, staked {available}")]
    InsufficientStake {
        /// Requested withdrawal
        required: u128,
        /// Recorded stake
        available: u128,
    },

    /// Reward funding while nothing is staked
    #[error("Nobody Stake Actually")]
    NoStakers,

    // ═══════════════════════════════════════════════════════════════════
    // Treasury Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Collateral asset has no active price feed
    #[error("Asset not whitelisted: {0}")]
    AssetNotWhitelisted(String),

    /// Collateral asset has no ledger registered with the protocol
    #[error("Unknown asset: {0}")]
    UnknownAsset(String),

    /// Price lookup failed or returned a non-positive value
    #[error("Oracle unavailable: {0}")]
    OracleUnavailable(String),

    // ═══════════════════════════════════════════════════════════════════
    // Validation Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Invalid input parameter
    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter {
        /// Parameter name
        name: String,
        /// Reason for invalidity
        reason: String,
    },

    /// Overflow in calculation
    #[error("Arithmetic overflow in {operation}")]
    Overflow {
        /// Operation that overflowed
        operation: String,
    },

    /// Underflow in calculation
    #[error("Arithmetic underflow in {operation}")]
    Underflow {
        /// Operation that underflowed
        operation: String,
    },

    /// Invariant violation detected
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    // ═══════════════════════════════════════════════════════════════════
    // Serialization / Configuration Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Serialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization failed
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Configuration could not be loaded or is inconsistent
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Returns true if the caller can fix the condition and retry
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::InsufficientBalance { .. }
                | Error::InsufficientAllowance { .. }
                | Error::InsufficientStake { .. }
                | Error::NoStakers
                | Error::OracleUnavailable(_)
        )
    }

    /// Returns true if this is a critical error requiring immediate attention
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            Error::InvariantViolation(_) | Error::Overflow { .. } | Error::Underflow { .. }
        )
    }

    /// Returns the error code for external systems
    pub fn code(&self) -> u32 {
        match self {
            // Authorization errors: 1xxx
            Error::Unauthorized(_) => 1001,

            // Ledger errors: 2xxx
            Error::InvalidAmount(_) => 2001,
            Error::InsufficientBalance { .. } => 2002,
            Error::InsufficientAllowance { .. } => 2003,

            // Staking errors: 3xxx
            Error::InsufficientStake { .. } => 3001,
            Error::NoStakers => 3002,

            // Treasury errors: 4xxx
            Error::AssetNotWhitelisted(_) => 4001,
            Error::UnknownAsset(_) => 4002,
            Error::OracleUnavailable(_) => 4003,

            // Validation errors: 5xxx
            Error::InvalidParameter { .. } => 5001,
            Error::Overflow { .. } => 5002,
            Error::Underflow { .. } => 5003,
            Error::InvariantViolation(_) => 5004,

            // Serialization / configuration errors: 7xxx
            Error::Serialization(_) => 7001,
            Error::Deserialization(_) => 7002,
            Error::Config(_) => 7003,
        }
    }
}
