//! Protocol constants and magic numbers.
//!
//! All protocol-wide constants are defined here for easy auditing and modification.

// ═══════════════════════════════════════════════════════════════════════════════
// CREDIT TOKEN CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// CLEARN decimals
pub const CREDIT_DECIMALS: u8 = 18;

/// CLEARN token name
pub const CREDIT_NAME: &str = "Clearn";

/// CLEARN token symbol
pub const CREDIT_SYMBOL: &str = "CLEARN";

/// Fixed-point scale used for reward-per-token accounting (10^18)
pub const WAD: u128 = 1_000_000_000_000_000_000;

// ═══════════════════════════════════════════════════════════════════════════════
// COLLATERAL CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Decimals of USDC, the reference collateral asset
pub const USDC_DECIMALS: u8 = 6;

/// Largest decimals value accepted anywhere (10^38 is the first power of ten
/// that no longer fits in a u128)
pub const MAX_DECIMALS: u8 = 38;

// ═══════════════════════════════════════════════════════════════════════════════
// STAKING CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Seconds in a day
pub const SECONDS_PER_DAY: u64 = 86_400;

/// Reward emission window: 30 days
pub const REWARD_PERIOD_SECS: u64 = 30 * SECONDS_PER_DAY;

// ═══════════════════════════════════════════════════════════════════════════════
// BOOKKEEPING CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Token events kept in memory per ledger
pub const DEFAULT_MAX_EVENTS: usize = 1_000;

/// Length of an account / asset address in bytes
pub const ADDRESS_LENGTH: usize = 20;

/// Length of a hash in bytes (SHA256)
pub const HASH_LENGTH: usize = 32;
