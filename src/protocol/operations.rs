//! Protocol operations - atomic state changes.
//!
//! Every caller-facing entry point of the token, Treasury and staking pool
//! is one [`ProtocolOperation`]. The state machine executes each one
//! atomically on behalf of a caller.

use serde::{Deserialize, Serialize};

use crate::core::ledger::Amount;
use crate::core::staking::UnstakeReceipt;
use crate::core::treasury::{DepositReceipt, WithdrawReceipt};
use crate::utils::crypto::Address;

// ═══════════════════════════════════════════════════════════════════════════════
// OPERATIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// All possible protocol operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolOperation {
    // Credit token
    /// Reassign the CLEARN minter (token owner only)
    SetMinter {
        /// New minting authority
        minter: Address,
    },
    /// Transfer CLEARN from the caller
    TransferCredit {
        /// Recipient
        to: Address,
        /// Amount in CLEARN base units
        amount: Amount,
    },
    /// Approve a CLEARN spender
    ApproveCredit {
        /// Spender
        spender: Address,
        /// New allowance
        amount: Amount,
    },
    /// Spend a CLEARN allowance granted to the caller
    TransferCreditFrom {
        /// Debited account
        from: Address,
        /// Recipient
        to: Address,
        /// Amount in CLEARN base units
        amount: Amount,
    },

    // Collateral assets
    /// Approve a spender on a collateral asset
    ApproveAsset {
        /// Collateral asset
        asset: Address,
        /// Spender
        spender: Address,
        /// New allowance
        amount: Amount,
    },
    /// Transfer a collateral asset from the caller
    TransferAsset {
        /// Collateral asset
        asset: Address,
        /// Recipient
        to: Address,
        /// Amount in asset base units
        amount: Amount,
    },

    // Treasury
    /// Whitelist a collateral asset (Treasury owner only)
    AddTokenInfo {
        /// Collateral asset
        asset: Address,
        /// Oracle feed pricing it
        price_feed: Address,
    },
    /// Remove a collateral asset from the whitelist (Treasury owner only)
    RemoveTokenInfo {
        /// Collateral asset
        asset: Address,
    },
    /// Deposit collateral for CLEARN
    Deposit {
        /// Collateral asset
        asset: Address,
        /// Amount in asset base units
        amount: Amount,
    },
    /// Redeem CLEARN for collateral
    Withdraw {
        /// Collateral asset to receive
        asset: Address,
        /// CLEARN to burn
        credit_amount: Amount,
    },

    // Staking
    /// Assign the yield distributor (pool owner only)
    SetYieldDistributor {
        /// New distributor
        distributor: Address,
    },
    /// Stake CLEARN
    Stake {
        /// Amount in CLEARN base units
        amount: Amount,
    },
    /// Unstake CLEARN and collect rewards
    Unstake {
        /// Amount in CLEARN base units
        amount: Amount,
    },
    /// Fund a new reward period (yield distributor only)
    IssuanceRate {
        /// Reward asset amount
        amount: Amount,
    },
}

impl ProtocolOperation {
    /// Get the operation type name
    pub fn operation_type(&self) -> &'static str {
        match self {
            Self::SetMinter { .. } => "SetMinter",
            Self::TransferCredit { .. } => "TransferCredit",
            Self::ApproveCredit { .. } => "ApproveCredit",
            Self::TransferCreditFrom { .. } => "TransferCreditFrom",
            Self::ApproveAsset { .. } => "ApproveAsset",
            Self::TransferAsset { .. } => "TransferAsset",
            Self::AddTokenInfo { .. } => "AddTokenInfo",
            Self::RemoveTokenInfo { .. } => "RemoveTokenInfo",
            Self::Deposit { .. } => "Deposit",
            Self::Withdraw { .. } => "Withdraw",
            Self::SetYieldDistributor { .. } => "SetYieldDistributor",
            Self::Stake { .. } => "Stake",
            Self::Unstake { .. } => "Unstake",
            Self::IssuanceRate { .. } => "IssuanceRate",
        }
    }

    /// Whether the operation consults the price oracle
    pub fn requires_price(&self) -> bool {
        matches!(self, Self::Deposit { .. } | Self::Withdraw { .. })
    }

    /// Whether the operation touches the staking accumulator
    pub fn settles_rewards(&self) -> bool {
        matches!(
            self,
            Self::Stake { .. } | Self::Unstake { .. } | Self::IssuanceRate { .. }
        )
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TRANSACTIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// An operation submitted by `caller` at `timestamp`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Acting account
    pub caller: Address,
    /// Execution time (unix seconds); must not precede the protocol clock
    pub timestamp: u64,
    /// What to do
    pub operation: ProtocolOperation,
}

impl Transaction {
    /// Create a transaction
    pub fn new(caller: Address, timestamp: u64, operation: ProtocolOperation) -> Self {
        Self {
            caller,
            timestamp,
            operation,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RESULTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Result of a committed operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationResult {
    /// Committed with nothing further to report
    Done,
    /// Collateral deposited, CLEARN minted
    Deposited(DepositReceipt),
    /// CLEARN burned, collateral returned
    Withdrawn(WithdrawReceipt),
    /// CLEARN staked
    Staked {
        /// Amount staked
        amount: Amount,
        /// Caller's stake afterwards
        new_balance: Amount,
    },
    /// CLEARN unstaked and rewards paid
    Unstaked(UnstakeReceipt),
    /// Reward period funded
    RewardsFunded {
        /// Funded amount
        amount: Amount,
        /// New per-second rate
        reward_rate: Amount,
        /// End of the new window
        period_finish: u64,
    },
}
