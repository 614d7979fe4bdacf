//! Protocol events for state change notifications.
//!
//! Events are recorded for every committed state change, in commit order.
//! Rejected operations record nothing.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::core::ledger::Amount;
use crate::error::{Error, Result};
use crate::oracle::PriceData;
use crate::utils::constants::DEFAULT_MAX_EVENTS;
use crate::utils::crypto::{Address, Hash};

// ═══════════════════════════════════════════════════════════════════════════════
// EVENT TYPES
// ═══════════════════════════════════════════════════════════════════════════════

/// All protocol event types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProtocolEvent {
    // Token Events
    /// CLEARN minter reassigned
    MinterChanged {
        /// New minter
        minter: Address,
    },
    /// CLEARN minted
    Minted {
        /// Recipient
        to: Address,
        /// Amount
        amount: Amount,
    },
    /// CLEARN burned
    Burned {
        /// Debited account
        from: Address,
        /// Amount
        amount: Amount,
    },
    /// Balance moved on a ledger
    Transfer {
        /// Ledger symbol
        symbol: String,
        /// Sender
        from: Address,
        /// Recipient
        to: Address,
        /// Amount
        amount: Amount,
    },
    /// Allowance set on a ledger
    Approval {
        /// Ledger symbol
        symbol: String,
        /// Granting account
        owner: Address,
        /// Spender
        spender: Address,
        /// New allowance
        amount: Amount,
    },

    // Treasury Events
    /// Collateral asset whitelisted
    AssetWhitelisted {
        /// Asset
        asset: Address,
        /// Price feed
        price_feed: Address,
    },
    /// Collateral asset removed from the whitelist
    AssetRemoved {
        /// Asset
        asset: Address,
    },
    /// Collateral deposited for CLEARN
    CollateralDeposited {
        /// Depositor
        account: Address,
        /// Asset
        asset: Address,
        /// Collateral forwarded to the yield source
        collateral_amount: Amount,
        /// CLEARN minted
        credit_amount: Amount,
        /// Valuation price
        price: PriceData,
    },
    /// CLEARN redeemed for collateral
    CollateralRedeemed {
        /// Redeemer
        account: Address,
        /// Asset
        asset: Address,
        /// CLEARN burned
        credit_amount: Amount,
        /// Collateral returned
        collateral_amount: Amount,
        /// Valuation price
        price: PriceData,
    },

    // Staking Events
    /// Yield distributor assigned
    YieldDistributorSet {
        /// New distributor
        distributor: Address,
    },
    /// CLEARN staked
    Staked {
        /// Staker
        account: Address,
        /// Amount
        amount: Amount,
    },
    /// CLEARN unstaked
    Unstaked {
        /// Staker
        account: Address,
        /// Amount
        amount: Amount,
        /// Rewards paid with the withdrawal
        reward_paid: Amount,
    },
    /// New reward period funded
    RewardsFunded {
        /// Distributor
        distributor: Address,
        /// Funded amount
        amount: Amount,
        /// New per-second rate
        reward_rate: Amount,
        /// End of the window
        period_finish: u64,
    },
}

impl ProtocolEvent {
    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::MinterChanged { .. } => "MinterChanged",
            Self::Minted { .. } => "Minted",
            Self::Burned { .. } => "Burned",
            Self::Transfer { .. } => "Transfer",
            Self::Approval { .. } => "Approval",
            Self::AssetWhitelisted { .. } => "AssetWhitelisted",
            Self::AssetRemoved { .. } => "AssetRemoved",
            Self::CollateralDeposited { .. } => "CollateralDeposited",
            Self::CollateralRedeemed { .. } => "CollateralRedeemed",
            Self::YieldDistributorSet { .. } => "YieldDistributorSet",
            Self::Staked { .. } => "Staked",
            Self::Unstaked { .. } => "Unstaked",
            Self::RewardsFunded { .. } => "RewardsFunded",
        }
    }
}

/// An event with its position and time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Monotonic sequence number
    pub sequence: u64,
    /// Protocol time when the event was committed
    pub timestamp: u64,
    /// The event
    pub event: ProtocolEvent,
}

impl EventRecord {
    /// SHA-256 digest of the bincode-encoded record
    pub fn hash(&self) -> Result<Hash> {
        let data = bincode::serialize(self).map_err(|e| Error::Serialization(e.to_string()))?;
        Ok(Hash::sha256(&data))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// EVENT LOG
// ═══════════════════════════════════════════════════════════════════════════════

/// Bounded in-memory event history; the oldest records are dropped first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLog {
    records: VecDeque<EventRecord>,
    max_events: usize,
    next_sequence: u64,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLog {
    /// Create an empty log with the default bound
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_EVENTS)
    }

    /// Create an empty log keeping at most `max_events` records
    pub fn with_capacity(max_events: usize) -> Self {
        Self {
            records: VecDeque::new(),
            max_events: max_events.max(1),
            next_sequence: 0,
        }
    }

    /// Record an event
    pub fn push(&mut self, timestamp: u64, event: ProtocolEvent) {
        if self.records.len() == self.max_events {
            self.records.pop_front();
        }
        self.records.push_back(EventRecord {
            sequence: self.next_sequence,
            timestamp,
            event,
        });
        self.next_sequence += 1;
    }

    /// All retained records, oldest first
    pub fn records(&self) -> impl Iterator<Item = &EventRecord> {
        self.records.iter()
    }

    /// Get events of a specific type
    pub fn filter_by_type(&self, event_type: &str) -> Vec<&EventRecord> {
        self.records
            .iter()
            .filter(|r| r.event.event_type() == event_type)
            .collect()
    }

    /// Records with `sequence >= from`
    pub fn since(&self, from: u64) -> Vec<&EventRecord> {
        self.records.iter().filter(|r| r.sequence >= from).collect()
    }

    /// Most recent record
    pub fn latest(&self) -> Option<&EventRecord> {
        self.records.back()
    }

    /// Sequence number the next event will get
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    /// Get the number of retained events
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Clear all events (sequence numbers keep counting)
    pub fn clear(&mut self) {
        self.records.clear();
    }
}
