//! CLEARN staking pool with time-weighted reward accrual.
//!
//! Stakers lock CLEARN and earn the reward asset funded by the yield
//! distributor. Each funding opens a fixed-length emission window at a
//! constant per-second rate; a global reward-per-token accumulator (scaled by
//! [`WAD`]) spreads that emission over the stake in proportion to balance.
//!
//! ## Settlement
//!
//! Every mutating call first advances the accumulator to `now` and snapshots
//! the acting staker's earnings. [`RewardState::settled`] and
//! [`StakingPosition::settled`] are pure; the pool only commits their output.
//!
//! ## Emission states
//!
//! - **Idle**: `now >= period_finish`, nothing accrues
//! - **Emitting**: `now < period_finish`, `reward_rate` units per second

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::core::ledger::{Amount, Ledger};
use crate::core::token::{CreditToken, NOT_OWNER};
use crate::error::{Error, Result};
use crate::utils::constants::*;
use crate::utils::crypto::Address;
use crate::utils::math::*;
use crate::utils::validation::*;

/// Revert reason for a zero stake
pub const ZERO_STAKE: &str = "Stake must be more than 0";

/// Revert reason for a zero unstake
pub const ZERO_WITHDRAW: &str = "Withdraw must be more than 0";

/// Revert reason for funding before a distributor is assigned
pub const NO_DISTRIBUTOR: &str = "Owner need to Set YieldDistributor";

/// Revert reason for funding from anyone but the distributor
pub const NOT_DISTRIBUTOR: &str = "Only Yield Distributor";

/// Revert reason for a zero funding
pub const ZERO_REWARDS: &str = "Zero rewards";

// ═══════════════════════════════════════════════════════════════════════════════
// GLOBAL REWARD STATE
// ═══════════════════════════════════════════════════════════════════════════════

/// Global accrual record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardState {
    /// Total CLEARN staked
    pub total_staked: Amount,
    /// Reward units emitted per second
    pub reward_rate: Amount,
    /// End of the current emission window
    pub period_finish: u64,
    /// Last time `reward_per_token_stored` was advanced
    pub last_update_time: u64,
    /// Accumulated reward per staked unit, scaled by WAD
    pub reward_per_token_stored: u128,
}

impl RewardState {
    /// `min(now, period_finish)`
    pub fn last_time_reward_applicable(&self, now: u64) -> u64 {
        now.min(self.period_finish)
    }

    /// Accumulator value at `now`
    pub fn reward_per_token(&self, now: u64) -> Result<u128> {
        if self.total_staked == 0 {
            return Ok(self.reward_per_token_stored);
        }
        let elapsed = self
            .last_time_reward_applicable(now)
            .saturating_sub(self.last_update_time) as u128;
        let accrued = mul_div(safe_mul(elapsed, self.reward_rate)?, WAD, self.total_staked)?;
        safe_add(self.reward_per_token_stored, accrued)
    }

    /// State with the accumulator advanced to `now`
    pub fn settled(&self, now: u64) -> Result<Self> {
        Ok(Self {
            reward_per_token_stored: self.reward_per_token(now)?,
            last_update_time: self.last_time_reward_applicable(now),
            ..*self
        })
    }

    /// Whether rewards are currently being emitted
    pub fn emission_state(&self, now: u64) -> EmissionState {
        if now < self.period_finish {
            EmissionState::Emitting
        } else {
            EmissionState::Idle
        }
    }
}

/// Global emission phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmissionState {
    /// No active emission window
    Idle,
    /// Inside a funded window
    Emitting,
}

// ═══════════════════════════════════════════════════════════════════════════════
// STAKING POSITION
// ═══════════════════════════════════════════════════════════════════════════════

/// Per-staker record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakingPosition {
    /// Staked CLEARN (one unit = one reward share)
    pub staked: Amount,
    /// Settled, unpaid rewards
    pub rewards: Amount,
    /// Accumulator value at the last settlement
    pub reward_per_token_paid: u128,
}

impl StakingPosition {
    /// Rewards owed given the accumulator value `reward_per_token`
    pub fn earned(&self, reward_per_token: u128) -> Result<Amount> {
        let delta = safe_sub(reward_per_token, self.reward_per_token_paid)?;
        safe_add(mul_div(self.staked, delta, WAD)?, self.rewards)
    }

    /// Position with rewards snapshotted at `reward_per_token`
    pub fn settled(&self, reward_per_token: u128) -> Result<Self> {
        Ok(Self {
            rewards: self.earned(reward_per_token)?,
            reward_per_token_paid: reward_per_token,
            ..*self
        })
    }

    /// Staked or Unstaked
    pub fn is_staked(&self) -> bool {
        self.staked > 0
    }
}

/// Outcome of an unstake
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnstakeReceipt {
    /// CLEARN returned
    pub amount: Amount,
    /// Reward asset paid out
    pub reward_paid: Amount,
}

// ═══════════════════════════════════════════════════════════════════════════════
// STAKING POOL
// ═══════════════════════════════════════════════════════════════════════════════

/// The CLEARN staking pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakingPool {
    /// Pool account (custodies staked CLEARN and reward funds)
    address: Address,
    /// Owner allowed to assign the distributor
    owner: Address,
    /// Asset rewards are paid in
    reward_asset: Address,
    /// Sole account allowed to fund rewards
    yield_distributor: Option<Address>,
    /// Emission window length in seconds
    reward_period: u64,
    /// Global accrual record
    state: RewardState,
    /// Positions by staker; never removed
    positions: BTreeMap<Address, StakingPosition>,
}

impl StakingPool {
    /// Create a pool paying rewards in `reward_asset`
    pub fn new(address: Address, owner: Address, reward_asset: Address, reward_period: u64) -> Result<Self> {
        validate_address(&address, "staking_pool")?;
        if reward_period == 0 {
            return Err(Error::InvalidParameter {
                name: "reward_period".into(),
                reason: "must be greater than 0".into(),
            });
        }
        Ok(Self {
            address,
            owner,
            reward_asset,
            yield_distributor: None,
            reward_period,
            state: RewardState::default(),
            positions: BTreeMap::new(),
        })
    }

    /// Assign the yield distributor (owner only, overwrites)
    pub fn set_yield_distributor(&mut self, caller: &Address, distributor: Address) -> Result<()> {
        require_caller(caller, &self.owner, NOT_OWNER)?;
        validate_address(&distributor, "yield_distributor")?;
        self.yield_distributor = Some(distributor);
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // SETTLEMENT
    // ═══════════════════════════════════════════════════════════════════════════

    fn settle(&mut self, account: Option<&Address>, now: u64) -> Result<()> {
        let state = self.state.settled(now)?;
        let rpt = state.reward_per_token_stored;

        if let Some(account) = account {
            let position = self.positions.get(account).copied().unwrap_or_default();
            let position = position.settled(rpt)?;
            debug!(
                staker = %account.short(),
                rewards = position.rewards,
                reward_per_token = rpt,
                "Settled staker"
            );
            self.positions.insert(*account, position);
        }

        self.state = state;
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // STAKER OPERATIONS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Lock `amount` CLEARN from the caller.
    ///
    /// The caller must have approved the pool for at least `amount`.
    pub fn stake(&mut self, caller: Address, amount: Amount, credit: &mut CreditToken, now: u64) -> Result<()> {
        require_positive(amount, ZERO_STAKE)?;
        require_balance(credit.balance_of(&caller), amount)?;
        require_allowance(credit.allowance(&caller, &self.address), amount)?;

        self.settle(Some(&caller), now)?;

        credit.transfer_from(self.address, caller, self.address, amount)?;
        self.state.total_staked = safe_add(self.state.total_staked, amount)?;
        let position = self.positions.entry(caller).or_default();
        position.staked = safe_add(position.staked, amount)?;
        Ok(())
    }

    /// Unlock `amount` CLEARN and pay out every settled reward.
    ///
    /// `rewards` is the ledger of the reward asset. It is only needed when
    /// something is owed, so principal can always leave the pool.
    pub fn withdraw(
        &mut self,
        caller: Address,
        amount: Amount,
        credit: &mut CreditToken,
        rewards: Option<&mut Ledger>,
        now: u64,
    ) -> Result<UnstakeReceipt> {
        require_positive(amount, ZERO_WITHDRAW)?;
        let staked = self.balance_of(&caller);
        if staked < amount {
            return Err(Error::InsufficientStake {
                required: amount,
                available: staked,
            });
        }

        self.settle(Some(&caller), now)?;

        let reward_paid = self.position(&caller).rewards;
        if reward_paid > 0 && rewards.is_none() {
            return Err(Error::UnknownAsset(self.reward_asset.to_string()));
        }

        self.state.total_staked = safe_sub(self.state.total_staked, amount)?;
        let position = self.positions.entry(caller).or_default();
        position.staked = safe_sub(position.staked, amount)?;
        position.rewards = 0;

        credit.transfer(self.address, caller, amount)?;
        if let Some(rewards) = rewards.filter(|_| reward_paid > 0) {
            rewards.transfer(self.address, caller, reward_paid)?;
        }

        Ok(UnstakeReceipt {
            amount,
            reward_paid,
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // REWARD FUNDING
    // ═══════════════════════════════════════════════════════════════════════════

    /// Fund a new emission window with `amount` of the reward asset.
    ///
    /// The new rate replaces the old one: rewards still unemitted from an
    /// active window are not carried over.
    pub fn issuance_rate(&mut self, caller: Address, amount: Amount, rewards: &mut Ledger, now: u64) -> Result<()> {
        let distributor = self
            .yield_distributor
            .ok_or_else(|| Error::Unauthorized(NO_DISTRIBUTOR.into()))?;
        require_caller(&caller, &distributor, NOT_DISTRIBUTOR)?;
        require_positive(amount, ZERO_REWARDS)?;
        if self.state.total_staked == 0 {
            return Err(Error::NoStakers);
        }
        require_allowance(rewards.allowance(&caller, &self.address), amount)?;

        self.settle(None, now)?;

        rewards.transfer_from(self.address, caller, self.address, amount)?;
        self.state.reward_rate = amount / self.reward_period as u128;
        self.state.period_finish = now.checked_add(self.reward_period).ok_or(Error::Overflow {
            operation: "period_finish".into(),
        })?;
        self.state.last_update_time = now;

        debug!(
            reward_rate = self.state.reward_rate,
            period_finish = self.state.period_finish,
            "Reward period funded"
        );
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // QUERIES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Pool account
    pub fn address(&self) -> Address {
        self.address
    }

    /// Owner account
    pub fn owner(&self) -> Address {
        self.owner
    }

    /// Asset rewards are paid in
    pub fn reward_asset(&self) -> Address {
        self.reward_asset
    }

    /// Current yield distributor
    pub fn yield_distributor(&self) -> Option<Address> {
        self.yield_distributor
    }

    /// Global accrual record
    pub fn reward_state(&self) -> &RewardState {
        &self.state
    }

    /// Position of `account` (default if never staked)
    pub fn position(&self, account: &Address) -> StakingPosition {
        self.positions.get(account).copied().unwrap_or_default()
    }

    /// Accounts that have ever staked
    pub fn staker_count(&self) -> usize {
        self.positions.len()
    }

    /// Accounts currently staking a positive balance
    pub fn active_stakers(&self) -> usize {
        self.positions.values().filter(|p| p.is_staked()).count()
    }

    /// Staked CLEARN of `account` (its xCLEARN balance)
    pub fn balance_of(&self, account: &Address) -> Amount {
        self.position(account).staked
    }

    /// Total staked CLEARN
    pub fn total_supply(&self) -> Amount {
        self.state.total_staked
    }

    /// Accumulator value at `now`
    pub fn reward_per_token(&self, now: u64) -> Result<u128> {
        self.state.reward_per_token(now)
    }

    /// Rewards `account` would be paid at `now`
    pub fn earned(&self, account: &Address, now: u64) -> Result<Amount> {
        self.position(account).earned(self.reward_per_token(now)?)
    }

    /// Reward units emitted per second
    pub fn reward_rate(&self) -> Amount {
        self.state.reward_rate
    }

    /// End of the current emission window
    pub fn period_finish(&self) -> u64 {
        self.state.period_finish
    }

    /// Last accumulator update
    pub fn last_update_time(&self) -> u64 {
        self.state.last_update_time
    }

    /// Emission window length
    pub fn reward_period(&self) -> u64 {
        self.reward_period
    }

    /// Total emitted over one full window at the current rate
    pub fn reward_for_duration(&self) -> Result<Amount> {
        safe_mul(self.state.reward_rate, self.reward_period as u128)
    }

    /// Idle or Emitting at `now`
    pub fn emission_state(&self, now: u64) -> EmissionState {
        self.state.emission_state(now)
    }

    /// Verify `total_staked == sum(staked)`
    pub fn verify_stake_invariant(&self) -> bool {
        self.positions
            .values()
            .try_fold(0u128, |acc, p| acc.checked_add(p.staked))
            .map(|sum| sum == self.state.total_staked)
            .unwrap_or(false)
    }
}
