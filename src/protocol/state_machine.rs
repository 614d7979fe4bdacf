//! Protocol State Machine - Core orchestration engine.
//!
//! The state machine owns every ledger and component, the injected price
//! oracle and the execution clock. It runs each operation atomically: the
//! whole state is snapshotted before the call and restored if anything in
//! it fails, so a rejected operation leaves the state byte-for-byte intact.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, error, info, warn};

use crate::core::config::ProtocolParams;
use crate::core::ledger::{Amount, Ledger};
use crate::core::staking::StakingPool;
use crate::core::token::CreditToken;
use crate::core::treasury::{Pricing, Treasury};
use crate::error::{Error, Result};
use crate::oracle::PriceOracle;
use crate::protocol::events::*;
use crate::protocol::operations::*;
use crate::utils::crypto::{Address, Hash};
use crate::utils::validation::*;

// ═══════════════════════════════════════════════════════════════════════════════
// DEPLOYMENT
// ═══════════════════════════════════════════════════════════════════════════════

/// Accounts fixed at deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    /// Deployer; owns the token, Treasury and staking pool
    pub owner: Address,
    /// Treasury account
    pub treasury: Address,
    /// Staking pool account
    pub staking_pool: Address,
    /// Yield source receiving collateral
    pub yield_source: Address,
    /// Asset staking rewards are paid in
    pub reward_asset: Address,
}

impl Deployment {
    /// Deterministic accounts derived from fixed labels
    pub fn labelled() -> Self {
        Self {
            owner: Address::from_label("owner"),
            treasury: Address::from_label("treasury"),
            staking_pool: Address::from_label("staking"),
            yield_source: Address::from_label("strategy-hub"),
            reward_asset: Address::from_label("usdc"),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PROTOCOL STATE
// ═══════════════════════════════════════════════════════════════════════════════

/// Complete mutable protocol state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolState {
    /// Parameters fixed at deployment
    pub params: ProtocolParams,
    /// Execution clock (unix seconds)
    pub now: u64,
    /// The CLEARN token
    pub credit: CreditToken,
    /// Collateral and reward asset ledgers
    pub assets: BTreeMap<Address, Ledger>,
    /// Collateral Treasury
    pub treasury: Treasury,
    /// CLEARN staking pool
    pub staking: StakingPool,
}

/// Balances of one account across the protocol
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSummary {
    /// Account
    pub account: Address,
    /// Liquid CLEARN
    pub clearn: Amount,
    /// Staked CLEARN
    pub staked: Amount,
    /// Rewards claimable now
    pub earned: Amount,
    /// Asset balances by symbol
    pub assets: BTreeMap<String, Amount>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// STATE MACHINE
// ═══════════════════════════════════════════════════════════════════════════════

/// Protocol state machine - orchestrates all operations
pub struct ClearnProtocol<O: PriceOracle> {
    state: ProtocolState,
    oracle: O,
    events: EventLog,
}

impl<O: PriceOracle> ClearnProtocol<O> {
    /// Deploy the token, Treasury and staking pool and hand the minter role
    /// to the Treasury.
    pub fn deploy(params: ProtocolParams, deployment: Deployment, oracle: O, now: u64) -> Result<Self> {
        params.validate()?;
        validate_address(&deployment.owner, "owner")?;

        let mut credit = CreditToken::with_decimals(deployment.owner, params.credit_decimals);
        let treasury = Treasury::new(
            deployment.treasury,
            deployment.owner,
            &credit,
            deployment.yield_source,
        )?;
        let staking = StakingPool::new(
            deployment.staking_pool,
            deployment.owner,
            deployment.reward_asset,
            params.reward_period_secs,
        )?;
        credit.set_minter(&deployment.owner, deployment.treasury)?;

        let mut events = EventLog::with_capacity(params.max_events);
        events.push(
            now,
            ProtocolEvent::MinterChanged {
                minter: deployment.treasury,
            },
        );

        info!(
            treasury = %deployment.treasury.short(),
            staking = %deployment.staking_pool.short(),
            reward_period = params.reward_period_secs,
            "Protocol deployed"
        );

        Ok(Self {
            state: ProtocolState {
                params,
                now,
                credit,
                assets: BTreeMap::new(),
                treasury,
                staking,
            },
            oracle,
            events,
        })
    }

    /// Resume from a previously exported state
    pub fn from_state(state: ProtocolState, oracle: O) -> Result<Self> {
        state.params.validate()?;
        let events = EventLog::with_capacity(state.params.max_events);
        let protocol = Self {
            state,
            oracle,
            events,
        };
        protocol.verify_invariants()?;
        Ok(protocol)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // ENVIRONMENT
    // ═══════════════════════════════════════════════════════════════════════════

    /// Register the ledger of an external asset
    pub fn register_asset(&mut self, asset: Address, ledger: Ledger) -> Result<()> {
        validate_address(&asset, "asset")?;
        validate_decimals(ledger.decimals, "asset decimals")?;
        if self.state.assets.contains_key(&asset) {
            return Err(Error::InvalidParameter {
                name: "asset".into(),
                reason: format!("{} already registered", asset),
            });
        }
        debug!(asset = %asset.short(), symbol = %ledger.symbol, "Asset registered");
        self.state.assets.insert(asset, ledger);
        Ok(())
    }

    /// Issue external asset balance to `to` (stands in for the asset's own issuer)
    pub fn fund(&mut self, asset: &Address, to: Address, amount: Amount) -> Result<()> {
        let ledger = self.asset_mut(asset)?;
        ledger.mint(to, amount)?;
        let symbol = ledger.symbol.clone();
        self.events.push(
            self.state.now,
            ProtocolEvent::Transfer {
                symbol,
                from: Address::ZERO,
                to,
                amount,
            },
        );
        Ok(())
    }

    /// Move the clock to `timestamp`; time never runs backwards
    pub fn advance_time(&mut self, timestamp: u64) -> Result<()> {
        if timestamp < self.state.now {
            return Err(Error::InvalidParameter {
                name: "timestamp".into(),
                reason: format!("{} precedes current time {}", timestamp, self.state.now),
            });
        }
        self.state.now = timestamp;
        Ok(())
    }

    /// Move the clock forward by `seconds`
    pub fn advance_by(&mut self, seconds: u64) -> Result<()> {
        let target = self.state.now.checked_add(seconds).ok_or(Error::Overflow {
            operation: "clock".into(),
        })?;
        self.advance_time(target)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // OPERATION EXECUTION
    // ═══════════════════════════════════════════════════════════════════════════

    /// Advance to the transaction's time and execute it
    pub fn submit(&mut self, tx: Transaction) -> Result<OperationResult> {
        self.advance_time(tx.timestamp)?;
        self.execute(tx.caller, tx.operation)
    }

    /// Execute a protocol operation on behalf of `caller`.
    ///
    /// Commits fully or not at all.
    pub fn execute(&mut self, caller: Address, op: ProtocolOperation) -> Result<OperationResult> {
        let op_type = op.operation_type();
        let snapshot = self.state.clone();
        let mut pending = Vec::new();

        match self.apply(caller, op, &mut pending) {
            Ok(result) => {
                let now = self.state.now;
                for event in pending {
                    self.events.push(now, event);
                }
                info!(op = op_type, caller = %caller.short(), now, "Operation committed");
                Ok(result)
            }
            Err(e) => {
                self.state = snapshot;
                if e.is_critical() {
                    error!(op = op_type, caller = %caller.short(), code = e.code(), error = %e, "Operation failed");
                } else {
                    warn!(op = op_type, caller = %caller.short(), code = e.code(), error = %e, "Operation rejected");
                }
                Err(e)
            }
        }
    }

    fn apply(
        &mut self,
        caller: Address,
        op: ProtocolOperation,
        events: &mut Vec<ProtocolEvent>,
    ) -> Result<OperationResult> {
        let ProtocolState {
            params,
            now,
            credit,
            assets,
            treasury,
            staking,
        } = &mut self.state;
        let now = *now;

        match op {
            // ─────────────────────────────────────────────────────────────────
            // Credit token
            // ─────────────────────────────────────────────────────────────────
            ProtocolOperation::SetMinter { minter } => {
                credit.set_minter(&caller, minter)?;
                events.push(ProtocolEvent::MinterChanged { minter });
            }
            ProtocolOperation::TransferCredit { to, amount } => {
                credit.transfer(caller, to, amount)?;
                events.push(transfer_event(credit.symbol(), caller, to, amount));
            }
            ProtocolOperation::ApproveCredit { spender, amount } => {
                credit.approve(caller, spender, amount)?;
                events.push(approval_event(credit.symbol(), caller, spender, amount));
            }
            ProtocolOperation::TransferCreditFrom { from, to, amount } => {
                credit.transfer_from(caller, from, to, amount)?;
                events.push(transfer_event(credit.symbol(), from, to, amount));
            }

            // ─────────────────────────────────────────────────────────────────
            // Collateral assets
            // ─────────────────────────────────────────────────────────────────
            ProtocolOperation::ApproveAsset {
                asset,
                spender,
                amount,
            } => {
                let ledger = lookup(assets, &asset)?;
                ledger.approve(caller, spender, amount)?;
                events.push(approval_event(&ledger.symbol, caller, spender, amount));
            }
            ProtocolOperation::TransferAsset { asset, to, amount } => {
                let ledger = lookup(assets, &asset)?;
                ledger.transfer(caller, to, amount)?;
                events.push(transfer_event(&ledger.symbol, caller, to, amount));
            }

            // ─────────────────────────────────────────────────────────────────
            // Treasury
            // ─────────────────────────────────────────────────────────────────
            ProtocolOperation::AddTokenInfo { asset, price_feed } => {
                treasury.add_token_info(&caller, asset, price_feed)?;
                events.push(ProtocolEvent::AssetWhitelisted { asset, price_feed });
            }
            ProtocolOperation::RemoveTokenInfo { asset } => {
                treasury.remove_token_info(&caller, &asset)?;
                events.push(ProtocolEvent::AssetRemoved { asset });
            }
            ProtocolOperation::Deposit { asset, amount } => {
                let collateral = collateral_ledger(treasury, assets, &asset, amount)?;
                let pricing = Pricing::new(&self.oracle, now).with_max_age(params.max_price_age_secs);
                let receipt = treasury.deposit(caller, &asset, amount, collateral, credit, &pricing)?;

                events.push(ProtocolEvent::CollateralDeposited {
                    account: caller,
                    asset,
                    collateral_amount: receipt.collateral_amount,
                    credit_amount: receipt.credit_amount,
                    price: receipt.price,
                });
                events.push(ProtocolEvent::Minted {
                    to: caller,
                    amount: receipt.credit_amount,
                });
                return Ok(OperationResult::Deposited(receipt));
            }
            ProtocolOperation::Withdraw {
                asset,
                credit_amount,
            } => {
                let collateral = collateral_ledger(treasury, assets, &asset, credit_amount)?;
                let pricing = Pricing::new(&self.oracle, now).with_max_age(params.max_price_age_secs);
                let receipt =
                    treasury.withdraw(caller, &asset, credit_amount, collateral, credit, &pricing)?;

                events.push(ProtocolEvent::CollateralRedeemed {
                    account: caller,
                    asset,
                    credit_amount: receipt.credit_amount,
                    collateral_amount: receipt.collateral_amount,
                    price: receipt.price,
                });
                events.push(ProtocolEvent::Burned {
                    from: caller,
                    amount: receipt.credit_amount,
                });
                return Ok(OperationResult::Withdrawn(receipt));
            }

            // ─────────────────────────────────────────────────────────────────
            // Staking
            // ─────────────────────────────────────────────────────────────────
            ProtocolOperation::SetYieldDistributor { distributor } => {
                staking.set_yield_distributor(&caller, distributor)?;
                events.push(ProtocolEvent::YieldDistributorSet { distributor });
            }
            ProtocolOperation::Stake { amount } => {
                staking.stake(caller, amount, credit, now)?;
                events.push(ProtocolEvent::Staked {
                    account: caller,
                    amount,
                });
                return Ok(OperationResult::Staked {
                    amount,
                    new_balance: staking.balance_of(&caller),
                });
            }
            ProtocolOperation::Unstake { amount } => {
                let rewards = assets.get_mut(&staking.reward_asset());
                let receipt = staking.withdraw(caller, amount, credit, rewards, now)?;
                events.push(ProtocolEvent::Unstaked {
                    account: caller,
                    amount: receipt.amount,
                    reward_paid: receipt.reward_paid,
                });
                return Ok(OperationResult::Unstaked(receipt));
            }
            ProtocolOperation::IssuanceRate { amount } => {
                let rewards = lookup(assets, &staking.reward_asset())?;
                staking.issuance_rate(caller, amount, rewards, now)?;
                events.push(ProtocolEvent::RewardsFunded {
                    distributor: caller,
                    amount,
                    reward_rate: staking.reward_rate(),
                    period_finish: staking.period_finish(),
                });
                return Ok(OperationResult::RewardsFunded {
                    amount,
                    reward_rate: staking.reward_rate(),
                    period_finish: staking.period_finish(),
                });
            }
        }

        Ok(OperationResult::Done)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // QUERIES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Current protocol time
    pub fn now(&self) -> u64 {
        self.state.now
    }

    /// Protocol parameters
    pub fn params(&self) -> &ProtocolParams {
        &self.state.params
    }

    /// Full state
    pub fn state(&self) -> &ProtocolState {
        &self.state
    }

    /// The CLEARN token
    pub fn credit(&self) -> &CreditToken {
        &self.state.credit
    }

    /// The Treasury
    pub fn treasury(&self) -> &Treasury {
        &self.state.treasury
    }

    /// The staking pool
    pub fn staking(&self) -> &StakingPool {
        &self.state.staking
    }

    /// Ledger of `asset`, if registered
    pub fn asset(&self, asset: &Address) -> Option<&Ledger> {
        self.state.assets.get(asset)
    }

    /// The injected oracle
    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    /// Mutable oracle access (for operator-driven price updates)
    pub fn oracle_mut(&mut self) -> &mut O {
        &mut self.oracle
    }

    /// Committed events
    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Rewards `account` could collect now
    pub fn earned(&self, account: &Address) -> Result<Amount> {
        self.state.staking.earned(account, self.state.now)
    }

    /// Accumulator value now
    pub fn reward_per_token(&self) -> Result<u128> {
        self.state.staking.reward_per_token(self.state.now)
    }

    /// CLEARN minted for depositing `amount` of `asset` at the current price
    pub fn quote_deposit(&self, asset: &Address, amount: Amount) -> Result<Amount> {
        let ledger = self.asset_ref(asset)?;
        let (credit, _) = self
            .state
            .treasury
            .quote_deposit(asset, ledger.decimals, amount, &self.pricing())?;
        Ok(credit)
    }

    /// Collateral returned for redeeming `credit_amount` CLEARN into `asset`
    pub fn quote_withdraw(&self, asset: &Address, credit_amount: Amount) -> Result<Amount> {
        let ledger = self.asset_ref(asset)?;
        let (collateral, _) = self
            .state
            .treasury
            .quote_withdraw(asset, ledger.decimals, credit_amount, &self.pricing())?;
        Ok(collateral)
    }

    /// Balances of `account` across the protocol
    pub fn account_summary(&self, account: &Address) -> Result<AccountSummary> {
        let assets = self
            .state
            .assets
            .values()
            .map(|ledger| (ledger.symbol.clone(), ledger.balance_of(account)))
            .collect();

        Ok(AccountSummary {
            account: *account,
            clearn: self.state.credit.balance_of(account),
            staked: self.state.staking.balance_of(account),
            earned: self.earned(account)?,
            assets,
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // STATE INTEGRITY
    // ═══════════════════════════════════════════════════════════════════════════

    /// Serialize the full state with bincode
    pub fn export_state(&self) -> Result<Vec<u8>> {
        bincode::serialize(&self.state).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// SHA-256 digest of the serialized state
    pub fn state_hash(&self) -> Result<Hash> {
        Ok(Hash::sha256(&self.export_state()?))
    }

    /// Check every cross-component accounting invariant
    pub fn verify_invariants(&self) -> Result<()> {
        let state = &self.state;

        if !state.credit.verify_supply_invariant() {
            return Err(Error::InvariantViolation(
                "CLEARN total supply differs from sum of balances".into(),
            ));
        }
        for (asset, ledger) in &state.assets {
            if !ledger.verify_supply_invariant() {
                return Err(Error::InvariantViolation(format!(
                    "{} ({}) total supply differs from sum of balances",
                    ledger.symbol, asset
                )));
            }
        }
        if !state.staking.verify_stake_invariant() {
            return Err(Error::InvariantViolation(
                "total staked differs from sum of positions".into(),
            ));
        }
        let custody = state.credit.balance_of(&state.staking.address());
        if custody < state.staking.total_supply() {
            return Err(Error::InvariantViolation(format!(
                "staking pool holds {} CLEARN but owes {}",
                custody,
                state.staking.total_supply()
            )));
        }
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // INTERNAL
    // ═══════════════════════════════════════════════════════════════════════════

    fn pricing(&self) -> Pricing<'_> {
        Pricing::new(&self.oracle, self.state.now).with_max_age(self.state.params.max_price_age_secs)
    }

    fn asset_ref(&self, asset: &Address) -> Result<&Ledger> {
        self.state
            .assets
            .get(asset)
            .ok_or_else(|| Error::UnknownAsset(asset.to_string()))
    }

    fn asset_mut(&mut self, asset: &Address) -> Result<&mut Ledger> {
        lookup(&mut self.state.assets, asset)
    }
}

fn lookup<'a>(assets: &'a mut BTreeMap<Address, Ledger>, asset: &Address) -> Result<&'a mut Ledger> {
    assets
        .get_mut(asset)
        .ok_or_else(|| Error::UnknownAsset(asset.to_string()))
}

/// Ledger of `asset` for a Treasury call. Request errors (zero amount, no
/// active feed) win over a missing ledger.
fn collateral_ledger<'a>(
    treasury: &Treasury,
    assets: &'a mut BTreeMap<Address, Ledger>,
    asset: &Address,
    amount: Amount,
) -> Result<&'a mut Ledger> {
    match assets.get_mut(asset) {
        Some(ledger) => Ok(ledger),
        None => {
            treasury.admit(asset, amount)?;
            Err(Error::UnknownAsset(asset.to_string()))
        }
    }
}

fn transfer_event(symbol: &str, from: Address, to: Address, amount: Amount) -> ProtocolEvent {
    ProtocolEvent::Transfer {
        symbol: symbol.to_string(),
        from,
        to,
        amount,
    }
}

fn approval_event(symbol: &str, owner: Address, spender: Address, amount: Amount) -> ProtocolEvent {
    ProtocolEvent::Approval {
        symbol: symbol.to_string(),
        owner,
        spender,
        amount,
    }
}
