//! Scenario replay.
//!
//! A [`Scenario`] describes a deployment, its external assets and prices and
//! an ordered list of transactions. Running it against a fresh protocol
//! yields a [`ScenarioReport`] with every step's outcome and the final
//! balances, so whole user journeys can be described in JSON and replayed
//! deterministically.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::core::config::ProtocolParams;
use crate::core::ledger::{Amount, Ledger, UNLIMITED_ALLOWANCE};
use crate::error::{Error, Result};
use crate::oracle::{PriceData, StaticPriceOracle};
use crate::protocol::operations::{OperationResult, ProtocolOperation, Transaction};
use crate::protocol::state_machine::{AccountSummary, ClearnProtocol, Deployment};
use crate::utils::constants::{SECONDS_PER_DAY, USDC_DECIMALS};
use crate::utils::crypto::Address;

// ═══════════════════════════════════════════════════════════════════════════════
// SCENARIO DESCRIPTION
// ═══════════════════════════════════════════════════════════════════════════════

/// An external asset available to the scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetSetup {
    /// Asset identifier
    pub address: Address,
    /// Asset name
    pub name: String,
    /// Asset symbol
    pub symbol: String,
    /// Base-unit decimals
    pub decimals: u8,
    /// Price feed and its initial answer, if the asset is priced
    #[serde(default)]
    pub feed: Option<FeedSetup>,
    /// Initial balances
    #[serde(default)]
    pub balances: Vec<Balance>,
}

/// A price feed with its initial answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedSetup {
    /// Feed identifier
    pub address: Address,
    /// Initial answer
    pub price: PriceData,
}

/// An initial balance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    /// Holder
    pub account: Address,
    /// Amount in base units
    pub amount: Amount,
}

/// One transaction of a scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioStep {
    /// Human description
    #[serde(default)]
    pub label: String,
    /// Acting account
    pub caller: Address,
    /// Execution time
    pub at: u64,
    /// What to do
    pub operation: ProtocolOperation,
    /// Error code the step is expected to fail with
    #[serde(default)]
    pub expect_error: Option<u32>,
}

impl ScenarioStep {
    /// A step expected to commit
    pub fn new(label: &str, caller: Address, at: u64, operation: ProtocolOperation) -> Self {
        Self {
            label: label.to_string(),
            caller,
            at,
            operation,
            expect_error: None,
        }
    }

    /// A step expected to be rejected with `code`
    pub fn failing(mut self, code: u32) -> Self {
        self.expect_error = Some(code);
        self
    }
}

/// A complete replayable scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name
    pub name: String,
    /// Protocol parameters
    #[serde(default)]
    pub params: ProtocolParams,
    /// Deployment accounts
    pub deployment: Deployment,
    /// Clock at deployment
    pub start_time: u64,
    /// External assets
    pub assets: Vec<AssetSetup>,
    /// Ordered transactions
    pub steps: Vec<ScenarioStep>,
    /// Accounts to summarize in the report
    #[serde(default)]
    pub watch: Vec<Address>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// REPORT
// ═══════════════════════════════════════════════════════════════════════════════

/// Outcome of one step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepOutcome {
    /// Step index
    pub index: usize,
    /// Step label
    pub label: String,
    /// Operation type
    pub operation: String,
    /// Execution time
    pub at: u64,
    /// Result when committed
    pub result: Option<OperationResult>,
    /// Error code when rejected
    pub error_code: Option<u32>,
    /// Error message when rejected
    pub error: Option<String>,
    /// Whether the outcome matched the expectation
    pub as_expected: bool,
}

/// Result of running a scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioReport {
    /// Scenario name
    pub name: String,
    /// Per-step outcomes
    pub steps: Vec<StepOutcome>,
    /// Final clock
    pub final_time: u64,
    /// CLEARN supply at the end
    pub clearn_supply: Amount,
    /// Total staked at the end
    pub total_staked: Amount,
    /// Reward rate at the end
    pub reward_rate: Amount,
    /// Watched accounts at the end
    pub accounts: Vec<AccountSummary>,
    /// Events committed
    pub event_count: usize,
    /// Hex SHA-256 of the final state
    pub state_hash: String,
}

impl ScenarioReport {
    /// Steps whose outcome differed from the expectation
    pub fn unexpected(&self) -> Vec<&StepOutcome> {
        self.steps.iter().filter(|s| !s.as_expected).collect()
    }

    /// True if every step behaved as expected
    pub fn passed(&self) -> bool {
        self.steps.iter().all(|s| s.as_expected)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// EXECUTION
// ═══════════════════════════════════════════════════════════════════════════════

impl Scenario {
    /// Load from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&content).map_err(|e| Error::Deserialization(e.to_string()))
    }

    /// Save as pretty JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            serde_json::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Build the deployed protocol with assets, feeds and balances in place
    pub fn setup(&self) -> Result<ClearnProtocol<StaticPriceOracle>> {
        let mut oracle = StaticPriceOracle::new();
        for asset in &self.assets {
            if let Some(feed) = &asset.feed {
                oracle.set_price(feed.address, feed.price)?;
            }
        }

        let mut protocol =
            ClearnProtocol::deploy(self.params.clone(), self.deployment, oracle, self.start_time)?;

        for asset in &self.assets {
            protocol.register_asset(
                asset.address,
                Ledger::new(asset.name.as_str(), asset.symbol.as_str(), asset.decimals),
            )?;
            for balance in &asset.balances {
                protocol.fund(&asset.address, balance.account, balance.amount)?;
            }
        }
        Ok(protocol)
    }

    /// Replay every step against a fresh protocol.
    ///
    /// Rejected steps are recorded, not fatal. Setup failures and invariant
    /// violations abort the run.
    pub fn run(&self) -> Result<ScenarioReport> {
        let mut protocol = self.setup()?;
        let mut steps = Vec::with_capacity(self.steps.len());

        for (index, step) in self.steps.iter().enumerate() {
            let tx = Transaction::new(step.caller, step.at, step.operation.clone());
            let outcome = protocol.submit(tx);
            protocol.verify_invariants()?;

            let (result, error_code, error) = match outcome {
                Ok(result) => (Some(result), None, None),
                Err(e) => (None, Some(e.code()), Some(e.to_string())),
            };
            steps.push(StepOutcome {
                index,
                label: step.label.clone(),
                operation: step.operation.operation_type().to_string(),
                at: step.at,
                as_expected: error_code == step.expect_error,
                result,
                error_code,
                error,
            });
        }

        let accounts = self
            .watch
            .iter()
            .map(|account| protocol.account_summary(account))
            .collect::<Result<Vec<_>>>()?;

        let report = ScenarioReport {
            name: self.name.clone(),
            steps,
            final_time: protocol.now(),
            clearn_supply: protocol.credit().total_supply(),
            total_staked: protocol.staking().total_supply(),
            reward_rate: protocol.staking().reward_rate(),
            accounts,
            event_count: protocol.events().len(),
            state_hash: protocol.state_hash()?.to_hex(),
        };

        info!(
            scenario = %report.name,
            steps = report.steps.len(),
            unexpected = report.unexpected().len(),
            "Scenario finished"
        );
        Ok(report)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // REFERENCE SCENARIO
    // ═══════════════════════════════════════════════════════════════════════════

    /// Three users deposit 10, 30 and 50 USDC, two of them stake in a 1:3
    /// ratio, the strategy hub funds 10 USDC of rewards and a day later the
    /// first user exits completely.
    pub fn reference() -> Self {
        let d = Deployment::labelled();
        let usdc = d.reward_asset;
        let feed = Address::from_label("usdc-usd");
        let hub = d.yield_source;
        let one = Address::from_label("user-one");
        let two = Address::from_label("user-two");
        let three = Address::from_label("user-three");

        let dollars = |n: u128| n * 1_000_000;
        let clearn = |n: u128| n * 1_000_000_000_000_000_000;
        let t0 = 1_700_000_000;
        let day = SECONDS_PER_DAY;

        let mut steps = vec![ScenarioStep::new(
            "whitelist USDC",
            d.owner,
            t0,
            ProtocolOperation::AddTokenInfo {
                asset: usdc,
                price_feed: feed,
            },
        )];
        for (user, amount) in [(one, 10), (two, 30), (three, 50)] {
            steps.push(ScenarioStep::new(
                "approve treasury",
                user,
                t0,
                ProtocolOperation::ApproveAsset {
                    asset: usdc,
                    spender: d.treasury,
                    amount: dollars(amount),
                },
            ));
            steps.push(ScenarioStep::new(
                "deposit USDC",
                user,
                t0,
                ProtocolOperation::Deposit {
                    asset: usdc,
                    amount: dollars(amount),
                },
            ));
        }

        steps.extend([
            ScenarioStep::new(
                "fund before distributor is set",
                hub,
                t0,
                ProtocolOperation::IssuanceRate { amount: dollars(10) },
            )
            .failing(1001),
            ScenarioStep::new(
                "assign distributor",
                d.owner,
                t0,
                ProtocolOperation::SetYieldDistributor { distributor: hub },
            ),
            ScenarioStep::new(
                "fund with nobody staked",
                hub,
                t0,
                ProtocolOperation::IssuanceRate { amount: dollars(10) },
            )
            .failing(3002),
            ScenarioStep::new(
                "approve pool",
                one,
                t0,
                ProtocolOperation::ApproveCredit {
                    spender: d.staking_pool,
                    amount: UNLIMITED_ALLOWANCE,
                },
            ),
            ScenarioStep::new(
                "approve pool",
                three,
                t0,
                ProtocolOperation::ApproveCredit {
                    spender: d.staking_pool,
                    amount: UNLIMITED_ALLOWANCE,
                },
            ),
            ScenarioStep::new("zero stake", one, t0, ProtocolOperation::Stake { amount: 0 })
                .failing(2001),
            ScenarioStep::new(
                "stake without allowance",
                two,
                t0,
                ProtocolOperation::Stake { amount: clearn(30) },
            )
            .failing(2003),
            ScenarioStep::new("stake", one, t0, ProtocolOperation::Stake { amount: clearn(10) }),
            ScenarioStep::new("stake", three, t0, ProtocolOperation::Stake { amount: clearn(30) }),
            ScenarioStep::new(
                "approve pool for rewards",
                hub,
                t0,
                ProtocolOperation::ApproveAsset {
                    asset: usdc,
                    spender: d.staking_pool,
                    amount: dollars(10),
                },
            ),
            ScenarioStep::new(
                "fund rewards",
                hub,
                t0,
                ProtocolOperation::IssuanceRate { amount: dollars(10) },
            ),
            ScenarioStep::new(
                "unstake more than staked",
                one,
                t0 + day,
                ProtocolOperation::Unstake { amount: clearn(11) },
            )
            .failing(3001),
            ScenarioStep::new(
                "unstake with rewards",
                one,
                t0 + day,
                ProtocolOperation::Unstake { amount: clearn(10) },
            ),
            ScenarioStep::new(
                "redeem without hub allowance",
                one,
                t0 + day,
                ProtocolOperation::Withdraw {
                    asset: usdc,
                    credit_amount: clearn(10),
                },
            )
            .failing(2003),
            ScenarioStep::new(
                "hub approves treasury",
                hub,
                t0 + day,
                ProtocolOperation::ApproveAsset {
                    asset: usdc,
                    spender: d.treasury,
                    amount: dollars(90),
                },
            ),
            ScenarioStep::new(
                "redeem",
                one,
                t0 + day,
                ProtocolOperation::Withdraw {
                    asset: usdc,
                    credit_amount: clearn(10),
                },
            ),
        ]);

        Scenario {
            name: "reference".into(),
            params: ProtocolParams::default(),
            deployment: d,
            start_time: t0,
            assets: vec![AssetSetup {
                address: usdc,
                name: "USD Coin".into(),
                symbol: "USDC".into(),
                decimals: USDC_DECIMALS,
                feed: Some(FeedSetup {
                    address: feed,
                    price: PriceData::one_dollar(t0),
                }),
                balances: vec![
                    Balance { account: one, amount: dollars(10) },
                    Balance { account: two, amount: dollars(30) },
                    Balance { account: three, amount: dollars(50) },
                    Balance { account: hub, amount: dollars(50) },
                ],
            }],
            steps,
            watch: vec![one, two, three, hub],
        }
    }
}
