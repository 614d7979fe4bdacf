//! Integration tests for the Clearn protocol.
//!
//! These tests drive the complete protocol through `ClearnProtocol::execute`
//! the way a user, the owner and the strategy hub would.

use clearn::core::config::ProtocolParams;
use clearn::core::ledger::{Amount, Ledger, UNLIMITED_ALLOWANCE};
use clearn::core::staking::EmissionState;
use clearn::error::{Error, Result};
use clearn::oracle::{PriceData, PriceOracle, StaticPriceOracle};
use clearn::protocol::operations::{OperationResult, ProtocolOperation as Op};
use clearn::protocol::state_machine::{ClearnProtocol, Deployment};
use clearn::utils::constants::{REWARD_PERIOD_SECS, SECONDS_PER_DAY};
use clearn::utils::crypto::Address;

// ═══════════════════════════════════════════════════════════════════════════════
// TEST HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

const T0: u64 = 1_700_000_000;

const DOLLAR_10: Amount = 10_000_000;
const DOLLAR_30: Amount = 30_000_000;
const DOLLAR_50: Amount = 50_000_000;
const DOLLAR_100: Amount = 100_000_000;

const CLEARN_10: Amount = 10_000_000_000_000_000_000;
const CLEARN_30: Amount = 30_000_000_000_000_000_000;
const CLEARN_50: Amount = 50_000_000_000_000_000_000;
const CLEARN_100: Amount = 100_000_000_000_000_000_000;
const CLEARN_200: Amount = 200_000_000_000_000_000_000;

struct Env {
    protocol: ClearnProtocol<StaticPriceOracle>,
    d: Deployment,
    usdc: Address,
    feed: Address,
}

impl Env {
    fn owner(&self) -> Address {
        self.d.owner
    }

    fn hub(&self) -> Address {
        self.d.yield_source
    }

    fn run(&mut self, caller: Address, op: Op) -> Result<OperationResult> {
        self.protocol.execute(caller, op)
    }

    fn usdc_balance(&self, account: &Address) -> Amount {
        self.protocol.asset(&self.usdc).unwrap().balance_of(account)
    }

    fn clearn_balance(&self, account: &Address) -> Amount {
        self.protocol.credit().balance_of(account)
    }

    fn approve_usdc(&mut self, owner: Address, spender: Address, amount: Amount) {
        let usdc = self.usdc;
        self.run(
            owner,
            Op::ApproveAsset {
                asset: usdc,
                spender,
                amount,
            },
        )
        .unwrap();
    }

    fn deposit(&mut self, user: Address, amount: Amount) -> Result<OperationResult> {
        let usdc = self.usdc;
        self.run(user, Op::Deposit { asset: usdc, amount })
    }

    fn withdraw(&mut self, user: Address, credit_amount: Amount) -> Result<OperationResult> {
        let usdc = self.usdc;
        self.run(
            user,
            Op::Withdraw {
                asset: usdc,
                credit_amount,
            },
        )
    }

    fn approve_pool(&mut self, user: Address, amount: Amount) {
        let pool = self.d.staking_pool;
        self.run(
            user,
            Op::ApproveCredit {
                spender: pool,
                amount,
            },
        )
        .unwrap();
    }
}

/// USDC registered and whitelisted at $1, nobody funded yet
fn deployed() -> Env {
    let d = Deployment::labelled();
    let usdc = d.reward_asset;
    let feed = Address::from_label("usdc-usd");
    let oracle = StaticPriceOracle::new().with_feed(feed, PriceData::one_dollar(T0));

    let mut protocol = ClearnProtocol::deploy(ProtocolParams::default(), d, oracle, T0).unwrap();
    protocol
        .register_asset(usdc, Ledger::new("USD Coin", "USDC", 6))
        .unwrap();
    protocol
        .execute(
            d.owner,
            Op::AddTokenInfo {
                asset: usdc,
                price_feed: feed,
            },
        )
        .unwrap();

    Env {
        protocol,
        d,
        usdc,
        feed,
    }
}

/// One user holding and having approved 10 USDC
fn treasury_env() -> (Env, Address) {
    let mut env = deployed();
    let user = Address::from_label("user");
    env.protocol.fund(&env.usdc, user, DOLLAR_10).unwrap();
    let treasury = env.d.treasury;
    env.approve_usdc(user, treasury, DOLLAR_10);
    (env, user)
}

/// One user who already deposited 100 USDC
fn withdraw_env() -> (Env, Address) {
    let mut env = deployed();
    let user = Address::from_label("user");
    env.protocol.fund(&env.usdc, user, DOLLAR_100).unwrap();
    let treasury = env.d.treasury;
    env.approve_usdc(user, treasury, DOLLAR_100);
    env.deposit(user, DOLLAR_100).unwrap();
    (env, user)
}

/// Three users holding 10, 30 and 50 CLEARN; users one and three approved the pool
fn staking_env() -> (Env, [Address; 3]) {
    let mut env = deployed();
    let users = [
        Address::from_label("user-one"),
        Address::from_label("user-two"),
        Address::from_label("user-three"),
    ];
    let treasury = env.d.treasury;
    for (user, amount) in users.iter().zip([DOLLAR_10, DOLLAR_30, DOLLAR_50]) {
        env.protocol.fund(&env.usdc, *user, amount).unwrap();
        env.approve_usdc(*user, treasury, amount);
        env.deposit(*user, amount).unwrap();
    }
    let one_balance = env.clearn_balance(&users[0]);
    let three_balance = env.clearn_balance(&users[2]);
    env.approve_pool(users[0], one_balance);
    env.approve_pool(users[2], three_balance);
    (env, users)
}

/// Fund `amount` of rewards from a fresh distributor account
fn fund_rewards(env: &mut Env, amount: Amount) -> Address {
    let distributor = Address::from_label("other-strategy-hub");
    let owner = env.owner();
    env.run(owner, Op::SetYieldDistributor { distributor }).unwrap();
    env.protocol.fund(&env.usdc, distributor, amount).unwrap();
    let pool = env.d.staking_pool;
    env.approve_usdc(distributor, pool, amount);
    env.run(distributor, Op::IssuanceRate { amount }).unwrap();
    distributor
}

// ═══════════════════════════════════════════════════════════════════════════════
// CREDIT TOKEN TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_treasury_is_minter_after_deploy() {
    let env = deployed();
    assert_eq!(env.protocol.credit().minter(), Some(env.d.treasury));
    assert_ne!(env.protocol.credit().minter(), Some(env.owner()));
}

#[test]
fn test_set_minter_owner_only() {
    let mut env = deployed();
    let user = Address::from_label("user");
    let treasury = env.d.treasury;

    let err = env.run(user, Op::SetMinter { minter: user }).unwrap_err();
    assert!(matches!(err, Error::Unauthorized(_)));

    let owner = env.owner();
    env.run(owner, Op::SetMinter { minter: treasury }).unwrap();
    assert_eq!(env.protocol.credit().minter(), Some(treasury));
}

#[test]
fn test_reassigned_minter_locks_out_treasury() {
    let (mut env, user) = treasury_env();
    let owner = env.owner();
    env.run(
        owner,
        Op::SetMinter {
            minter: Address::from_label("new-minter"),
        },
    )
    .unwrap();

    let err = env.deposit(user, DOLLAR_10).unwrap_err();
    assert!(matches!(err, Error::Unauthorized(_)));
    assert_eq!(env.usdc_balance(&user), DOLLAR_10);
    assert_eq!(env.protocol.credit().total_supply(), 0);
}

#[test]
fn test_credit_transfer_and_allowance() {
    let (mut env, user) = withdraw_env();
    let friend = Address::from_label("friend");
    let spender = Address::from_label("spender");

    env.run(
        user,
        Op::TransferCredit {
            to: friend,
            amount: CLEARN_10,
        },
    )
    .unwrap();
    assert_eq!(env.clearn_balance(&friend), CLEARN_10);

    env.run(
        user,
        Op::ApproveCredit {
            spender,
            amount: CLEARN_30,
        },
    )
    .unwrap();
    env.run(
        spender,
        Op::TransferCreditFrom {
            from: user,
            to: friend,
            amount: CLEARN_30,
        },
    )
    .unwrap();

    assert_eq!(env.clearn_balance(&friend), CLEARN_10 + CLEARN_30);
    assert_eq!(env.clearn_balance(&user), CLEARN_100 - CLEARN_10 - CLEARN_30);
    assert_eq!(env.protocol.credit().allowance(&user, &spender), 0);

    let err = env
        .run(
            spender,
            Op::TransferCreditFrom {
                from: user,
                to: friend,
                amount: 1,
            },
        )
        .unwrap_err();
    assert!(matches!(err, Error::InsufficientAllowance { .. }));
}

// ═══════════════════════════════════════════════════════════════════════════════
// TREASURY TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_whitelist_add_and_remove() {
    let mut env = deployed();
    let token = Address::from_label("goerli-usdc");
    let feed = Address::from_label("goerli-usdc-feed");
    let owner = env.owner();

    assert!(!env.protocol.treasury().depositable_tokens(&token));

    env.run(
        owner,
        Op::AddTokenInfo {
            asset: token,
            price_feed: feed,
        },
    )
    .unwrap();
    assert_eq!(env.protocol.treasury().price_feed(&token), Some(feed));
    assert!(env.protocol.treasury().depositable_tokens(&token));

    env.run(owner, Op::RemoveTokenInfo { asset: token }).unwrap();
    assert_eq!(env.protocol.treasury().price_feed(&token), None);
    assert!(!env.protocol.treasury().depositable_tokens(&token));
}

#[test]
fn test_whitelist_owner_only() {
    let mut env = deployed();
    let user = Address::from_label("user");
    let token = Address::from_label("token");

    let err = env
        .run(
            user,
            Op::AddTokenInfo {
                asset: token,
                price_feed: Address::from_label("feed"),
            },
        )
        .unwrap_err();
    assert!(matches!(err, Error::Unauthorized(_)));
    assert!(!env.protocol.treasury().depositable_tokens(&token));
}

#[test]
fn test_deposit_fixture_state() {
    let (env, user) = treasury_env();
    assert_eq!(env.usdc_balance(&user), DOLLAR_10);
    assert!(env.protocol.treasury().depositable_tokens(&env.usdc));
    assert_eq!(
        env.protocol
            .asset(&env.usdc)
            .unwrap()
            .allowance(&user, &env.d.treasury),
        DOLLAR_10
    );
}

#[test]
fn test_deposit_zero_rejected() {
    let (mut env, user) = treasury_env();
    let err = env.deposit(user, 0).unwrap_err();
    assert_eq!(err, Error::InvalidAmount("Deposit must be more than 0".into()));
}

#[test]
fn test_deposit_insufficient_balance() {
    let (mut env, user) = treasury_env();
    let err = env.deposit(user, DOLLAR_50).unwrap_err();
    assert!(matches!(err, Error::InsufficientBalance { .. }));
}

#[test]
fn test_deposit_insufficient_allowance() {
    let (mut env, user) = treasury_env();
    env.protocol.fund(&env.usdc, user, DOLLAR_50).unwrap();
    let err = env.deposit(user, DOLLAR_50).unwrap_err();
    assert!(matches!(err, Error::InsufficientAllowance { .. }));
}

#[test]
fn test_deposit_success() {
    let (mut env, user) = treasury_env();
    let result = env.deposit(user, DOLLAR_10).unwrap();

    match result {
        OperationResult::Deposited(receipt) => {
            assert_eq!(receipt.collateral_amount, DOLLAR_10);
            assert_eq!(receipt.credit_amount, CLEARN_10);
        }
        other => panic!("unexpected result {:?}", other),
    }
    assert_eq!(env.clearn_balance(&user), CLEARN_10);
    assert_eq!(env.usdc_balance(&user), 0);
    assert_eq!(env.usdc_balance(&env.hub()), DOLLAR_10);
    assert_eq!(env.usdc_balance(&env.d.treasury), 0);
    env.protocol.verify_invariants().unwrap();
}

#[test]
fn test_deposit_non_whitelisted_asset() {
    let (mut env, user) = treasury_env();
    let owner = env.owner();
    let usdc = env.usdc;
    env.run(owner, Op::RemoveTokenInfo { asset: usdc }).unwrap();

    let err = env.deposit(user, DOLLAR_10).unwrap_err();
    assert!(matches!(err, Error::AssetNotWhitelisted(_)));
}

#[test]
fn test_deposit_never_whitelisted_asset() {
    let (mut env, user) = treasury_env();
    let unknown = Address::from_label("never-listed");
    let hash_before = env.protocol.state_hash().unwrap();

    let err = env
        .run(
            user,
            Op::Deposit {
                asset: unknown,
                amount: DOLLAR_10,
            },
        )
        .unwrap_err();
    assert!(matches!(err, Error::AssetNotWhitelisted(_)));
    assert_eq!(env.protocol.state_hash().unwrap(), hash_before);
}

#[test]
fn test_deposit_with_feed_offline() {
    let (mut env, user) = treasury_env();
    let feed = env.feed;
    env.protocol.oracle_mut().remove_feed(&feed);

    let err = env.deposit(user, DOLLAR_10).unwrap_err();
    assert!(matches!(err, Error::OracleUnavailable(_)));
    assert_eq!(env.usdc_balance(&user), DOLLAR_10);
}

#[test]
fn test_deposit_follows_price() {
    let (mut env, user) = treasury_env();
    let feed = env.feed;
    // $0.50 per USDC
    env.protocol
        .oracle_mut()
        .set_price(feed, PriceData::new(50_000_000, 8, T0))
        .unwrap();

    env.deposit(user, DOLLAR_10).unwrap();
    assert_eq!(env.clearn_balance(&user), CLEARN_10 / 2);
}

#[test]
fn test_withdraw_zero_rejected() {
    let (mut env, user) = withdraw_env();
    let err = env.withdraw(user, 0).unwrap_err();
    assert_eq!(err, Error::InvalidAmount("Deposit must be more than 0".into()));
}

#[test]
fn test_withdraw_more_than_balance() {
    let (mut env, user) = withdraw_env();
    let err = env.withdraw(user, CLEARN_200).unwrap_err();
    assert!(matches!(err, Error::InsufficientBalance { .. }));
}

#[test]
fn test_withdraw_without_hub_allowance() {
    let (mut env, user) = withdraw_env();
    let err = env.withdraw(user, CLEARN_100).unwrap_err();
    assert!(matches!(err, Error::InsufficientAllowance { .. }));
    assert_eq!(env.clearn_balance(&user), CLEARN_100);
}

#[test]
fn test_withdraw_success() {
    let (mut env, user) = withdraw_env();
    let hub = env.hub();
    let treasury = env.d.treasury;
    env.approve_usdc(hub, treasury, DOLLAR_100);

    let result = env.withdraw(user, CLEARN_100).unwrap();
    match result {
        OperationResult::Withdrawn(receipt) => {
            assert_eq!(receipt.credit_amount, CLEARN_100);
            assert_eq!(receipt.collateral_amount, DOLLAR_100);
        }
        other => panic!("unexpected result {:?}", other),
    }

    assert_eq!(env.usdc_balance(&hub), 0);
    assert_eq!(env.usdc_balance(&user), DOLLAR_100);
    assert_eq!(env.clearn_balance(&user), 0);
    assert_eq!(env.protocol.credit().total_supply(), 0);
}

#[test]
fn test_quotes_match_execution() {
    let (mut env, user) = withdraw_env();
    let quoted = env.protocol.quote_withdraw(&env.usdc, CLEARN_30).unwrap();
    assert_eq!(quoted, DOLLAR_30);

    let hub = env.hub();
    let treasury = env.d.treasury;
    env.approve_usdc(hub, treasury, DOLLAR_100);
    env.withdraw(user, CLEARN_30).unwrap();
    assert_eq!(env.usdc_balance(&user), quoted);

    assert_eq!(env.protocol.quote_deposit(&env.usdc, DOLLAR_50).unwrap(), CLEARN_50);
}

#[test]
fn test_stale_price_rejected_when_bounded() {
    let d = Deployment::labelled();
    let usdc = d.reward_asset;
    let feed = Address::from_label("usdc-usd");
    let oracle = StaticPriceOracle::new().with_feed(feed, PriceData::one_dollar(T0));
    let params = ProtocolParams::default().with_max_price_age(3_600);

    let mut protocol = ClearnProtocol::deploy(params, d, oracle, T0).unwrap();
    protocol
        .register_asset(usdc, Ledger::new("USD Coin", "USDC", 6))
        .unwrap();
    protocol
        .execute(
            d.owner,
            Op::AddTokenInfo {
                asset: usdc,
                price_feed: feed,
            },
        )
        .unwrap();

    let user = Address::from_label("user");
    protocol.fund(&usdc, user, DOLLAR_10).unwrap();
    protocol
        .execute(
            user,
            Op::ApproveAsset {
                asset: usdc,
                spender: d.treasury,
                amount: DOLLAR_10,
            },
        )
        .unwrap();

    protocol.advance_by(SECONDS_PER_DAY).unwrap();
    let err = protocol
        .execute(
            user,
            Op::Deposit {
                asset: usdc,
                amount: DOLLAR_10,
            },
        )
        .unwrap_err();
    assert!(matches!(err, Error::OracleUnavailable(_)));

    protocol
        .oracle_mut()
        .set_price(feed, PriceData::one_dollar(T0 + SECONDS_PER_DAY))
        .unwrap();
    protocol
        .execute(
            user,
            Op::Deposit {
                asset: usdc,
                amount: DOLLAR_10,
            },
        )
        .unwrap();
    assert_eq!(protocol.credit().balance_of(&user), CLEARN_10);
}

// ═══════════════════════════════════════════════════════════════════════════════
// STAKING TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_stake_zero_rejected() {
    let (mut env, [one, _, _]) = staking_env();
    let err = env.run(one, Op::Stake { amount: 0 }).unwrap_err();
    assert_eq!(err, Error::InvalidAmount("Stake must be more than 0".into()));
}

#[test]
fn test_stake_more_than_balance() {
    let (mut env, [one, _, _]) = staking_env();
    let err = env.run(one, Op::Stake { amount: CLEARN_30 }).unwrap_err();
    assert!(matches!(err, Error::InsufficientBalance { .. }));
}

#[test]
fn test_stake_without_allowance() {
    let (mut env, [_, two, _]) = staking_env();
    let err = env.run(two, Op::Stake { amount: CLEARN_30 }).unwrap_err();
    assert!(matches!(err, Error::InsufficientAllowance { .. }));
}

#[test]
fn test_stake_after_approval() {
    let (mut env, [_, two, _]) = staking_env();
    let balance = env.clearn_balance(&two);
    env.approve_pool(two, balance);

    let result = env.run(two, Op::Stake { amount: CLEARN_30 }).unwrap();
    assert_eq!(
        result,
        OperationResult::Staked {
            amount: CLEARN_30,
            new_balance: CLEARN_30
        }
    );
    assert_eq!(env.protocol.staking().balance_of(&two), balance);
}

#[test]
fn test_stake_moves_credit_into_pool() {
    let (mut env, [one, _, _]) = staking_env();
    env.run(one, Op::Stake { amount: CLEARN_10 }).unwrap();

    assert_eq!(env.clearn_balance(&one), 0);
    assert_eq!(env.protocol.staking().balance_of(&one), CLEARN_10);
    assert_eq!(env.clearn_balance(&env.d.staking_pool), CLEARN_10);
    assert_eq!(env.protocol.staking().total_supply(), CLEARN_10);
}

#[test]
fn test_unstake_zero_rejected() {
    let (mut env, [one, _, _]) = staking_env();
    let err = env.run(one, Op::Unstake { amount: 0 }).unwrap_err();
    assert_eq!(err, Error::InvalidAmount("Withdraw must be more than 0".into()));
}

#[test]
fn test_unstake_without_stake() {
    let (mut env, [one, _, _]) = staking_env();
    let err = env.run(one, Op::Unstake { amount: CLEARN_10 }).unwrap_err();
    assert!(matches!(err, Error::InsufficientStake { .. }));
}

#[test]
fn test_unstake_restores_balances() {
    let (mut env, [one, _, _]) = staking_env();
    env.run(one, Op::Stake { amount: CLEARN_10 }).unwrap();
    let total_before = env.protocol.staking().total_supply();

    let result = env.run(one, Op::Unstake { amount: CLEARN_10 }).unwrap();
    match result {
        OperationResult::Unstaked(receipt) => {
            assert_eq!(receipt.amount, CLEARN_10);
            assert_eq!(receipt.reward_paid, 0);
        }
        other => panic!("unexpected result {:?}", other),
    }

    assert!(env.protocol.staking().total_supply() < total_before);
    assert_eq!(env.protocol.staking().balance_of(&one), 0);
    assert_eq!(env.clearn_balance(&one), CLEARN_10);
}

#[test]
fn test_issuance_requires_distributor() {
    let (mut env, _) = staking_env();
    let hub = env.hub();
    let err = env.run(hub, Op::IssuanceRate { amount: 0 }).unwrap_err();
    assert_eq!(
        err,
        Error::Unauthorized("Owner need to Set YieldDistributor".into())
    );
}

#[test]
fn test_set_yield_distributor() {
    let (mut env, [one, _, _]) = staking_env();
    let owner = env.owner();
    let hub = env.hub();

    let err = env
        .run(one, Op::SetYieldDistributor { distributor: one })
        .unwrap_err();
    assert!(matches!(err, Error::Unauthorized(_)));

    env.run(owner, Op::SetYieldDistributor { distributor: hub })
        .unwrap();
    assert_eq!(env.protocol.staking().yield_distributor(), Some(hub));

    let err = env.run(one, Op::IssuanceRate { amount: 0 }).unwrap_err();
    assert_eq!(err, Error::Unauthorized("Only Yield Distributor".into()));
}

#[test]
fn test_issuance_zero_rewards() {
    let (mut env, _) = staking_env();
    let owner = env.owner();
    let hub = env.hub();
    env.run(owner, Op::SetYieldDistributor { distributor: hub })
        .unwrap();

    let err = env.run(hub, Op::IssuanceRate { amount: 0 }).unwrap_err();
    assert_eq!(err, Error::InvalidAmount("Zero rewards".into()));
}

#[test]
fn test_issuance_without_stakers() {
    let (mut env, _) = staking_env();
    let owner = env.owner();
    let hub = env.hub();
    env.run(owner, Op::SetYieldDistributor { distributor: hub })
        .unwrap();

    let err = env
        .run(hub, Op::IssuanceRate { amount: DOLLAR_10 })
        .unwrap_err();
    assert_eq!(err, Error::NoStakers);
}

#[test]
fn test_issuance_without_allowance() {
    let (mut env, [one, _, _]) = staking_env();
    let owner = env.owner();
    let hub = env.hub();
    env.run(owner, Op::SetYieldDistributor { distributor: hub })
        .unwrap();
    env.run(one, Op::Stake { amount: CLEARN_10 }).unwrap();

    let err = env
        .run(hub, Op::IssuanceRate { amount: DOLLAR_10 })
        .unwrap_err();
    assert!(matches!(err, Error::InsufficientAllowance { .. }));
}

#[test]
fn test_issuance_moves_rewards_and_opens_window() {
    let (mut env, [one, _, _]) = staking_env();
    let last_update_before = env.protocol.staking().last_update_time();
    env.run(one, Op::Stake { amount: CLEARN_10 }).unwrap();
    env.protocol.advance_by(60).unwrap();

    let distributor = fund_rewards(&mut env, DOLLAR_10);

    assert_eq!(env.usdc_balance(&distributor), 0);
    assert_eq!(env.usdc_balance(&env.d.staking_pool), DOLLAR_10);
    assert!(env.protocol.staking().last_update_time() > last_update_before);
    assert_eq!(
        env.protocol.staking().period_finish(),
        T0 + 60 + REWARD_PERIOD_SECS
    );
    assert_eq!(
        env.protocol.staking().reward_rate(),
        DOLLAR_10 / REWARD_PERIOD_SECS as u128
    );
    assert_eq!(env.protocol.staking().reward_rate(), 3);
    assert_eq!(
        env.protocol.staking().emission_state(env.protocol.now()),
        EmissionState::Emitting
    );
}

#[test]
fn test_earned_grows_over_a_day() {
    let (mut env, [one, _, _]) = staking_env();
    env.run(one, Op::Stake { amount: CLEARN_10 }).unwrap();
    fund_rewards(&mut env, DOLLAR_10);

    let before = env.protocol.earned(&one).unwrap();
    env.protocol.advance_by(SECONDS_PER_DAY).unwrap();
    let after = env.protocol.earned(&one).unwrap();

    assert_eq!(before, 0);
    assert!(after > before);
    // 3/s for a day, sole staker
    assert_eq!(after, 3 * SECONDS_PER_DAY as u128);
}

#[test]
fn test_rewards_split_by_stake_ratio() {
    let (mut env, [one, _, three]) = staking_env();
    env.run(one, Op::Stake { amount: CLEARN_10 }).unwrap();
    env.run(three, Op::Stake { amount: CLEARN_30 }).unwrap();
    fund_rewards(&mut env, DOLLAR_10);

    env.protocol.advance_by(SECONDS_PER_DAY).unwrap();
    let earned_one = env.protocol.earned(&one).unwrap();
    let earned_three = env.protocol.earned(&three).unwrap();

    assert_eq!(earned_one, 64_800);
    assert_eq!(earned_three, earned_one * 3);
}

#[test]
fn test_unstake_pays_rewards_in_usdc() {
    let (mut env, [one, _, three]) = staking_env();
    env.run(one, Op::Stake { amount: CLEARN_10 }).unwrap();
    env.run(three, Op::Stake { amount: CLEARN_30 }).unwrap();
    fund_rewards(&mut env, DOLLAR_10);
    env.protocol.advance_by(SECONDS_PER_DAY).unwrap();

    let result = env.run(one, Op::Unstake { amount: CLEARN_10 }).unwrap();
    match result {
        OperationResult::Unstaked(receipt) => assert_eq!(receipt.reward_paid, 64_800),
        other => panic!("unexpected result {:?}", other),
    }
    assert_eq!(env.usdc_balance(&one), 64_800);
    assert_eq!(env.clearn_balance(&one), CLEARN_10);
    assert_eq!(env.protocol.earned(&one).unwrap(), 0);

    // user three keeps accruing on the whole pool from here on
    let three_before = env.protocol.earned(&three).unwrap();
    env.protocol.advance_by(SECONDS_PER_DAY).unwrap();
    assert_eq!(
        env.protocol.earned(&three).unwrap(),
        three_before + 3 * SECONDS_PER_DAY as u128
    );
}

#[test]
fn test_emission_stops_at_period_finish() {
    let (mut env, [one, _, _]) = staking_env();
    env.run(one, Op::Stake { amount: CLEARN_10 }).unwrap();
    fund_rewards(&mut env, DOLLAR_10);

    env.protocol.advance_by(REWARD_PERIOD_SECS).unwrap();
    let at_finish = env.protocol.earned(&one).unwrap();
    env.protocol.advance_by(SECONDS_PER_DAY).unwrap();

    assert_eq!(env.protocol.earned(&one).unwrap(), at_finish);
    assert_eq!(at_finish, 3 * REWARD_PERIOD_SECS as u128);
    assert!(at_finish <= DOLLAR_10);
    assert_eq!(
        env.protocol.staking().emission_state(env.protocol.now()),
        EmissionState::Idle
    );
}

// ═══════════════════════════════════════════════════════════════════════════════
// ATOMICITY AND EVENTS
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_rejected_operation_leaves_state_untouched() {
    let (mut env, user) = withdraw_env();
    let hash_before = env.protocol.state_hash().unwrap();
    let events_before = env.protocol.events().len();

    assert!(env.withdraw(user, CLEARN_100).is_err());
    assert!(env.deposit(user, 1).is_err());
    assert!(env.run(user, Op::Stake { amount: CLEARN_10 }).is_err());

    assert_eq!(env.protocol.state_hash().unwrap(), hash_before);
    assert_eq!(env.protocol.events().len(), events_before);
}

#[test]
fn test_unregistered_asset_rejected() {
    let mut env = deployed();
    let owner = env.owner();
    let user = Address::from_label("user");
    let ghost = Address::from_label("ghost-token");
    let feed = env.feed;
    env.run(
        owner,
        Op::AddTokenInfo {
            asset: ghost,
            price_feed: feed,
        },
    )
    .unwrap();

    let err = env
        .run(
            user,
            Op::Deposit {
                asset: ghost,
                amount: DOLLAR_10,
            },
        )
        .unwrap_err();
    assert!(matches!(err, Error::UnknownAsset(_)));

    // Request checks still come first
    let err = env
        .run(
            user,
            Op::Deposit {
                asset: ghost,
                amount: 0,
            },
        )
        .unwrap_err();
    assert!(matches!(err, Error::InvalidAmount(_)));

    let err = env
        .run(
            user,
            Op::Withdraw {
                asset: ghost,
                credit_amount: CLEARN_10,
            },
        )
        .unwrap_err();
    assert!(matches!(err, Error::UnknownAsset(_)));
}

#[test]
fn test_deposit_emits_events() {
    let (mut env, user) = treasury_env();
    env.deposit(user, DOLLAR_10).unwrap();

    let deposited = env.protocol.events().filter_by_type("CollateralDeposited");
    assert_eq!(deposited.len(), 1);
    assert_eq!(env.protocol.events().filter_by_type("Minted").len(), 1);
    assert_eq!(
        env.protocol.events().latest().unwrap().event.event_type(),
        "Minted"
    );
}

#[test]
fn test_clock_never_runs_backwards() {
    let mut env = deployed();
    env.protocol.advance_by(10).unwrap();
    let err = env.protocol.advance_time(T0).unwrap_err();
    assert!(matches!(err, Error::InvalidParameter { .. }));
    assert_eq!(env.protocol.now(), T0 + 10);
}

#[test]
fn test_unlimited_allowance_not_consumed() {
    let (mut env, [one, _, _]) = staking_env();
    env.approve_pool(one, UNLIMITED_ALLOWANCE);
    env.run(one, Op::Stake { amount: CLEARN_10 }).unwrap();
    assert_eq!(
        env.protocol
            .credit()
            .allowance(&one, &env.d.staking_pool),
        UNLIMITED_ALLOWANCE
    );
}

// ═══════════════════════════════════════════════════════════════════════════════
// CUSTOM DEPLOYMENTS
// ═══════════════════════════════════════════════════════════════════════════════

struct FailingOracle;

impl PriceOracle for FailingOracle {
    fn latest_price(&self, _feed: &Address) -> Result<PriceData> {
        Err(Error::Config("rpc timeout".into()))
    }
}

/// Deploy `d` with `collateral` registered and whitelisted against `feed`
fn custom_deploy<O: PriceOracle>(
    d: Deployment,
    oracle: O,
    collateral: Address,
    ledger: Ledger,
    feed: Address,
) -> ClearnProtocol<O> {
    let mut protocol = ClearnProtocol::deploy(ProtocolParams::default(), d, oracle, T0).unwrap();
    protocol.register_asset(collateral, ledger).unwrap();
    protocol
        .execute(
            d.owner,
            Op::AddTokenInfo {
                asset: collateral,
                price_feed: feed,
            },
        )
        .unwrap();
    protocol
}

/// Fund `user` with `amount` of `asset`, approve the Treasury and deposit it
fn deposit_all<O: PriceOracle>(
    protocol: &mut ClearnProtocol<O>,
    d: &Deployment,
    asset: Address,
    user: Address,
    amount: Amount,
) -> Result<OperationResult> {
    protocol.fund(&asset, user, amount).unwrap();
    protocol
        .execute(
            user,
            Op::ApproveAsset {
                asset,
                spender: d.treasury,
                amount,
            },
        )
        .unwrap();
    protocol.execute(user, Op::Deposit { asset, amount })
}

#[test]
fn test_eighteen_decimal_reward_asset_stays_withdrawable() {
    const DAI: Amount = 1_000_000_000_000_000_000;
    let dai = Address::from_label("dai");
    let feed = Address::from_label("dai-usd");
    let d = Deployment {
        reward_asset: dai,
        ..Deployment::labelled()
    };
    let oracle = StaticPriceOracle::new().with_feed(feed, PriceData::one_dollar(T0));
    let mut protocol = custom_deploy(d, oracle, dai, Ledger::new("Dai Stablecoin", "DAI", 18), feed);

    let user = Address::from_label("user");
    deposit_all(&mut protocol, &d, dai, user, 100 * DAI).unwrap();
    assert_eq!(protocol.credit().balance_of(&user), 100 * DAI);
    protocol
        .execute(
            user,
            Op::ApproveCredit {
                spender: d.staking_pool,
                amount: 100 * DAI,
            },
        )
        .unwrap();
    protocol.execute(user, Op::Stake { amount: 100 * DAI }).unwrap();

    let distributor = Address::from_label("distributor");
    protocol
        .execute(d.owner, Op::SetYieldDistributor { distributor })
        .unwrap();
    protocol.fund(&dai, distributor, 10_000 * DAI).unwrap();
    protocol
        .execute(
            distributor,
            Op::ApproveAsset {
                asset: dai,
                spender: d.staking_pool,
                amount: 10_000 * DAI,
            },
        )
        .unwrap();
    protocol
        .execute(distributor, Op::IssuanceRate { amount: 10_000 * DAI })
        .unwrap();

    protocol.advance_by(2 * SECONDS_PER_DAY).unwrap();
    let expected = protocol.staking().reward_rate() * (2 * SECONDS_PER_DAY) as u128;
    assert_eq!(protocol.earned(&user).unwrap(), expected);

    match protocol.execute(user, Op::Unstake { amount: 100 * DAI }).unwrap() {
        OperationResult::Unstaked(receipt) => {
            assert_eq!(receipt.amount, 100 * DAI);
            assert_eq!(receipt.reward_paid, expected);
        }
        other => panic!("expected Unstaked, got {:?}", other),
    }
    assert_eq!(protocol.credit().balance_of(&user), 100 * DAI);
    assert_eq!(protocol.asset(&dai).unwrap().balance_of(&user), expected);
    protocol.verify_invariants().unwrap();
}

#[test]
fn test_unstake_with_unregistered_reward_asset() {
    let labelled = Deployment::labelled();
    let usdc = labelled.reward_asset;
    let feed = Address::from_label("usdc-usd");
    let d = Deployment {
        reward_asset: Address::from_label("unlisted-reward"),
        ..labelled
    };
    let oracle = StaticPriceOracle::new().with_feed(feed, PriceData::one_dollar(T0));
    let mut protocol = custom_deploy(d, oracle, usdc, Ledger::new("USD Coin", "USDC", 6), feed);

    let user = Address::from_label("user");
    deposit_all(&mut protocol, &d, usdc, user, DOLLAR_10).unwrap();
    protocol
        .execute(
            user,
            Op::ApproveCredit {
                spender: d.staking_pool,
                amount: UNLIMITED_ALLOWANCE,
            },
        )
        .unwrap();
    protocol.execute(user, Op::Stake { amount: CLEARN_10 }).unwrap();
    protocol.advance_by(SECONDS_PER_DAY).unwrap();

    match protocol.execute(user, Op::Unstake { amount: CLEARN_10 }).unwrap() {
        OperationResult::Unstaked(receipt) => assert_eq!(receipt.reward_paid, 0),
        other => panic!("expected Unstaked, got {:?}", other),
    }
    assert_eq!(protocol.credit().balance_of(&user), CLEARN_10);
    assert_eq!(protocol.staking().total_supply(), 0);

    // Funding rewards still needs the ledger
    let distributor = Address::from_label("distributor");
    protocol
        .execute(d.owner, Op::SetYieldDistributor { distributor })
        .unwrap();
    protocol.execute(user, Op::Stake { amount: CLEARN_10 }).unwrap();
    let err = protocol
        .execute(distributor, Op::IssuanceRate { amount: DOLLAR_10 })
        .unwrap_err();
    assert!(matches!(err, Error::UnknownAsset(_)));
}

#[test]
fn test_failing_oracle_reports_unavailable() {
    let d = Deployment::labelled();
    let usdc = d.reward_asset;
    let feed = Address::from_label("usdc-usd");
    let mut protocol = custom_deploy(d, FailingOracle, usdc, Ledger::new("USD Coin", "USDC", 6), feed);

    let user = Address::from_label("user");
    let err = deposit_all(&mut protocol, &d, usdc, user, DOLLAR_10).unwrap_err();
    assert!(matches!(err, Error::OracleUnavailable(_)));
    assert_eq!(protocol.asset(&usdc).unwrap().balance_of(&user), DOLLAR_10);
    assert_eq!(protocol.credit().total_supply(), 0);
    assert!(protocol.events().filter_by_type("CollateralDeposited").is_empty());

    assert!(matches!(
        protocol.quote_deposit(&usdc, DOLLAR_10),
        Err(Error::OracleUnavailable(_))
    ));
}

#[test]
fn test_oversized_price_decimals_report_unavailable() {
    let (mut env, user) = treasury_env();
    let feed = env.feed;
    env.protocol
        .oracle_mut()
        .set_price(feed, PriceData::new(1, 36, T0))
        .unwrap();

    let err = env.deposit(user, DOLLAR_10).unwrap_err();
    assert!(matches!(err, Error::OracleUnavailable(_)));
    assert_eq!(env.usdc_balance(&user), DOLLAR_10);
}
