//! Curation pool acceptance scenarios
//!
//! 1. Deposit-claim ordering and allocative efficiency
//! 2. Genesis vs newcomer baselines
//! 3. Withdrawal settles against the registered stake
//! 4. Accumulator monotonicity
//! 5. Conservation across a mixed sequence
//! 6. Issuance with no depositors is burned
//! 7. Failed operations leave no trace
//! 8. Shared pool across threads
//! 9. Share royalties are conserved
//! 10. Holding addresses cannot participate

use curation_pool::*;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn d(v: i64) -> Decimal {
    Decimal::from(v)
}

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn assert_close(actual: Decimal, expected: Decimal, tolerance: &str) {
    let diff = (actual - expected).abs();
    assert!(
        diff <= dec(tolerance),
        "expected {} to be within {} of {}",
        actual,
        tolerance,
        expected
    );
}

/// curator1: reserve 0, deposit 500, shares 1000
/// curator2: reserve 1000, deposit 0, shares 0
fn scenario_pool(rate: &str) -> (CurationPool, Chain) {
    let _ = env_logger::builder().is_test(true).try_init();
    let chain = Chain::default();
    let genesis = GenesisConfig {
        reserve_balances: vec![
            Allocation::new("queryMarket", d(10_000)),
            Allocation::new("curator1", d(0)),
            Allocation::new("curator2", d(1000)),
            Allocation::new("curationPool", d(500)),
        ],
        share_balances: vec![
            Allocation::new("curator1", d(1000)),
            Allocation::new("curator2", d(0)),
        ],
        deposits: vec![
            Allocation::new("curator1", d(500)),
            Allocation::new("curator2", d(0)),
        ],
    };
    let config = PoolConfig::default().with_issuance_rate(dec(rate));
    let pool = CurationPool::from_genesis(config, &genesis, chain.clone()).expect("Failed to build pool");
    (pool, chain)
}

fn accumulators(pool: &CurationPool) -> [Decimal; 3] {
    [
        pool.acc_royalties_per_share(),
        pool.secondary().acc_shares_per_deposit(),
        pool.secondary().acc_royalties_per_deposit(),
    ]
}

/// Scenario 1: curator2 joins after 100 blocks and ends up owning shares in
/// proportion to its deposit
#[test]
fn test_scenario_1_deposit_claim_ordering() {
    let (mut pool, chain) = scenario_pool("0.0001");

    chain.sleep(100).unwrap();
    pool.deposit("curator2", d(1000)).expect("Deposit failed");

    // Nothing accrued to curator2 before its deposit
    assert_eq!(pool.shares().balance_of("curator2"), Decimal::ZERO);
    assert_eq!(pool.deposit_of("curator2"), d(1000));
    assert_eq!(pool.secondary().total_deposits(), d(1500));
    assert_eq!(pool.last_minted_block(), 100);

    // The first 100 blocks of issuance belong to curator1 alone
    pool.claim("curator1").unwrap();
    assert_close(
        pool.shares().balance_of("curator1"),
        dec("1010.0496620928765688550188629"),
        "0.000000001",
    );

    // From here on issuance splits 1000:500
    chain.sleep(100).unwrap();
    let gain2 = pool.claim("curator2").unwrap().shares;
    let gain1 = pool.claim("curator1").unwrap().shares;
    assert_close(gain2, dec("6.7671052007050460753801687"), "0.000000001");
    assert_close(gain2, gain1 * d(2), "0.000000001");

    chain.sleep(100_000).unwrap();
    pool.claim("curator2").unwrap();
    pool.claim("curator1").unwrap();

    let ratio = pool.shares().balance_of("curator2") / pool.shares().balance_of("curator1");
    assert!(ratio > dec("1.99") && ratio < d(2), "share ratio was {}", ratio);
}

/// Scenario 2: an unsnapshotted genesis depositor collects everything since
/// inception; a newcomer only what accrued after it joined
#[test]
fn test_scenario_2_genesis_and_newcomer_baselines() {
    let (mut pool, chain) = scenario_pool("0.0001");

    chain.sleep(100).unwrap();
    pool.deposit("curator2", d(1000)).unwrap();

    // Royalties injected after both are registered
    let cost = pool.buy_shares("queryMarket", d(10)).unwrap();
    assert!(cost > Decimal::ZERO);
    assert!(pool.secondary().acc_shares_per_deposit() > Decimal::ZERO);
    assert!(pool.secondary().acc_royalties_per_deposit() > Decimal::ZERO);
    assert!(!pool.secondary().has_snapshot("curator1"));

    let genesis = pool.claim("curator1").unwrap();
    let newcomer = pool.claim("curator2").unwrap();

    // Genesis baseline is zero: full deposit times full accumulator
    assert_close(genesis.shares, dec("10.049662092876568855018862907"), "0.000000001");
    assert_close(genesis.royalties, cost / d(3), "0.000000001");

    // Newcomer baseline is the accumulator at its deposit
    assert_eq!(newcomer.shares, Decimal::ZERO);
    assert_close(newcomer.royalties, cost * d(2) / d(3), "0.000000001");
}

/// Scenario 3: a withdrawal settles against the deposit registered before it
#[test]
fn test_scenario_3_withdraw_settles_registered_stake() {
    let (mut pool, chain) = scenario_pool("0.0001");

    chain.sleep(100).unwrap();
    pool.deposit("curator2", d(1000)).unwrap();
    chain.sleep(100).unwrap();

    pool.withdraw("curator2", d(1000)).unwrap();

    assert_close(
        pool.shares().balance_of("curator2"),
        dec("6.7671052007050460753801687"),
        "0.000000001",
    );
    assert_eq!(pool.reserve().balance_of("curator2"), d(1000));
    assert_eq!(pool.deposit_of("curator2"), Decimal::ZERO);
    assert_eq!(pool.secondary().total_deposits(), d(500));

    // No stake, no further issuance
    chain.sleep(100).unwrap();
    assert!(pool.claim("curator2").unwrap().is_empty());
}

fn mixed_sequence(pool: &mut CurationPool, chain: &Chain, mut observe: impl FnMut(&CurationPool)) {
    observe(pool);
    chain.sleep(10).unwrap();
    pool.deposit("curator2", d(500)).unwrap();
    observe(pool);
    pool.buy_shares("queryMarket", d(50)).unwrap();
    observe(pool);
    // Snapshot the unclaimed issuance held by the secondary pool
    pool.claim_share_royalties("secondaryPool").unwrap();
    observe(pool);
    chain.sleep(25).unwrap();
    pool.claim("curator1").unwrap();
    observe(pool);
    pool.withdraw("curator2", d(200)).unwrap();
    observe(pool);
    pool.distribute_royalties("queryMarket", d(100)).unwrap();
    observe(pool);
    pool.transfer_shares("curator1", "curator3", d(100)).unwrap();
    observe(pool);
    chain.sleep(5).unwrap();
    pool.claim("curator2").unwrap();
    observe(pool);
    pool.claim_share_royalties("curator3").unwrap();
    observe(pool);
    assert!(pool.withdraw("curator3", d(1)).is_err());
    observe(pool);
    pool.distribute_royalties("queryMarket", d(50)).unwrap();
    observe(pool);
    // Royalties earned by unclaimed issuance are forwarded to depositors
    let forwarded = pool.claim_share_royalties("secondaryPool").unwrap();
    assert!(forwarded > Decimal::ZERO);
    observe(pool);
}

/// Scenario 4: all accumulators only ever grow
#[test]
fn test_scenario_4_accumulators_are_monotonic() {
    let (mut pool, chain) = scenario_pool("0.001");
    let mut previous = accumulators(&pool);

    mixed_sequence(&mut pool, &chain, |pool| {
        let current = accumulators(pool);
        for (now, before) in current.iter().zip(previous.iter()) {
            assert!(now >= before, "accumulator decreased from {} to {}", before, now);
        }
        previous = current;
    });

    assert!(previous.iter().all(|acc| *acc > Decimal::ZERO));
}

/// Scenario 5: reserve is conserved and both ledgers stay consistent
#[test]
fn test_scenario_5_conservation() {
    let (mut pool, chain) = scenario_pool("0.001");
    let reserve_supply = pool.reserve().total_supply();

    mixed_sequence(&mut pool, &chain, |pool| {
        assert_eq!(pool.reserve().total_supply(), reserve_supply);

        let reserve_sum: Decimal = pool.reserve().iter().map(|(_, v)| v).sum();
        assert_close(reserve_sum, pool.reserve().total_supply(), "0.000000000001");

        let share_sum: Decimal = pool.shares().iter().map(|(_, v)| v).sum();
        assert_close(share_sum, pool.shares().total_supply(), "0.000000000001");

        let deposit_sum: Decimal = pool.deposits().values().sum();
        assert_eq!(deposit_sum, pool.reserve().balance_of(pool.address()));
        assert_eq!(deposit_sum, pool.secondary().total_deposits());
    });
}

/// Scenario 6: issuance while nobody is deposited has no claimant
#[test]
fn test_scenario_6_issuance_without_depositors_is_burned() {
    let (mut pool, chain) = scenario_pool("0.0001");
    pool.withdraw("curator1", d(500)).unwrap();
    assert_eq!(pool.secondary().total_deposits(), Decimal::ZERO);

    chain.sleep(100).unwrap();
    let settlement = pool.claim("curator1").unwrap();

    assert!(settlement.is_empty());
    assert_close(pool.shares().total_supply(), d(1000), "0.000000000001");
    assert_close(pool.shares().balance_of("secondaryPool"), Decimal::ZERO, "0.000000000001");
    assert_eq!(pool.last_minted_block(), 100);
}

/// Scenario 7: a failure midway through an operation is rolled back
#[test]
fn test_scenario_7_failed_operation_is_atomic() {
    let (mut pool, chain) = scenario_pool("0.0001");
    let transfers_seen = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&transfers_seen);
    pool.register_reserve_hooks(LedgerHooks::new().post_transfer(move |ctx| {
        counter.fetch_add(1, Ordering::SeqCst);
        ctx
    }));
    pool.register_share_hooks(LedgerHooks::new().pre_mint(|ctx| {
        if ctx.to.as_deref() == Some("curator2") {
            ctx.with_amount(Decimal::NEGATIVE_ONE)
        } else {
            ctx
        }
    }));
    chain.sleep(50).unwrap();

    let before_reserve = pool.reserve().balances();
    let before_shares = pool.shares().balances();
    let before_acc = accumulators(&pool);

    // Payment and royalty distribution succeed, the share mint does not
    let err = pool.buy_shares("curator2", d(100)).unwrap_err();
    assert!(matches!(err, PoolError::InvalidAmount(_)));

    assert_eq!(pool.reserve().balances(), before_reserve);
    assert_eq!(pool.shares().balances(), before_shares);
    assert_eq!(accumulators(&pool), before_acc);
    // The payment was undone, so no observer ever saw it
    assert_eq!(transfers_seen.load(Ordering::SeqCst), 0);

    let err = pool.deposit("curator2", d(5000)).unwrap_err();
    assert!(matches!(err, PoolError::InsufficientFunds { .. }));
    assert_eq!(pool.last_minted_block(), 0);

    // Post hooks fire once the operation commits
    pool.deposit("curator2", d(500)).unwrap();
    assert!(transfers_seen.load(Ordering::SeqCst) >= 1);
    assert_eq!(pool.last_minted_block(), 50);
}

/// Scenario 9: share royalties paid in are all paid out
#[test]
fn test_scenario_9_share_royalties_are_conserved() {
    let (mut pool, chain) = scenario_pool("0.001");
    let mut paid_in = Decimal::ZERO;

    chain.sleep(20).unwrap();
    pool.distribute_royalties("queryMarket", d(100)).unwrap();
    paid_in += d(100);
    pool.deposit("curator2", d(1000)).unwrap();
    pool.buy_shares("queryMarket", d(40)).unwrap();
    chain.sleep(30).unwrap();
    pool.distribute_royalties("queryMarket", d(60)).unwrap();
    paid_in += d(60);
    pool.transfer_shares("curator1", "curator3", d(250)).unwrap();
    pool.claim("curator2").unwrap();
    pool.distribute_royalties("queryMarket", d(40)).unwrap();
    paid_in += d(40);

    let holders = ["curator1", "curator2", "curator3", "queryMarket", "secondaryPool"];
    let mut paid_out = Decimal::ZERO;
    for holder in holders {
        paid_out += pool.claim_share_royalties(holder).unwrap();
    }
    for depositor in ["curator1", "curator2"] {
        pool.claim(depositor).unwrap();
    }

    assert!(paid_out > Decimal::ZERO);
    assert_close(pool.reserve().balance_of("curationPool/royalties"), Decimal::ZERO, "0.000000000001");
    assert_eq!(pool.deferred_share_royalties(), Decimal::ZERO);
    // Transfers and claims settled the rest along the way
    assert!(paid_out <= paid_in);
    assert_close(pool.reserve().balance_of("secondaryPool"), Decimal::ZERO, "0.000000000001");
}

/// Scenario 10: the pool's own accounts cannot take part
#[test]
fn test_scenario_10_holding_addresses_rejected() {
    let (mut pool, _chain) = scenario_pool("0.0001");

    let err = pool.deposit("curationPool", d(500)).unwrap_err();
    assert_eq!(err, PoolError::ReservedAddress("curationPool".to_string()));

    let deposit_sum: Decimal = pool.deposits().values().sum();
    assert_eq!(deposit_sum, pool.reserve().balance_of(pool.address()));
    assert_eq!(deposit_sum, pool.secondary().total_deposits());
}

/// Scenario 8: concurrent callers serialize on the shared pool
#[test]
fn test_scenario_8_shared_pool() {
    let (pool, _chain) = scenario_pool("0");
    let shared = SharedCurationPool::from(pool);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let shared = shared.clone();
            std::thread::spawn(move || shared.deposit("curator2", d(100)))
        })
        .collect();
    for handle in handles {
        handle.join().unwrap().unwrap();
    }

    shared.read(|pool| {
        assert_eq!(pool.deposit_of("curator2"), d(400));
        assert_eq!(pool.reserve().balance_of("curator2"), d(600));
        assert_eq!(pool.secondary().total_deposits(), d(900));
    });
    let cost = shared.buy_shares("queryMarket", d(1000)).unwrap();
    assert!(cost > Decimal::ZERO);
    shared.write(|pool| pool.claim("curator1")).unwrap();
}
