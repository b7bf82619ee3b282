//! Treasury Settlement Tests - Mocked Pipeline Runs
//!
//! Drives single `TreasurySettler` runs against mocked chain, venue and
//! archive ports with a real in-memory lock store: the burn partition,
//! the minimum-output floor, the zero-reward degraded run, lock
//! exclusion, and lock release on failure.

use std::sync::Arc;

use mockall::mock;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::broadcast;
use uuid::Uuid;

use nft_flywheel_bot::adapters::locks::MemoryLockStore;
use nft_flywheel_bot::config::AppConfig;
use nft_flywheel_bot::domain::events::{FlywheelEvent, SettlementSkip};
use nft_flywheel_bot::domain::flywheel::FulfillmentCall;
use nft_flywheel_bot::domain::settlement::{SettlementResult, SettlementStep};
use nft_flywheel_bot::ports::chain_client::CallOutcome;
use nft_flywheel_bot::ports::lock_store::LockStore;
use nft_flywheel_bot::usecases::lock_manager::LockManager;
use nft_flywheel_bot::usecases::treasury::{TREASURY_BURN_LOCK, TreasurySettler};

// ---- Mock Definitions ----

mock! {
    pub ChainCli {}

    #[async_trait::async_trait]
    impl nft_flywheel_bot::ports::chain_client::ChainClient for ChainCli {
        fn address(&self) -> &str;

        async fn native_balance(&self, address: &str) -> anyhow::Result<Decimal>;

        async fn erc20_balance(&self, token: &str, owner: &str) -> anyhow::Result<Decimal>;

        async fn nft_owner(&self, collection: &str, token_id: &String) -> anyhow::Result<String>;

        async fn submit_fulfillment(&self, call: &FulfillmentCall) -> anyhow::Result<CallOutcome>;

        async fn transfer_native(&self, to: &str, amount: Decimal) -> anyhow::Result<CallOutcome>;

        async fn transfer_erc20(
            &self,
            token: &str,
            to: &str,
            amount: Decimal,
        ) -> anyhow::Result<CallOutcome>;

        async fn gas_price_gwei(&self) -> anyhow::Result<f64>;

        async fn is_healthy(&self) -> bool;
    }
}

mock! {
    pub Venue {}

    #[async_trait::async_trait]
    impl nft_flywheel_bot::ports::swap_venue::SwapVenue for Venue {
        async fn quote_native_for_reward(&self, amount_in: Decimal) -> anyhow::Result<Decimal>;

        async fn wrap_native(&self, amount: Decimal) -> anyhow::Result<CallOutcome>;

        async fn approve_router(&self, amount: Decimal) -> anyhow::Result<CallOutcome>;

        async fn swap_wrapped_for_reward(
            &self,
            amount_in: Decimal,
            min_out: Decimal,
        ) -> anyhow::Result<CallOutcome>;

        async fn is_healthy(&self) -> bool;
    }
}

mock! {
    pub Archive {}

    #[async_trait::async_trait]
    impl nft_flywheel_bot::ports::archive::SettlementArchive for Archive {
        async fn append_result(&self, result: &SettlementResult) -> anyhow::Result<()>;

        async fn load_results(&self) -> anyhow::Result<Vec<SettlementResult>>;

        async fn record_step(&self, run_id: Uuid, step: SettlementStep) -> anyhow::Result<()>;

        async fn clear_checkpoint(&self) -> anyhow::Result<()>;

        async fn interrupted_run(
            &self,
        ) -> anyhow::Result<Option<nft_flywheel_bot::ports::archive::CheckpointRecord>>;

        async fn is_healthy(&self) -> bool;
    }
}

// ---- Fixtures ----

const TREASURY: &str = "0x2222222222222222222222222222222222222222";
const TRADING: &str = "0x1111111111111111111111111111111111111111";
const REWARD_TOKEN: &str = "0xb000000000000000000000000000000000000000";
const BURN_ADDRESS: &str = "0x000000000000000000000000000000000000dEaD";

fn test_config() -> AppConfig {
    toml::from_str(
        r#"
        [bot]
        name = "settlement-test"

        [chain]
        rpc_url = "http://localhost:8545"
        chain_id = 137

        [gas]

        [marketplace]
        base_url = "http://localhost:9999"
        collection = "0xc01lec7000000000000000000000000000000000"

        [swap]
        router = "0xr000000000000000000000000000000000000000"
        wrapped_native = "0xw000000000000000000000000000000000000000"
        reward_token = "0xb000000000000000000000000000000000000000"
        slippage_fraction = 0.10

        [flywheel]
        markup_fraction = 0.20

        [treasury]
        min_settle_balance = 1.0
        gas_reserve = 0.5

        [risk]
        daily_spend_cap = 5.0

        [lock]
        backend = "memory"
        ttl_seconds = 600

        [metrics]

        [persistence]
        "#,
    )
    .expect("test config must parse")
}

fn ok_outcome(hash: &str) -> CallOutcome {
    CallOutcome {
        tx_hash: hash.to_string(),
        success: true,
        block_number: 500,
        gas_cost: dec!(0.002),
    }
}

/// Archive mock that accepts every write; for tests not asserting on
/// journal contents.
fn permissive_archive() -> MockArchive {
    let mut archive = MockArchive::new();
    archive.expect_record_step().returning(|_, _| Ok(()));
    archive.expect_append_result().returning(|_| Ok(()));
    archive.expect_clear_checkpoint().returning(|| Ok(()));
    archive
}

struct Harness {
    settler: TreasurySettler<MockChainCli, MockVenue, MockArchive>,
    events_rx: broadcast::Receiver<FlywheelEvent>,
    store: Arc<MemoryLockStore>,
    _shutdown_tx: broadcast::Sender<()>,
}

fn harness(chain: MockChainCli, venue: MockVenue, archive: MockArchive) -> Harness {
    let (events_tx, events_rx) = broadcast::channel(64);
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let store = Arc::new(MemoryLockStore::new());
    let locks = LockManager::new(
        Arc::clone(&store) as Arc<dyn LockStore>,
        600,
        events_tx.clone(),
    );
    let settler = TreasurySettler::new(
        Arc::new(chain),
        Arc::new(venue),
        Arc::new(archive),
        locks,
        test_config(),
        TRADING.to_string(),
        events_tx,
        shutdown_rx,
    );
    Harness {
        settler,
        events_rx,
        store,
        _shutdown_tx: shutdown_tx,
    }
}

fn drain(rx: &mut broadcast::Receiver<FlywheelEvent>) -> Vec<FlywheelEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

// ---- Tests ----

#[tokio::test]
async fn test_below_threshold_is_a_noop() {
    let mut chain = MockChainCli::new();
    chain.expect_address().return_const(TREASURY.to_string());
    chain
        .expect_native_balance()
        .times(1)
        .returning(|_| Ok(dec!(0.7)));

    // Venue untouched: any call would panic.
    let mut h = harness(chain, MockVenue::new(), MockArchive::new());
    let result = h.settler.settle_once().await.unwrap();

    assert!(result.is_none());
    assert!(drain(&mut h.events_rx).iter().any(|e| matches!(
        e,
        FlywheelEvent::SettlementSkipped {
            reason: SettlementSkip::BelowThreshold
        }
    )));
    // No lock was ever taken.
    assert!(h.store.peek(TREASURY_BURN_LOCK).await.unwrap().is_none());
}

#[tokio::test]
async fn test_full_pipeline_partitions_swaps_and_burns() {
    // The reference example: balance 10, reserve 0.5, so the remainder
    // 9.5 splits into a 9.405 swap tranche and a 0.095 top-up.
    let mut chain = MockChainCli::new();
    chain.expect_address().return_const(TREASURY.to_string());
    chain
        .expect_native_balance()
        .times(1)
        .returning(|_| Ok(dec!(10)));
    chain.expect_gas_price_gwei().returning(|| Ok(32.5));
    chain
        .expect_erc20_balance()
        .withf(|token, owner| token == REWARD_TOKEN && owner == TREASURY)
        .times(1)
        .returning(|_, _| Ok(dec!(99000)));
    chain
        .expect_transfer_erc20()
        .withf(|token, to, amount| {
            token == REWARD_TOKEN && to == BURN_ADDRESS && *amount == dec!(99000)
        })
        .times(1)
        .returning(|_, _, _| Ok(ok_outcome("0xburn")));
    chain
        .expect_transfer_native()
        .withf(|to, amount| to == TRADING && *amount == dec!(0.095))
        .times(1)
        .returning(|_, _| Ok(ok_outcome("0xtopup")));

    let mut venue = MockVenue::new();
    venue
        .expect_quote_native_for_reward()
        .withf(|amount| *amount == dec!(9.405))
        .times(1)
        .returning(|_| Ok(dec!(100000)));
    venue
        .expect_wrap_native()
        .withf(|amount| *amount == dec!(9.405))
        .times(1)
        .returning(|_| Ok(ok_outcome("0xwrap")));
    venue
        .expect_approve_router()
        .withf(|amount| *amount == dec!(9.405))
        .times(1)
        .returning(|_| Ok(ok_outcome("0xapprove")));
    // 10% slippage tolerance on a 100000 quote floors the swap at 90000.
    venue
        .expect_swap_wrapped_for_reward()
        .withf(|amount_in, min_out| *amount_in == dec!(9.405) && *min_out == dec!(90000))
        .times(1)
        .returning(|_, _| Ok(ok_outcome("0xswap")));

    let mut archive = MockArchive::new();
    archive.expect_record_step().returning(|_, _| Ok(()));
    archive
        .expect_append_result()
        .withf(|result| {
            !result.degraded
                && result.native_swapped == dec!(9.405)
                && result.gas_topup == dec!(0.095)
                && result.native_reserved_for_gas == dec!(0.5)
                && result.reward_burned == dec!(99000)
                && result.settlement_tx_id.as_deref() == Some("0xburn")
        })
        .times(1)
        .returning(|_| Ok(()));
    archive.expect_clear_checkpoint().times(1).returning(|| Ok(()));

    let mut h = harness(chain, venue, archive);
    let result = h.settler.settle_once().await.unwrap().expect("pipeline ran");

    assert_eq!(result.native_received, dec!(10));
    assert_eq!(result.reward_burned, dec!(99000));
    assert!(!result.degraded);

    // The lock was released on the happy path.
    assert!(h.store.peek(TREASURY_BURN_LOCK).await.unwrap().is_none());

    // Steps were announced in pipeline order.
    let steps: Vec<SettlementStep> = drain(&mut h.events_rx)
        .into_iter()
        .filter_map(|e| match e {
            FlywheelEvent::SettlementStepDone { step, .. } => Some(step),
            _ => None,
        })
        .collect();
    assert_eq!(steps, SettlementStep::ALL.to_vec());
}

#[tokio::test]
async fn test_zero_reward_balance_skips_burn_and_degrades() {
    let mut chain = MockChainCli::new();
    chain.expect_address().return_const(TREASURY.to_string());
    chain
        .expect_native_balance()
        .times(1)
        .returning(|_| Ok(dec!(10)));
    chain.expect_gas_price_gwei().returning(|| Ok(30.0));
    // Swap confirmed, yet nothing arrived.
    chain
        .expect_erc20_balance()
        .times(1)
        .returning(|_, _| Ok(Decimal::ZERO));
    // No transfer_erc20 / transfer_native expectations: burning zero or
    // topping up after a degraded run would panic.

    let mut venue = MockVenue::new();
    venue
        .expect_quote_native_for_reward()
        .returning(|_| Ok(dec!(100000)));
    venue
        .expect_wrap_native()
        .returning(|_| Ok(ok_outcome("0xwrap")));
    venue
        .expect_approve_router()
        .returning(|_| Ok(ok_outcome("0xapprove")));
    venue
        .expect_swap_wrapped_for_reward()
        .returning(|_, _| Ok(ok_outcome("0xswap")));

    let mut archive = MockArchive::new();
    archive.expect_record_step().returning(|_, _| Ok(()));
    archive
        .expect_append_result()
        .withf(|result| {
            result.degraded
                && result.reward_burned == Decimal::ZERO
                && result.settlement_tx_id.is_none()
                && result.gas_topup == Decimal::ZERO
        })
        .times(1)
        .returning(|_| Ok(()));
    archive.expect_clear_checkpoint().times(1).returning(|| Ok(()));

    let mut h = harness(chain, venue, archive);
    let result = h.settler.settle_once().await.unwrap().expect("degraded run");

    assert!(result.degraded);
    assert_eq!(result.reward_burned, Decimal::ZERO);
    assert!(result.settlement_tx_id.is_none());
    assert!(h.store.peek(TREASURY_BURN_LOCK).await.unwrap().is_none());
}

#[tokio::test]
async fn test_reverted_swap_aborts_before_burn() {
    // The on-chain minimum-output guard firing (stale or manipulated
    // quote) surfaces as a reverted swap; nothing after it may run.
    let mut chain = MockChainCli::new();
    chain.expect_address().return_const(TREASURY.to_string());
    chain
        .expect_native_balance()
        .times(1)
        .returning(|_| Ok(dec!(10)));
    chain.expect_gas_price_gwei().returning(|| Ok(30.0));
    // No erc20_balance / transfer expectations past the swap.

    let mut venue = MockVenue::new();
    venue
        .expect_quote_native_for_reward()
        .returning(|_| Ok(dec!(100000)));
    venue
        .expect_wrap_native()
        .returning(|_| Ok(ok_outcome("0xwrap")));
    venue
        .expect_approve_router()
        .returning(|_| Ok(ok_outcome("0xapprove")));
    venue.expect_swap_wrapped_for_reward().returning(|_, _| {
        Ok(CallOutcome {
            tx_hash: "0xswap".to_string(),
            success: false,
            block_number: 500,
            gas_cost: dec!(0.002),
        })
    });

    let mut archive = MockArchive::new();
    archive.expect_record_step().returning(|_, _| Ok(()));
    // No append_result: a failed run is never journaled.

    let mut h = harness(chain, venue, archive);
    let err = h.settler.settle_once().await.unwrap_err();
    assert!(err.to_string().contains("aborted at step swapped"));

    // The lock was released despite the failure.
    assert!(h.store.peek(TREASURY_BURN_LOCK).await.unwrap().is_none());
}

#[tokio::test]
async fn test_failed_wrap_releases_lock_for_next_poll() {
    let mut chain = MockChainCli::new();
    chain.expect_address().return_const(TREASURY.to_string());
    chain
        .expect_native_balance()
        .times(1)
        .returning(|_| Ok(dec!(10)));
    chain.expect_gas_price_gwei().returning(|| Ok(30.0));

    let mut venue = MockVenue::new();
    venue
        .expect_quote_native_for_reward()
        .returning(|_| Ok(dec!(100000)));
    venue
        .expect_wrap_native()
        .returning(|_| Err(anyhow::anyhow!("rpc timeout")));

    let mut h = harness(chain, venue, permissive_archive());
    assert!(h.settler.settle_once().await.is_err());

    // Another instance can settle immediately; no TTL wait needed.
    assert!(h
        .store
        .try_acquire(TREASURY_BURN_LOCK, "other-instance", std::time::Duration::from_secs(600))
        .await
        .unwrap());
}

#[tokio::test]
async fn test_lock_held_elsewhere_skips_run() {
    let mut chain = MockChainCli::new();
    chain.expect_address().return_const(TREASURY.to_string());
    chain
        .expect_native_balance()
        .times(1)
        .returning(|_| Ok(dec!(10)));

    // Venue untouched: the pipeline must never start.
    let mut h = harness(chain, MockVenue::new(), MockArchive::new());
    assert!(h
        .store
        .try_acquire(
            TREASURY_BURN_LOCK,
            "another-process",
            std::time::Duration::from_secs(600)
        )
        .await
        .unwrap());

    let result = h.settler.settle_once().await.unwrap();
    assert!(result.is_none());
    assert!(drain(&mut h.events_rx).iter().any(|e| matches!(
        e,
        FlywheelEvent::SettlementSkipped {
            reason: SettlementSkip::LockBusy
        }
    )));

    // The other process's lock was not disturbed.
    let record = h.store.peek(TREASURY_BURN_LOCK).await.unwrap().unwrap();
    assert_eq!(record.holder, "another-process");
}
