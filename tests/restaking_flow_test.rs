use restaking_indexer::domain::{
    keys, DelegatorAssetPosition, Operator, ParticipationState, PointsAccount, PointsHourlyTotal,
    PointsNetwork, RequestStatus, WithdrawRequest,
};
use restaking_indexer::{
    Address, Amount, AssetRegistry, BlockTick, ChainEvent, EventKind, EventMeta, Indexer,
    MockPriceFeed, PointsManager, PriceOracle, PriceOracleConfig, Repository, Timestamp,
};
use std::sync::Arc;

const DELEGATOR: &str = "0x1111111111111111111111111111111111111111";
const OPERATOR: &str = "0x2222222222222222222222222222222222222222";

fn setup_indexer() -> Indexer {
    let feed = MockPriceFeed::new().with_price("tangle", 2.0);
    let oracle = PriceOracle::new(
        Arc::new(feed),
        Arc::new(AssetRegistry::with_defaults("tangle")),
        PriceOracleConfig::default(),
    );
    Indexer::new(
        Repository::in_memory(),
        Arc::new(oracle),
        PointsManager::new(PointsNetwork::Mainnet),
    )
}

fn event(block: u64, log_index: u32, kind: EventKind) -> ChainEvent {
    ChainEvent {
        meta: EventMeta {
            block_number: block,
            block_hash: format!("0xhash{}", block),
            timestamp: Timestamp::new(block * 12),
            tx_hash: Some(format!("0xtx{}-{}", block, log_index)),
            log_index,
            src_address: Address::zero(),
        },
        kind,
    }
}

fn tick(block: u64, secs: u64) -> BlockTick {
    BlockTick {
        block_number: block,
        timestamp: Timestamp::new(secs),
        hash: None,
    }
}

fn tnt(units: u64) -> Amount {
    Amount::from_u64(units).saturating_mul(Amount::pow10(18))
}

#[tokio::test]
async fn test_deposit_accrues_hourly_until_withdrawn() {
    let ix = setup_indexer();
    let delegator = Address::new(DELEGATOR);

    ix.handle(&event(
        1,
        0,
        EventKind::Deposited {
            delegator: delegator.clone(),
            token: Address::zero(),
            amount: tnt(100),
            lock: 0,
        },
    ))
    .await
    .unwrap();

    // One hour after the deposit at block 1 (t = 12).
    let report = ix.on_block(&tick(300, 12 + 3600)).await.unwrap();
    assert_eq!(report.awarded, 1);
    assert_eq!(report.points, Amount::from_u64(20_000));

    let account: PointsAccount = ix.repo().get(DELEGATOR).await.unwrap().unwrap();
    // 10_000 for the deposit itself plus 20_000 hourly.
    assert_eq!(account.total_points, Amount::from_u64(30_000));
    assert_eq!(account.total_mainnet_points, Amount::from_u64(30_000));
    assert_eq!(ix.repo().count::<PointsHourlyTotal>().await.unwrap(), 1);

    ix.handle(&event(
        301,
        0,
        EventKind::WithdrawScheduled {
            delegator: delegator.clone(),
            token: Address::zero(),
            amount: tnt(100),
            ready_round: 3,
        },
    ))
    .await
    .unwrap();
    ix.handle(&event(
        302,
        0,
        EventKind::Withdrawn {
            delegator: delegator.clone(),
            token: Address::zero(),
            amount: tnt(100),
        },
    ))
    .await
    .unwrap();

    let state: ParticipationState = ix
        .repo()
        .get(&keys::participation("delegator-hourly", DELEGATOR))
        .await
        .unwrap()
        .unwrap();
    assert!(!state.active);

    let report = ix.on_block(&tick(600, 12 + 7200)).await.unwrap();
    assert_eq!(report.awarded, 0);
    let account: PointsAccount = ix.repo().get(DELEGATOR).await.unwrap().unwrap();
    assert_eq!(account.total_points, Amount::from_u64(30_000));
}

#[tokio::test]
async fn test_withdrawals_settle_oldest_first() {
    let ix = setup_indexer();
    let delegator = Address::new(DELEGATOR);
    let mut events = vec![event(
        1,
        0,
        EventKind::Deposited {
            delegator: delegator.clone(),
            token: Address::zero(),
            amount: tnt(100),
            lock: 0,
        },
    )];
    for (log_index, amount) in [(0u32, 25u64), (1, 25), (2, 10)] {
        events.push(event(
            2,
            log_index,
            EventKind::WithdrawScheduled {
                delegator: delegator.clone(),
                token: Address::zero(),
                amount: tnt(amount),
                ready_round: 5,
            },
        ));
    }
    // The first 25 resolves the older of the two identical requests; the 10
    // then skips the remaining 25, which stays pending.
    for (log_index, amount) in [(0u32, 25u64), (1, 10)] {
        events.push(event(
            3,
            log_index,
            EventKind::Withdrawn {
                delegator: delegator.clone(),
                token: Address::zero(),
                amount: tnt(amount),
            },
        ));
    }
    ix.handle_all(&events).await.unwrap();

    let requests: Vec<WithdrawRequest> = ix.repo().find_by("delegator", &delegator).await.unwrap();
    let statuses: Vec<(u64, RequestStatus)> = requests.iter().map(|r| (r.nonce, r.status)).collect();
    assert_eq!(
        statuses,
        vec![
            (0, RequestStatus::Executed),
            (1, RequestStatus::Pending),
            (2, RequestStatus::Executed),
        ]
    );

    let positions: Vec<DelegatorAssetPosition> =
        ix.repo().find_by("delegator", &delegator).await.unwrap();
    assert_eq!(positions.len(), 1);
    assert_eq!(positions[0].deposited, tnt(40));

    // The cursor now sits past the skipped request, so a later 25 finds nothing.
    ix.handle(&event(
        4,
        0,
        EventKind::Withdrawn {
            delegator: delegator.clone(),
            token: Address::zero(),
            amount: tnt(25),
        },
    ))
    .await
    .unwrap();
    let skipped: WithdrawRequest = ix
        .repo()
        .get(&keys::withdraw_request(&delegator, 1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(skipped.status, RequestStatus::Pending);
}

#[tokio::test]
async fn test_operator_stake_saturates_at_zero() {
    let ix = setup_indexer();
    let operator = Address::new(OPERATOR);
    let events = vec![
        event(
            1,
            0,
            EventKind::OperatorRegistered {
                operator: operator.clone(),
                stake: tnt(10),
            },
        ),
        event(
            2,
            0,
            EventKind::OperatorUnstakeExecuted {
                operator: operator.clone(),
                amount: tnt(25),
            },
        ),
    ];
    ix.handle_all(&events).await.unwrap();

    let op: Operator = ix.repo().get(OPERATOR).await.unwrap().unwrap();
    assert!(op.stake.is_zero());
    let state: ParticipationState = ix
        .repo()
        .get(&keys::participation("operator-hourly", OPERATOR))
        .await
        .unwrap()
        .unwrap();
    assert!(!state.active);
}
