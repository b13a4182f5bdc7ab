// Funding ledger tests
// Contribution admission, owner-only withdrawal and the reset that follows

use fundme::identity::Address;
use fundme::ledger::{
    AccountBook, FundingLedger, LedgerConfig, LedgerError, LedgerEvent, MockPayoutTarget,
    MINIMUM_USD, WEI_PER_ETHER,
};
use fundme::oracle::{MockPriceFeed, OracleError, PriceOracle, RoundData};
use std::sync::Arc;

const SEND_VALUE: u128 = WEI_PER_ETHER; // 1 ETH

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

struct Fixture {
    ledger: FundingLedger,
    feed: Arc<MockPriceFeed>,
    book: Arc<AccountBook>,
    deployer: Address,
}

fn setup() -> Fixture {
    let deployer = Address::random();
    let feed = Arc::new(MockPriceFeed::with_defaults(Address::random()));
    let book = Arc::new(AccountBook::new());
    let ledger = FundingLedger::new(deployer, feed.clone(), book.clone());

    Fixture {
        ledger,
        feed,
        book,
        deployer,
    }
}

fn balance_sum(ledger: &FundingLedger) -> u128 {
    ledger
        .funders()
        .iter()
        .map(|f| ledger.amount_funded(f))
        .sum()
}

// ============================================================================
// CONSTRUCTION
// ============================================================================

#[test]
fn test_sets_price_feed_address() {
    let fx = setup();
    assert_eq!(fx.ledger.price_feed(), fx.feed.address());
}

#[test]
fn test_deployer_is_owner() {
    let fx = setup();
    assert_eq!(fx.ledger.owner(), &fx.deployer);
}

#[test]
fn test_new_ledger_is_empty() {
    let fx = setup();

    assert!(fx.ledger.is_empty());
    assert_eq!(fx.ledger.held_total(), 0);
    assert_eq!(fx.ledger.funder_count(), 0);
    assert_eq!(fx.ledger.minimum_usd(), MINIMUM_USD);
}

#[test]
fn test_with_config_rejects_zero_minimum() {
    let feed = Arc::new(MockPriceFeed::with_defaults(Address::random()));
    let config = LedgerConfig::new().with_minimum_usd(0);

    let result = FundingLedger::with_config(
        config,
        Address::random(),
        feed,
        Arc::new(AccountBook::new()),
    );

    assert!(matches!(result, Err(LedgerError::InvalidConfig(_))));
}

// ============================================================================
// CONTRIBUTE
// ============================================================================

#[tokio::test]
async fn test_fails_without_enough_value() {
    let mut fx = setup();

    let result = fx.ledger.contribute(&fx.deployer, 0).await;

    assert!(matches!(
        result,
        Err(LedgerError::InsufficientContribution { usd_value: 0, .. })
    ));
}

#[tokio::test]
async fn test_updates_amount_funded() {
    let mut fx = setup();

    fx.ledger.contribute(&fx.deployer, SEND_VALUE).await.unwrap();

    assert_eq!(fx.ledger.amount_funded(&fx.deployer), SEND_VALUE);
    assert_eq!(fx.ledger.held_total(), SEND_VALUE);
}

#[tokio::test]
async fn test_adds_funder_to_list() {
    let mut fx = setup();

    fx.ledger.contribute(&fx.deployer, SEND_VALUE).await.unwrap();

    assert_eq!(fx.ledger.funder(0).unwrap(), &fx.deployer);
}

#[tokio::test]
async fn test_receipt_reports_usd_value() {
    let mut fx = setup();

    let receipt = fx.ledger.contribute(&fx.deployer, SEND_VALUE).await.unwrap();

    // 1 ETH at 2000 USD
    assert_eq!(receipt.usd_value, 2000 * WEI_PER_ETHER);
    assert_eq!(receipt.balance, SEND_VALUE);
    assert!(receipt.new_funder);
    assert_eq!(receipt.round_id, 1);
}

#[tokio::test]
async fn test_under_threshold_leaves_state_unchanged() {
    let mut fx = setup();
    let other = Address::random();
    fx.ledger.contribute(&other, SEND_VALUE).await.unwrap();

    // 0.02 ETH is 40 USD at 2000 USD/ETH
    let small = WEI_PER_ETHER / 50;
    let result = fx.ledger.contribute(&fx.deployer, small).await;

    assert!(matches!(result, Err(LedgerError::InsufficientContribution { .. })));
    assert_eq!(fx.ledger.held_total(), SEND_VALUE);
    assert_eq!(fx.ledger.funder_count(), 1);
    assert_eq!(fx.ledger.amount_funded(&fx.deployer), 0);
}

#[tokio::test]
async fn test_exact_minimum_is_accepted() {
    let mut fx = setup();

    // 50 USD at 2000 USD/ETH is 0.025 ETH
    let exact = WEI_PER_ETHER / 40;
    fx.ledger.contribute(&fx.deployer, exact).await.unwrap();

    let result = fx.ledger.contribute(&fx.deployer, exact - 1).await;
    assert!(matches!(result, Err(LedgerError::InsufficientContribution { .. })));
    assert_eq!(fx.ledger.amount_funded(&fx.deployer), exact);
}

#[tokio::test]
async fn test_repeat_contributions_accumulate_single_entry() {
    let mut fx = setup();

    fx.ledger.contribute(&fx.deployer, SEND_VALUE).await.unwrap();
    let receipt = fx.ledger.contribute(&fx.deployer, SEND_VALUE).await.unwrap();

    assert!(!receipt.new_funder);
    assert_eq!(fx.ledger.funder_count(), 1);
    assert_eq!(fx.ledger.amount_funded(&fx.deployer), 2 * SEND_VALUE);
    assert_eq!(fx.ledger.held_total(), 2 * SEND_VALUE);
}

#[tokio::test]
async fn test_funders_kept_in_contribution_order() {
    let mut fx = setup();
    let funders: Vec<Address> = (0..5).map(|_| Address::random()).collect();

    for funder in &funders {
        fx.ledger.contribute(funder, SEND_VALUE).await.unwrap();
    }

    assert_eq!(fx.ledger.funders(), funders.as_slice());
    for (i, funder) in funders.iter().enumerate() {
        assert_eq!(fx.ledger.funder(i).unwrap(), funder);
    }
}

#[tokio::test]
async fn test_balance_sum_matches_held_total() {
    let mut fx = setup();
    let a = Address::random();
    let b = Address::random();

    let amounts = [(a, SEND_VALUE), (b, SEND_VALUE / 10), (a, SEND_VALUE * 3), (b, 7 * SEND_VALUE)];
    for (funder, amount) in amounts {
        fx.ledger.contribute(&funder, amount).await.unwrap();
        assert_eq!(balance_sum(&fx.ledger), fx.ledger.held_total());
    }

    assert_eq!(fx.ledger.held_total(), 11 * SEND_VALUE + SEND_VALUE / 10);
}

#[tokio::test]
async fn test_price_is_read_on_every_contribution() {
    let mut fx = setup();

    fx.ledger.contribute(&fx.deployer, SEND_VALUE).await.unwrap();
    assert_eq!(fx.feed.read_count(), 1);

    // Price crashes to 40 USD: 1 ETH is no longer enough
    fx.feed.update_answer(40_0000_0000);
    let result = fx.ledger.contribute(&fx.deployer, SEND_VALUE).await;

    assert!(matches!(result, Err(LedgerError::InsufficientContribution { .. })));
    assert_eq!(fx.feed.read_count(), 2);
    assert_eq!(fx.ledger.amount_funded(&fx.deployer), SEND_VALUE);
}

#[tokio::test]
async fn test_invalid_oracle_answer_rejects_contribution() {
    let mut fx = setup();
    fx.feed.update_answer(0);

    let result = fx.ledger.contribute(&fx.deployer, SEND_VALUE).await;

    assert_eq!(
        result.unwrap_err(),
        LedgerError::Oracle(OracleError::InvalidAnswer(0))
    );
    assert!(fx.ledger.is_empty());
}

#[tokio::test]
async fn test_conversion_overflow_rejects_contribution() {
    let mut fx = setup();

    let result = fx.ledger.contribute(&fx.deployer, u128::MAX).await;

    assert_eq!(
        result.unwrap_err(),
        LedgerError::Oracle(OracleError::ConversionOverflow)
    );
    assert!(fx.ledger.is_empty());
}

#[tokio::test]
async fn test_held_overflow_rejects_contribution() {
    // 1 USD per unit with no decimals: conversion never overflows
    let feed = Arc::new(MockPriceFeed::new(Address::random(), 0, 1));
    let config = LedgerConfig::new().with_minimum_usd(1);
    let mut ledger =
        FundingLedger::with_config(config, Address::random(), feed, Arc::new(AccountBook::new()))
            .unwrap();
    let whale = Address::random();
    let minnow = Address::random();

    ledger.contribute(&whale, u128::MAX).await.unwrap();
    let result = ledger.contribute(&minnow, 1).await;

    assert_eq!(result.unwrap_err(), LedgerError::BalanceOverflow);
    assert_eq!(ledger.funder_count(), 1);
    assert_eq!(ledger.held_total(), u128::MAX);
}

// ============================================================================
// WITHDRAW
// ============================================================================

#[tokio::test]
async fn test_withdraw_single_funder() {
    let mut fx = setup();
    fx.ledger.contribute(&fx.deployer, SEND_VALUE).await.unwrap();

    let starting_ledger_balance = fx.ledger.held_total();
    let starting_deployer_balance = fx.book.balance_of(&fx.deployer);

    let receipt = fx.ledger.withdraw(&fx.deployer).await.unwrap();

    assert_eq!(fx.ledger.held_total(), 0);
    assert_eq!(receipt.amount, starting_ledger_balance);
    assert_eq!(
        fx.book.balance_of(&fx.deployer),
        starting_deployer_balance + starting_ledger_balance
    );
    assert_eq!(fx.ledger.amount_funded(&fx.deployer), 0);
    assert_eq!(fx.ledger.funder_count(), 0);
}

#[tokio::test]
async fn test_withdraw_with_multiple_funders() {
    let mut fx = setup();
    let accounts: Vec<Address> = (0..5).map(|_| Address::random()).collect();
    for account in &accounts {
        fx.ledger.contribute(account, SEND_VALUE).await.unwrap();
    }
    assert_eq!(fx.ledger.funder_count(), 5);

    let starting_ledger_balance = fx.ledger.held_total();
    let receipt = fx.ledger.withdraw(&fx.deployer).await.unwrap();

    assert_eq!(receipt.funders_cleared, 5);
    assert_eq!(fx.ledger.held_total(), 0);
    assert_eq!(fx.book.balance_of(&fx.deployer), starting_ledger_balance);

    // Funder list is reset
    assert!(matches!(
        fx.ledger.funder(0),
        Err(LedgerError::IndexOutOfRange { index: 0, len: 0 })
    ));

    // Every balance is reset
    for account in &accounts {
        assert_eq!(fx.ledger.amount_funded(account), 0);
    }
}

#[tokio::test]
async fn test_only_owner_can_withdraw() {
    let mut fx = setup();
    fx.ledger.contribute(&fx.deployer, SEND_VALUE).await.unwrap();
    let attacker = Address::random();

    let result = fx.ledger.withdraw(&attacker).await;

    assert_eq!(
        result.unwrap_err(),
        LedgerError::Unauthorized { caller: attacker }
    );
    assert_eq!(fx.ledger.held_total(), SEND_VALUE);
    assert_eq!(fx.ledger.amount_funded(&fx.deployer), SEND_VALUE);
    assert_eq!(fx.book.balance_of(&attacker), 0);
    assert_eq!(fx.book.balance_of(&fx.deployer), 0);
}

#[tokio::test]
async fn test_withdraw_on_empty_ledger_succeeds() {
    let mut fx = setup();

    let receipt = fx.ledger.withdraw(&fx.deployer).await.unwrap();

    assert_eq!(receipt.amount, 0);
    assert_eq!(receipt.funders_cleared, 0);
    assert!(fx.ledger.is_empty());
}

#[tokio::test]
async fn test_failed_transfer_leaves_ledger_intact() {
    let owner = Address::random();
    let feed = Arc::new(MockPriceFeed::with_defaults(Address::random()));
    let payout = Arc::new(MockPayoutTarget::new().with_failures_then_success(1));
    let mut ledger = FundingLedger::new(owner, feed, payout.clone());
    let funder = Address::random();
    ledger.contribute(&funder, SEND_VALUE).await.unwrap();

    let result = ledger.withdraw(&owner).await;

    assert!(matches!(result, Err(LedgerError::TransferFailure(_))));
    assert_eq!(ledger.held_total(), SEND_VALUE);
    assert_eq!(ledger.amount_funded(&funder), SEND_VALUE);
    assert_eq!(ledger.funder(0).unwrap(), &funder);
    assert!(payout.delivered().is_empty());

    // Caller retries; the second attempt goes through
    let receipt = ledger.withdraw(&owner).await.unwrap();
    assert_eq!(receipt.amount, SEND_VALUE);
    assert_eq!(payout.delivered(), vec![(owner, SEND_VALUE)]);
    assert_eq!(payout.call_count(), 2);
    assert!(ledger.is_empty());
}

#[tokio::test]
async fn test_ledger_can_be_refunded_after_withdraw() {
    let mut fx = setup();
    let funder = Address::random();
    fx.ledger.contribute(&funder, SEND_VALUE).await.unwrap();
    fx.ledger.withdraw(&fx.deployer).await.unwrap();

    fx.ledger.contribute(&funder, SEND_VALUE * 2).await.unwrap();

    assert_eq!(fx.ledger.funder(0).unwrap(), &funder);
    assert_eq!(fx.ledger.amount_funded(&funder), SEND_VALUE * 2);
    assert_eq!(fx.ledger.held_total(), SEND_VALUE * 2);
}

// ============================================================================
// READ ACCESSORS AND EVENTS
// ============================================================================

#[tokio::test]
async fn test_accessors_have_no_side_effects() {
    let mut fx = setup();
    fx.ledger.contribute(&fx.deployer, SEND_VALUE).await.unwrap();
    let before = fx.ledger.export_state();

    for _ in 0..3 {
        let _ = fx.ledger.owner();
        let _ = fx.ledger.amount_funded(&fx.deployer);
        let _ = fx.ledger.amount_funded(&Address::random());
        let _ = fx.ledger.funder(0);
        let _ = fx.ledger.funder(9);
        let _ = fx.ledger.price_feed();
    }

    assert_eq!(fx.ledger.export_state(), before);
    assert_eq!(fx.feed.read_count(), 1);
}

#[tokio::test]
async fn test_events_are_emitted_and_drained() {
    let mut fx = setup();
    fx.ledger.contribute(&fx.deployer, SEND_VALUE).await.unwrap();
    let _ = fx.ledger.contribute(&fx.deployer, 1).await;
    fx.ledger.withdraw(&fx.deployer).await.unwrap();

    let events = fx.ledger.poll_events();

    assert_eq!(events.len(), 2);
    assert!(matches!(events[0], LedgerEvent::Funded { amount: SEND_VALUE, .. }));
    assert_eq!(
        events[1],
        LedgerEvent::Withdrawn {
            owner: fx.deployer,
            amount: SEND_VALUE,
            funders_cleared: 1,
        }
    );
    assert!(fx.ledger.poll_events().is_empty());
}

// ============================================================================
// STATE EXPORT/IMPORT
// ============================================================================

#[tokio::test]
async fn test_state_round_trip() {
    let mut fx = setup();
    let a = Address::random();
    let b = Address::random();
    fx.ledger.contribute(&a, SEND_VALUE).await.unwrap();
    fx.ledger.contribute(&b, SEND_VALUE * 2).await.unwrap();

    let bytes = fx.ledger.export_state().to_bytes().unwrap();
    let state = fundme::ledger::LedgerState::from_bytes(&bytes).unwrap();
    let restored = FundingLedger::from_state(state, fx.feed.clone(), fx.book.clone()).unwrap();

    assert_eq!(restored.owner(), &fx.deployer);
    assert_eq!(restored.funders(), &[a, b]);
    assert_eq!(restored.amount_funded(&b), SEND_VALUE * 2);
    assert_eq!(restored.held_total(), SEND_VALUE * 3);
}

#[tokio::test]
async fn test_restore_rejects_other_feed() {
    let mut fx = setup();
    fx.ledger.contribute(&fx.deployer, SEND_VALUE).await.unwrap();
    let other_feed = Arc::new(MockPriceFeed::with_defaults(Address::random()));

    let result = FundingLedger::from_state(fx.ledger.export_state(), other_feed, fx.book.clone());

    assert!(matches!(result, Err(LedgerError::StateError(_))));
}

#[tokio::test]
async fn test_restore_rejects_inconsistent_totals() {
    let mut fx = setup();
    fx.ledger.contribute(&fx.deployer, SEND_VALUE).await.unwrap();
    let mut state = fx.ledger.export_state();
    state.held += 1;

    let result = FundingLedger::from_state(state, fx.feed.clone(), fx.book.clone());

    assert!(matches!(result, Err(LedgerError::StateError(_))));
}

#[tokio::test]
async fn test_restore_rejects_duplicate_funder_with_orphan_balance() {
    let fx = setup();
    let a = Address::random();
    let b = Address::random();
    let mut state = fx.ledger.export_state();
    state.funders = vec![a, a];
    state.balances = vec![(a, 1), (b, 1)];
    state.held = 2;

    let result = FundingLedger::from_state(state, fx.feed.clone(), fx.book.clone());

    assert!(matches!(result, Err(LedgerError::StateError(_))));
}

#[tokio::test]
async fn test_restore_rejects_balance_without_funder() {
    let mut fx = setup();
    let a = Address::random();
    fx.ledger.contribute(&a, SEND_VALUE).await.unwrap();
    let mut state = fx.ledger.export_state();
    let orphan = Address::random();
    state.balances.push((orphan, SEND_VALUE));
    state.held += SEND_VALUE;
    state.funders = vec![orphan];

    let result = FundingLedger::from_state(state, fx.feed.clone(), fx.book.clone());

    assert!(matches!(result, Err(LedgerError::StateError(_))));
}

#[tokio::test]
async fn test_restore_rejects_repeated_balance_entry() {
    let mut fx = setup();
    let a = Address::random();
    fx.ledger.contribute(&a, SEND_VALUE).await.unwrap();
    let mut state = fx.ledger.export_state();
    state.balances.push((a, 0));

    let result = FundingLedger::from_state(state, fx.feed.clone(), fx.book.clone());

    assert!(matches!(result, Err(LedgerError::StateError(_))));
}

#[tokio::test]
async fn test_restored_ledger_withdraw_clears_every_balance() {
    let mut fx = setup();
    let a = Address::random();
    let b = Address::random();
    fx.ledger.contribute(&a, SEND_VALUE).await.unwrap();
    fx.ledger.contribute(&b, SEND_VALUE).await.unwrap();

    let mut restored =
        FundingLedger::from_state(fx.ledger.export_state(), fx.feed.clone(), fx.book.clone())
            .unwrap();
    restored.withdraw(&fx.deployer).await.unwrap();

    assert_eq!(restored.amount_funded(&a), 0);
    assert_eq!(restored.amount_funded(&b), 0);
    assert_eq!(restored.held_total(), 0);
    assert!(restored.export_state().balances.is_empty());
}

#[test]
fn test_round_data_reads_back_from_mock() {
    let feed = MockPriceFeed::with_defaults(Address::random());
    let round: RoundData = feed.current_round();

    assert_eq!(round.answer, 2000_0000_0000);
    assert_eq!(round.decimals, 8);
}
