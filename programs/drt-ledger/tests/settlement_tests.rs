use solana_program::pubkey::Pubkey;

use drt_ledger::engine::{DealEngine, Evaluation, OfferSide};
use drt_ledger::error::DrtError;
use drt_ledger::state::{DealState, DrtLedger, SECONDS_PER_DAY};

const DAY: u64 = SECONDS_PER_DAY;
const START: u64 = 1_000 * DAY;
const MATURITY: u64 = START + 30 * DAY;
const NOW: u64 = START - 5 * DAY;
const STRIKE: u64 = 1_500;
const FEE_BPS: u16 = 200;

struct Setup {
    ledger: DrtLedger,
    fee_collector: Pubkey,
    alice: Pubkey,
    bob: Pubkey,
    configuration_id: [u8; 32],
}

/// Ledger with a matched deal: alice is buyer, bob is seller,
/// notional 20000, premium 5000
fn setup_matched() -> Setup {
    let owner = Pubkey::new_unique();
    let fee_collector = Pubkey::new_unique();
    let alice = Pubkey::new_unique();
    let bob = Pubkey::new_unique();

    let mut ledger = DrtLedger::new(owner, fee_collector, 255);
    ledger.access.add_user(alice).unwrap();
    ledger.access.add_user(bob).unwrap();
    let configuration_id = ledger
        .registry
        .add_standard("BTC_SEP".to_string(), STRIKE, FEE_BPS, START, MATURITY, 0)
        .unwrap();
    ledger
        .registry
        .add_token("USDC".to_string(), Pubkey::new_unique())
        .unwrap();

    DealEngine::create_offer(
        &mut ledger,
        alice,
        OfferSide::Bid,
        "BTC_SEP",
        "USDC",
        20_000,
        5_000,
        NOW + 10 * DAY,
        NOW,
    )
    .unwrap();
    DealEngine::match_offer(&mut ledger, bob, 1, OfferSide::Bid).unwrap();

    Setup {
        ledger,
        fee_collector,
        alice,
        bob,
        configuration_id,
    }
}

#[test]
fn test_offer_expiry_refunds_full_escrow() {
    let mut s = setup_matched();

    // A second, unmatched offer from bob
    DealEngine::create_offer(
        &mut s.ledger,
        s.bob,
        OfferSide::Ask,
        "BTC_SEP",
        "USDC",
        30_000,
        10_000,
        NOW + 3 * DAY,
        NOW,
    )
    .unwrap();

    // Before expiry: no-op
    let eval = DealEngine::evaluate(&mut s.ledger, 2, NOW + 2 * DAY).unwrap();
    assert_eq!(eval, Evaluation::NoAction);
    assert!(s.ledger.deals.exists(2));

    // At expiry: deleted, full funds back to the initiator
    let eval = DealEngine::evaluate(&mut s.ledger, 2, NOW + 3 * DAY).unwrap();
    match eval {
        Evaluation::Expired { refund } => {
            assert_eq!(refund.recipient, s.bob);
            assert_eq!(refund.amount, 20_000);
        }
        other => panic!("expected Expired, got {other:?}"),
    }
    assert!(!s.ledger.deals.exists(2));
}

#[test]
fn test_matched_is_noop_outside_window() {
    let mut s = setup_matched();

    // Before the window opens nothing happens, including at start_date itself
    for date in [NOW, START - 1, START] {
        let eval = DealEngine::evaluate(&mut s.ledger, 1, date).unwrap();
        assert_eq!(eval, Evaluation::NoAction);
        assert_eq!(s.ledger.get_deal(1).unwrap().state, DealState::Matched);
    }
}

#[test]
fn test_full_day_guard_before_first_trigger_check() {
    let mut s = setup_matched();

    // Inside the window but less than a full day past start: goes Live
    // without an end-of-day check, so no index level is needed yet
    let eval = DealEngine::evaluate(&mut s.ledger, 1, START + 1).unwrap();
    assert_eq!(eval, Evaluation::WentLive);
    assert_eq!(s.ledger.get_deal(1).unwrap().state, DealState::Live);

    // Still under one full day: no-op
    let eval = DealEngine::evaluate(&mut s.ledger, 1, START + DAY - 1).unwrap();
    assert_eq!(eval, Evaluation::NoAction);
}

#[test]
fn test_missing_level_is_fatal() {
    let mut s = setup_matched();

    DealEngine::evaluate(&mut s.ledger, 1, START + 1).unwrap();

    let err = DealEngine::evaluate(&mut s.ledger, 1, START + DAY).unwrap_err();
    assert_eq!(err, DrtError::IndexLevelMissing.into());
}

#[test]
fn test_missing_level_leaves_matched_state_untouched() {
    let mut s = setup_matched();
    let date = START + DAY;

    // Failed evaluation must not half-apply the Matched -> Live transition
    let err = DealEngine::evaluate(&mut s.ledger, 1, date).unwrap_err();
    assert_eq!(err, DrtError::IndexLevelMissing.into());
    assert_eq!(s.ledger.get_deal(1).unwrap().state, DealState::Matched);

    // Once the level lands, the same call settles normally
    DealEngine::publish_index_level(&mut s.ledger, s.configuration_id, date, STRIKE).unwrap();
    let eval = DealEngine::evaluate(&mut s.ledger, 1, date).unwrap();
    assert!(matches!(eval, Evaluation::Triggered { .. }));
    assert!(!s.ledger.deals.exists(1));
}

#[test]
fn test_triggered_pays_buyer_minus_fee() {
    let mut s = setup_matched();
    let date = START + DAY;

    DealEngine::publish_index_level(&mut s.ledger, s.configuration_id, date, STRIKE).unwrap();

    // Matched deal straight through Live to Triggered in one evaluation
    let eval = DealEngine::evaluate(&mut s.ledger, 1, date).unwrap();
    match eval {
        Evaluation::Triggered { winner, fee } => {
            // fee = 20000 * 200 / 10000 = 400
            assert_eq!(winner.recipient, s.alice);
            assert_eq!(winner.amount, 19_600);
            assert_eq!(fee.recipient, s.fee_collector);
            assert_eq!(fee.amount, 400);

            // Fund conservation: escrowed premium + counterparty escrow
            // equals everything paid out
            assert_eq!(winner.amount + fee.amount, 20_000);
        }
        other => panic!("expected Triggered, got {other:?}"),
    }

    assert!(!s.ledger.deals.exists(1));
    assert_eq!(s.ledger.active_count(&s.alice, &s.configuration_id), 0);
    assert_eq!(s.ledger.active_count(&s.bob, &s.configuration_id), 0);
}

#[test]
fn test_below_strike_waits_until_maturity() {
    let mut s = setup_matched();
    let mid_date = START + DAY;

    DealEngine::publish_index_level(&mut s.ledger, s.configuration_id, mid_date, STRIKE - 1)
        .unwrap();

    let eval = DealEngine::evaluate(&mut s.ledger, 1, mid_date).unwrap();
    assert_eq!(eval, Evaluation::NoAction);
    assert!(s.ledger.deals.exists(1));
}

#[test]
fn test_matured_pays_seller_minus_fee() {
    let mut s = setup_matched();

    DealEngine::publish_index_level(&mut s.ledger, s.configuration_id, MATURITY, STRIKE - 1)
        .unwrap();

    let eval = DealEngine::evaluate(&mut s.ledger, 1, MATURITY).unwrap();
    match eval {
        Evaluation::Matured { winner, fee } => {
            assert_eq!(winner.recipient, s.bob);
            assert_eq!(winner.amount, 19_600);
            assert_eq!(fee.recipient, s.fee_collector);
            assert_eq!(fee.amount, 400);
        }
        other => panic!("expected Matured, got {other:?}"),
    }

    assert!(!s.ledger.deals.exists(1));
    assert_eq!(s.ledger.active_count(&s.alice, &s.configuration_id), 0);
    assert_eq!(s.ledger.active_count(&s.bob, &s.configuration_id), 0);
}

#[test]
fn test_live_is_noop_past_maturity() {
    let mut s = setup_matched();

    DealEngine::evaluate(&mut s.ledger, 1, START + 1).unwrap();

    let eval = DealEngine::evaluate(&mut s.ledger, 1, MATURITY + DAY).unwrap();
    assert_eq!(eval, Evaluation::NoAction);
}

#[test]
fn test_evaluate_unknown_deal() {
    let mut s = setup_matched();

    let err = DealEngine::evaluate(&mut s.ledger, 42, START + DAY).unwrap_err();
    assert_eq!(err, DrtError::DealNotFound.into());
}

#[test]
fn test_scaled_strike_drives_trigger_comparison() {
    let owner = Pubkey::new_unique();
    let alice = Pubkey::new_unique();
    let bob = Pubkey::new_unique();

    let mut ledger = DrtLedger::new(owner, Pubkey::new_unique(), 255);
    ledger.access.add_user(alice).unwrap();
    ledger.access.add_user(bob).unwrap();
    // strike 15, scaled by 10^2 at snapshot -> 1500
    let configuration_id = ledger
        .registry
        .add_standard("SCALED".to_string(), 15, FEE_BPS, START, MATURITY, 2)
        .unwrap();
    ledger
        .registry
        .add_token("USDC".to_string(), Pubkey::new_unique())
        .unwrap();

    DealEngine::create_offer(
        &mut ledger,
        alice,
        OfferSide::Bid,
        "SCALED",
        "USDC",
        20_000,
        5_000,
        NOW + 10 * DAY,
        NOW,
    )
    .unwrap();
    assert_eq!(ledger.get_deal(1).unwrap().voucher.strike, 1_500);

    DealEngine::match_offer(&mut ledger, bob, 1, OfferSide::Bid).unwrap();

    let date = START + DAY;
    DealEngine::publish_index_level(&mut ledger, configuration_id, date, 1_499).unwrap();
    let eval = DealEngine::evaluate(&mut ledger, 1, date).unwrap();
    assert_eq!(eval, Evaluation::NoAction);
}
