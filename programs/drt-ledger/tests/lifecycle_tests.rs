use solana_program::pubkey::Pubkey;

use drt_ledger::engine::{DealEngine, OfferSide};
use drt_ledger::error::DrtError;
use drt_ledger::state::{DealState, DrtLedger, Gate, SECONDS_PER_DAY};

const DAY: u64 = SECONDS_PER_DAY;
const START: u64 = 1_000 * DAY;
const MATURITY: u64 = START + 30 * DAY;
const NOW: u64 = START - 5 * DAY;

struct Setup {
    ledger: DrtLedger,
    owner: Pubkey,
    alice: Pubkey,
    bob: Pubkey,
    mint: Pubkey,
}

fn setup() -> Setup {
    let owner = Pubkey::new_unique();
    let alice = Pubkey::new_unique();
    let bob = Pubkey::new_unique();
    let mint = Pubkey::new_unique();

    let mut ledger = DrtLedger::new(owner, Pubkey::new_unique(), 255);
    ledger.access.add_user(alice).unwrap();
    ledger.access.add_user(bob).unwrap();
    ledger
        .registry
        .add_standard("BTC_SEP".to_string(), 1_500, 200, START, MATURITY, 0)
        .unwrap();
    ledger
        .registry
        .add_token("USDC".to_string(), mint)
        .unwrap();

    Setup {
        ledger,
        owner,
        alice,
        bob,
        mint,
    }
}

#[test]
fn test_create_bid_then_match() {
    let mut s = setup();

    let created = DealEngine::create_offer(
        &mut s.ledger,
        s.alice,
        OfferSide::Bid,
        "BTC_SEP",
        "USDC",
        20_000,
        5_000,
        NOW + 10 * DAY,
        NOW,
    )
    .unwrap();

    assert_eq!(created.deal_id, 1);
    assert_eq!(created.escrow, 5_000);
    assert_eq!(created.token, s.mint);

    let deal = s.ledger.get_deal(1).unwrap();
    assert_eq!(deal.state, DealState::BidLive);
    assert_eq!(deal.funds, 5_000);
    assert_eq!(deal.buyer, Some(s.alice));
    assert_eq!(deal.seller, None);

    let matched = DealEngine::match_offer(&mut s.ledger, s.bob, 1, OfferSide::Bid).unwrap();
    assert_eq!(matched.escrow, 15_000);

    let deal = s.ledger.get_deal(1).unwrap();
    let configuration_id = deal.voucher.configuration_id;
    assert_eq!(deal.state, DealState::Matched);
    assert_eq!(deal.funds, 20_000);
    assert_eq!(deal.seller, Some(s.bob));

    assert_eq!(s.ledger.active_count(&s.alice, &configuration_id), 1);
    assert_eq!(s.ledger.active_count(&s.bob, &configuration_id), 1);
}

#[test]
fn test_create_ask_escrows_notional_minus_premium() {
    let mut s = setup();

    let created = DealEngine::create_offer(
        &mut s.ledger,
        s.alice,
        OfferSide::Ask,
        "BTC_SEP",
        "USDC",
        20_000,
        5_000,
        NOW + 10 * DAY,
        NOW,
    )
    .unwrap();

    assert_eq!(created.escrow, 15_000);

    let deal = s.ledger.get_deal(1).unwrap();
    assert_eq!(deal.state, DealState::AskLive);
    assert_eq!(deal.seller, Some(s.alice));
    assert_eq!(deal.buyer, None);

    // Matching an ask makes the caller the buyer and escrows the premium
    let matched = DealEngine::match_offer(&mut s.ledger, s.bob, 1, OfferSide::Ask).unwrap();
    assert_eq!(matched.escrow, 5_000);
    assert_eq!(s.ledger.get_deal(1).unwrap().buyer, Some(s.bob));
}

#[test]
fn test_create_offer_validations() {
    let mut s = setup();
    let expiry = NOW + 10 * DAY;

    let cases: Vec<(&str, &str, u64, u64, u64, DrtError)> = vec![
        ("NOPE", "USDC", 20_000, 5_000, expiry, DrtError::StandardNotFound),
        ("BTC_SEP", "EUR", 20_000, 5_000, expiry, DrtError::TokenNotFound),
        ("BTC_SEP", "USDC", 0, 5_000, expiry, DrtError::InvalidNotional),
        ("BTC_SEP", "USDC", 20_001, 5_000, expiry, DrtError::InvalidNotional),
        ("BTC_SEP", "USDC", 20_000, 0, expiry, DrtError::InvalidPremium),
        ("BTC_SEP", "USDC", 20_000, 20_000, expiry, DrtError::InvalidPremium),
        ("BTC_SEP", "USDC", 20_000, 25_000, expiry, DrtError::InvalidPremium),
        ("BTC_SEP", "USDC", 20_000, 5_000, NOW, DrtError::InvalidExpiryDate),
        (
            "BTC_SEP",
            "USDC",
            20_000,
            5_000,
            MATURITY + 1,
            DrtError::InvalidExpiryDate,
        ),
    ];

    for (symbol, denomination, notional, premium, expiry_date, expected) in cases {
        let err = DealEngine::create_offer(
            &mut s.ledger,
            s.alice,
            OfferSide::Bid,
            symbol,
            denomination,
            notional,
            premium,
            expiry_date,
            NOW,
        )
        .unwrap_err();
        assert_eq!(err, expected.into(), "case {symbol} {notional} {premium}");
    }

    assert_eq!(s.ledger.deals.count(), 0);
}

#[test]
fn test_cancel_refunds_initiator() {
    let mut s = setup();

    DealEngine::create_offer(
        &mut s.ledger,
        s.alice,
        OfferSide::Bid,
        "BTC_SEP",
        "USDC",
        20_000,
        5_000,
        NOW + 10 * DAY,
        NOW,
    )
    .unwrap();

    // Only the initiator may cancel
    let err = DealEngine::cancel(&mut s.ledger, &s.bob, 1).unwrap_err();
    assert_eq!(err, DrtError::Unauthorized.into());

    let refund = DealEngine::cancel(&mut s.ledger, &s.alice, 1).unwrap();
    assert_eq!(refund.recipient, s.alice);
    assert_eq!(refund.amount, 5_000);
    assert!(!s.ledger.deals.exists(1));
}

#[test]
fn test_cancel_rejected_after_match() {
    let mut s = setup();

    DealEngine::create_offer(
        &mut s.ledger,
        s.alice,
        OfferSide::Bid,
        "BTC_SEP",
        "USDC",
        20_000,
        5_000,
        NOW + 10 * DAY,
        NOW,
    )
    .unwrap();
    DealEngine::match_offer(&mut s.ledger, s.bob, 1, OfferSide::Bid).unwrap();

    let err = DealEngine::cancel(&mut s.ledger, &s.alice, 1).unwrap_err();
    assert_eq!(err, DrtError::WrongDealState.into());
}

#[test]
fn test_match_preconditions() {
    let mut s = setup();

    DealEngine::create_offer(
        &mut s.ledger,
        s.alice,
        OfferSide::Bid,
        "BTC_SEP",
        "USDC",
        20_000,
        5_000,
        NOW + 10 * DAY,
        NOW,
    )
    .unwrap();

    // Initiator cannot take their own offer
    let err = DealEngine::match_offer(&mut s.ledger, s.alice, 1, OfferSide::Bid).unwrap_err();
    assert_eq!(err, DrtError::CannotMatchOwnOffer.into());

    // A bid cannot be taken through the ask path
    let err = DealEngine::match_offer(&mut s.ledger, s.bob, 1, OfferSide::Ask).unwrap_err();
    assert_eq!(err, DrtError::WrongDealState.into());

    DealEngine::match_offer(&mut s.ledger, s.bob, 1, OfferSide::Bid).unwrap();

    // Already matched
    let carol = Pubkey::new_unique();
    let err = DealEngine::match_offer(&mut s.ledger, carol, 1, OfferSide::Bid).unwrap_err();
    assert_eq!(err, DrtError::WrongDealState.into());

    let err = DealEngine::match_offer(&mut s.ledger, s.bob, 99, OfferSide::Bid).unwrap_err();
    assert_eq!(err, DrtError::DealNotFound.into());
}

#[test]
fn test_voucher_snapshot_survives_standard_deletion() {
    let mut s = setup();

    DealEngine::create_offer(
        &mut s.ledger,
        s.alice,
        OfferSide::Bid,
        "BTC_SEP",
        "USDC",
        20_000,
        5_000,
        NOW + 10 * DAY,
        NOW,
    )
    .unwrap();

    s.ledger.registry.delete_standard("BTC_SEP").unwrap();
    assert!(s.ledger.registry.get_standard("BTC_SEP").is_none());

    // The deal's voucher keeps the snapshot terms
    let deal = s.ledger.get_deal(1).unwrap();
    assert_eq!(deal.voucher.strike, 1_500);
    assert_eq!(deal.voucher.fee_bps, 200);
    assert_eq!(deal.voucher.start_date, START);
    assert_eq!(deal.voucher.maturity_date, MATURITY);

    // New offers against the deleted standard are rejected
    let err = DealEngine::create_offer(
        &mut s.ledger,
        s.bob,
        OfferSide::Bid,
        "BTC_SEP",
        "USDC",
        20_000,
        5_000,
        NOW + 10 * DAY,
        NOW,
    )
    .unwrap_err();
    assert_eq!(err, DrtError::StandardNotFound.into());
}

#[test]
fn test_access_gates() {
    let s = setup();
    let stranger = Pubkey::new_unique();

    assert!(s.ledger.access.check(&s.owner, Gate::Owner).is_ok());
    assert!(s.ledger.access.check(&s.alice, Gate::User).is_ok());
    // Owners are accepted on the operator gate
    assert!(s.ledger.access.check(&s.owner, Gate::Operator).is_ok());

    assert_eq!(
        s.ledger.access.check(&stranger, Gate::Owner).unwrap_err(),
        DrtError::Unauthorized.into()
    );
    assert_eq!(
        s.ledger.access.check(&stranger, Gate::User).unwrap_err(),
        DrtError::Unauthorized.into()
    );
    // Claimback requires dissolution
    assert_eq!(
        s.ledger.access.check(&s.alice, Gate::Claimback).unwrap_err(),
        DrtError::SystemNotDissolved.into()
    );
}

#[test]
fn test_kill_switches_are_one_way_gates() {
    let mut s = setup();

    s.ledger.access.deactivate_owners();
    assert_eq!(
        s.ledger.access.check(&s.owner, Gate::Owner).unwrap_err(),
        DrtError::OwnersDeactivated.into()
    );

    s.ledger.access.restrict_users_to_claimback();
    assert_eq!(
        s.ledger.access.check(&s.alice, Gate::User).unwrap_err(),
        DrtError::RestrictedToClaimback.into()
    );

    let operator = Pubkey::new_unique();
    s.ledger.access.operators.push(operator);
    s.ledger.access.deactivate_operators();
    assert_eq!(
        s.ledger.access.check(&operator, Gate::Operator).unwrap_err(),
        DrtError::OperatorsDeactivated.into()
    );
}
