use solana_program::{program_error::ProgramError, pubkey::Pubkey};

use crate::error::DrtError;
use crate::state::{
    Deal, DealState, DrtLedger, Voucher, INVALID_LEVEL, NOTIONAL_UNIT, SECONDS_PER_DAY,
};

/// A fund movement out of custody, executed by the processor after all state
/// mutation has been committed.
#[derive(Debug, Clone, PartialEq)]
pub struct Payout {
    pub recipient: Pubkey,
    pub token: Pubkey,
    pub amount: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferSide {
    Bid,
    Ask,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreatedOffer {
    pub deal_id: u64,
    /// Amount the initiator must move into custody
    pub escrow: u64,
    pub token: Pubkey,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchedOffer {
    /// Amount the counterparty must move into custody
    pub escrow: u64,
    pub token: Pubkey,
}

/// Result of driving `evaluate` for one deal and date
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    NoAction,
    /// Offer lapsed; full funds refunded to the initiator
    Expired { refund: Payout },
    /// Matched deal entered the standard's window
    WentLive,
    /// Level at or above strike; buyer paid out
    Triggered { winner: Payout, fee: Payout },
    /// Maturity reached below strike; seller paid out
    Matured { winner: Payout, fee: Payout },
    /// Oracle unavailable at the transition; system dissolved
    Dissolved,
}

impl Evaluation {
    pub fn payouts(&self) -> Vec<Payout> {
        match self {
            Evaluation::Expired { refund } => vec![refund.clone()],
            Evaluation::Triggered { winner, fee } | Evaluation::Matured { winner, fee } => {
                vec![winner.clone(), fee.clone()]
            }
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RelayOutcome {
    /// Level already stored; no new request booked
    AlreadyAvailable,
    Requested { request_id: u64 },
    /// Oracle unhealthy; system dissolved instead
    Dissolved,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FulfillOutcome {
    Stored,
    /// Key already held a value; write-once keeps the original
    Ignored,
    /// Sentinel propagated; system dissolved
    Dissolved,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Claim {
    pub payout: Payout,
    /// True once both sides (or the sole side) have withdrawn
    pub deal_deleted: bool,
}

/// Deal lifecycle and settlement state machine. Pure state mutation over
/// `DrtLedger`; fund movements are returned as `Payout`s so the caller can
/// keep the transfer as the final step of the operation.
pub struct DealEngine;

impl DealEngine {
    pub fn create_offer(
        ledger: &mut DrtLedger,
        initiator: Pubkey,
        side: OfferSide,
        symbol: &str,
        denomination: &str,
        notional: u64,
        premium: u64,
        expiry_date: u64,
        now: u64,
    ) -> Result<CreatedOffer, ProgramError> {
        let standard = ledger
            .registry
            .get_standard(symbol)
            .ok_or(DrtError::StandardNotFound)?
            .clone();
        let token = ledger
            .registry
            .get_token(denomination)
            .ok_or(DrtError::TokenNotFound)?
            .mint;

        if notional == 0 || notional % NOTIONAL_UNIT != 0 {
            return Err(DrtError::InvalidNotional.into());
        }
        if premium == 0 || premium >= notional {
            return Err(DrtError::InvalidPremium.into());
        }
        if expiry_date <= now || expiry_date > standard.maturity_date {
            return Err(DrtError::InvalidExpiryDate.into());
        }

        let voucher = Voucher {
            notional,
            premium,
            configuration_id: standard.configuration_id,
            fee_bps: standard.fee_bps,
            strike: standard.scaled_strike()?,
            start_date: standard.start_date,
            maturity_date: standard.maturity_date,
            token,
        };

        let (state, buyer, seller, escrow) = match side {
            OfferSide::Bid => (DealState::BidLive, Some(initiator), None, premium),
            OfferSide::Ask => (
                DealState::AskLive,
                None,
                Some(initiator),
                notional - premium,
            ),
        };

        let deal = Deal {
            id: 0,
            initiator,
            buyer,
            seller,
            funds: escrow,
            expiry_date,
            voucher,
            state,
            buyer_has_claimed_back: false,
            seller_has_claimed_back: false,
            index_in_set: 0,
        };

        let deal_id = ledger.deals.insert(deal)?;

        Ok(CreatedOffer {
            deal_id,
            escrow,
            token,
        })
    }

    /// Valid only while the deal is an unmatched offer and the caller is its
    /// initiator; returns the full escrow as a refund.
    pub fn cancel(
        ledger: &mut DrtLedger,
        caller: &Pubkey,
        deal_id: u64,
    ) -> Result<Payout, ProgramError> {
        if !ledger.deals.exists(deal_id) {
            return Err(DrtError::DealNotFound.into());
        }
        {
            let deal = ledger.deals.get(deal_id).ok_or(DrtError::DealNotFound)?;
            if !deal.is_offer() {
                return Err(DrtError::WrongDealState.into());
            }
            if &deal.initiator != caller {
                return Err(DrtError::Unauthorized.into());
            }
        }

        let deal = ledger.deals.delete(deal_id)?;
        Ok(Payout {
            recipient: deal.initiator,
            token: deal.voucher.token,
            amount: deal.funds,
        })
    }

    /// Counterparty takes the open side of an offer. `side` names the offer
    /// being taken: matching a bid makes the caller the seller, matching an
    /// ask makes the caller the buyer.
    pub fn match_offer(
        ledger: &mut DrtLedger,
        caller: Pubkey,
        deal_id: u64,
        side: OfferSide,
    ) -> Result<MatchedOffer, ProgramError> {
        if !ledger.deals.exists(deal_id) {
            return Err(DrtError::DealNotFound.into());
        }

        let (buyer, seller, configuration_id, escrow, token) = {
            let deal = ledger.deals.get_mut(deal_id).ok_or(DrtError::DealNotFound)?;

            let expected_state = match side {
                OfferSide::Bid => DealState::BidLive,
                OfferSide::Ask => DealState::AskLive,
            };
            if deal.state != expected_state {
                return Err(DrtError::WrongDealState.into());
            }
            if deal.initiator == caller {
                return Err(DrtError::CannotMatchOwnOffer.into());
            }

            let escrow = match side {
                OfferSide::Bid => {
                    if deal.seller.is_some() {
                        return Err(DrtError::OfferAlreadyMatched.into());
                    }
                    deal.seller = Some(caller);
                    deal.seller_escrow()
                }
                OfferSide::Ask => {
                    if deal.buyer.is_some() {
                        return Err(DrtError::OfferAlreadyMatched.into());
                    }
                    deal.buyer = Some(caller);
                    deal.buyer_escrow()
                }
            };

            deal.state = DealState::Matched;
            deal.funds = deal.voucher.notional;

            (
                deal.buyer.ok_or(DrtError::WrongDealState)?,
                deal.seller.ok_or(DrtError::WrongDealState)?,
                deal.voucher.configuration_id,
                escrow,
                deal.voucher.token,
            )
        };

        ledger.increment_active(buyer, configuration_id);
        ledger.increment_active(seller, configuration_id);

        Ok(MatchedOffer { escrow, token })
    }

    /// Drive the settlement state machine for one deal and date. Safe to call
    /// repeatedly for the same date.
    pub fn evaluate(
        ledger: &mut DrtLedger,
        deal_id: u64,
        date: u64,
    ) -> Result<Evaluation, ProgramError> {
        if !ledger.deals.exists(deal_id) {
            return Err(DrtError::DealNotFound.into());
        }
        let snapshot = ledger
            .deals
            .get(deal_id)
            .ok_or(DrtError::DealNotFound)?
            .clone();

        match snapshot.state {
            DealState::BidLive | DealState::AskLive => {
                if date >= snapshot.expiry_date {
                    let deal = ledger.deals.delete(deal_id)?;
                    Ok(Evaluation::Expired {
                        refund: Payout {
                            recipient: deal.initiator,
                            token: deal.voucher.token,
                            amount: deal.funds,
                        },
                    })
                } else {
                    Ok(Evaluation::NoAction)
                }
            }
            DealState::Matched => {
                if snapshot.voucher.start_date < date && date <= snapshot.voucher.maturity_date {
                    if !ledger.oracle.healthy {
                        Self::dissolve(ledger);
                        return Ok(Evaluation::Dissolved);
                    }

                    // Dates are end-of-day instants but start_date is a
                    // start-of-day instant; require one full day past the
                    // start before the first trigger check.
                    if date >= snapshot.voucher.start_date + SECONDS_PER_DAY {
                        // Evaluate first so an end-of-day failure leaves the
                        // deal Matched; the survivor (if not settled away)
                        // goes Live afterwards.
                        let evaluation = Self::end_of_day(ledger, deal_id, date)?;
                        if let Some(deal) = ledger.deals.get_mut(deal_id) {
                            deal.state = DealState::Live;
                        }
                        Ok(evaluation)
                    } else {
                        ledger
                            .deals
                            .get_mut(deal_id)
                            .ok_or(DrtError::DealNotFound)?
                            .state = DealState::Live;
                        Ok(Evaluation::WentLive)
                    }
                } else {
                    Ok(Evaluation::NoAction)
                }
            }
            DealState::Live => {
                if snapshot.voucher.start_date + SECONDS_PER_DAY <= date
                    && date <= snapshot.voucher.maturity_date
                {
                    Self::end_of_day(ledger, deal_id, date)
                } else {
                    Ok(Evaluation::NoAction)
                }
            }
        }
    }

    /// End-of-day evaluation; requires the index level to already be stored
    /// for (configuration, date). A missing level is a caller sequencing bug.
    fn end_of_day(
        ledger: &mut DrtLedger,
        deal_id: u64,
        date: u64,
    ) -> Result<Evaluation, ProgramError> {
        let snapshot = ledger
            .deals
            .get(deal_id)
            .ok_or(DrtError::DealNotFound)?
            .clone();

        let level = ledger
            .index_store
            .get(&snapshot.voucher.configuration_id, date)
            .ok_or(DrtError::IndexLevelMissing)?;

        if level >= snapshot.voucher.strike {
            let winner = snapshot.buyer.ok_or(DrtError::WrongDealState)?;
            let (winner, fee) = Self::settle(ledger, deal_id, winner)?;
            Ok(Evaluation::Triggered { winner, fee })
        } else if date >= snapshot.voucher.maturity_date {
            let winner = snapshot.seller.ok_or(DrtError::WrongDealState)?;
            let (winner, fee) = Self::settle(ledger, deal_id, winner)?;
            Ok(Evaluation::Matured { winner, fee })
        } else {
            Ok(Evaluation::NoAction)
        }
    }

    /// Delete the deal, decrement both parties' counters, split funds into
    /// winner payout and fee.
    fn settle(
        ledger: &mut DrtLedger,
        deal_id: u64,
        winner: Pubkey,
    ) -> Result<(Payout, Payout), ProgramError> {
        let deal = ledger.deals.delete(deal_id)?;
        let fee = deal.fee()?;
        let winner_amount = deal
            .funds
            .checked_sub(fee)
            .ok_or(DrtError::ArithmeticOverflow)?;

        let buyer = deal.buyer.ok_or(DrtError::WrongDealState)?;
        let seller = deal.seller.ok_or(DrtError::WrongDealState)?;
        ledger.decrement_active(&buyer, &deal.voucher.configuration_id);
        ledger.decrement_active(&seller, &deal.voucher.configuration_id);

        Ok((
            Payout {
                recipient: winner,
                token: deal.voucher.token,
                amount: winner_amount,
            },
            Payout {
                recipient: ledger.fee_collector,
                token: deal.voucher.token,
                amount: fee,
            },
        ))
    }

    /// Ask the relay for a level. Short-circuits when the level exists,
    /// dissolves when the oracle is unhealthy, otherwise books a request.
    pub fn request_index_level(
        ledger: &mut DrtLedger,
        caller: Pubkey,
        configuration_id: [u8; 32],
        timestamp: u64,
    ) -> Result<RelayOutcome, ProgramError> {
        if ledger.index_store.has(&configuration_id, timestamp) {
            return Ok(RelayOutcome::AlreadyAvailable);
        }
        if !ledger.oracle.healthy {
            Self::dissolve(ledger);
            return Ok(RelayOutcome::Dissolved);
        }

        let request_id = ledger.oracle.book_request(caller)?;
        Ok(RelayOutcome::Requested { request_id })
    }

    /// Owner-driven asynchronous callback. The request must still be
    /// outstanding; it is deleted regardless of outcome. A sentinel
    /// (unhealthy relay or invalid data) never stores a value and escalates
    /// to dissolution.
    pub fn fulfill_index_level(
        ledger: &mut DrtLedger,
        request_id: u64,
        configuration_id: [u8; 32],
        timestamp: u64,
        level: u64,
        is_valid: bool,
    ) -> Result<FulfillOutcome, ProgramError> {
        ledger.oracle.take_request(request_id)?;

        if !ledger.oracle.healthy || !is_valid || level == INVALID_LEVEL {
            Self::dissolve(ledger);
            return Ok(FulfillOutcome::Dissolved);
        }

        if ledger.index_store.store(configuration_id, timestamp, level)? {
            Ok(FulfillOutcome::Stored)
        } else {
            Ok(FulfillOutcome::Ignored)
        }
    }

    /// Operator direct supply path through the same write-once store
    pub fn publish_index_level(
        ledger: &mut DrtLedger,
        configuration_id: [u8; 32],
        timestamp: u64,
        level: u64,
    ) -> Result<(), ProgramError> {
        if !ledger.index_store.store(configuration_id, timestamp, level)? {
            return Err(DrtError::IndexLevelAlreadyExists.into());
        }
        Ok(())
    }

    /// Post-dissolution unwind: each side withdraws its share exactly once;
    /// the deal is deleted when funds reach zero.
    pub fn claim_back(
        ledger: &mut DrtLedger,
        caller: &Pubkey,
        deal_id: u64,
    ) -> Result<Claim, ProgramError> {
        if !ledger.deals.exists(deal_id) {
            return Err(DrtError::DealNotFound.into());
        }

        let (share, token, configuration_id, was_active, remaining) = {
            let deal = ledger.deals.get_mut(deal_id).ok_or(DrtError::DealNotFound)?;
            if !deal.is_party(caller) {
                return Err(DrtError::NotAPartyToDeal.into());
            }

            let was_active = deal.is_active();
            let share = if deal.buyer.as_ref() == Some(caller) {
                if deal.buyer_has_claimed_back {
                    return Err(DrtError::AlreadyClaimedBack.into());
                }
                deal.buyer_has_claimed_back = true;
                deal.buyer_escrow()
            } else {
                if deal.seller_has_claimed_back {
                    return Err(DrtError::AlreadyClaimedBack.into());
                }
                deal.seller_has_claimed_back = true;
                deal.seller_escrow()
            };

            deal.funds = deal
                .funds
                .checked_sub(share)
                .ok_or(DrtError::AlreadyClaimedBack)?;

            (
                share,
                deal.voucher.token,
                deal.voucher.configuration_id,
                was_active,
                deal.funds,
            )
        };

        if was_active {
            ledger.decrement_active(caller, &configuration_id);
        }

        let deal_deleted = remaining == 0;
        if deal_deleted {
            ledger.deals.delete(deal_id)?;
        }

        Ok(Claim {
            payout: Payout {
                recipient: *caller,
                token,
                amount: share,
            },
            deal_deleted,
        })
    }

    /// One-way systemic halt: flips every kill switch and removes all
    /// standards; deals remain, reachable only through claimback.
    pub fn dissolve(ledger: &mut DrtLedger) {
        ledger.access.dissolve();
        ledger.registry.clear_standards();
    }
}
