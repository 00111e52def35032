use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{program_error::ProgramError, pubkey::Pubkey};

use crate::error::DrtError;

/// Notional amounts must be a multiple of this unit so fee arithmetic is exact
pub const NOTIONAL_UNIT: u64 = 10_000;
pub const BPS_DENOMINATOR: u64 = 10_000;
pub const SECONDS_PER_DAY: u64 = 86_400;

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DealState {
    /// Bid offer awaiting a seller
    BidLive,
    /// Ask offer awaiting a buyer
    AskLive,
    /// Both sides escrowed, waiting for the standard's start window
    Matched,
    /// Inside [start_date, maturity_date], evaluated daily
    Live,
}

/// Immutable snapshot of financial terms captured onto a deal at creation.
/// The strike is stored pre-scaled by the standard's power-of-ten multiplier
/// so settlement never has to read the (deletable) standard again.
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq)]
pub struct Voucher {
    pub notional: u64,
    pub premium: u64,
    pub configuration_id: [u8; 32],
    pub fee_bps: u16,
    pub strike: u64,
    pub start_date: u64,
    pub maturity_date: u64,
    /// Settlement currency mint
    pub token: Pubkey,
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq)]
pub struct Deal {
    /// Unique, monotonically assigned, stable across set compaction
    pub id: u64,

    pub initiator: Pubkey,
    pub buyer: Option<Pubkey>,
    pub seller: Option<Pubkey>,

    /// Current escrowed balance; always equals the sum still owed to parties
    pub funds: u64,

    /// Date after which an unmatched offer lapses
    pub expiry_date: u64,

    pub voucher: Voucher,
    pub state: DealState,

    pub buyer_has_claimed_back: bool,
    pub seller_has_claimed_back: bool,

    /// Position in the deal set's backing array; fixed up on compaction
    pub index_in_set: u32,
}

impl Deal {
    /// Serialized size upper bound (strings-free, all fields fixed width)
    pub const LEN: usize = 8 + 32 + 33 + 33 + 8 + 8 + Voucher::LEN + 1 + 1 + 1 + 4;

    /// Escrow owed by the buyer side
    pub fn buyer_escrow(&self) -> u64 {
        self.voucher.premium
    }

    /// Escrow owed by the seller side
    pub fn seller_escrow(&self) -> u64 {
        self.voucher.notional - self.voucher.premium
    }

    /// Settlement fee, floor of notional * fee_bps / 10000
    pub fn fee(&self) -> Result<u64, ProgramError> {
        let fee = (self.voucher.notional as u128)
            .checked_mul(self.voucher.fee_bps as u128)
            .ok_or(DrtError::ArithmeticOverflow)?
            / BPS_DENOMINATOR as u128;
        Ok(fee as u64)
    }

    pub fn is_offer(&self) -> bool {
        matches!(self.state, DealState::BidLive | DealState::AskLive)
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, DealState::Matched | DealState::Live)
    }

    pub fn is_party(&self, address: &Pubkey) -> bool {
        self.buyer.as_ref() == Some(address) || self.seller.as_ref() == Some(address)
    }
}

impl Voucher {
    pub const LEN: usize = 8 + 8 + 32 + 2 + 8 + 8 + 8 + 32;
}
