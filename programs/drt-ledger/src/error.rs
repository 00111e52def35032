use num_derive::FromPrimitive;
use solana_program::{
    decode_error::DecodeError,
    program_error::{PrintProgramError, ProgramError},
};
use thiserror::Error;

#[derive(Error, Debug, Copy, Clone, FromPrimitive, PartialEq)]
pub enum DrtError {
    #[error("Invalid instruction")]
    InvalidInstruction = 0,

    #[error("Ledger already initialized")]
    AlreadyInitialized = 1,

    #[error("Ledger not initialized")]
    NotInitialized = 2,

    #[error("Caller lacks the required role")]
    Unauthorized = 3,

    #[error("Owner functions are deactivated")]
    OwnersDeactivated = 4,

    #[error("Operator functions are deactivated")]
    OperatorsDeactivated = 5,

    #[error("Users are restricted to claimback")]
    RestrictedToClaimback = 6,

    #[error("System is dissolved")]
    SystemDissolved = 7,

    #[error("System is not dissolved")]
    SystemNotDissolved = 8,

    #[error("Standard not found")]
    StandardNotFound = 9,

    #[error("Standard already exists")]
    StandardAlreadyExists = 10,

    #[error("Settlement token not found")]
    TokenNotFound = 11,

    #[error("Settlement token already exists")]
    TokenAlreadyExists = 12,

    #[error("Notional must be positive and a multiple of 10000")]
    InvalidNotional = 13,

    #[error("Premium must be positive and below notional")]
    InvalidPremium = 14,

    #[error("Expiry date must be in the future and at most maturity")]
    InvalidExpiryDate = 15,

    #[error("Deal not found")]
    DealNotFound = 16,

    #[error("Deal is in the wrong state for this operation")]
    WrongDealState = 17,

    #[error("Initiator cannot match their own offer")]
    CannotMatchOwnOffer = 18,

    #[error("Offer already has a counterparty")]
    OfferAlreadyMatched = 19,

    #[error("Caller is not a party to this deal")]
    NotAPartyToDeal = 20,

    #[error("Side has already claimed back")]
    AlreadyClaimedBack = 21,

    #[error("Insufficient balance for escrow")]
    InsufficientEscrowBalance = 22,

    #[error("Index level missing for evaluation date")]
    IndexLevelMissing = 23,

    #[error("Index level already stored for this key")]
    IndexLevelAlreadyExists = 24,

    #[error("Index level is the invalid sentinel")]
    InvalidIndexLevel = 25,

    #[error("Oracle request unknown or already fulfilled")]
    UnknownOracleRequest = 26,

    #[error("Arithmetic overflow")]
    ArithmeticOverflow = 27,

    #[error("Standard start date must precede maturity date")]
    InvalidStandardDates = 28,

    #[error("Fee basis points exceed 10000")]
    InvalidFeeBps = 29,

    #[error("Token account does not match expected mint or owner")]
    InvalidTokenAccount = 30,

    #[error("Capacity exceeded")]
    CapacityExceeded = 31,

    #[error("Symbol or denomination exceeds the maximum length")]
    SymbolTooLong = 32,
}

impl PrintProgramError for DrtError {
    fn print<E>(&self) {
        use solana_program::msg;
        msg!("DrtError: {}", self);
    }
}

impl From<DrtError> for ProgramError {
    fn from(e: DrtError) -> Self {
        ProgramError::Custom(e as u32)
    }
}

impl<T> DecodeError<T> for DrtError {
    fn type_of() -> &'static str {
        "DrtError"
    }
}
