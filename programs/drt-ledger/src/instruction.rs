use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    instruction::{AccountMeta, Instruction},
    program_error::ProgramError,
    pubkey::Pubkey,
};

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone)]
pub enum DrtInstruction {
    /// Create and initialize the ledger account; caller becomes first owner
    /// Accounts:
    /// 0. `[signer, writable]` Payer / initial owner
    /// 1. `[signer, writable]` Ledger account
    /// 2. `[]` System program
    /// 3. `[]` Rent sysvar
    Initialize { fee_collector: Pubkey },

    /// Accounts:
    /// 0. `[signer]` Owner
    /// 1. `[writable]` Ledger account
    AddOwner { address: Pubkey },

    /// Accounts: as AddOwner
    AddOperator { address: Pubkey },

    /// Register an identity-verified user (stands in for the KYX gateway)
    /// Accounts: as AddOwner
    RegisterUser { address: Pubkey },

    /// Add a named template of economic parameters; its configuration id is
    /// keccak256(symbol)
    /// Accounts: as AddOwner
    AddStandard {
        symbol: String,
        strike: u64,
        fee_bps: u16,
        start_date: u64,
        maturity_date: u64,
        exponent_of_ten_multiplier_for_strike: u8,
    },

    /// Accounts: as AddOwner
    DeleteStandard { symbol: String },

    /// Map a denomination string to a settlement currency mint
    /// Accounts: as AddOwner
    AddToken { denomination: String, mint: Pubkey },

    /// Accounts: as AddOwner
    DeleteToken { denomination: String },

    /// One-way kill switches
    /// Accounts: as AddOwner
    DeactivateOwners,
    DeactivateOperators,
    RestrictUsersToClaimback,

    /// Owner-maintained relay health flag
    /// Accounts: as AddOwner
    SetOracleHealth { healthy: bool },

    /// Create a bid offer, escrowing the premium
    /// Accounts:
    /// 0. `[signer]` Initiator (registered user)
    /// 1. `[writable]` Ledger account
    /// 2. `[writable]` Initiator settlement token account
    /// 3. `[writable]` Custody token account
    /// 4. `[]` Token program
    CreateBid {
        symbol: String,
        denomination: String,
        notional: u64,
        premium: u64,
        expiry_date: u64,
    },

    /// Create an ask offer, escrowing notional - premium
    /// Accounts: as CreateBid
    CreateAsk {
        symbol: String,
        denomination: String,
        notional: u64,
        premium: u64,
        expiry_date: u64,
    },

    /// Cancel an unmatched offer; full escrow refunded to the initiator
    /// Accounts:
    /// 0. `[signer]` Initiator
    /// 1. `[writable]` Ledger account
    /// 2. `[writable]` Custody token account
    /// 3. `[writable]` Initiator settlement token account
    /// 4. `[]` Custody authority PDA
    /// 5. `[]` Token program
    CancelDeal { deal_id: u64 },

    /// Take a bid offer as seller, escrowing notional - premium
    /// Accounts: as CreateBid
    MatchBid { deal_id: u64 },

    /// Take an ask offer as buyer, escrowing the premium
    /// Accounts: as CreateBid
    MatchAsk { deal_id: u64 },

    /// Drive the settlement state machine for one deal and date
    /// Accounts:
    /// 0. `[signer]` Operator (or owner)
    /// 1. `[writable]` Ledger account
    /// 2. `[writable]` Custody token account
    /// 3. `[writable]` Recipient settlement token account
    /// 4. `[writable]` Fee collector settlement token account
    /// 5. `[]` Custody authority PDA
    /// 6. `[]` Token program
    Evaluate { deal_id: u64, date: u64 },

    /// Ask the relay for a level; operator, owner, or a user holding an
    /// active deal in that configuration
    /// Accounts:
    /// 0. `[signer]` Requestor
    /// 1. `[writable]` Ledger account
    RequestIndexLevel {
        configuration_id: [u8; 32],
        timestamp: u64,
    },

    /// Asynchronous oracle callback path
    /// Accounts:
    /// 0. `[signer]` Owner
    /// 1. `[writable]` Ledger account
    FulfillIndexLevel {
        request_id: u64,
        configuration_id: [u8; 32],
        timestamp: u64,
        level: u64,
        is_valid: bool,
    },

    /// Operator direct supply path through the same write-once store
    /// Accounts:
    /// 0. `[signer]` Operator (or owner)
    /// 1. `[writable]` Ledger account
    PublishIndexLevel {
        configuration_id: [u8; 32],
        timestamp: u64,
        level: u64,
    },

    /// Post-dissolution withdrawal of the caller's share
    /// Accounts:
    /// 0. `[signer]` Buyer or seller of the deal
    /// 1. `[writable]` Ledger account
    /// 2. `[writable]` Custody token account
    /// 3. `[writable]` Caller settlement token account
    /// 4. `[]` Custody authority PDA
    /// 5. `[]` Token program
    ClaimBack { deal_id: u64 },
}

impl DrtInstruction {
    pub fn unpack(input: &[u8]) -> Result<Self, ProgramError> {
        let (&variant, rest) = input
            .split_first()
            .ok_or(ProgramError::InvalidInstructionData)?;

        Ok(match variant {
            0 => {
                let payload = AddressPayload::try_from_slice(rest)?;
                Self::Initialize {
                    fee_collector: payload.address,
                }
            }
            1 => {
                let payload = AddressPayload::try_from_slice(rest)?;
                Self::AddOwner {
                    address: payload.address,
                }
            }
            2 => {
                let payload = AddressPayload::try_from_slice(rest)?;
                Self::AddOperator {
                    address: payload.address,
                }
            }
            3 => {
                let payload = AddressPayload::try_from_slice(rest)?;
                Self::RegisterUser {
                    address: payload.address,
                }
            }
            4 => {
                let payload = AddStandardPayload::try_from_slice(rest)?;
                Self::AddStandard {
                    symbol: payload.symbol,
                    strike: payload.strike,
                    fee_bps: payload.fee_bps,
                    start_date: payload.start_date,
                    maturity_date: payload.maturity_date,
                    exponent_of_ten_multiplier_for_strike: payload
                        .exponent_of_ten_multiplier_for_strike,
                }
            }
            5 => {
                let payload = NamePayload::try_from_slice(rest)?;
                Self::DeleteStandard {
                    symbol: payload.name,
                }
            }
            6 => {
                let payload = AddTokenPayload::try_from_slice(rest)?;
                Self::AddToken {
                    denomination: payload.denomination,
                    mint: payload.mint,
                }
            }
            7 => {
                let payload = NamePayload::try_from_slice(rest)?;
                Self::DeleteToken {
                    denomination: payload.name,
                }
            }
            8 => Self::DeactivateOwners,
            9 => Self::DeactivateOperators,
            10 => Self::RestrictUsersToClaimback,
            11 => {
                let payload = SetOracleHealthPayload::try_from_slice(rest)?;
                Self::SetOracleHealth {
                    healthy: payload.healthy,
                }
            }
            12 => {
                let payload = CreateOfferPayload::try_from_slice(rest)?;
                Self::CreateBid {
                    symbol: payload.symbol,
                    denomination: payload.denomination,
                    notional: payload.notional,
                    premium: payload.premium,
                    expiry_date: payload.expiry_date,
                }
            }
            13 => {
                let payload = CreateOfferPayload::try_from_slice(rest)?;
                Self::CreateAsk {
                    symbol: payload.symbol,
                    denomination: payload.denomination,
                    notional: payload.notional,
                    premium: payload.premium,
                    expiry_date: payload.expiry_date,
                }
            }
            14 => {
                let payload = DealIdPayload::try_from_slice(rest)?;
                Self::CancelDeal {
                    deal_id: payload.deal_id,
                }
            }
            15 => {
                let payload = DealIdPayload::try_from_slice(rest)?;
                Self::MatchBid {
                    deal_id: payload.deal_id,
                }
            }
            16 => {
                let payload = DealIdPayload::try_from_slice(rest)?;
                Self::MatchAsk {
                    deal_id: payload.deal_id,
                }
            }
            17 => {
                let payload = EvaluatePayload::try_from_slice(rest)?;
                Self::Evaluate {
                    deal_id: payload.deal_id,
                    date: payload.date,
                }
            }
            18 => {
                let payload = LevelKeyPayload::try_from_slice(rest)?;
                Self::RequestIndexLevel {
                    configuration_id: payload.configuration_id,
                    timestamp: payload.timestamp,
                }
            }
            19 => {
                let payload = FulfillPayload::try_from_slice(rest)?;
                Self::FulfillIndexLevel {
                    request_id: payload.request_id,
                    configuration_id: payload.configuration_id,
                    timestamp: payload.timestamp,
                    level: payload.level,
                    is_valid: payload.is_valid,
                }
            }
            20 => {
                let payload = PublishPayload::try_from_slice(rest)?;
                Self::PublishIndexLevel {
                    configuration_id: payload.configuration_id,
                    timestamp: payload.timestamp,
                    level: payload.level,
                }
            }
            21 => {
                let payload = DealIdPayload::try_from_slice(rest)?;
                Self::ClaimBack {
                    deal_id: payload.deal_id,
                }
            }
            _ => return Err(ProgramError::InvalidInstructionData),
        })
    }
}

// Payload structs for instruction data after the variant byte

#[derive(BorshSerialize, BorshDeserialize)]
struct AddressPayload {
    address: Pubkey,
}

#[derive(BorshSerialize, BorshDeserialize)]
struct NamePayload {
    name: String,
}

#[derive(BorshSerialize, BorshDeserialize)]
struct AddStandardPayload {
    symbol: String,
    strike: u64,
    fee_bps: u16,
    start_date: u64,
    maturity_date: u64,
    exponent_of_ten_multiplier_for_strike: u8,
}

#[derive(BorshSerialize, BorshDeserialize)]
struct AddTokenPayload {
    denomination: String,
    mint: Pubkey,
}

#[derive(BorshSerialize, BorshDeserialize)]
struct SetOracleHealthPayload {
    healthy: bool,
}

#[derive(BorshSerialize, BorshDeserialize)]
struct CreateOfferPayload {
    symbol: String,
    denomination: String,
    notional: u64,
    premium: u64,
    expiry_date: u64,
}

#[derive(BorshSerialize, BorshDeserialize)]
struct DealIdPayload {
    deal_id: u64,
}

#[derive(BorshSerialize, BorshDeserialize)]
struct EvaluatePayload {
    deal_id: u64,
    date: u64,
}

#[derive(BorshSerialize, BorshDeserialize)]
struct LevelKeyPayload {
    configuration_id: [u8; 32],
    timestamp: u64,
}

#[derive(BorshSerialize, BorshDeserialize)]
struct FulfillPayload {
    request_id: u64,
    configuration_id: [u8; 32],
    timestamp: u64,
    level: u64,
    is_valid: bool,
}

#[derive(BorshSerialize, BorshDeserialize)]
struct PublishPayload {
    configuration_id: [u8; 32],
    timestamp: u64,
    level: u64,
}

// Helper functions to create instructions

pub fn initialize(
    program_id: &Pubkey,
    payer: &Pubkey,
    ledger_account: &Pubkey,
    fee_collector: Pubkey,
) -> Instruction {
    let accounts = vec![
        AccountMeta::new(*payer, true),
        AccountMeta::new(*ledger_account, true),
        AccountMeta::new_readonly(solana_program::system_program::id(), false),
        AccountMeta::new_readonly(solana_program::sysvar::rent::id(), false),
    ];

    Instruction {
        program_id: *program_id,
        accounts,
        data: pack(&DrtInstruction::Initialize { fee_collector }),
    }
}

pub fn create_bid(
    program_id: &Pubkey,
    initiator: &Pubkey,
    ledger_account: &Pubkey,
    initiator_token_account: &Pubkey,
    custody_token_account: &Pubkey,
    symbol: String,
    denomination: String,
    notional: u64,
    premium: u64,
    expiry_date: u64,
) -> Instruction {
    let accounts = vec![
        AccountMeta::new_readonly(*initiator, true),
        AccountMeta::new(*ledger_account, false),
        AccountMeta::new(*initiator_token_account, false),
        AccountMeta::new(*custody_token_account, false),
        AccountMeta::new_readonly(spl_token::id(), false),
    ];

    Instruction {
        program_id: *program_id,
        accounts,
        data: pack(&DrtInstruction::CreateBid {
            symbol,
            denomination,
            notional,
            premium,
            expiry_date,
        }),
    }
}

pub fn evaluate(
    program_id: &Pubkey,
    operator: &Pubkey,
    ledger_account: &Pubkey,
    custody_token_account: &Pubkey,
    recipient_token_account: &Pubkey,
    fee_token_account: &Pubkey,
    custody_authority: &Pubkey,
    deal_id: u64,
    date: u64,
) -> Instruction {
    let accounts = vec![
        AccountMeta::new_readonly(*operator, true),
        AccountMeta::new(*ledger_account, false),
        AccountMeta::new(*custody_token_account, false),
        AccountMeta::new(*recipient_token_account, false),
        AccountMeta::new(*fee_token_account, false),
        AccountMeta::new_readonly(*custody_authority, false),
        AccountMeta::new_readonly(spl_token::id(), false),
    ];

    Instruction {
        program_id: *program_id,
        accounts,
        data: pack(&DrtInstruction::Evaluate { deal_id, date }),
    }
}

pub fn claim_back(
    program_id: &Pubkey,
    caller: &Pubkey,
    ledger_account: &Pubkey,
    custody_token_account: &Pubkey,
    caller_token_account: &Pubkey,
    custody_authority: &Pubkey,
    deal_id: u64,
) -> Instruction {
    let accounts = vec![
        AccountMeta::new_readonly(*caller, true),
        AccountMeta::new(*ledger_account, false),
        AccountMeta::new(*custody_token_account, false),
        AccountMeta::new(*caller_token_account, false),
        AccountMeta::new_readonly(*custody_authority, false),
        AccountMeta::new_readonly(spl_token::id(), false),
    ];

    Instruction {
        program_id: *program_id,
        accounts,
        data: pack(&DrtInstruction::ClaimBack { deal_id }),
    }
}

fn pack(instruction: &DrtInstruction) -> Vec<u8> {
    instruction.try_to_vec().expect("instruction serialization cannot fail")
}
