use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    account_info::{next_account_info, AccountInfo},
    entrypoint::ProgramResult,
    msg,
    program::{invoke, invoke_signed},
    program_error::ProgramError,
    program_pack::Pack,
    pubkey::Pubkey,
    system_instruction,
    sysvar::{clock::Clock, rent::Rent, Sysvar},
};
use spl_token::state::Account as TokenAccount;

use crate::{
    engine::{DealEngine, Evaluation, FulfillOutcome, OfferSide, Payout, RelayOutcome},
    error::DrtError,
    instruction::DrtInstruction,
    state::{DrtLedger, Gate},
    CUSTODY_SEED,
};

pub fn process_instruction(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    instruction_data: &[u8],
) -> ProgramResult {
    let instruction = DrtInstruction::unpack(instruction_data)?;

    match instruction {
        DrtInstruction::Initialize { fee_collector } => {
            msg!("Instruction: Initialize");
            process_initialize(program_id, accounts, fee_collector)
        }

        DrtInstruction::AddOwner { address } => {
            msg!("Instruction: AddOwner");
            process_admin(accounts, |ledger| ledger.access.add_owner(address))
        }

        DrtInstruction::AddOperator { address } => {
            msg!("Instruction: AddOperator");
            process_admin(accounts, |ledger| ledger.access.add_operator(address))
        }

        DrtInstruction::RegisterUser { address } => {
            msg!("Instruction: RegisterUser");
            process_admin(accounts, |ledger| ledger.access.add_user(address))
        }

        DrtInstruction::AddStandard {
            symbol,
            strike,
            fee_bps,
            start_date,
            maturity_date,
            exponent_of_ten_multiplier_for_strike,
        } => {
            msg!("Instruction: AddStandard");
            process_admin(accounts, |ledger| {
                let configuration_id = ledger.registry.add_standard(
                    symbol.clone(),
                    strike,
                    fee_bps,
                    start_date,
                    maturity_date,
                    exponent_of_ten_multiplier_for_strike,
                )?;
                msg!(
                    "StandardAdded: symbol={} configuration={:?}",
                    symbol,
                    configuration_id
                );
                Ok(())
            })
        }

        DrtInstruction::DeleteStandard { symbol } => {
            msg!("Instruction: DeleteStandard");
            process_admin(accounts, |ledger| ledger.registry.delete_standard(&symbol))
        }

        DrtInstruction::AddToken { denomination, mint } => {
            msg!("Instruction: AddToken");
            process_admin(accounts, |ledger| {
                ledger.registry.add_token(denomination.clone(), mint)
            })
        }

        DrtInstruction::DeleteToken { denomination } => {
            msg!("Instruction: DeleteToken");
            process_admin(accounts, |ledger| {
                ledger.registry.delete_token(&denomination)
            })
        }

        DrtInstruction::DeactivateOwners => {
            msg!("Instruction: DeactivateOwners");
            process_admin(accounts, |ledger| {
                ledger.access.deactivate_owners();
                Ok(())
            })
        }

        DrtInstruction::DeactivateOperators => {
            msg!("Instruction: DeactivateOperators");
            process_admin(accounts, |ledger| {
                ledger.access.deactivate_operators();
                Ok(())
            })
        }

        DrtInstruction::RestrictUsersToClaimback => {
            msg!("Instruction: RestrictUsersToClaimback");
            process_admin(accounts, |ledger| {
                ledger.access.restrict_users_to_claimback();
                Ok(())
            })
        }

        DrtInstruction::SetOracleHealth { healthy } => {
            msg!("Instruction: SetOracleHealth");
            process_admin(accounts, |ledger| {
                ledger.oracle.healthy = healthy;
                Ok(())
            })
        }

        DrtInstruction::CreateBid {
            symbol,
            denomination,
            notional,
            premium,
            expiry_date,
        } => {
            msg!("Instruction: CreateBid");
            process_create_offer(
                program_id,
                accounts,
                OfferSide::Bid,
                symbol,
                denomination,
                notional,
                premium,
                expiry_date,
            )
        }

        DrtInstruction::CreateAsk {
            symbol,
            denomination,
            notional,
            premium,
            expiry_date,
        } => {
            msg!("Instruction: CreateAsk");
            process_create_offer(
                program_id,
                accounts,
                OfferSide::Ask,
                symbol,
                denomination,
                notional,
                premium,
                expiry_date,
            )
        }

        DrtInstruction::CancelDeal { deal_id } => {
            msg!("Instruction: CancelDeal");
            process_cancel(program_id, accounts, deal_id)
        }

        DrtInstruction::MatchBid { deal_id } => {
            msg!("Instruction: MatchBid");
            process_match(program_id, accounts, deal_id, OfferSide::Bid)
        }

        DrtInstruction::MatchAsk { deal_id } => {
            msg!("Instruction: MatchAsk");
            process_match(program_id, accounts, deal_id, OfferSide::Ask)
        }

        DrtInstruction::Evaluate { deal_id, date } => {
            msg!("Instruction: Evaluate");
            process_evaluate(program_id, accounts, deal_id, date)
        }

        DrtInstruction::RequestIndexLevel {
            configuration_id,
            timestamp,
        } => {
            msg!("Instruction: RequestIndexLevel");
            process_request_index_level(accounts, configuration_id, timestamp)
        }

        DrtInstruction::FulfillIndexLevel {
            request_id,
            configuration_id,
            timestamp,
            level,
            is_valid,
        } => {
            msg!("Instruction: FulfillIndexLevel");
            process_fulfill_index_level(
                accounts,
                request_id,
                configuration_id,
                timestamp,
                level,
                is_valid,
            )
        }

        DrtInstruction::PublishIndexLevel {
            configuration_id,
            timestamp,
            level,
        } => {
            msg!("Instruction: PublishIndexLevel");
            process_publish_index_level(accounts, configuration_id, timestamp, level)
        }

        DrtInstruction::ClaimBack { deal_id } => {
            msg!("Instruction: ClaimBack");
            process_claim_back(program_id, accounts, deal_id)
        }
    }
}

/// Create and initialize the ledger account; the payer becomes first owner
fn process_initialize(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    fee_collector: Pubkey,
) -> ProgramResult {
    let account_info_iter = &mut accounts.iter();

    let payer_info = next_account_info(account_info_iter)?;
    let ledger_info = next_account_info(account_info_iter)?;
    let system_program = next_account_info(account_info_iter)?;
    let _rent_sysvar = next_account_info(account_info_iter)?;

    if !payer_info.is_signer || !ledger_info.is_signer {
        return Err(ProgramError::MissingRequiredSignature);
    }
    if !ledger_info.data_is_empty() {
        return Err(DrtError::AlreadyInitialized.into());
    }

    let rent = Rent::get()?;
    let required_lamports = rent.minimum_balance(DrtLedger::LEN);

    invoke(
        &system_instruction::create_account(
            payer_info.key,
            ledger_info.key,
            required_lamports,
            DrtLedger::LEN as u64,
            program_id,
        ),
        &[
            payer_info.clone(),
            ledger_info.clone(),
            system_program.clone(),
        ],
    )?;

    let (_, custody_bump) = Pubkey::find_program_address(&[CUSTODY_SEED], program_id);
    let ledger = DrtLedger::new(*payer_info.key, fee_collector, custody_bump);
    save_ledger(&ledger, ledger_info)?;

    msg!("Ledger initialized, owner: {}", payer_info.key);

    Ok(())
}

/// Owner-gated ledger mutation with no fund movement
fn process_admin<F>(accounts: &[AccountInfo], mutate: F) -> ProgramResult
where
    F: FnOnce(&mut DrtLedger) -> Result<(), ProgramError>,
{
    let account_info_iter = &mut accounts.iter();

    let caller_info = next_account_info(account_info_iter)?;
    let ledger_info = next_account_info(account_info_iter)?;

    if !caller_info.is_signer {
        return Err(ProgramError::MissingRequiredSignature);
    }

    let mut ledger = load_ledger(ledger_info)?;
    ledger.access.check(caller_info.key, Gate::Owner)?;

    mutate(&mut ledger)?;

    save_ledger(&ledger, ledger_info)
}

fn process_create_offer(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    side: OfferSide,
    symbol: String,
    denomination: String,
    notional: u64,
    premium: u64,
    expiry_date: u64,
) -> ProgramResult {
    let account_info_iter = &mut accounts.iter();

    let caller_info = next_account_info(account_info_iter)?;
    let ledger_info = next_account_info(account_info_iter)?;
    let source_token_info = next_account_info(account_info_iter)?;
    let custody_token_info = next_account_info(account_info_iter)?;
    let token_program = next_account_info(account_info_iter)?;

    if !caller_info.is_signer {
        return Err(ProgramError::MissingRequiredSignature);
    }

    let mut ledger = load_ledger(ledger_info)?;
    ledger.access.check(caller_info.key, Gate::User)?;

    let now = current_timestamp()?;
    let created = DealEngine::create_offer(
        &mut ledger,
        *caller_info.key,
        side,
        &symbol,
        &denomination,
        notional,
        premium,
        expiry_date,
        now,
    )?;

    check_escrow_source(source_token_info, caller_info.key, &created.token, created.escrow)?;
    check_custody_account(
        program_id,
        custody_token_info,
        &created.token,
        ledger.custody_bump,
    )?;

    save_ledger(&ledger, ledger_info)?;

    // Escrow transfer is the final step; a CPI failure aborts the whole
    // transaction, so no partial state is observable.
    transfer_in(
        source_token_info,
        custody_token_info,
        caller_info,
        token_program,
        created.escrow,
    )?;

    msg!(
        "OfferCreated: deal={} side={:?} notional={} premium={} escrow={}",
        created.deal_id,
        side,
        notional,
        premium,
        created.escrow
    );

    Ok(())
}

fn process_cancel(program_id: &Pubkey, accounts: &[AccountInfo], deal_id: u64) -> ProgramResult {
    let account_info_iter = &mut accounts.iter();

    let caller_info = next_account_info(account_info_iter)?;
    let ledger_info = next_account_info(account_info_iter)?;
    let custody_token_info = next_account_info(account_info_iter)?;
    let recipient_token_info = next_account_info(account_info_iter)?;
    let custody_authority_info = next_account_info(account_info_iter)?;
    let token_program = next_account_info(account_info_iter)?;

    if !caller_info.is_signer {
        return Err(ProgramError::MissingRequiredSignature);
    }

    let mut ledger = load_ledger(ledger_info)?;
    ledger.access.check(caller_info.key, Gate::User)?;

    let refund = DealEngine::cancel(&mut ledger, caller_info.key, deal_id)?;
    let custody_bump = ledger.custody_bump;

    save_ledger(&ledger, ledger_info)?;

    pay_out(
        program_id,
        &refund,
        custody_token_info,
        &[recipient_token_info],
        custody_authority_info,
        token_program,
        custody_bump,
    )?;

    msg!("DealCancelled: deal={} refund={}", deal_id, refund.amount);

    Ok(())
}

fn process_match(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    deal_id: u64,
    side: OfferSide,
) -> ProgramResult {
    let account_info_iter = &mut accounts.iter();

    let caller_info = next_account_info(account_info_iter)?;
    let ledger_info = next_account_info(account_info_iter)?;
    let source_token_info = next_account_info(account_info_iter)?;
    let custody_token_info = next_account_info(account_info_iter)?;
    let token_program = next_account_info(account_info_iter)?;

    if !caller_info.is_signer {
        return Err(ProgramError::MissingRequiredSignature);
    }

    let mut ledger = load_ledger(ledger_info)?;
    ledger.access.check(caller_info.key, Gate::User)?;

    let matched = DealEngine::match_offer(&mut ledger, *caller_info.key, deal_id, side)?;

    check_escrow_source(source_token_info, caller_info.key, &matched.token, matched.escrow)?;
    check_custody_account(
        program_id,
        custody_token_info,
        &matched.token,
        ledger.custody_bump,
    )?;

    save_ledger(&ledger, ledger_info)?;

    transfer_in(
        source_token_info,
        custody_token_info,
        caller_info,
        token_program,
        matched.escrow,
    )?;

    msg!(
        "DealMatched: deal={} counterparty={} escrow={}",
        deal_id,
        caller_info.key,
        matched.escrow
    );

    Ok(())
}

fn process_evaluate(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    deal_id: u64,
    date: u64,
) -> ProgramResult {
    let account_info_iter = &mut accounts.iter();

    let caller_info = next_account_info(account_info_iter)?;
    let ledger_info = next_account_info(account_info_iter)?;
    let custody_token_info = next_account_info(account_info_iter)?;
    let recipient_token_info = next_account_info(account_info_iter)?;
    let fee_token_info = next_account_info(account_info_iter)?;
    let custody_authority_info = next_account_info(account_info_iter)?;
    let token_program = next_account_info(account_info_iter)?;

    if !caller_info.is_signer {
        return Err(ProgramError::MissingRequiredSignature);
    }

    let mut ledger = load_ledger(ledger_info)?;
    ledger.access.check(caller_info.key, Gate::Operator)?;

    let evaluation = DealEngine::evaluate(&mut ledger, deal_id, date)?;
    let custody_bump = ledger.custody_bump;

    save_ledger(&ledger, ledger_info)?;

    for payout in evaluation.payouts() {
        pay_out(
            program_id,
            &payout,
            custody_token_info,
            &[recipient_token_info, fee_token_info],
            custody_authority_info,
            token_program,
            custody_bump,
        )?;
    }

    match &evaluation {
        Evaluation::NoAction => msg!("Evaluated: deal={} no action", deal_id),
        Evaluation::Expired { refund } => {
            msg!("DealExpired: deal={} refund={}", deal_id, refund.amount)
        }
        Evaluation::WentLive => msg!("DealLive: deal={}", deal_id),
        Evaluation::Triggered { winner, fee } => msg!(
            "DealTriggered: deal={} buyer_payout={} fee={}",
            deal_id,
            winner.amount,
            fee.amount
        ),
        Evaluation::Matured { winner, fee } => msg!(
            "DealMatured: deal={} seller_payout={} fee={}",
            deal_id,
            winner.amount,
            fee.amount
        ),
        Evaluation::Dissolved => msg!("Dissolution: oracle unavailable, deal={}", deal_id),
    }

    Ok(())
}

fn process_request_index_level(
    accounts: &[AccountInfo],
    configuration_id: [u8; 32],
    timestamp: u64,
) -> ProgramResult {
    let account_info_iter = &mut accounts.iter();

    let caller_info = next_account_info(account_info_iter)?;
    let ledger_info = next_account_info(account_info_iter)?;

    if !caller_info.is_signer {
        return Err(ProgramError::MissingRequiredSignature);
    }

    let mut ledger = load_ledger(ledger_info)?;
    if ledger.is_dissolved() {
        return Err(DrtError::SystemDissolved.into());
    }
    if !ledger.may_request_index_data(caller_info.key, &configuration_id) {
        return Err(DrtError::Unauthorized.into());
    }

    let outcome =
        DealEngine::request_index_level(&mut ledger, *caller_info.key, configuration_id, timestamp)?;

    save_ledger(&ledger, ledger_info)?;

    match outcome {
        RelayOutcome::AlreadyAvailable => {
            msg!("IndexLevelAlreadyAvailable: timestamp={}", timestamp)
        }
        // This log line is the outbound fire-and-forget oracle signal
        RelayOutcome::Requested { request_id } => msg!(
            "IndexLevelRequested: request={} timestamp={}",
            request_id,
            timestamp
        ),
        RelayOutcome::Dissolved => msg!("Dissolution: oracle unavailable on request"),
    }

    Ok(())
}

fn process_fulfill_index_level(
    accounts: &[AccountInfo],
    request_id: u64,
    configuration_id: [u8; 32],
    timestamp: u64,
    level: u64,
    is_valid: bool,
) -> ProgramResult {
    let account_info_iter = &mut accounts.iter();

    let caller_info = next_account_info(account_info_iter)?;
    let ledger_info = next_account_info(account_info_iter)?;

    if !caller_info.is_signer {
        return Err(ProgramError::MissingRequiredSignature);
    }

    let mut ledger = load_ledger(ledger_info)?;
    ledger.access.check(caller_info.key, Gate::Owner)?;

    let outcome = DealEngine::fulfill_index_level(
        &mut ledger,
        request_id,
        configuration_id,
        timestamp,
        level,
        is_valid,
    )?;

    save_ledger(&ledger, ledger_info)?;

    match outcome {
        FulfillOutcome::Stored => msg!(
            "IndexLevelStored: request={} timestamp={} level={}",
            request_id,
            timestamp,
            level
        ),
        FulfillOutcome::Ignored => msg!(
            "IndexLevelIgnored: request={} timestamp={} already stored",
            request_id,
            timestamp
        ),
        FulfillOutcome::Dissolved => {
            msg!("Dissolution: invalid oracle data, request={}", request_id)
        }
    }

    Ok(())
}

fn process_publish_index_level(
    accounts: &[AccountInfo],
    configuration_id: [u8; 32],
    timestamp: u64,
    level: u64,
) -> ProgramResult {
    let account_info_iter = &mut accounts.iter();

    let caller_info = next_account_info(account_info_iter)?;
    let ledger_info = next_account_info(account_info_iter)?;

    if !caller_info.is_signer {
        return Err(ProgramError::MissingRequiredSignature);
    }

    let mut ledger = load_ledger(ledger_info)?;
    ledger.access.check(caller_info.key, Gate::Operator)?;

    DealEngine::publish_index_level(&mut ledger, configuration_id, timestamp, level)?;

    save_ledger(&ledger, ledger_info)?;

    msg!("IndexLevelPublished: timestamp={} level={}", timestamp, level);

    Ok(())
}

fn process_claim_back(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    deal_id: u64,
) -> ProgramResult {
    let account_info_iter = &mut accounts.iter();

    let caller_info = next_account_info(account_info_iter)?;
    let ledger_info = next_account_info(account_info_iter)?;
    let custody_token_info = next_account_info(account_info_iter)?;
    let recipient_token_info = next_account_info(account_info_iter)?;
    let custody_authority_info = next_account_info(account_info_iter)?;
    let token_program = next_account_info(account_info_iter)?;

    if !caller_info.is_signer {
        return Err(ProgramError::MissingRequiredSignature);
    }

    let mut ledger = load_ledger(ledger_info)?;
    ledger.access.check(caller_info.key, Gate::Claimback)?;

    let claim = DealEngine::claim_back(&mut ledger, caller_info.key, deal_id)?;
    let custody_bump = ledger.custody_bump;

    save_ledger(&ledger, ledger_info)?;

    pay_out(
        program_id,
        &claim.payout,
        custody_token_info,
        &[recipient_token_info],
        custody_authority_info,
        token_program,
        custody_bump,
    )?;

    msg!(
        "ClaimedBack: deal={} amount={} deleted={}",
        deal_id,
        claim.payout.amount,
        claim.deal_deleted
    );

    Ok(())
}

fn current_timestamp() -> Result<u64, ProgramError> {
    let now = Clock::get()?.unix_timestamp;
    Ok(now.max(0) as u64)
}

fn load_ledger(ledger_info: &AccountInfo) -> Result<DrtLedger, ProgramError> {
    // deserialize (not try_from_slice): the account carries padding
    let ledger = DrtLedger::deserialize(&mut &ledger_info.data.borrow()[..])?;
    ledger.validate()?;
    Ok(ledger)
}

fn save_ledger(ledger: &DrtLedger, ledger_info: &AccountInfo) -> ProgramResult {
    ledger.serialize(&mut &mut ledger_info.data.borrow_mut()[..])?;
    Ok(())
}

/// Source must hold enough of the voucher's settlement currency
fn check_escrow_source(
    source_token_info: &AccountInfo,
    expected_owner: &Pubkey,
    expected_mint: &Pubkey,
    amount: u64,
) -> ProgramResult {
    let source = TokenAccount::unpack(&source_token_info.data.borrow())?;
    if source.owner != *expected_owner || source.mint != *expected_mint {
        return Err(DrtError::InvalidTokenAccount.into());
    }
    if source.amount < amount {
        return Err(DrtError::InsufficientEscrowBalance.into());
    }
    Ok(())
}

fn check_custody_account(
    program_id: &Pubkey,
    custody_token_info: &AccountInfo,
    expected_mint: &Pubkey,
    custody_bump: u8,
) -> ProgramResult {
    let custody_authority =
        Pubkey::create_program_address(&[CUSTODY_SEED, &[custody_bump]], program_id)?;
    let custody = TokenAccount::unpack(&custody_token_info.data.borrow())?;
    if custody.owner != custody_authority || custody.mint != *expected_mint {
        return Err(DrtError::InvalidTokenAccount.into());
    }
    Ok(())
}

fn transfer_in<'a>(
    source_token_info: &AccountInfo<'a>,
    custody_token_info: &AccountInfo<'a>,
    authority_info: &AccountInfo<'a>,
    token_program: &AccountInfo<'a>,
    amount: u64,
) -> ProgramResult {
    invoke(
        &spl_token::instruction::transfer(
            token_program.key,
            source_token_info.key,
            custody_token_info.key,
            authority_info.key,
            &[],
            amount,
        )?,
        &[
            source_token_info.clone(),
            custody_token_info.clone(),
            authority_info.clone(),
            token_program.clone(),
        ],
    )
}

/// Execute one payout out of custody, signed by the custody authority PDA.
/// The recipient's token account is picked from the provided candidates by
/// matching its owner and mint.
fn pay_out<'a>(
    program_id: &Pubkey,
    payout: &Payout,
    custody_token_info: &AccountInfo<'a>,
    candidates: &[&AccountInfo<'a>],
    custody_authority_info: &AccountInfo<'a>,
    token_program: &AccountInfo<'a>,
    custody_bump: u8,
) -> ProgramResult {
    if payout.amount == 0 {
        return Ok(());
    }

    let custody_authority =
        Pubkey::create_program_address(&[CUSTODY_SEED, &[custody_bump]], program_id)?;
    if *custody_authority_info.key != custody_authority {
        return Err(DrtError::InvalidTokenAccount.into());
    }

    let custody = TokenAccount::unpack(&custody_token_info.data.borrow())?;
    if custody.owner != custody_authority || custody.mint != payout.token {
        return Err(DrtError::InvalidTokenAccount.into());
    }

    let recipient_token_info = candidates
        .iter()
        .find(|info| {
            TokenAccount::unpack(&info.data.borrow())
                .map(|acc| acc.owner == payout.recipient && acc.mint == payout.token)
                .unwrap_or(false)
        })
        .ok_or(DrtError::InvalidTokenAccount)?;

    invoke_signed(
        &spl_token::instruction::transfer(
            token_program.key,
            custody_token_info.key,
            recipient_token_info.key,
            &custody_authority,
            &[],
            payout.amount,
        )?,
        &[
            custody_token_info.clone(),
            (*recipient_token_info).clone(),
            custody_authority_info.clone(),
            token_program.clone(),
        ],
        &[&[CUSTODY_SEED, &[custody_bump]]],
    )
}
