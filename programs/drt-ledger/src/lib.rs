// CerchiaDRT derivatives ledger with companion oracle relay
// Native Solana implementation - NO ANCHOR

use solana_program::entrypoint;

pub mod engine;
pub mod error;
pub mod instruction;
pub mod processor;
pub mod state;

use processor::process_instruction;

// Declare program ID
solana_program::declare_id!("618cjVrMnnPRQeTuuanKAN2dzvanvaVWXbJqSZkv2Eqp");

/// Seed of the custody authority PDA that signs escrow payouts
pub const CUSTODY_SEED: &[u8] = b"custody";

#[cfg(not(feature = "no-entrypoint"))]
entrypoint!(process_instruction);
