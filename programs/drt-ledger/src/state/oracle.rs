use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{program_error::ProgramError, pubkey::Pubkey};

use crate::error::DrtError;

/// Outstanding level request; deleted on fulfillment, id never reused
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq)]
pub struct OracleRequest {
    pub id: u64,
    pub requestor: Pubkey,
}

/// Request/response correlation for the asynchronous oracle, plus the
/// owner-maintained health flag that gates dissolution.
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone)]
pub struct OracleBook {
    pub healthy: bool,
    /// Next request id; strictly increasing, starts at 1
    pub next_request_id: u64,
    pub pending: Vec<OracleRequest>,
}

impl OracleBook {
    pub const MAX_PENDING: usize = 64;

    pub fn new() -> Self {
        Self {
            healthy: true,
            next_request_id: 1,
            pending: Vec::new(),
        }
    }

    pub fn book_request(&mut self, requestor: Pubkey) -> Result<u64, ProgramError> {
        if self.pending.len() >= Self::MAX_PENDING {
            return Err(DrtError::CapacityExceeded.into());
        }

        let id = self.next_request_id;
        self.next_request_id += 1;
        self.pending.push(OracleRequest { id, requestor });
        Ok(id)
    }

    /// Remove and return an outstanding request; unknown or already
    /// fulfilled ids are an error.
    pub fn take_request(&mut self, id: u64) -> Result<OracleRequest, ProgramError> {
        let position = self
            .pending
            .iter()
            .position(|r| r.id == id)
            .ok_or(DrtError::UnknownOracleRequest)?;
        Ok(self.pending.remove(position))
    }

    pub fn is_outstanding(&self, id: u64) -> bool {
        self.pending.iter().any(|r| r.id == id)
    }
}
