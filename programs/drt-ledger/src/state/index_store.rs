use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::program_error::ProgramError;

use crate::error::DrtError;

/// Sentinel the relay propagates instead of a level when the oracle is
/// unhealthy or reports invalid data; never stored.
pub const INVALID_LEVEL: u64 = u64::MAX;

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub configuration_id: [u8; 32],
    pub timestamp: u64,
    pub level: u64,
}

/// Per-(configuration, timestamp) cache of externally supplied reference
/// values. Write-once: a stored level is never overwritten.
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone)]
pub struct IndexStore {
    pub entries: Vec<IndexEntry>,
}

impl IndexStore {
    pub const MAX_ENTRIES: usize = 1024;

    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn has(&self, configuration_id: &[u8; 32], timestamp: u64) -> bool {
        self.get(configuration_id, timestamp).is_some()
    }

    pub fn get(&self, configuration_id: &[u8; 32], timestamp: u64) -> Option<u64> {
        self.entries
            .iter()
            .find(|e| &e.configuration_id == configuration_id && e.timestamp == timestamp)
            .map(|e| e.level)
    }

    /// Returns false when the key is already present; the stored value is
    /// left untouched.
    pub fn store(
        &mut self,
        configuration_id: [u8; 32],
        timestamp: u64,
        level: u64,
    ) -> Result<bool, ProgramError> {
        if level == INVALID_LEVEL {
            return Err(DrtError::InvalidIndexLevel.into());
        }
        if self.has(&configuration_id, timestamp) {
            return Ok(false);
        }
        if self.entries.len() >= Self::MAX_ENTRIES {
            return Err(DrtError::CapacityExceeded.into());
        }

        self.entries.push(IndexEntry {
            configuration_id,
            timestamp,
            level,
        });
        Ok(true)
    }
}
