use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{program_error::ProgramError, pubkey::Pubkey};

use crate::error::DrtError;
use crate::state::access::AccessControl;
use crate::state::deal::Deal;
use crate::state::deal_set::DealSet;
use crate::state::index_store::{IndexEntry, IndexStore};
use crate::state::oracle::OracleBook;
use crate::state::registry::{Registry, Standard, TokenEntry};

/// Count of Matched/Live deals per (party, configuration); gates index-data
/// requests and is decremented on settlement or claimback.
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq)]
pub struct ActiveDealCount {
    pub party: Pubkey,
    pub configuration_id: [u8; 32],
    pub count: u32,
}

/// The entire persisted state of the ledger, held in a single program
/// account. Every mutating instruction deserializes, mutates, and writes it
/// back; Solana's instruction atomicity supplies the transaction semantics.
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone)]
pub struct DrtLedger {
    /// Account discriminator
    pub discriminator: [u8; 8],
    pub is_initialized: bool,

    pub access: AccessControl,
    /// Receives the settlement fee cut
    pub fee_collector: Pubkey,
    /// Bump of the custody authority PDA that signs payouts
    pub custody_bump: u8,

    pub registry: Registry,
    pub index_store: IndexStore,
    pub deals: DealSet,
    pub active_counts: Vec<ActiveDealCount>,
    pub oracle: OracleBook,
}

impl DrtLedger {
    pub const DISCRIMINATOR: [u8; 8] = [68, 82, 84, 76, 68, 71, 82, 49]; // "DRTLDGR1"

    pub const LEN: usize = 8 + // discriminator
        1 + // is_initialized
        (3 * 4) + 32 * (AccessControl::MAX_OWNERS + AccessControl::MAX_OPERATORS + AccessControl::MAX_USERS) +
        4 + // access flags
        32 + // fee_collector
        1 + // custody_bump
        4 + Registry::MAX_STANDARDS * (4 + Registry::MAX_SYMBOL_LEN + 32 + 8 + 2 + 8 + 8 + 1) +
        4 + Registry::MAX_TOKENS * (4 + Registry::MAX_SYMBOL_LEN + 32) +
        4 + IndexStore::MAX_ENTRIES * (32 + 8 + 8) +
        4 + DealSet::MAX_DEALS * Deal::LEN +
        4 + DealSet::MAX_DEALS * 12 + // id index
        8 + // last_id
        4 + DealSet::MAX_DEALS * 2 * (32 + 32 + 4) + // active counts
        1 + 8 + 4 + OracleBook::MAX_PENDING * 40 +
        512; // padding

    pub fn new(initial_owner: Pubkey, fee_collector: Pubkey, custody_bump: u8) -> Self {
        Self {
            discriminator: Self::DISCRIMINATOR,
            is_initialized: true,
            access: AccessControl::new(initial_owner),
            fee_collector,
            custody_bump,
            registry: Registry::new(),
            index_store: IndexStore::new(),
            deals: DealSet::new(),
            active_counts: Vec::new(),
            oracle: OracleBook::new(),
        }
    }

    pub fn validate(&self) -> Result<(), ProgramError> {
        if self.discriminator != Self::DISCRIMINATOR || !self.is_initialized {
            return Err(DrtError::NotInitialized.into());
        }
        Ok(())
    }

    pub fn active_count(&self, party: &Pubkey, configuration_id: &[u8; 32]) -> u32 {
        self.active_counts
            .iter()
            .find(|c| &c.party == party && &c.configuration_id == configuration_id)
            .map(|c| c.count)
            .unwrap_or(0)
    }

    pub fn increment_active(&mut self, party: Pubkey, configuration_id: [u8; 32]) {
        if let Some(entry) = self
            .active_counts
            .iter_mut()
            .find(|c| c.party == party && c.configuration_id == configuration_id)
        {
            entry.count += 1;
        } else {
            self.active_counts.push(ActiveDealCount {
                party,
                configuration_id,
                count: 1,
            });
        }
    }

    pub fn decrement_active(&mut self, party: &Pubkey, configuration_id: &[u8; 32]) {
        if let Some(position) = self
            .active_counts
            .iter()
            .position(|c| &c.party == party && &c.configuration_id == configuration_id)
        {
            self.active_counts[position].count =
                self.active_counts[position].count.saturating_sub(1);
            if self.active_counts[position].count == 0 {
                self.active_counts.remove(position);
            }
        }
    }

    /// Whether a caller may ask the relay for an index level: operators and
    /// owners always, users only while they hold an active deal in that
    /// configuration.
    pub fn may_request_index_data(&self, caller: &Pubkey, configuration_id: &[u8; 32]) -> bool {
        self.access.is_operator(caller)
            || self.access.is_owner(caller)
            || self.active_count(caller, configuration_id) > 0
    }

    // Read-only query surface; pure projections of the data model.

    pub fn deal_ids(&self) -> Vec<u64> {
        self.deals.ids()
    }

    pub fn get_deal(&self, id: u64) -> Option<&Deal> {
        self.deals.get(id)
    }

    pub fn standards(&self) -> &[Standard] {
        &self.registry.standards
    }

    pub fn tokens(&self) -> &[TokenEntry] {
        &self.registry.tokens
    }

    pub fn index_levels(&self) -> &[IndexEntry] {
        &self.index_store.entries
    }

    pub fn is_dissolved(&self) -> bool {
        self.access.dissolved
    }
}
