use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{program_error::ProgramError, pubkey::Pubkey};

use crate::error::DrtError;
use crate::state::deal::Deal;

/// Indexed deal collection with O(1) insert, lookup and delete.
///
/// Deals live in a contiguous backing array; deletion swaps the target with
/// the last element and shrinks, so no surviving deal's id ever changes, only
/// its backing position. The id map stays sorted because ids are assigned in
/// increasing order and inserts append.
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone)]
pub struct DealSet {
    pub deals: Vec<Deal>,
    /// (deal id, position in `deals`), sorted by id
    pub id_index: Vec<(u64, u32)>,
    /// Last id handed out; ids start at 1 and are never reused
    pub last_id: u64,
}

impl DealSet {
    pub const MAX_DEALS: usize = 256;

    pub fn new() -> Self {
        Self {
            deals: Vec::new(),
            id_index: Vec::new(),
            last_id: 0,
        }
    }

    pub fn count(&self) -> usize {
        self.deals.len()
    }

    pub fn last_assigned_id(&self) -> u64 {
        self.last_id
    }

    /// Assign the next sequential id and append, returning the id
    pub fn insert(&mut self, mut deal: Deal) -> Result<u64, ProgramError> {
        if self.deals.len() >= Self::MAX_DEALS {
            return Err(DrtError::CapacityExceeded.into());
        }

        let id = self.last_id + 1;
        let position = self.deals.len() as u32;

        deal.id = id;
        deal.index_in_set = position;
        self.deals.push(deal);
        self.id_index.push((id, position));
        self.last_id = id;

        Ok(id)
    }

    /// A slot cleared by compaction reads as a different record, so existence
    /// is discriminated via the map plus the stored id and a non-empty
    /// initiator.
    pub fn exists(&self, id: u64) -> bool {
        match self.position_of(id) {
            Some(position) => {
                let deal = &self.deals[position as usize];
                deal.id == id && deal.initiator != Pubkey::default()
            }
            None => false,
        }
    }

    /// Callers are expected to have checked `exists` first
    pub fn get(&self, id: u64) -> Option<&Deal> {
        self.position_of(id).map(|p| &self.deals[p as usize])
    }

    pub fn get_mut(&mut self, id: u64) -> Option<&mut Deal> {
        self.position_of(id)
            .map(move |p| &mut self.deals[p as usize])
    }

    /// Swap-and-pop removal; fixes up the moved deal's stored position
    pub fn delete(&mut self, id: u64) -> Result<Deal, ProgramError> {
        let map_slot = self
            .id_index
            .binary_search_by_key(&id, |entry| entry.0)
            .map_err(|_| DrtError::DealNotFound)?;
        let position = self.id_index[map_slot].1;
        self.id_index.remove(map_slot);

        let deal = self.deals.swap_remove(position as usize);

        if (position as usize) < self.deals.len() {
            let moved_id = self.deals[position as usize].id;
            self.deals[position as usize].index_in_set = position;
            if let Ok(slot) = self.id_index.binary_search_by_key(&moved_id, |entry| entry.0) {
                self.id_index[slot].1 = position;
            }
        }

        Ok(deal)
    }

    pub fn ids(&self) -> Vec<u64> {
        self.id_index.iter().map(|entry| entry.0).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Deal> {
        self.deals.iter()
    }

    fn position_of(&self, id: u64) -> Option<u32> {
        self.id_index
            .binary_search_by_key(&id, |entry| entry.0)
            .ok()
            .map(|slot| self.id_index[slot].1)
    }
}
