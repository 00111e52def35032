use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{program_error::ProgramError, pubkey::Pubkey};

use crate::error::DrtError;

/// Operation classes; every mutating instruction names the gate it runs
/// behind, keeping the precondition table auditable in one place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// Administrative registry and kill-switch operations
    Owner,
    /// Settlement driving and direct index publication
    Operator,
    /// Deal creation, cancellation, matching
    User,
    /// Post-dissolution unwind; the only gate that requires dissolution
    Claimback,
}

/// Role sets plus the one-way kill switches. Dissolution flips every flag at
/// once; there is no reset path.
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone)]
pub struct AccessControl {
    pub owners: Vec<Pubkey>,
    pub operators: Vec<Pubkey>,
    pub users: Vec<Pubkey>,

    pub owners_deactivated: bool,
    pub operators_deactivated: bool,
    pub users_claimback_only: bool,
    pub dissolved: bool,
}

impl AccessControl {
    pub const MAX_OWNERS: usize = 8;
    pub const MAX_OPERATORS: usize = 16;
    pub const MAX_USERS: usize = 256;

    pub fn new(initial_owner: Pubkey) -> Self {
        Self {
            owners: vec![initial_owner],
            operators: Vec::new(),
            users: Vec::new(),
            owners_deactivated: false,
            operators_deactivated: false,
            users_claimback_only: false,
            dissolved: false,
        }
    }

    pub fn is_owner(&self, address: &Pubkey) -> bool {
        self.owners.contains(address)
    }

    pub fn is_operator(&self, address: &Pubkey) -> bool {
        self.operators.contains(address)
    }

    pub fn is_user(&self, address: &Pubkey) -> bool {
        self.users.contains(address)
    }

    /// Single policy check for an operation class
    pub fn check(&self, caller: &Pubkey, gate: Gate) -> Result<(), ProgramError> {
        match gate {
            Gate::Owner => {
                if self.dissolved {
                    return Err(DrtError::SystemDissolved.into());
                }
                if self.owners_deactivated {
                    return Err(DrtError::OwnersDeactivated.into());
                }
                if !self.is_owner(caller) {
                    return Err(DrtError::Unauthorized.into());
                }
            }
            Gate::Operator => {
                if self.dissolved {
                    return Err(DrtError::SystemDissolved.into());
                }
                if self.operators_deactivated {
                    return Err(DrtError::OperatorsDeactivated.into());
                }
                if !self.is_operator(caller) && !self.is_owner(caller) {
                    return Err(DrtError::Unauthorized.into());
                }
            }
            Gate::User => {
                if self.dissolved {
                    return Err(DrtError::SystemDissolved.into());
                }
                if self.users_claimback_only {
                    return Err(DrtError::RestrictedToClaimback.into());
                }
                if !self.is_user(caller) {
                    return Err(DrtError::Unauthorized.into());
                }
            }
            Gate::Claimback => {
                if !self.dissolved {
                    return Err(DrtError::SystemNotDissolved.into());
                }
            }
        }
        Ok(())
    }

    pub fn add_owner(&mut self, address: Pubkey) -> Result<(), ProgramError> {
        Self::add_to(&mut self.owners, address, Self::MAX_OWNERS)
    }

    pub fn add_operator(&mut self, address: Pubkey) -> Result<(), ProgramError> {
        Self::add_to(&mut self.operators, address, Self::MAX_OPERATORS)
    }

    pub fn add_user(&mut self, address: Pubkey) -> Result<(), ProgramError> {
        Self::add_to(&mut self.users, address, Self::MAX_USERS)
    }

    pub fn deactivate_owners(&mut self) {
        self.owners_deactivated = true;
    }

    pub fn deactivate_operators(&mut self) {
        self.operators_deactivated = true;
    }

    pub fn restrict_users_to_claimback(&mut self) {
        self.users_claimback_only = true;
    }

    /// One-way: every switch flips and stays flipped
    pub fn dissolve(&mut self) {
        self.dissolved = true;
        self.owners_deactivated = true;
        self.operators_deactivated = true;
        self.users_claimback_only = true;
    }

    fn add_to(set: &mut Vec<Pubkey>, address: Pubkey, max: usize) -> Result<(), ProgramError> {
        if set.contains(&address) {
            return Ok(());
        }
        if set.len() >= max {
            return Err(DrtError::CapacityExceeded.into());
        }
        set.push(address);
        Ok(())
    }
}
