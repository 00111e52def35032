use borsh::{BorshDeserialize, BorshSerialize};
use sha3::{Digest, Keccak256};
use solana_program::{program_error::ProgramError, pubkey::Pubkey};

use crate::error::DrtError;
use crate::state::deal::BPS_DENOMINATOR;

/// Named template of economic parameters; deals snapshot these fields into
/// their voucher at creation so later deletion cannot affect existing deals.
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq)]
pub struct Standard {
    pub symbol: String,
    pub configuration_id: [u8; 32],
    pub strike: u64,
    pub fee_bps: u16,
    pub start_date: u64,
    pub maturity_date: u64,
    pub exponent_of_ten_multiplier_for_strike: u8,
}

impl Standard {
    /// Strike scaled by the power-of-ten multiplier, as snapshot into vouchers
    pub fn scaled_strike(&self) -> Result<u64, ProgramError> {
        let multiplier = 10u64
            .checked_pow(self.exponent_of_ten_multiplier_for_strike as u32)
            .ok_or(DrtError::ArithmeticOverflow)?;
        self.strike
            .checked_mul(multiplier)
            .ok_or_else(|| DrtError::ArithmeticOverflow.into())
    }
}

/// Denomination string -> settlement currency mint
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq)]
pub struct TokenEntry {
    pub denomination: String,
    pub mint: Pubkey,
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone)]
pub struct Registry {
    pub standards: Vec<Standard>,
    pub tokens: Vec<TokenEntry>,
}

/// Deterministic configuration id derived from the standard's symbol
pub fn configuration_id_for(symbol: &str) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(symbol.as_bytes());

    let result = hasher.finalize();
    let mut configuration_id = [0u8; 32];
    configuration_id.copy_from_slice(&result[..32]);
    configuration_id
}

impl Registry {
    pub const MAX_STANDARDS: usize = 32;
    pub const MAX_TOKENS: usize = 32;
    pub const MAX_SYMBOL_LEN: usize = 32;

    pub fn new() -> Self {
        Self {
            standards: Vec::new(),
            tokens: Vec::new(),
        }
    }

    pub fn add_standard(
        &mut self,
        symbol: String,
        strike: u64,
        fee_bps: u16,
        start_date: u64,
        maturity_date: u64,
        exponent_of_ten_multiplier_for_strike: u8,
    ) -> Result<[u8; 32], ProgramError> {
        if self.standards.len() >= Self::MAX_STANDARDS {
            return Err(DrtError::CapacityExceeded.into());
        }
        if symbol.len() > Self::MAX_SYMBOL_LEN {
            return Err(DrtError::SymbolTooLong.into());
        }
        if self.standards.iter().any(|s| s.symbol == symbol) {
            return Err(DrtError::StandardAlreadyExists.into());
        }
        if start_date >= maturity_date {
            return Err(DrtError::InvalidStandardDates.into());
        }
        if fee_bps as u64 > BPS_DENOMINATOR {
            return Err(DrtError::InvalidFeeBps.into());
        }

        let configuration_id = configuration_id_for(&symbol);
        self.standards.push(Standard {
            symbol,
            configuration_id,
            strike,
            fee_bps,
            start_date,
            maturity_date,
            exponent_of_ten_multiplier_for_strike,
        });

        Ok(configuration_id)
    }

    pub fn delete_standard(&mut self, symbol: &str) -> Result<(), ProgramError> {
        let position = self
            .standards
            .iter()
            .position(|s| s.symbol == symbol)
            .ok_or(DrtError::StandardNotFound)?;
        self.standards.remove(position);
        Ok(())
    }

    /// Dissolution cascade: all standards removed so no new deals can
    /// reference stale terms
    pub fn clear_standards(&mut self) {
        self.standards.clear();
    }

    pub fn get_standard(&self, symbol: &str) -> Option<&Standard> {
        self.standards.iter().find(|s| s.symbol == symbol)
    }

    pub fn add_token(&mut self, denomination: String, mint: Pubkey) -> Result<(), ProgramError> {
        if self.tokens.len() >= Self::MAX_TOKENS {
            return Err(DrtError::CapacityExceeded.into());
        }
        if denomination.len() > Self::MAX_SYMBOL_LEN {
            return Err(DrtError::SymbolTooLong.into());
        }
        if self.tokens.iter().any(|t| t.denomination == denomination) {
            return Err(DrtError::TokenAlreadyExists.into());
        }

        self.tokens.push(TokenEntry { denomination, mint });
        Ok(())
    }

    pub fn delete_token(&mut self, denomination: &str) -> Result<(), ProgramError> {
        let position = self
            .tokens
            .iter()
            .position(|t| t.denomination == denomination)
            .ok_or(DrtError::TokenNotFound)?;
        self.tokens.remove(position);
        Ok(())
    }

    pub fn get_token(&self, denomination: &str) -> Option<&TokenEntry> {
        self.tokens.iter().find(|t| t.denomination == denomination)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_id_deterministic() {
        let a = configuration_id_for("BTCUSD_SEP");
        let b = configuration_id_for("BTCUSD_SEP");
        assert_eq!(a, b);

        let c = configuration_id_for("ETHUSD_SEP");
        assert_ne!(a, c);
    }

    #[test]
    fn test_scaled_strike() {
        let mut registry = Registry::new();
        registry
            .add_standard("S".to_string(), 25, 50, 100, 200, 3)
            .unwrap();

        let standard = registry.get_standard("S").unwrap();
        assert_eq!(standard.scaled_strike().unwrap(), 25_000);
    }

    #[test]
    fn test_overlong_names_rejected() {
        let mut registry = Registry::new();
        let long = "X".repeat(Registry::MAX_SYMBOL_LEN + 1);

        let err = registry
            .add_standard(long.clone(), 25, 50, 100, 200, 0)
            .unwrap_err();
        assert_eq!(err, DrtError::SymbolTooLong.into());

        let err = registry
            .add_token(long, solana_program::pubkey::Pubkey::new_unique())
            .unwrap_err();
        assert_eq!(err, DrtError::SymbolTooLong.into());

        // Exactly at the limit is fine
        let max = "X".repeat(Registry::MAX_SYMBOL_LEN);
        registry
            .add_standard(max.clone(), 25, 50, 100, 200, 0)
            .unwrap();
        registry
            .add_token(max, solana_program::pubkey::Pubkey::new_unique())
            .unwrap();
    }

    #[test]
    fn test_duplicate_standard_rejected() {
        let mut registry = Registry::new();
        registry
            .add_standard("S".to_string(), 25, 50, 100, 200, 0)
            .unwrap();

        let err = registry
            .add_standard("S".to_string(), 30, 50, 100, 200, 0)
            .unwrap_err();
        assert_eq!(err, DrtError::StandardAlreadyExists.into());
    }
}
