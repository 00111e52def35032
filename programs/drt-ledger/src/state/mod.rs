pub mod access;
pub mod deal;
pub mod deal_set;
pub mod index_store;
pub mod ledger;
pub mod oracle;
pub mod registry;

pub use access::{AccessControl, Gate};
pub use deal::{Deal, DealState, Voucher, BPS_DENOMINATOR, NOTIONAL_UNIT, SECONDS_PER_DAY};
pub use deal_set::DealSet;
pub use index_store::{IndexEntry, IndexStore, INVALID_LEVEL};
pub use ledger::{ActiveDealCount, DrtLedger};
pub use oracle::{OracleBook, OracleRequest};
pub use registry::{Registry, Standard, TokenEntry};
