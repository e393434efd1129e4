pub mod invariants;
pub mod ledger;
pub mod persistence;
pub mod types;

pub use invariants::assert_tap_consistency;
pub use ledger::TapLedger;
pub use persistence::TapPersistence;
pub use types::{TapLedgerSnapshot, TapPolicy, TapRecord, WithdrawalTicket};
