use serde::{Deserialize, Serialize};

pub type AssetId = String;
pub type CallerId = String;
pub type Amount = u128;
pub type Timestamp = u64;

/// Fixed-point base for percentages: `PCT_BASE` is 100%.
pub const PCT_BASE: u128 = 1_000_000_000_000_000_000;

/// Reserve ratios are expressed in parts per million.
pub const PPM: u32 = 1_000_000;

pub const SECONDS_PER_DAY: u64 = 86_400;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalReceipt {
    pub asset_id: AssetId,
    pub amount: Amount,
    pub destination: CallerId,
    pub tapped_at: Timestamp,
}
