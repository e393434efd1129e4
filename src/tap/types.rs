use serde::{Deserialize, Serialize};

use crate::{
    curve::CurveParams,
    types::{Amount, AssetId, CallerId, PCT_BASE, SECONDS_PER_DAY, Timestamp},
};

/// Per-asset tap state. The withdrawable allowance is derived from these
/// fields and the custodied balance; it is never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TapRecord {
    pub asset_id: AssetId,
    /// Amount released per `TapPolicy::rate_period_secs`.
    pub tap_rate: Amount,
    pub floor: Amount,
    pub last_tap_timestamp: Timestamp,
    /// Reference point for the rate-change cap.
    pub last_rate_update: Timestamp,
    /// Curve listing paired with this record; re-listed on startup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listing: Option<CurveParams>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TapPolicy {
    /// Largest relative rate change allowed per `rate_change_period_secs`, over `PCT_BASE`.
    pub max_tap_change_pct: u128,
    pub rate_change_period_secs: u64,
    pub rate_period_secs: u64,
}

impl Default for TapPolicy {
    fn default() -> Self {
        Self {
            // 10% per 30 days
            max_tap_change_pct: PCT_BASE / 10,
            rate_change_period_secs: 30 * SECONDS_PER_DAY,
            rate_period_secs: SECONDS_PER_DAY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TapLedgerSnapshot {
    pub policy: TapPolicy,
    pub beneficiary: CallerId,
    #[serde(default)]
    pub records: Vec<TapRecord>,
}

/// Allowance computed for one withdrawal attempt. Committing it moves the
/// accrual clock to `accrued_until`, and only if the record has not been
/// tapped since the ticket was issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawalTicket {
    pub asset_id: AssetId,
    pub amount: Amount,
    pub accrued_since: Timestamp,
    /// End of the accrual window `amount` pays for. Sub-unit remainders stay
    /// behind it; a floor-clipped withdrawal consumes the whole window.
    pub accrued_until: Timestamp,
    pub tapped_at: Timestamp,
}
