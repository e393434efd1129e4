use serde::{Deserialize, Serialize};

use crate::{
    custody::CustodyPort,
    error::TreasuryError,
    tap::TapLedger,
    types::{Amount, AssetId, Timestamp},
};

/// Collateral the curve may treat as redeemable: custody net of whatever the
/// tap can already withdraw. Clamped at zero.
pub fn available_balance(raw_balance: Amount, tap_allowance: Amount) -> Amount {
    raw_balance.saturating_sub(tap_allowance)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceView {
    pub asset_id: AssetId,
    pub raw_balance: Amount,
    pub floor: Amount,
    pub tap_allowance: Amount,
    pub available_balance: Amount,
    pub as_of: Timestamp,
}

/// Read-only balance capability consulted by the curve before it admits a
/// redemption.
pub trait CollateralBalancePort: Send + Sync {
    fn available_balance(&self, asset_id: &str) -> Result<Amount, TreasuryError>;
}

pub fn balance_view(
    ledger: &TapLedger,
    custody: &dyn CustodyPort,
    asset_id: &str,
    now: Timestamp,
) -> Result<BalanceView, TreasuryError> {
    let raw_balance = custody.raw_balance(asset_id)?;
    let tap_allowance = ledger.compute_allowance(asset_id, raw_balance, now)?;
    let floor = ledger
        .record(asset_id)
        .map(|record| record.floor)
        .unwrap_or_default();

    Ok(BalanceView {
        asset_id: asset_id.to_string(),
        raw_balance,
        floor,
        tap_allowance,
        available_balance: available_balance(raw_balance, tap_allowance),
        as_of: now,
    })
}
