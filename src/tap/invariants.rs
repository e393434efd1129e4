use crate::{
    accounting::available_balance,
    custody::CustodyPort,
    error::{TreasuryError, invariant_violation},
    tap::ledger::TapLedger,
    types::Timestamp,
};

pub fn assert_tap_consistency(
    ledger: &TapLedger,
    custody: &dyn CustodyPort,
    now: Timestamp,
) -> Result<(), TreasuryError> {
    for record in ledger.records() {
        if record.last_tap_timestamp > now {
            return Err(invariant_violation(format!(
                "asset '{}' was tapped in the future: last_tap_timestamp={}, now={}",
                record.asset_id, record.last_tap_timestamp, now
            )));
        }

        let raw_balance = custody.raw_balance(&record.asset_id)?;
        let allowance = ledger.compute_allowance(&record.asset_id, raw_balance, now)?;
        if allowance > raw_balance.saturating_sub(record.floor) {
            return Err(invariant_violation(format!(
                "allowance {} for '{}' breaches floor {} at balance {}",
                allowance, record.asset_id, record.floor, raw_balance
            )));
        }

        let available = available_balance(raw_balance, allowance);
        if available > raw_balance {
            return Err(invariant_violation(format!(
                "available balance {} for '{}' exceeds custody {}",
                available, record.asset_id, raw_balance
            )));
        }
    }

    Ok(())
}
