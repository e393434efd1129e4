use std::collections::BTreeMap;

use crate::{
    curve::CurveParams,
    custody::CustodyPort,
    error::{
        CollaboratorError, TreasuryError, already_registered, arithmetic_error,
        insufficient_custody_funds, invalid_asset_parameters, invalid_request,
        invariant_violation, not_registered, nothing_to_withdraw, rate_change_too_large,
    },
    tap::types::{TapLedgerSnapshot, TapPolicy, TapRecord, WithdrawalTicket},
    types::{Amount, AssetId, CallerId, PCT_BASE, Timestamp, WithdrawalReceipt},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TapLedger {
    records: BTreeMap<AssetId, TapRecord>,
    policy: TapPolicy,
    beneficiary: CallerId,
}

impl TapLedger {
    pub fn new(policy: TapPolicy, beneficiary: impl Into<CallerId>) -> Self {
        Self {
            records: BTreeMap::new(),
            policy,
            beneficiary: beneficiary.into(),
        }
    }

    pub fn from_snapshot(snapshot: TapLedgerSnapshot) -> Result<Self, TreasuryError> {
        if snapshot.beneficiary.trim().is_empty() {
            return Err(invalid_request("tap beneficiary cannot be empty"));
        }

        let mut records = BTreeMap::new();
        for record in snapshot.records {
            if records.contains_key(&record.asset_id) {
                return Err(invalid_request(format!(
                    "duplicate tap record for asset '{}'",
                    record.asset_id
                )));
            }
            records.insert(record.asset_id.clone(), record);
        }

        Ok(Self {
            records,
            policy: snapshot.policy,
            beneficiary: snapshot.beneficiary,
        })
    }

    pub fn snapshot(&self) -> TapLedgerSnapshot {
        TapLedgerSnapshot {
            policy: self.policy.clone(),
            beneficiary: self.beneficiary.clone(),
            records: self.records.values().cloned().collect(),
        }
    }

    pub fn policy(&self) -> &TapPolicy {
        &self.policy
    }

    pub fn beneficiary(&self) -> &str {
        &self.beneficiary
    }

    pub fn record(&self, asset_id: &str) -> Option<&TapRecord> {
        self.records.get(asset_id)
    }

    pub fn records(&self) -> impl Iterator<Item = &TapRecord> {
        self.records.values()
    }

    pub fn is_registered(&self, asset_id: &str) -> bool {
        self.records.contains_key(asset_id)
    }

    pub fn register(
        &mut self,
        asset_id: &str,
        tap_rate: Amount,
        floor: Amount,
        now: Timestamp,
    ) -> Result<&TapRecord, TreasuryError> {
        if asset_id.trim().is_empty() {
            return Err(invalid_asset_parameters("asset_id cannot be empty"));
        }
        if self.records.contains_key(asset_id) {
            return Err(already_registered(&asset_id.to_string()));
        }

        let record = self
            .records
            .entry(asset_id.to_string())
            .or_insert(TapRecord {
                asset_id: asset_id.to_string(),
                tap_rate,
                floor,
                last_tap_timestamp: now,
                last_rate_update: now,
                listing: None,
            });
        Ok(record)
    }

    pub fn set_listing(
        &mut self,
        asset_id: &str,
        params: CurveParams,
    ) -> Result<(), TreasuryError> {
        let record = self
            .records
            .get_mut(asset_id)
            .ok_or_else(|| not_registered(&asset_id.to_string()))?;
        record.listing = Some(params);
        Ok(())
    }

    /// Mirrors a curve reserve-ratio change into the stored listing, if any.
    pub fn update_listing_reserve_ratio(
        &mut self,
        asset_id: &str,
        reserve_ratio: u32,
    ) -> Result<(), TreasuryError> {
        let record = self
            .records
            .get_mut(asset_id)
            .ok_or_else(|| not_registered(&asset_id.to_string()))?;
        if let Some(listing) = record.listing.as_mut() {
            listing.reserve_ratio = reserve_ratio;
        }
        Ok(())
    }

    pub fn remove(&mut self, asset_id: &str) -> Result<TapRecord, TreasuryError> {
        self.records
            .remove(asset_id)
            .ok_or_else(|| not_registered(&asset_id.to_string()))
    }

    /// Applies a new rate if the relative change stays within the cap earned
    /// since the previous rate change.
    pub fn update_rate(
        &mut self,
        asset_id: &str,
        new_rate: Amount,
        now: Timestamp,
    ) -> Result<(), TreasuryError> {
        let policy = self.policy.clone();
        let record = self
            .records
            .get_mut(asset_id)
            .ok_or_else(|| not_registered(&asset_id.to_string()))?;

        let old_rate = record.tap_rate;
        if old_rate != 0 && new_rate != old_rate {
            let elapsed = now.saturating_sub(record.last_rate_update);
            let allowed = allowed_rate_delta(&policy, old_rate, elapsed)?;
            let delta = old_rate.abs_diff(new_rate);
            if delta > allowed {
                return Err(rate_change_too_large(format!(
                    "tap rate change for '{}' from {} to {} exceeds allowed delta {} after {}s",
                    asset_id, old_rate, new_rate, allowed, elapsed
                )));
            }
        }

        record.tap_rate = new_rate;
        record.last_rate_update = now;
        Ok(())
    }

    pub fn update_floor(&mut self, asset_id: &str, floor: Amount) -> Result<(), TreasuryError> {
        let record = self
            .records
            .get_mut(asset_id)
            .ok_or_else(|| not_registered(&asset_id.to_string()))?;
        record.floor = floor;
        Ok(())
    }

    pub fn update_max_change_pct(&mut self, max_tap_change_pct: u128) {
        self.policy.max_tap_change_pct = max_tap_change_pct;
    }

    pub fn update_beneficiary(&mut self, beneficiary: &str) -> Result<(), TreasuryError> {
        if beneficiary.trim().is_empty() {
            return Err(invalid_request("tap beneficiary cannot be empty"));
        }
        self.beneficiary = beneficiary.to_string();
        Ok(())
    }

    /// `min(rate * elapsed / rate_period, max(0, raw_balance - floor))`.
    pub fn compute_allowance(
        &self,
        asset_id: &str,
        raw_balance: Amount,
        now: Timestamp,
    ) -> Result<Amount, TreasuryError> {
        let record = self
            .records
            .get(asset_id)
            .ok_or_else(|| not_registered(&asset_id.to_string()))?;
        Ok(accrued_allowance(&self.policy, record, raw_balance, now))
    }

    pub fn prepare_withdrawal(
        &self,
        asset_id: &str,
        raw_balance: Amount,
        now: Timestamp,
    ) -> Result<WithdrawalTicket, TreasuryError> {
        let record = self
            .records
            .get(asset_id)
            .ok_or_else(|| not_registered(&asset_id.to_string()))?;

        let amount = accrued_allowance(&self.policy, record, raw_balance, now);
        if amount == 0 {
            return Err(nothing_to_withdraw(&record.asset_id));
        }

        Ok(WithdrawalTicket {
            asset_id: record.asset_id.clone(),
            amount,
            accrued_since: record.last_tap_timestamp,
            accrued_until: paid_through(&self.policy, record, amount, now),
            tapped_at: now,
        })
    }

    pub fn commit_withdrawal(
        &mut self,
        ticket: &WithdrawalTicket,
    ) -> Result<WithdrawalReceipt, TreasuryError> {
        let beneficiary = self.beneficiary.clone();
        let record = self
            .records
            .get_mut(&ticket.asset_id)
            .ok_or_else(|| not_registered(&ticket.asset_id))?;

        if record.last_tap_timestamp != ticket.accrued_since {
            return Err(invariant_violation(format!(
                "withdrawal ticket for '{}' is stale: accrued_since={}, current={}",
                ticket.asset_id, ticket.accrued_since, record.last_tap_timestamp
            )));
        }

        record.last_tap_timestamp = ticket.accrued_until;
        Ok(WithdrawalReceipt {
            asset_id: ticket.asset_id.clone(),
            amount: ticket.amount,
            destination: beneficiary,
            tapped_at: ticket.tapped_at,
        })
    }

    /// Transfers the accrued allowance to the beneficiary, then resets the
    /// accrual clock. A failed transfer leaves the record untouched.
    pub fn withdraw(
        &mut self,
        asset_id: &str,
        custody: &dyn CustodyPort,
        now: Timestamp,
    ) -> Result<WithdrawalReceipt, TreasuryError> {
        if !self.is_registered(asset_id) {
            return Err(not_registered(&asset_id.to_string()));
        }

        let raw_balance = custody.raw_balance(asset_id)?;
        let ticket = self.prepare_withdrawal(asset_id, raw_balance, now)?;

        custody
            .transfer_out(&ticket.asset_id, ticket.amount, &self.beneficiary)
            .map_err(|err| transfer_failure(&ticket, err))?;

        self.commit_withdrawal(&ticket)
    }
}

pub(crate) fn transfer_failure(
    ticket: &WithdrawalTicket,
    err: CollaboratorError,
) -> TreasuryError {
    match err {
        CollaboratorError::InsufficientFunds { .. } => TreasuryError::from(err),
        other => insufficient_custody_funds(format!(
            "tap transfer of {} '{}' failed: {other}",
            ticket.amount, ticket.asset_id
        )),
    }
}

fn accrued_allowance(
    policy: &TapPolicy,
    record: &TapRecord,
    raw_balance: Amount,
    now: Timestamp,
) -> Amount {
    let elapsed = now.saturating_sub(record.last_tap_timestamp) as u128;
    let period = policy.rate_period_secs.max(1) as u128;
    let accrued = record.tap_rate.saturating_mul(elapsed) / period;
    let cap = raw_balance.saturating_sub(record.floor);
    accrued.min(cap)
}

/// Timestamp up to which `amount` settles the accrual. Unclipped withdrawals
/// advance the clock only by the seconds they pay for, so the truncated
/// remainder keeps accruing.
fn paid_through(
    policy: &TapPolicy,
    record: &TapRecord,
    amount: Amount,
    now: Timestamp,
) -> Timestamp {
    let elapsed = now.saturating_sub(record.last_tap_timestamp) as u128;
    let period = policy.rate_period_secs.max(1) as u128;
    let accrued = record.tap_rate.saturating_mul(elapsed) / period;
    if record.tap_rate == 0 || amount < accrued {
        return now;
    }

    match amount
        .checked_mul(period)
        .map(|scaled| scaled.div_ceil(record.tap_rate))
    {
        Some(seconds) if seconds <= elapsed => record.last_tap_timestamp + seconds as Timestamp,
        _ => now,
    }
}

fn allowed_rate_delta(
    policy: &TapPolicy,
    old_rate: Amount,
    elapsed: u64,
) -> Result<Amount, TreasuryError> {
    let period = policy.rate_change_period_secs.max(1);
    let window = elapsed.min(period) as u128;

    let per_period = mul_div(old_rate, policy.max_tap_change_pct, PCT_BASE)
        .ok_or_else(|| arithmetic_error("tap rate cap overflow"))?;
    mul_div(per_period, window, period as u128)
        .ok_or_else(|| arithmetic_error("tap rate cap overflow"))
}

fn mul_div(a: u128, b: u128, c: u128) -> Option<u128> {
    if c == 0 {
        return None;
    }
    match a.checked_mul(b) {
        Some(product) => Some(product / c),
        None => {
            let whole = (a / c).checked_mul(b)?;
            let part = (a % c).checked_mul(b)? / c;
            whole.checked_add(part)
        }
    }
}
