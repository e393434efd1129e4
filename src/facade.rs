use std::sync::{Arc, Mutex, MutexGuard};

use validator::Validate;

use crate::{
    access::{AccessGateway, Operation},
    accounting::{self, BalanceView, CollateralBalancePort},
    clock::Clock,
    curve::{BuyOrder, CurveParams, CurvePort, OrderReceipt, SellOrder},
    custody::CustodyPort,
    error::{TreasuryError, internal_error, invalid_asset_parameters, not_registered},
    tap::{
        TapLedger, TapLedgerSnapshot, TapPersistence, TapRecord, assert_tap_consistency,
        ledger::transfer_failure,
    },
    types::{Amount, Timestamp, WithdrawalReceipt},
};

/// Single entry point for privileged treasury actions. Every mutating call is
/// checked by the gateway first, applied to a staged copy of the tap ledger,
/// and committed only once every collaborator and the durable store accepted it.
pub struct TreasuryFacade {
    gateway: AccessGateway,
    ledger: Mutex<TapLedger>,
    curve: Arc<dyn CurvePort>,
    custody: Arc<dyn CustodyPort>,
    clock: Arc<dyn Clock>,
    persistence: Option<TapPersistence>,
}

impl TreasuryFacade {
    pub fn new(
        gateway: AccessGateway,
        ledger: TapLedger,
        curve: Arc<dyn CurvePort>,
        custody: Arc<dyn CustodyPort>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            gateway,
            ledger: Mutex::new(ledger),
            curve,
            custody,
            clock,
            persistence: None,
        }
    }

    pub fn with_persistence(mut self, persistence: TapPersistence) -> Self {
        self.persistence = Some(persistence);
        self
    }

    pub fn add_collateral_asset(
        &self,
        caller: &str,
        asset_id: &str,
        curve_params: CurveParams,
        tap_rate: Amount,
        floor: Amount,
    ) -> Result<TapRecord, TreasuryError> {
        self.gateway.require(Operation::AddAsset, caller)?;
        curve_params.validate().map_err(|err| {
            invalid_asset_parameters(format!("invalid curve params for '{asset_id}': {err}"))
        })?;

        let mut guard = self.lock_ledger()?;
        let now = self.clock.now();
        let mut staged = guard.clone();
        staged.register(asset_id, tap_rate, floor, now)?;
        staged.set_listing(asset_id, curve_params.clone())?;
        let record = staged
            .record(asset_id)
            .cloned()
            .ok_or_else(|| not_registered(&asset_id.to_string()))?;

        self.curve.register_asset(asset_id, &curve_params)?;
        if let Err(err) = self.persist(&staged) {
            if let Err(rollback_err) = self.curve.remove_asset(asset_id) {
                tracing::error!(
                    target: "treasury",
                    asset_id = %asset_id,
                    error = %rollback_err,
                    "curve_listing_rollback_failed"
                );
            }
            return Err(err);
        }
        *guard = staged;

        tracing::info!(
            target: "treasury",
            caller = %caller,
            asset_id = %asset_id,
            tap_rate = %tap_rate,
            floor = %floor,
            reserve_ratio = curve_params.reserve_ratio,
            "collateral_asset_added"
        );
        Ok(record)
    }

    pub fn remove_collateral_asset(
        &self,
        caller: &str,
        asset_id: &str,
    ) -> Result<TapRecord, TreasuryError> {
        self.gateway.require(Operation::RemoveAsset, caller)?;

        let mut guard = self.lock_ledger()?;
        let mut staged = guard.clone();
        let removed = staged.remove(asset_id)?;

        self.persist(&staged)?;
        if let Err(err) = self.curve.remove_asset(asset_id) {
            if let Err(restore_err) = self.persist(&guard) {
                tracing::error!(
                    target: "treasury",
                    asset_id = %asset_id,
                    error = %restore_err,
                    "tap_state_restore_failed"
                );
            }
            return Err(err.into());
        }
        *guard = staged;

        tracing::info!(
            target: "treasury",
            caller = %caller,
            asset_id = %asset_id,
            "collateral_asset_removed"
        );
        Ok(removed)
    }

    pub fn update_tap_rate(
        &self,
        caller: &str,
        asset_id: &str,
        tap_rate: Amount,
    ) -> Result<(), TreasuryError> {
        self.gateway.require(Operation::UpdateTapRate, caller)?;
        self.apply(|ledger, now| ledger.update_rate(asset_id, tap_rate, now))?;
        tracing::info!(
            target: "treasury",
            caller = %caller,
            asset_id = %asset_id,
            tap_rate = %tap_rate,
            "tap_rate_updated"
        );
        Ok(())
    }

    pub fn update_tap_floor(
        &self,
        caller: &str,
        asset_id: &str,
        floor: Amount,
    ) -> Result<(), TreasuryError> {
        self.gateway.require(Operation::UpdateTapFloor, caller)?;
        self.apply(|ledger, _| ledger.update_floor(asset_id, floor))?;
        tracing::info!(
            target: "treasury",
            caller = %caller,
            asset_id = %asset_id,
            floor = %floor,
            "tap_floor_updated"
        );
        Ok(())
    }

    pub fn update_max_tap_increase(
        &self,
        caller: &str,
        max_tap_change_pct: u128,
    ) -> Result<(), TreasuryError> {
        self.gateway.require(Operation::UpdateMaxTapIncrease, caller)?;
        self.apply(|ledger, _| {
            ledger.update_max_change_pct(max_tap_change_pct);
            Ok(())
        })?;
        tracing::info!(
            target: "treasury",
            caller = %caller,
            max_tap_change_pct = %max_tap_change_pct,
            "max_tap_change_updated"
        );
        Ok(())
    }

    pub fn update_beneficiary(&self, caller: &str, beneficiary: &str) -> Result<(), TreasuryError> {
        self.gateway.require(Operation::UpdateBeneficiary, caller)?;
        self.apply(|ledger, _| ledger.update_beneficiary(beneficiary))?;
        tracing::info!(
            target: "treasury",
            caller = %caller,
            beneficiary = %beneficiary,
            "tap_beneficiary_updated"
        );
        Ok(())
    }

    pub fn update_reserve_ratio(
        &self,
        caller: &str,
        asset_id: &str,
        reserve_ratio: u32,
    ) -> Result<(), TreasuryError> {
        self.gateway.require(Operation::UpdateReserveRatio, caller)?;

        let mut guard = self.lock_ledger()?;
        let previous = guard
            .record(asset_id)
            .ok_or_else(|| not_registered(&asset_id.to_string()))?
            .listing
            .as_ref()
            .map(|listing| listing.reserve_ratio);
        let mut staged = guard.clone();
        staged.update_listing_reserve_ratio(asset_id, reserve_ratio)?;

        self.curve.update_reserve_ratio(asset_id, reserve_ratio)?;
        if let Err(err) = self.persist(&staged) {
            if let Some(previous) = previous {
                if let Err(rollback_err) = self.curve.update_reserve_ratio(asset_id, previous) {
                    tracing::error!(
                        target: "treasury",
                        asset_id = %asset_id,
                        error = %rollback_err,
                        "reserve_ratio_rollback_failed"
                    );
                }
            }
            return Err(err);
        }
        *guard = staged;

        tracing::info!(
            target: "treasury",
            caller = %caller,
            asset_id = %asset_id,
            reserve_ratio,
            "reserve_ratio_updated"
        );
        Ok(())
    }

    pub fn open_buy_order(
        &self,
        caller: &str,
        asset_id: &str,
        amount: Amount,
        payment: Amount,
    ) -> Result<OrderReceipt, TreasuryError> {
        self.gateway.require(Operation::OpenBuyOrder, caller)?;
        let receipt = self.curve.open_buy_order(BuyOrder {
            caller: caller.to_string(),
            asset_id: asset_id.to_string(),
            amount,
            payment,
        })?;
        tracing::debug!(
            target: "treasury",
            order_id = %receipt.order_id,
            caller = %caller,
            asset_id = %asset_id,
            amount = %amount,
            "buy_order_opened"
        );
        Ok(receipt)
    }

    pub fn open_sell_order(
        &self,
        caller: &str,
        asset_id: &str,
        amount: Amount,
    ) -> Result<OrderReceipt, TreasuryError> {
        self.gateway.require(Operation::OpenSellOrder, caller)?;
        let receipt = self.curve.open_sell_order(SellOrder {
            caller: caller.to_string(),
            asset_id: asset_id.to_string(),
            amount,
        })?;
        tracing::debug!(
            target: "treasury",
            order_id = %receipt.order_id,
            caller = %caller,
            asset_id = %asset_id,
            amount = %amount,
            "sell_order_opened"
        );
        Ok(receipt)
    }

    /// Pays the accrued allowance to the beneficiary. The reset accrual clock
    /// is persisted before funds move; a refused transfer restores the
    /// persisted state, so an error never leaves a payout behind.
    pub fn withdraw(
        &self,
        caller: &str,
        asset_id: &str,
    ) -> Result<WithdrawalReceipt, TreasuryError> {
        self.gateway.require(Operation::Withdraw, caller)?;

        let mut guard = self.lock_ledger()?;
        let now = self.clock.now();
        let raw_balance = self.custody.raw_balance(asset_id)?;
        let ticket = guard.prepare_withdrawal(asset_id, raw_balance, now)?;
        let mut staged = guard.clone();
        let receipt = staged.commit_withdrawal(&ticket)?;

        self.persist(&staged)?;
        let transferred = self
            .custody
            .transfer_out(&ticket.asset_id, ticket.amount, &receipt.destination);
        if let Err(err) = transferred {
            if let Err(restore_err) = self.persist(&guard) {
                tracing::error!(
                    target: "treasury",
                    asset_id = %asset_id,
                    error = %restore_err,
                    "tap_state_restore_failed"
                );
            }
            return Err(transfer_failure(&ticket, err));
        }
        *guard = staged;

        tracing::info!(
            target: "treasury",
            caller = %caller,
            asset_id = %asset_id,
            amount = %receipt.amount,
            destination = %receipt.destination,
            accrued_until = ticket.accrued_until,
            "tap_withdrawn"
        );
        Ok(receipt)
    }

    /// Re-lists every stored curve listing the curve does not know yet.
    /// Returns how many listings were restored.
    pub fn restore_curve_listings(&self) -> Result<usize, TreasuryError> {
        let guard = self.lock_ledger()?;
        let mut restored = 0;
        for record in guard.records() {
            let Some(listing) = record.listing.as_ref() else {
                tracing::warn!(
                    target: "treasury",
                    asset_id = %record.asset_id,
                    "tap_record_without_curve_listing"
                );
                continue;
            };
            if self.curve.asset_is_registered(&record.asset_id) {
                continue;
            }
            self.curve.register_asset(&record.asset_id, listing)?;
            restored += 1;
        }

        tracing::info!(target: "treasury", restored, "curve_listings_restored");
        Ok(restored)
    }

    pub fn available_balance(&self, asset_id: &str) -> Result<Amount, TreasuryError> {
        Ok(self.balance_view(asset_id)?.available_balance)
    }

    pub fn compute_allowance(&self, asset_id: &str) -> Result<Amount, TreasuryError> {
        Ok(self.balance_view(asset_id)?.tap_allowance)
    }

    pub fn balance_view(&self, asset_id: &str) -> Result<BalanceView, TreasuryError> {
        let guard = self.lock_ledger()?;
        accounting::balance_view(&guard, self.custody.as_ref(), asset_id, self.clock.now())
    }

    pub fn tap_record(&self, asset_id: &str) -> Result<TapRecord, TreasuryError> {
        self.lock_ledger()?
            .record(asset_id)
            .cloned()
            .ok_or_else(|| not_registered(&asset_id.to_string()))
    }

    pub fn tap_snapshot(&self) -> Result<TapLedgerSnapshot, TreasuryError> {
        Ok(self.lock_ledger()?.snapshot())
    }

    pub fn check_invariants(&self) -> Result<(), TreasuryError> {
        let guard = self.lock_ledger()?;
        assert_tap_consistency(&guard, self.custody.as_ref(), self.clock.now())
    }

    fn apply<T>(
        &self,
        mutate: impl FnOnce(&mut TapLedger, Timestamp) -> Result<T, TreasuryError>,
    ) -> Result<T, TreasuryError> {
        let mut guard = self.lock_ledger()?;
        let mut staged = guard.clone();
        let out = mutate(&mut staged, self.clock.now())?;
        self.persist(&staged)?;
        *guard = staged;
        Ok(out)
    }

    fn persist(&self, ledger: &TapLedger) -> Result<(), TreasuryError> {
        match &self.persistence {
            Some(persistence) => persistence.save(&ledger.snapshot()),
            None => Ok(()),
        }
    }

    fn lock_ledger(&self) -> Result<MutexGuard<'_, TapLedger>, TreasuryError> {
        self.ledger
            .lock()
            .map_err(|_| internal_error("tap ledger lock poisoned"))
    }
}

impl CollateralBalancePort for TreasuryFacade {
    fn available_balance(&self, asset_id: &str) -> Result<Amount, TreasuryError> {
        TreasuryFacade::available_balance(self, asset_id)
    }
}
