use std::{
    collections::BTreeMap,
    sync::{
        Mutex, RwLock, Weak,
        atomic::{AtomicBool, Ordering},
    },
};

use uuid::Uuid;

use crate::{
    accounting::CollateralBalancePort,
    curve::{
        ports::CurvePort,
        types::{BuyOrder, CurveParams, OrderReceipt, OrderSide, SellOrder},
    },
    error::CollaboratorError,
    types::{AssetId, PPM},
};

#[derive(Debug, Default)]
struct CurveState {
    listings: BTreeMap<AssetId, CurveParams>,
    orders: Vec<OrderReceipt>,
}

/// Listing book and order recorder standing in for the curve engine.
///
/// When a redemption guard is attached, sell orders are redeemed at par and are
/// refused if they exceed the collateral available after the tap allowance.
#[derive(Default)]
pub struct InMemoryCurve {
    state: Mutex<CurveState>,
    redemption_guard: RwLock<Option<Weak<dyn CollateralBalancePort>>>,
    fail_registrations: AtomicBool,
    fail_removals: AtomicBool,
}

impl InMemoryCurve {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach_redemption_guard(&self, guard: Weak<dyn CollateralBalancePort>) {
        if let Ok(mut slot) = self.redemption_guard.write() {
            *slot = Some(guard);
        }
    }

    pub fn fail_registrations(&self, fail: bool) {
        self.fail_registrations.store(fail, Ordering::SeqCst);
    }

    pub fn fail_removals(&self, fail: bool) {
        self.fail_removals.store(fail, Ordering::SeqCst);
    }

    pub fn listing(&self, asset_id: &str) -> Option<CurveParams> {
        self.lock().ok()?.listings.get(asset_id).cloned()
    }

    pub fn orders(&self) -> Vec<OrderReceipt> {
        self.lock()
            .map(|state| state.orders.clone())
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, CurveState>, CollaboratorError> {
        self.state
            .lock()
            .map_err(|_| CollaboratorError::Unavailable("curve state lock poisoned".to_string()))
    }

    fn check_redemption(&self, order: &SellOrder) -> Result<(), CollaboratorError> {
        let guard = self
            .redemption_guard
            .read()
            .ok()
            .and_then(|slot| slot.as_ref().and_then(Weak::upgrade));
        let Some(guard) = guard else {
            return Ok(());
        };

        let available = guard
            .available_balance(&order.asset_id)
            .map_err(|err| CollaboratorError::Unavailable(err.message))?;
        if order.amount > available {
            return Err(CollaboratorError::InsufficientFunds {
                asset_id: order.asset_id.clone(),
                requested: order.amount,
                available,
            });
        }
        Ok(())
    }
}

impl CurvePort for InMemoryCurve {
    fn register_asset(
        &self,
        asset_id: &str,
        params: &CurveParams,
    ) -> Result<(), CollaboratorError> {
        if self.fail_registrations.load(Ordering::SeqCst) {
            return Err(CollaboratorError::Rejected(format!(
                "curve refused listing for '{asset_id}'"
            )));
        }
        let mut state = self.lock()?;
        if state.listings.contains_key(asset_id) {
            return Err(CollaboratorError::AlreadyListed(asset_id.to_string()));
        }
        state.listings.insert(asset_id.to_string(), params.clone());
        Ok(())
    }

    fn remove_asset(&self, asset_id: &str) -> Result<(), CollaboratorError> {
        if self.fail_removals.load(Ordering::SeqCst) {
            return Err(CollaboratorError::Rejected(format!(
                "curve refused delisting '{asset_id}'"
            )));
        }
        let mut state = self.lock()?;
        state
            .listings
            .remove(asset_id)
            .map(|_| ())
            .ok_or_else(|| CollaboratorError::UnknownAsset(asset_id.to_string()))
    }

    fn update_reserve_ratio(
        &self,
        asset_id: &str,
        reserve_ratio: u32,
    ) -> Result<(), CollaboratorError> {
        let mut state = self.lock()?;
        let listing = state
            .listings
            .get_mut(asset_id)
            .ok_or_else(|| CollaboratorError::UnknownAsset(asset_id.to_string()))?;
        if reserve_ratio == 0 || reserve_ratio > PPM {
            return Err(CollaboratorError::Rejected(format!(
                "reserve ratio {reserve_ratio} is outside (0, {PPM}]"
            )));
        }
        listing.reserve_ratio = reserve_ratio;
        Ok(())
    }

    fn open_buy_order(&self, order: BuyOrder) -> Result<OrderReceipt, CollaboratorError> {
        let mut state = self.lock()?;
        if !state.listings.contains_key(&order.asset_id) {
            return Err(CollaboratorError::UnknownAsset(order.asset_id));
        }
        let receipt = OrderReceipt {
            order_id: format!("buy:{}", Uuid::now_v7()),
            side: OrderSide::Buy,
            caller: order.caller,
            asset_id: order.asset_id,
            amount: order.amount,
            payment: order.payment,
        };
        state.orders.push(receipt.clone());
        Ok(receipt)
    }

    fn open_sell_order(&self, order: SellOrder) -> Result<OrderReceipt, CollaboratorError> {
        if !self.asset_is_registered(&order.asset_id) {
            return Err(CollaboratorError::UnknownAsset(order.asset_id));
        }
        self.check_redemption(&order)?;

        let mut state = self.lock()?;
        let receipt = OrderReceipt {
            order_id: format!("sell:{}", Uuid::now_v7()),
            side: OrderSide::Sell,
            caller: order.caller,
            asset_id: order.asset_id,
            amount: order.amount,
            payment: 0,
        };
        state.orders.push(receipt.clone());
        Ok(receipt)
    }

    fn asset_is_registered(&self, asset_id: &str) -> bool {
        self.lock()
            .map(|state| state.listings.contains_key(asset_id))
            .unwrap_or(false)
    }
}
