use crate::{
    curve::types::{BuyOrder, CurveParams, OrderReceipt, SellOrder},
    error::CollaboratorError,
};

/// Bonding-curve market maker. Pricing and batch settlement live behind this port.
pub trait CurvePort: Send + Sync {
    fn register_asset(
        &self,
        asset_id: &str,
        params: &CurveParams,
    ) -> Result<(), CollaboratorError>;

    fn remove_asset(&self, asset_id: &str) -> Result<(), CollaboratorError>;

    fn update_reserve_ratio(
        &self,
        asset_id: &str,
        reserve_ratio: u32,
    ) -> Result<(), CollaboratorError>;

    fn open_buy_order(&self, order: BuyOrder) -> Result<OrderReceipt, CollaboratorError>;

    fn open_sell_order(&self, order: SellOrder) -> Result<OrderReceipt, CollaboratorError>;

    fn asset_is_registered(&self, asset_id: &str) -> bool;
}
