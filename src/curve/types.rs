use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::types::{Amount, AssetId, CallerId};

/// Listing parameters handed to the bonding curve when a collateral asset is added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct CurveParams {
    pub virtual_supply: Amount,
    pub virtual_balance: Amount,
    #[validate(range(min = 1, max = 1_000_000))]
    pub reserve_ratio: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderSide {
    Buy,
    Sell,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuyOrder {
    pub caller: CallerId,
    pub asset_id: AssetId,
    pub amount: Amount,
    /// Value attached by the caller, passed through untouched.
    pub payment: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SellOrder {
    pub caller: CallerId,
    pub asset_id: AssetId,
    pub amount: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderReceipt {
    pub order_id: String,
    pub side: OrderSide,
    pub caller: CallerId,
    pub asset_id: AssetId,
    pub amount: Amount,
    #[serde(default)]
    pub payment: Amount,
}
