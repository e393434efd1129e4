use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::CallerId;

/// Privileged operations gated by the access gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Operation {
    AddAsset,
    RemoveAsset,
    UpdateReserveRatio,
    UpdateTapRate,
    UpdateTapFloor,
    UpdateMaxTapIncrease,
    UpdateBeneficiary,
    OpenBuyOrder,
    OpenSellOrder,
    Withdraw,
    Deposit,
}

impl Operation {
    pub const ALL: [Operation; 11] = [
        Operation::AddAsset,
        Operation::RemoveAsset,
        Operation::UpdateReserveRatio,
        Operation::UpdateTapRate,
        Operation::UpdateTapFloor,
        Operation::UpdateMaxTapIncrease,
        Operation::UpdateBeneficiary,
        Operation::OpenBuyOrder,
        Operation::OpenSellOrder,
        Operation::Withdraw,
        Operation::Deposit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::AddAsset => "add-asset",
            Operation::RemoveAsset => "remove-asset",
            Operation::UpdateReserveRatio => "update-reserve-ratio",
            Operation::UpdateTapRate => "update-tap-rate",
            Operation::UpdateTapFloor => "update-tap-floor",
            Operation::UpdateMaxTapIncrease => "update-max-tap-increase",
            Operation::UpdateBeneficiary => "update-beneficiary",
            Operation::OpenBuyOrder => "open-buy-order",
            Operation::OpenSellOrder => "open-sell-order",
            Operation::Withdraw => "withdraw",
            Operation::Deposit => "deposit",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Allowed,
    Denied,
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AccessDecision::Allowed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    pub operation: Operation,
    pub caller: CallerId,
}
