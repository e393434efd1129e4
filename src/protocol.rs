use serde::{Deserialize, Serialize, de::Error as _};
use serde_json::{Map, Value};

use crate::{
    curve::CurveParams,
    error::TreasuryError,
    types::{Amount, AssetId, CallerId},
};

/// One NDJSON request line from an operator or governance client. On the wire
/// the variant is named by a `type` field next to the variant's own fields.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum Request {
    AddCollateralAsset {
        caller: CallerId,
        asset_id: AssetId,
        curve: CurveParams,
        tap_rate: Amount,
        #[serde(default)]
        floor: Amount,
    },
    RemoveCollateralAsset {
        caller: CallerId,
        asset_id: AssetId,
    },
    UpdateTapRate {
        caller: CallerId,
        asset_id: AssetId,
        tap_rate: Amount,
    },
    UpdateTapFloor {
        caller: CallerId,
        asset_id: AssetId,
        floor: Amount,
    },
    UpdateMaxTapIncrease {
        caller: CallerId,
        max_tap_change_pct: u128,
    },
    UpdateBeneficiary {
        caller: CallerId,
        beneficiary: CallerId,
    },
    UpdateReserveRatio {
        caller: CallerId,
        asset_id: AssetId,
        reserve_ratio: u32,
    },
    OpenBuyOrder {
        caller: CallerId,
        asset_id: AssetId,
        amount: Amount,
        #[serde(default)]
        payment: Amount,
    },
    OpenSellOrder {
        caller: CallerId,
        asset_id: AssetId,
        amount: Amount,
    },
    Withdraw {
        caller: CallerId,
        asset_id: AssetId,
    },
    AvailableBalance {
        asset_id: AssetId,
    },
    BalanceView {
        asset_id: AssetId,
    },
    TapRecord {
        asset_id: AssetId,
    },
    /// Funds the in-memory custody pool, standing in for curve settlement inflows.
    Deposit {
        caller: CallerId,
        asset_id: AssetId,
        amount: Amount,
    },
    Shutdown {},
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Response {
    Ok(Value),
    Error(TreasuryError),
}

/// Parses `{"type": "...", ...}`. The tag is lifted out by hand and the rest is
/// decoded as `{"<type>": {...}}`, which keeps `u128` amounts intact.
pub fn parse_request(line: &str) -> Result<Request, serde_json::Error> {
    let mut fields = match serde_json::from_str::<Value>(line)? {
        Value::Object(fields) => fields,
        _ => return Err(serde_json::Error::custom("request must be a JSON object")),
    };
    let request_type = match fields.remove("type") {
        Some(Value::String(request_type)) => request_type,
        Some(_) => return Err(serde_json::Error::custom("request type must be a string")),
        None => return Err(serde_json::Error::missing_field("type")),
    };

    let mut envelope = Map::new();
    envelope.insert(request_type, Value::Object(fields));
    serde_json::from_value(Value::Object(envelope))
}

pub fn encode_response(response: &Response) -> Result<String, serde_json::Error> {
    let mut line = serde_json::to_string(response)?;
    line.push('\n');
    Ok(line)
}
