pub mod memory;
pub mod ports;
pub mod types;

pub use memory::InMemoryCurve;
pub use ports::CurvePort;
pub use types::{BuyOrder, CurveParams, OrderReceipt, OrderSide, SellOrder};
