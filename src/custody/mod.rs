pub mod memory;
pub mod ports;

pub use memory::{InMemoryCustody, TransferRecord};
pub use ports::CustodyPort;
