pub mod gateway;
pub mod policy;
pub mod types;

pub use gateway::AccessGateway;
pub use policy::{InMemoryPolicyStore, PolicyStore};
pub use types::{AccessDecision, Grant, Operation};
