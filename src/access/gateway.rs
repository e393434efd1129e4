use std::sync::Arc;

use crate::{
    access::{
        policy::PolicyStore,
        types::{AccessDecision, Operation},
    },
    error::{TreasuryError, permission_denied},
};

/// Evaluates the externally owned permission table before any privileged
/// operation reaches a subsystem. Never mutates grants.
#[derive(Clone)]
pub struct AccessGateway {
    policy: Arc<dyn PolicyStore>,
}

impl AccessGateway {
    pub fn new(policy: Arc<dyn PolicyStore>) -> Self {
        Self { policy }
    }

    pub fn authorize(&self, operation: Operation, caller: &str) -> AccessDecision {
        if caller.trim().is_empty() {
            return AccessDecision::Denied;
        }
        if self.policy.is_granted(operation, caller) {
            AccessDecision::Allowed
        } else {
            AccessDecision::Denied
        }
    }

    pub fn require(&self, operation: Operation, caller: &str) -> Result<(), TreasuryError> {
        if self.authorize(operation, caller).is_allowed() {
            return Ok(());
        }
        tracing::warn!(
            target: "access",
            operation = %operation,
            caller = %caller,
            "access_denied"
        );
        Err(permission_denied(format!(
            "caller '{}' lacks permission '{}'",
            caller, operation
        )))
    }
}
