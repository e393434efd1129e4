use std::{collections::BTreeSet, sync::RwLock};

use crate::{
    access::types::{Grant, Operation},
    types::CallerId,
};

/// Read side of the externally owned permission table.
pub trait PolicyStore: Send + Sync {
    fn is_granted(&self, operation: Operation, caller: &str) -> bool;
}

/// Permission table held in memory. `grant` and `revoke` belong to the
/// governance side; the gateway only ever reads through [`PolicyStore`].
#[derive(Debug, Default)]
pub struct InMemoryPolicyStore {
    grants: RwLock<BTreeSet<(Operation, CallerId)>>,
}

impl InMemoryPolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_grants(grants: impl IntoIterator<Item = Grant>) -> Self {
        let store = Self::new();
        for grant in grants {
            store.grant(grant.operation, grant.caller);
        }
        store
    }

    pub fn grant(&self, operation: Operation, caller: impl Into<CallerId>) {
        if let Ok(mut guard) = self.grants.write() {
            guard.insert((operation, caller.into()));
        }
    }

    pub fn grant_all(&self, caller: &str) {
        for operation in Operation::ALL {
            self.grant(operation, caller);
        }
    }

    pub fn revoke(&self, operation: Operation, caller: &str) -> bool {
        match self.grants.write() {
            Ok(mut guard) => guard.remove(&(operation, caller.to_string())),
            Err(_) => false,
        }
    }
}

impl PolicyStore for InMemoryPolicyStore {
    fn is_granted(&self, operation: Operation, caller: &str) -> bool {
        // A poisoned table fails closed.
        self.grants
            .read()
            .map(|guard| guard.contains(&(operation, caller.to_string())))
            .unwrap_or(false)
    }
}
