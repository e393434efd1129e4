use std::{
    collections::BTreeMap,
    sync::{
        Mutex, MutexGuard,
        atomic::{AtomicBool, Ordering},
    },
};

use serde::{Deserialize, Serialize};

use crate::{
    custody::ports::CustodyPort,
    error::CollaboratorError,
    types::{Amount, AssetId, CallerId},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRecord {
    pub asset_id: AssetId,
    pub amount: Amount,
    pub destination: CallerId,
}

#[derive(Debug, Default)]
struct CustodyState {
    balances: BTreeMap<AssetId, Amount>,
    transfers: Vec<TransferRecord>,
}

#[derive(Debug, Default)]
pub struct InMemoryCustody {
    state: Mutex<CustodyState>,
    fail_transfers: AtomicBool,
}

impl InMemoryCustody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_balances(balances: impl IntoIterator<Item = (AssetId, Amount)>) -> Self {
        let custody = Self::new();
        if let Ok(mut state) = custody.lock() {
            state.balances.extend(balances);
        }
        custody
    }

    pub fn deposit(&self, asset_id: &str, amount: Amount) -> Result<Amount, CollaboratorError> {
        let mut state = self.lock()?;
        let balance = state.balances.entry(asset_id.to_string()).or_default();
        *balance = balance.checked_add(amount).ok_or_else(|| {
            CollaboratorError::Rejected(format!("balance overflow for '{asset_id}'"))
        })?;
        Ok(*balance)
    }

    /// Outflow driven by curve settlement rather than the tap.
    pub fn debit(&self, asset_id: &str, amount: Amount) -> Result<Amount, CollaboratorError> {
        let mut state = self.lock()?;
        let balance = state.balances.entry(asset_id.to_string()).or_default();
        if *balance < amount {
            return Err(CollaboratorError::InsufficientFunds {
                asset_id: asset_id.to_string(),
                requested: amount,
                available: *balance,
            });
        }
        *balance -= amount;
        Ok(*balance)
    }

    pub fn fail_transfers(&self, fail: bool) {
        self.fail_transfers.store(fail, Ordering::SeqCst);
    }

    pub fn transfers(&self) -> Vec<TransferRecord> {
        self.lock()
            .map(|state| state.transfers.clone())
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, CustodyState>, CollaboratorError> {
        self.state
            .lock()
            .map_err(|_| CollaboratorError::Unavailable("custody state lock poisoned".to_string()))
    }
}

impl CustodyPort for InMemoryCustody {
    fn raw_balance(&self, asset_id: &str) -> Result<Amount, CollaboratorError> {
        Ok(self
            .lock()?
            .balances
            .get(asset_id)
            .copied()
            .unwrap_or_default())
    }

    fn transfer_out(
        &self,
        asset_id: &str,
        amount: Amount,
        destination: &str,
    ) -> Result<(), CollaboratorError> {
        if self.fail_transfers.load(Ordering::SeqCst) {
            return Err(CollaboratorError::Unavailable(format!(
                "transfer of '{asset_id}' to '{destination}' failed"
            )));
        }

        let mut state = self.lock()?;
        let balance = state.balances.get(asset_id).copied().unwrap_or_default();
        if balance < amount {
            return Err(CollaboratorError::InsufficientFunds {
                asset_id: asset_id.to_string(),
                requested: amount,
                available: balance,
            });
        }
        state.balances.insert(asset_id.to_string(), balance - amount);
        state.transfers.push(TransferRecord {
            asset_id: asset_id.to_string(),
            amount,
            destination: destination.to_string(),
        });
        Ok(())
    }
}
