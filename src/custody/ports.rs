use crate::{error::CollaboratorError, types::Amount};

/// Pool that custodies the collateral. Balances change only through curve
/// settlement and tap withdrawals.
pub trait CustodyPort: Send + Sync {
    fn raw_balance(&self, asset_id: &str) -> Result<Amount, CollaboratorError>;

    fn transfer_out(
        &self,
        asset_id: &str,
        amount: Amount,
        destination: &str,
    ) -> Result<(), CollaboratorError>;
}
