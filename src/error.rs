use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{Amount, AssetId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreasuryErrorKind {
    PermissionDenied,
    NotRegistered,
    AlreadyRegistered,
    RateChangeTooLarge,
    NothingToWithdraw,
    InsufficientCustodyFunds,
    InvalidAssetParameters,
    InvalidRequest,
    InvariantViolation,
    CollaboratorFailure,
    Arithmetic,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreasuryError {
    pub kind: TreasuryErrorKind,
    pub message: String,
}

impl TreasuryError {
    pub fn new(kind: TreasuryErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for TreasuryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for TreasuryError {}

pub fn permission_denied(message: impl Into<String>) -> TreasuryError {
    TreasuryError::new(TreasuryErrorKind::PermissionDenied, message)
}

pub fn not_registered(asset_id: &AssetId) -> TreasuryError {
    TreasuryError::new(
        TreasuryErrorKind::NotRegistered,
        format!("asset '{}' is not registered", asset_id),
    )
}

pub fn already_registered(asset_id: &AssetId) -> TreasuryError {
    TreasuryError::new(
        TreasuryErrorKind::AlreadyRegistered,
        format!("asset '{}' is already registered", asset_id),
    )
}

pub fn rate_change_too_large(message: impl Into<String>) -> TreasuryError {
    TreasuryError::new(TreasuryErrorKind::RateChangeTooLarge, message)
}

pub fn nothing_to_withdraw(asset_id: &AssetId) -> TreasuryError {
    TreasuryError::new(
        TreasuryErrorKind::NothingToWithdraw,
        format!("asset '{}' has no accrued allowance", asset_id),
    )
}

pub fn insufficient_custody_funds(message: impl Into<String>) -> TreasuryError {
    TreasuryError::new(TreasuryErrorKind::InsufficientCustodyFunds, message)
}

pub fn invalid_asset_parameters(message: impl Into<String>) -> TreasuryError {
    TreasuryError::new(TreasuryErrorKind::InvalidAssetParameters, message)
}

pub fn invalid_request(message: impl Into<String>) -> TreasuryError {
    TreasuryError::new(TreasuryErrorKind::InvalidRequest, message)
}

pub fn invariant_violation(message: impl Into<String>) -> TreasuryError {
    TreasuryError::new(TreasuryErrorKind::InvariantViolation, message)
}

pub fn collaborator_failure(message: impl Into<String>) -> TreasuryError {
    TreasuryError::new(TreasuryErrorKind::CollaboratorFailure, message)
}

pub fn arithmetic_error(message: impl Into<String>) -> TreasuryError {
    TreasuryError::new(TreasuryErrorKind::Arithmetic, message)
}

pub fn internal_error(message: impl Into<String>) -> TreasuryError {
    TreasuryError::new(TreasuryErrorKind::Internal, message)
}

/// Failures reported by the curve and custody collaborators.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollaboratorError {
    #[error("asset '{0}' is not listed")]
    UnknownAsset(AssetId),
    #[error("asset '{0}' is already listed")]
    AlreadyListed(AssetId),
    #[error("insufficient funds for '{asset_id}': requested={requested}, available={available}")]
    InsufficientFunds {
        asset_id: AssetId,
        requested: Amount,
        available: Amount,
    },
    #[error("request rejected: {0}")]
    Rejected(String),
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),
}

impl From<CollaboratorError> for TreasuryError {
    fn from(err: CollaboratorError) -> Self {
        let kind = match &err {
            CollaboratorError::UnknownAsset(_) => TreasuryErrorKind::NotRegistered,
            CollaboratorError::AlreadyListed(_) => TreasuryErrorKind::AlreadyRegistered,
            CollaboratorError::InsufficientFunds { .. } => {
                TreasuryErrorKind::InsufficientCustodyFunds
            }
            CollaboratorError::Rejected(_) | CollaboratorError::Unavailable(_) => {
                return collaborator_failure(err.to_string());
            }
        };
        TreasuryError::new(kind, err.to_string())
    }
}
