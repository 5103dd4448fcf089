use thiserror::Error;

use agrosupply_auth::AuthzError;
use agrosupply_core::DomainError;

use crate::store::StoreError;

/// Coarse failure class, used by adapters to pick a status code and by
/// callers to decide whether a retry can help.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input, rejected before any side effect.
    Validation,
    /// A business rule refused the operation; nothing was changed.
    BusinessRule,
    /// Storage failed; the operation did not happen and may be retried.
    Infrastructure,
}

#[derive(Debug, Error)]
pub enum FulfillmentError {
    #[error("{0}")]
    Validation(DomainError),

    #[error("{0}")]
    BusinessRule(DomainError),

    #[error("{0}")]
    Infrastructure(StoreError),

    /// Checkout failed; inventory and orders are exactly as before the call.
    #[error("order placement failed: {reason}")]
    OrderPlacementFailed { reason: Box<FulfillmentError> },
}

impl FulfillmentError {
    pub fn placement_failed(reason: FulfillmentError) -> Self {
        match reason {
            already @ FulfillmentError::OrderPlacementFailed { .. } => already,
            other => FulfillmentError::OrderPlacementFailed {
                reason: Box::new(other),
            },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            FulfillmentError::Validation(_) => ErrorKind::Validation,
            FulfillmentError::BusinessRule(_) => ErrorKind::BusinessRule,
            FulfillmentError::Infrastructure(_) => ErrorKind::Infrastructure,
            FulfillmentError::OrderPlacementFailed { reason } => reason.kind(),
        }
    }

    /// The underlying domain error, if this is not an infrastructure failure.
    pub fn domain(&self) -> Option<&DomainError> {
        match self {
            FulfillmentError::Validation(e) | FulfillmentError::BusinessRule(e) => Some(e),
            FulfillmentError::Infrastructure(_) => None,
            FulfillmentError::OrderPlacementFailed { reason } => reason.domain(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            FulfillmentError::Infrastructure(e) => e.is_retryable(),
            FulfillmentError::OrderPlacementFailed { reason } => reason.is_retryable(),
            _ => false,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            FulfillmentError::Validation(e) | FulfillmentError::BusinessRule(e) => e.code(),
            FulfillmentError::Infrastructure(StoreError::Conflict(_)) => "storage_conflict",
            FulfillmentError::Infrastructure(StoreError::Corrupt(_)) => "storage_corrupt",
            FulfillmentError::Infrastructure(_) => "storage_unavailable",
            FulfillmentError::OrderPlacementFailed { reason } => reason.code(),
        }
    }
}

impl From<DomainError> for FulfillmentError {
    fn from(value: DomainError) -> Self {
        if value.is_validation() {
            FulfillmentError::Validation(value)
        } else {
            FulfillmentError::BusinessRule(value)
        }
    }
}

impl From<StoreError> for FulfillmentError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Domain(e) => e.into(),
            other => FulfillmentError::Infrastructure(other),
        }
    }
}

impl From<AuthzError> for FulfillmentError {
    fn from(value: AuthzError) -> Self {
        FulfillmentError::BusinessRule(value.into())
    }
}

pub type FulfillmentResult<T> = Result<T, FulfillmentError>;
