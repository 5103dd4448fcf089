//! Domain error model.

use thiserror::Error;

use crate::id::{OrderId, ProductId};
use crate::money::Money;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// business rules, conflicts). Infrastructure concerns belong elsewhere.
///
/// Every variant is either a *validation* failure (rejected before any side
/// effect, see [`DomainError::is_validation`]) or a *business rule* failure
/// (rejected after validation, with no partial state change).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. non-positive quantity).
    #[error("validation failed: {0}")]
    Validation(String),

    /// Checkout was attempted with no lines.
    #[error("cart is empty")]
    EmptyCart,

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A reservation asked for more units than the product has available.
    #[error(
        "insufficient stock for product {product_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        product_id: ProductId,
        requested: i64,
        available: i64,
    },

    /// A line was priced differently from the catalog at checkout.
    #[error("price mismatch for product {product_id}: quoted {quoted}, catalog {current}")]
    PriceMismatch {
        product_id: ProductId,
        quoted: Money,
        current: Money,
    },

    /// A lifecycle transition is not reachable from the current state.
    #[error("invalid {entity} transition: {from} -> {to}")]
    InvalidTransition {
        entity: &'static str,
        from: &'static str,
        to: &'static str,
    },

    /// A shipment already exists for the order (1:1 constraint).
    #[error("order {0} already has a shipment")]
    AlreadyShipped(OrderId),

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// A requested resource was not found.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    /// A conflict occurred (e.g. duplicate registration).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The acting identity lacks the role an operation requires.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn not_found(entity: &'static str, id: impl Into<i64>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn invalid_transition(entity: &'static str, from: &'static str, to: &'static str) -> Self {
        Self::InvalidTransition { entity, from, to }
    }

    /// True for failures detected before any side effect (malformed input).
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            DomainError::Validation(_) | DomainError::EmptyCart | DomainError::InvalidId(_)
        )
    }

    /// Stable machine-readable code for adapters (HTTP, CLI).
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::Validation(_) => "validation_error",
            DomainError::EmptyCart => "empty_cart",
            DomainError::InvalidId(_) => "invalid_id",
            DomainError::InsufficientStock { .. } => "insufficient_stock",
            DomainError::PriceMismatch { .. } => "price_mismatch",
            DomainError::InvalidTransition { .. } => "invalid_transition",
            DomainError::AlreadyShipped(_) => "already_shipped",
            DomainError::InvariantViolation(_) => "invariant_violation",
            DomainError::NotFound { .. } => "not_found",
            DomainError::Conflict(_) => "conflict",
            DomainError::Unauthorized(_) => "unauthorized",
        }
    }
}
