use thiserror::Error;

use agrosupply_core::DomainError;

use crate::{DirectoryEntry, Permission, Principal, Role};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: role '{role}' lacks permission '{permission}'")]
    Forbidden { role: Role, permission: Permission },

    #[error("user {0} is not registered")]
    UnknownUser(i64),

    #[error("user {user_id} has role '{actual}', expected '{expected}'")]
    RoleMismatch {
        user_id: i64,
        expected: Role,
        actual: Role,
    },
}

impl From<AuthzError> for DomainError {
    fn from(value: AuthzError) -> Self {
        DomainError::unauthorized(value.to_string())
    }
}

/// Check that a principal's role grants `required`.
///
/// - No IO
/// - No panics
/// - No business logic (pure policy check)
pub fn authorize(principal: &Principal, required: Permission) -> Result<(), AuthzError> {
    if principal.role.has(required) {
        Ok(())
    } else {
        tracing::debug!(
            user_id = %principal.user_id,
            role = %principal.role,
            permission = %required,
            "authorization denied"
        );
        Err(AuthzError::Forbidden {
            role: principal.role,
            permission: required,
        })
    }
}

/// Check that a directory lookup resolved to a user holding exactly `expected`.
///
/// Used where an operation names a *counterparty* (the buyer of an order, the
/// carrier of a shipment) rather than the caller.
pub fn require_role(
    user_id: agrosupply_core::UserId,
    entry: Option<&DirectoryEntry>,
    expected: Role,
) -> Result<(), AuthzError> {
    let entry = entry.ok_or(AuthzError::UnknownUser(user_id.get()))?;
    if entry.role != expected {
        return Err(AuthzError::RoleMismatch {
            user_id: user_id.get(),
            expected,
            actual: entry.role,
        });
    }
    Ok(())
}
