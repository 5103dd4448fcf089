use agrosupply_auth::{AuthzError, DirectoryEntry, Permission, Principal, Role, authorize};
use agrosupply_core::UserId;

/// Caller identity for a request, resolved from the user directory.
///
/// Inserted by [`crate::middleware::identity_middleware`]; present on every
/// route except `/health`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    principal: Principal,
    name: String,
}

impl PrincipalContext {
    pub fn new(principal: Principal, name: impl Into<String>) -> Self {
        Self {
            principal,
            name: name.into(),
        }
    }

    pub fn from_entry(entry: &DirectoryEntry) -> Self {
        Self::new(entry.principal(), entry.name.clone())
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn user_id(&self) -> UserId {
        self.principal.user_id
    }

    pub fn role(&self) -> Role {
        self.principal.role
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Check the caller's role grants `permission`.
    pub fn require(&self, permission: Permission) -> Result<(), AuthzError> {
        authorize(&self.principal, permission)
    }
}
