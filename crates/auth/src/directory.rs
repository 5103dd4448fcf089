//! User directory: resolves a user id to a display name and role.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use agrosupply_core::{DomainError, DomainResult, UserId};

use crate::{Principal, Role};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub user_id: UserId,
    pub name: String,
    pub role: Role,
}

impl DirectoryEntry {
    pub fn new(user_id: UserId, name: impl Into<String>, role: Role) -> Self {
        Self {
            user_id,
            name: name.into(),
            role,
        }
    }

    pub fn principal(&self) -> Principal {
        Principal::new(self.user_id, self.role)
    }
}

/// Read access to registered platform users.
pub trait UserDirectory: Send + Sync {
    fn lookup(&self, user_id: UserId) -> Option<DirectoryEntry>;

    fn principal(&self, user_id: UserId) -> Option<Principal> {
        self.lookup(user_id).map(|e| e.principal())
    }
}

impl<T: UserDirectory + ?Sized> UserDirectory for std::sync::Arc<T> {
    fn lookup(&self, user_id: UserId) -> Option<DirectoryEntry> {
        (**self).lookup(user_id)
    }
}

/// Directory held in process memory, seeded from configuration.
#[derive(Debug, Default)]
pub struct InMemoryUserDirectory {
    entries: RwLock<HashMap<UserId, DirectoryEntry>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: impl IntoIterator<Item = DirectoryEntry>) -> Self {
        let dir = Self::new();
        for e in entries {
            dir.insert(e);
        }
        dir
    }

    /// Register or replace a user.
    pub fn insert(&self, entry: DirectoryEntry) {
        if let Ok(mut map) = self.entries.write() {
            map.insert(entry.user_id, entry);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Parse a compact `id:role[:name],id:role[:name]` listing.
    pub fn parse(listing: &str) -> DomainResult<Self> {
        Ok(Self::with_entries(parse_entries(listing)?))
    }
}

/// Parse a compact `id:role[:name],id:role[:name]` listing into entries.
///
/// Missing names default to `user-<id>`.
pub fn parse_entries(listing: &str) -> DomainResult<Vec<DirectoryEntry>> {
    let mut entries = Vec::new();
    for raw in listing.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let mut parts = raw.splitn(3, ':');
        let id: UserId = parts.next().unwrap_or_default().parse()?;
        let role: Role = parts
            .next()
            .ok_or_else(|| DomainError::validation(format!("user entry '{raw}' has no role")))?
            .parse()?;
        let name = parts
            .next()
            .map(str::to_string)
            .unwrap_or_else(|| format!("user-{id}"));
        entries.push(DirectoryEntry::new(id, name, role));
    }
    Ok(entries)
}

impl UserDirectory for InMemoryUserDirectory {
    fn lookup(&self, user_id: UserId) -> Option<DirectoryEntry> {
        self.entries.read().ok()?.get(&user_id).cloned()
    }
}
