//! `agrosupply-auth`: role directory and authorization boundary.
//!
//! Authentication (credentials, sessions) happens outside this workspace. This
//! crate only answers "who is this user id, what role do they hold, and may
//! that role perform this operation". It is decoupled from HTTP and storage.

pub mod authorize;
pub mod directory;
pub mod permissions;
pub mod principal;
pub mod roles;

pub use authorize::{AuthzError, authorize, require_role};
pub use directory::{DirectoryEntry, InMemoryUserDirectory, UserDirectory, parse_entries};
pub use permissions::Permission;
pub use principal::Principal;
pub use roles::Role;
