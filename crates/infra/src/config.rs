//! Configuration loading and representation.
//!
//! Everything comes from environment variables; nothing is read from disk.
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | `AGRO_BIND_ADDR` | `0.0.0.0:8080` | HTTP listen address |
//! | `DATABASE_URL` | unset | Postgres URL; unset selects the in-memory store |
//! | `AGRO_DB_MAX_CONNECTIONS` | `5` | Pool size |
//! | `AGRO_RESTOCK_ON_CANCEL` | `false` | Release inventory when an order is cancelled |
//! | `AGRO_LOG_FORMAT` | `json` | `json` or `pretty` |
//! | `AGRO_USERS` | empty | Directory seed, `id:role[:name],...` |

use std::net::SocketAddr;

use thiserror::Error;

use agrosupply_auth::{DirectoryEntry, parse_entries};
use agrosupply_observability::LogFormat;

use crate::fulfillment::FulfillmentConfig;

pub const BIND_ADDR: &str = "AGRO_BIND_ADDR";
pub const DATABASE_URL: &str = "DATABASE_URL";
pub const DB_MAX_CONNECTIONS: &str = "AGRO_DB_MAX_CONNECTIONS";
pub const RESTOCK_ON_CANCEL: &str = "AGRO_RESTOCK_ON_CANCEL";
pub const LOG_FORMAT: &str = "AGRO_LOG_FORMAT";
pub const USERS: &str = "AGRO_USERS";

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var}: invalid value '{value}': {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    fn invalid(var: &'static str, value: &str, reason: impl ToString) -> Self {
        ConfigError::Invalid {
            var,
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseConfig {
    InMemory,
    Postgres { url: String, max_connections: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub database: DatabaseConfig,
    pub fulfillment: FulfillmentConfig,
    pub log_format: LogFormat,
    pub users: Vec<DirectoryEntry>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (tests pass a map).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind_raw = get(BIND_ADDR).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw
            .trim()
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::invalid(BIND_ADDR, &bind_raw, e))?;

        let max_connections = match get(DB_MAX_CONNECTIONS) {
            None => DEFAULT_MAX_CONNECTIONS,
            Some(raw) => match raw.trim().parse::<u32>() {
                Ok(n) if n > 0 => n,
                Ok(_) => return Err(ConfigError::invalid(DB_MAX_CONNECTIONS, &raw, "must be at least 1")),
                Err(e) => return Err(ConfigError::invalid(DB_MAX_CONNECTIONS, &raw, e)),
            },
        };
        let database = match get(DATABASE_URL) {
            None => DatabaseConfig::InMemory,
            Some(url) => DatabaseConfig::Postgres {
                url: url.trim().to_string(),
                max_connections,
            },
        };

        let restock_on_cancel = match get(RESTOCK_ON_CANCEL) {
            None => false,
            Some(raw) => parse_bool(&raw).ok_or_else(|| {
                ConfigError::invalid(RESTOCK_ON_CANCEL, &raw, "expected true/false")
            })?,
        };

        let log_format = match get(LOG_FORMAT) {
            None => LogFormat::default(),
            Some(raw) => raw
                .parse::<LogFormat>()
                .map_err(|e| ConfigError::invalid(LOG_FORMAT, &raw, e))?,
        };

        let users = match get(USERS) {
            None => Vec::new(),
            Some(raw) => parse_entries(&raw).map_err(|e| ConfigError::invalid(USERS, &raw, e))?,
        };

        Ok(Self {
            bind_addr,
            database,
            fulfillment: FulfillmentConfig { restock_on_cancel },
            log_format,
            users,
        })
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use agrosupply_auth::Role;

    use super::*;

    fn load(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_select_in_memory_store() {
        let cfg = load(&[]).unwrap();
        assert_eq!(cfg.bind_addr, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(cfg.database, DatabaseConfig::InMemory);
        assert!(!cfg.fulfillment.restock_on_cancel);
        assert_eq!(cfg.log_format, LogFormat::Json);
        assert!(cfg.users.is_empty());
    }

    #[test]
    fn reads_every_variable() {
        let cfg = load(&[
            (BIND_ADDR, "127.0.0.1:9000"),
            (DATABASE_URL, "postgres://agro@localhost/agro"),
            (DB_MAX_CONNECTIONS, "12"),
            (RESTOCK_ON_CANCEL, "yes"),
            (LOG_FORMAT, "pretty"),
            (USERS, "7:buyer,9:carrier:Luis"),
        ])
        .unwrap();

        assert_eq!(cfg.bind_addr.port(), 9000);
        assert_eq!(
            cfg.database,
            DatabaseConfig::Postgres {
                url: "postgres://agro@localhost/agro".into(),
                max_connections: 12
            }
        );
        assert!(cfg.fulfillment.restock_on_cancel);
        assert_eq!(cfg.log_format, LogFormat::Pretty);
        assert_eq!(cfg.users.len(), 2);
        assert_eq!(cfg.users[1].role, Role::Carrier);
    }

    #[test]
    fn invalid_values_name_the_variable() {
        let err = load(&[(DB_MAX_CONNECTIONS, "0")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: DB_MAX_CONNECTIONS, .. }));

        let err = load(&[(RESTOCK_ON_CANCEL, "maybe")]).unwrap_err();
        assert!(err.to_string().starts_with(RESTOCK_ON_CANCEL));

        assert!(load(&[(BIND_ADDR, "not-an-addr")]).is_err());
        assert!(load(&[(USERS, "7:farmer")]).is_err());
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let cfg = load(&[(DATABASE_URL, "   "), (LOG_FORMAT, "")]).unwrap();
        assert_eq!(cfg.database, DatabaseConfig::InMemory);
        assert_eq!(cfg.log_format, LogFormat::Json);
    }
}
