//! Service configuration.
//!
//! Loaded once at start-up (see the `chemical-api` binary, which fills it
//! from flags and environment variables) and read-only afterwards.

use std::net::SocketAddr;

use crate::auth::{AccessPolicy, Credential};

/// Connection settings for the backing document database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MongoSettings {
    pub host: String,
    pub port: u16,
    pub dbname: String,
}

impl Default for MongoSettings {
    fn default() -> Self {
        Self {
            host: "mongo".to_string(),
            port: 27017,
            dbname: "eve".to_string(),
        }
    }
}

impl MongoSettings {
    /// Connection string for the driver.
    pub fn uri(&self) -> String {
        format!("mongodb://{}:{}", self.host, self.port)
    }
}

/// Client cache directives attached to every response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    /// Value of the `Cache-Control` header.
    pub control: String,
    /// Seconds added to the current time for the `Expires` header.
    pub expires_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            control: "max-age=20".to_string(),
            expires_secs: 20,
        }
    }
}

/// Page size limits for collection reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub default_max_results: usize,
    /// Requests asking for more items per page are clamped to this.
    pub max_results_cap: usize,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            default_max_results: 25,
            max_results_cap: 50,
        }
    }
}

/// Everything the service needs, passed explicitly at construction.
#[derive(Debug, Clone)]
pub struct Settings {
    pub bind: SocketAddr,
    pub mongo: MongoSettings,
    /// Query operators rejected in `where` filters.
    pub query_blacklist: Vec<String>,
    pub access: AccessPolicy,
    pub cache: CacheSettings,
    pub pagination: Pagination,
    pub admin: Credential,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 5000)),
            mongo: MongoSettings::default(),
            query_blacklist: vec!["$where".to_string()],
            access: AccessPolicy::default(),
            cache: CacheSettings::default(),
            pagination: Pagination::default(),
            admin: Credential::new("admin", "admin"),
        }
    }
}
