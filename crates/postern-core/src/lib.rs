//! Postern Core Library
//!
//! Core types, configuration, and utilities shared by the Postern
//! directory login crates.

pub mod config;
pub mod error;
pub mod privilege;
pub mod types;
pub mod utils;

pub use config::PosternConfig;
pub use error::{Error, Result};

/// Postern version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Token value handed back to the host login pipeline on success
pub const AUTH_TOKEN: &str = "auth";

/// Account type reported for mail accounts in authentication results
pub const MAIL_ACCOUNT_TYPE: &str = "mail";

/// Server domain used as the catch-all route
pub const WILDCARD_DOMAIN: &str = "*";

/// Default LDAP port
pub const DEFAULT_LDAP_PORT: u16 = 389;
