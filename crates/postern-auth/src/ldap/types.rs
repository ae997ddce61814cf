//! LDAP types and configuration
//!
//! Directory entries, search results, and the typed outcome of a
//! credential check.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

pub use postern_core::config::LdapConfigSection as LdapConfig;

// ============================================================================
// Connection
// ============================================================================

/// Where and how to reach the directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEndpoint {
    pub host: String,
    pub port: u16,
    /// Base DN for user searches
    pub base_dn: String,
    pub start_tls: bool,
    pub timeout: Duration,
}

impl DirectoryEndpoint {
    pub fn url(&self) -> String {
        format!("ldap://{}:{}", self.host, self.port)
    }
}

impl From<&LdapConfig> for DirectoryEndpoint {
    fn from(config: &LdapConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            base_dn: config.users_dn.clone(),
            start_tls: config.start_tls,
            timeout: Duration::from_secs(config.timeout_seconds),
        }
    }
}

/// Build the user search filter `(login_field=login)`.
///
/// Filter metacharacters in the login are escaped, so a login such as `*`
/// matches only an entry whose attribute is literally `*`.
pub fn build_login_filter(login_field: &str, login: &str) -> String {
    format!("({}={})", login_field, ldap3::ldap_escape(login))
}

// ============================================================================
// Entries
// ============================================================================

/// Attribute value as returned by the directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    Single(String),
    Multi(Vec<String>),
}

impl AttributeValue {
    /// First non-empty value, if any
    pub fn first(&self) -> Option<&str> {
        let value = match self {
            AttributeValue::Single(value) => Some(value.as_str()),
            AttributeValue::Multi(values) => values.first().map(|s| s.as_str()),
        };
        value.filter(|v| !v.is_empty())
    }
}

impl From<Vec<String>> for AttributeValue {
    fn from(mut values: Vec<String>) -> Self {
        if values.len() == 1 {
            AttributeValue::Single(values.remove(0))
        } else {
            AttributeValue::Multi(values)
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Single(value.to_string())
    }
}

/// One entry returned by a directory search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub dn: String,
    pub attributes: HashMap<String, AttributeValue>,
}

impl DirectoryEntry {
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attributes: HashMap::new(),
        }
    }

    pub fn with_attribute(mut self, name: &str, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(name.to_string(), value.into());
        self
    }

    /// First value of an attribute. Attribute names compare case-insensitively.
    pub fn first_value(&self, name: &str) -> Option<&str> {
        self.attributes
            .get(name)
            .or_else(|| {
                self.attributes
                    .iter()
                    .find(|(key, _)| key.eq_ignore_ascii_case(name))
                    .map(|(_, value)| value)
            })
            .and_then(|value| value.first())
    }
}

/// Entries matched by one search
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchResults {
    entries: Vec<DirectoryEntry>,
}

impl SearchResults {
    pub fn new(entries: Vec<DirectoryEntry>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The matched entry, only when the search matched exactly one
    pub fn single(&self) -> Option<&DirectoryEntry> {
        match self.entries.as_slice() {
            [entry] => Some(entry),
            _ => None,
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Failure of a single directory operation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("Failed to connect to LDAP server: {0}")]
    Connect(String),

    #[error("Bind failed with code {rc}: {message}")]
    Bind { rc: u32, message: String },

    /// Result code 49
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Search failed: {0}")]
    Search(String),
}

/// LDAP result code for invalidCredentials
pub const RC_INVALID_CREDENTIALS: u32 = 49;

// ============================================================================
// Authentication Result
// ============================================================================

/// Identity proven by a successful re-bind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryIdentity {
    pub dn: String,
    pub login: String,
    pub email: Option<String>,
}

/// Outcome of one credential check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LdapAuthResult {
    /// Authentication successful
    Success(DirectoryIdentity),
    /// No directory connector is configured
    Unavailable,
    /// Login or password was empty
    EmptyCredentials,
    /// Service connection or bind failed
    ConnectionError(String),
    /// No entry matched the login
    UserNotFound,
    /// More than one entry matched the login
    AmbiguousUser(usize),
    /// The matched entry had an empty DN
    MissingDn,
    /// Re-bind as the user failed
    InvalidCredentials,
}

impl LdapAuthResult {
    pub fn is_success(&self) -> bool {
        matches!(self, LdapAuthResult::Success(_))
    }

    pub fn identity(&self) -> Option<&DirectoryIdentity> {
        match self {
            LdapAuthResult::Success(identity) => Some(identity),
            _ => None,
        }
    }

    /// Short machine name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            LdapAuthResult::Success(_) => "success",
            LdapAuthResult::Unavailable => "unavailable",
            LdapAuthResult::EmptyCredentials => "empty_credentials",
            LdapAuthResult::ConnectionError(_) => "connection_error",
            LdapAuthResult::UserNotFound => "user_not_found",
            LdapAuthResult::AmbiguousUser(_) => "ambiguous_user",
            LdapAuthResult::MissingDn => "missing_dn",
            LdapAuthResult::InvalidCredentials => "invalid_credentials",
        }
    }
}
