//! Mail server routing types

use serde::{Deserialize, Serialize};

/// A mail server that new accounts can be provisioned on.
///
/// `domain` is either an exact mail domain or [`crate::WILDCARD_DOMAIN`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailServer {
    pub id: i64,
    pub name: String,
    pub domain: String,
    pub enable_threading: bool,
}

impl MailServer {
    pub fn is_wildcard(&self) -> bool {
        self.domain == crate::WILDCARD_DOMAIN
    }
}

/// Server registration request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMailServer {
    pub name: String,
    pub domain: String,
    pub enable_threading: bool,
}

impl NewMailServer {
    pub fn new(name: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            domain: domain.into().to_lowercase(),
            enable_threading: false,
        }
    }

    pub fn with_threading(mut self, enable_threading: bool) -> Self {
        self.enable_threading = enable_threading;
        self
    }
}
