//! User types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Platform user identity backing one or more mail accounts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// Identity creation request sent on a first directory login
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
}

impl NewUser {
    /// A user named after its email address
    pub fn from_email(email: &str) -> Self {
        Self {
            name: email.to_string(),
            email: email.to_string(),
        }
    }
}
