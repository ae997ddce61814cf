//! Mail account types

use serde::{Deserialize, Serialize};
use std::fmt;

use super::MailServer;

/// Mail account as stored by the mail subsystem.
///
/// `id` and `owner_user_id` are `None` for an in-memory draft that has not
/// been persisted yet.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailAccount {
    pub id: Option<i64>,
    pub owner_user_id: Option<i64>,
    pub email: String,
    pub friendly_name: String,
    pub incoming_login: String,
    pub incoming_password: String,
    pub server_id: i64,
    pub used_to_authorize: bool,
    pub use_threading: bool,
}

impl MailAccount {
    /// Unsaved account for a login routed to `server`
    pub fn draft(login: &str, password: &str, server: &MailServer) -> Self {
        Self {
            id: None,
            owner_user_id: None,
            email: login.to_string(),
            friendly_name: String::new(),
            incoming_login: login.to_string(),
            incoming_password: password.to_string(),
            server_id: server.id,
            used_to_authorize: false,
            use_threading: false,
        }
    }

    pub fn is_draft(&self) -> bool {
        self.id.is_none()
    }

    /// Whether the stored incoming credentials differ from the given pair
    pub fn credentials_differ(&self, login: &str, password: &str) -> bool {
        self.incoming_password != password || self.incoming_login != login
    }

    pub fn set_credentials(&mut self, login: &str, password: &str) {
        self.incoming_login = login.to_string();
        self.incoming_password = password.to_string();
    }
}

impl fmt::Debug for MailAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailAccount")
            .field("id", &self.id)
            .field("owner_user_id", &self.owner_user_id)
            .field("email", &self.email)
            .field("friendly_name", &self.friendly_name)
            .field("incoming_login", &self.incoming_login)
            .field("incoming_password", &"<redacted>")
            .field("server_id", &self.server_id)
            .field("used_to_authorize", &self.used_to_authorize)
            .field("use_threading", &self.use_threading)
            .finish()
    }
}

/// Mail account creation request
#[derive(Clone, Serialize, Deserialize)]
pub struct NewMailAccount {
    pub user_id: i64,
    pub email: String,
    pub friendly_name: String,
    pub incoming_login: String,
    pub incoming_password: String,
    pub server_id: i64,
}

impl fmt::Debug for NewMailAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewMailAccount")
            .field("user_id", &self.user_id)
            .field("email", &self.email)
            .field("incoming_login", &self.incoming_login)
            .field("server_id", &self.server_id)
            .finish_non_exhaustive()
    }
}
