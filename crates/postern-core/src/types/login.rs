//! Login event payloads

use serde::{Deserialize, Serialize};
use std::fmt;

use super::MailAccount;

/// Login attempt received from the host pipeline
#[derive(Clone, Deserialize)]
pub struct LoginRequest {
    pub login: String,
    pub password: String,
    #[serde(default)]
    pub sign_me: bool,
}

impl LoginRequest {
    pub fn new(login: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            password: password.into(),
            sign_me: false,
        }
    }

    pub fn sign_me(mut self, sign_me: bool) -> Self {
        self.sign_me = sign_me;
        self
    }
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("login", &self.login)
            .field("sign_me", &self.sign_me)
            .finish_non_exhaustive()
    }
}

/// Data for the authentication token, produced only on success
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResult {
    pub token: String,
    #[serde(rename = "sign-me")]
    pub sign_me: bool,
    #[serde(rename = "id")]
    pub user_id: i64,
    #[serde(rename = "account")]
    pub account_id: i64,
    pub account_type: String,
}

impl AuthResult {
    /// Build the result for a persisted account.
    ///
    /// Fails for drafts, which have neither an id nor an owner.
    pub fn for_account(account: &MailAccount, sign_me: bool) -> crate::Result<Self> {
        match (account.id, account.owner_user_id) {
            (Some(account_id), Some(user_id)) => Ok(Self {
                token: crate::AUTH_TOKEN.to_string(),
                sign_me,
                user_id,
                account_id,
                account_type: crate::MAIL_ACCOUNT_TYPE.to_string(),
            }),
            _ => Err(crate::Error::InternalError(format!(
                "account {} has not been persisted",
                account.email
            ))),
        }
    }
}
