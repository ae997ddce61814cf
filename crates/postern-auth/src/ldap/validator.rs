//! Credential validation against the directory

use crate::ldap::client::{DirectoryConnector, DirectorySession};
use crate::ldap::types::*;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Proves a login/password pair with a service bind, a search, and a user
/// re-bind.
///
/// Holds no per-call state: repeated calls with the same inputs give the same
/// outcome for the same directory contents.
pub struct CredentialValidator {
    config: LdapConfig,
    connector: Option<Arc<dyn DirectoryConnector>>,
}

impl CredentialValidator {
    /// Create a validator. Without a connector every check fails as
    /// [`LdapAuthResult::Unavailable`].
    pub fn new(config: LdapConfig, connector: Option<Arc<dyn DirectoryConnector>>) -> Self {
        Self { config, connector }
    }

    /// Validator using the `ldap3` client
    pub fn with_ldap(config: LdapConfig) -> Self {
        Self::new(config, Some(Arc::new(super::LdapConnector::new())))
    }

    pub fn is_available(&self) -> bool {
        self.connector.is_some()
    }

    /// Boolean view of [`Self::validate`]
    pub async fn is_valid(&self, login: &str, password: &str) -> bool {
        self.validate(login, password).await.is_success()
    }

    /// Check `login`/`password` against the directory
    pub async fn validate(&self, login: &str, password: &str) -> LdapAuthResult {
        let connector = match &self.connector {
            Some(connector) => connector,
            None => {
                warn!(login, stage = "capability", "LDAP support is not available");
                return LdapAuthResult::Unavailable;
            }
        };

        // An empty password would turn the re-bind into an anonymous bind
        if login.is_empty() || password.is_empty() {
            debug!(login, stage = "precheck", "Empty login or password");
            return LdapAuthResult::EmptyCredentials;
        }

        // Step 1: Connect and bind with service account
        let endpoint = DirectoryEndpoint::from(&self.config);
        let mut session = match connector
            .connect(&endpoint, &self.config.bind_dn, &self.config.bind_password)
            .await
        {
            Ok(session) => session,
            Err(e) => {
                warn!(login, stage = "connect", error = %e, "Can't connect to LDAP server");
                return LdapAuthResult::ConnectionError(e.to_string());
            }
        };

        let result = self.authenticate(session.as_mut(), login, password).await;
        session.close().await;

        match &result {
            LdapAuthResult::Success(identity) => {
                info!(login, dn = %identity.dn, "LDAP authentication succeeded");
            }
            LdapAuthResult::UserNotFound | LdapAuthResult::AmbiguousUser(_) => {
                info!(login, stage = "search", outcome = result.kind(), "Can't find user on LDAP server");
            }
            LdapAuthResult::InvalidCredentials | LdapAuthResult::MissingDn => {
                info!(login, stage = "rebind", outcome = result.kind(), "Bad credentials for user");
            }
            other => {
                warn!(login, outcome = other.kind(), "LDAP authentication failed");
            }
        }

        result
    }

    async fn authenticate(
        &self,
        session: &mut dyn DirectorySession,
        login: &str,
        password: &str,
    ) -> LdapAuthResult {
        // Step 2: Search for user
        let filter = build_login_filter(&self.config.login_field, login);
        let results = match session.search(&filter).await {
            Ok(results) => results,
            Err(e) => {
                warn!(login, stage = "search", error = %e, "LDAP user search failed");
                return LdapAuthResult::ConnectionError(e.to_string());
            }
        };

        let entry = match results.single() {
            Some(entry) => entry,
            None if results.is_empty() => return LdapAuthResult::UserNotFound,
            None => return LdapAuthResult::AmbiguousUser(results.len()),
        };

        // Step 3: The entry must name a DN to bind as
        if entry.dn.is_empty() {
            return LdapAuthResult::MissingDn;
        }

        debug!(login, dn = %entry.dn, "Found user entry");

        // Step 4: Verify user password by binding as the user
        match session.rebind(&entry.dn, password).await {
            Ok(()) => LdapAuthResult::Success(DirectoryIdentity {
                dn: entry.dn.clone(),
                login: login.to_string(),
                email: entry
                    .first_value(&self.config.email_field)
                    .map(str::to_string),
            }),
            Err(DirectoryError::Connect(e)) => LdapAuthResult::ConnectionError(e),
            Err(e) => {
                debug!(login, stage = "rebind", error = %e, "User bind rejected");
                LdapAuthResult::InvalidCredentials
            }
        }
    }
}
