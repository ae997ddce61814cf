//! Login handler
//!
//! Sequence for one attempt:
//! 1. look up the account used to authorize the login (or draft a new one)
//! 2. check the submitted pair against the directory
//! 3. store drifted credentials, or provision the new account
//! 4. hand back the authentication result
//!
//! Any failure short of a reserved-login conflict ends the attempt without a
//! result and without an error, exactly like a wrong password.

use crate::ldap::{CredentialValidator, LdapAuthResult};
use crate::login::resolver::{AccountResolver, Resolution};
use postern_core::types::{AuthResult, LoginRequest};
use postern_core::{Error, PosternConfig, Result};
use tracing::{debug, info, warn};

/// Why an attempt produced no result
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LoginFailure {
    #[error("no account authorizes this login")]
    NoAccount,

    #[error("no mail server accepts domain '{0}'")]
    NoServer(String),

    #[error("account lookup failed: {0}")]
    Lookup(String),

    #[error("directory rejected the login: {}", .0.kind())]
    Directory(LdapAuthResult),

    #[error("failed to store account: {0}")]
    Persistence(String),

    #[error("failed to provision account: {0}")]
    Provisioning(String),
}

/// Result of one attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    Authenticated(AuthResult),
    Rejected(LoginFailure),
}

impl LoginOutcome {
    pub fn into_result(self) -> Option<AuthResult> {
        match self {
            LoginOutcome::Authenticated(result) => Some(result),
            LoginOutcome::Rejected(_) => None,
        }
    }
}

pub struct LoginHandler {
    validator: CredentialValidator,
    resolver: AccountResolver,
    autocreate: bool,
    admin_login: String,
}

impl LoginHandler {
    /// Position in the host login pipeline
    pub const PRIORITY: i32 = 10;

    pub fn new(validator: CredentialValidator, resolver: AccountResolver, config: &PosternConfig) -> Self {
        Self {
            validator,
            resolver,
            autocreate: config.mail.autocreate_mail_account_on_new_user_first_login,
            admin_login: config.auth.admin_login.clone(),
        }
    }

    /// Pipeline entry point: the result on success, `None` otherwise
    pub async fn on_login(&self, request: &LoginRequest) -> Option<AuthResult> {
        let outcome = self.authenticate(request).await;
        if let LoginOutcome::Rejected(failure) = &outcome {
            info!(login = %request.login, reason = %failure, "Login rejected");
        }
        outcome.into_result()
    }

    /// Refuse account names that collide with the reserved administrator login
    pub fn on_check_account_exists(&self, login: &str) -> Result<()> {
        if login == self.admin_login {
            warn!(login, "Login collides with the administrator login");
            return Err(Error::AccountExists);
        }
        Ok(())
    }

    pub async fn authenticate(&self, request: &LoginRequest) -> LoginOutcome {
        let login = request.login.as_str();
        let password = request.password.as_str();

        let resolution = match self.resolver.resolve(login, password, self.autocreate).await {
            Ok(resolution) => resolution,
            Err(e) => {
                warn!(login, stage = "lookup", error = %e, "Account lookup failed");
                return LoginOutcome::Rejected(LoginFailure::Lookup(e.to_string()));
            }
        };

        let (mut account, new_server) = match resolution {
            Resolution::Existing(account) => (account, None),
            Resolution::New { draft, server } => (draft, Some(server)),
            Resolution::NoAccount => return LoginOutcome::Rejected(LoginFailure::NoAccount),
            Resolution::NoServer { domain } => {
                return LoginOutcome::Rejected(LoginFailure::NoServer(domain))
            }
        };

        // Always validate the submitted pair, never the cached one
        let needs_update = account.credentials_differ(login, password);
        account.set_credentials(login, password);

        let check = self.validator.validate(login, password).await;
        if !check.is_success() {
            return LoginOutcome::Rejected(LoginFailure::Directory(check));
        }

        let account = match new_server {
            None => {
                if needs_update {
                    debug!(login, "Incoming credentials changed, storing");
                    if let Err(e) = self.resolver.save_credentials(&account).await {
                        warn!(login, stage = "persist", error = %e, "Failed to store credentials");
                        return LoginOutcome::Rejected(LoginFailure::Persistence(e.to_string()));
                    }
                }
                account
            }
            Some(server) => match self.resolver.provision(login, password, &server).await {
                Ok(account) => account,
                Err(e) => {
                    return LoginOutcome::Rejected(LoginFailure::Provisioning(e.to_string()));
                }
            },
        };

        match AuthResult::for_account(&account, request.sign_me) {
            Ok(result) => {
                info!(login, account_id = result.account_id, "Login accepted");
                LoginOutcome::Authenticated(result)
            }
            Err(e) => LoginOutcome::Rejected(LoginFailure::Persistence(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ldap::memory::MemoryDirectory;
    use crate::ldap::{DirectoryEntry, LdapConfig};
    use async_trait::async_trait;
    use postern_core::privilege::ElevatedScope;
    use postern_core::types::{MailAccount, NewMailAccount, NewMailServer, NewUser};
    use postern_metadata::{MailProvisioner, MetadataStore};
    use std::sync::Arc;

    const SERVICE_DN: &str = "cn=reader,dc=example,dc=com";
    const SERVICE_PASSWORD: &str = "reader-secret";

    fn config(autocreate: bool) -> PosternConfig {
        let mut config = PosternConfig::default();
        config.ldap = LdapConfig {
            users_dn: "ou=people,dc=example,dc=com".to_string(),
            bind_dn: SERVICE_DN.to_string(),
            bind_password: SERVICE_PASSWORD.to_string(),
            login_field: "mail".to_string(),
            ..Default::default()
        };
        config.mail.autocreate_mail_account_on_new_user_first_login = autocreate;
        config
    }

    fn directory(password: &str) -> MemoryDirectory {
        MemoryDirectory::new(SERVICE_DN, SERVICE_PASSWORD).with_user(
            DirectoryEntry::new("uid=alice,ou=people,dc=example,dc=com")
                .with_attribute("mail", "alice@example.com"),
            password,
        )
    }

    fn handler(store: &Arc<MetadataStore>, directory: &MemoryDirectory, autocreate: bool) -> LoginHandler {
        let config = config(autocreate);
        let validator = CredentialValidator::new(config.ldap.clone(), Some(Arc::new(directory.clone())));
        LoginHandler::new(validator, AccountResolver::from_store(store.clone()), &config)
    }

    async fn seed_account(store: &MetadataStore, login: &str, password: &str) -> MailAccount {
        let server = store
            .create_server(&NewMailServer::new("primary", "example.com"))
            .await
            .unwrap();
        let user = store.create_user(&NewUser::from_email(login)).await.unwrap();
        let mut account = {
            let _scope = ElevatedScope::enter();
            store
                .create_account(&NewMailAccount {
                    user_id: user.id,
                    email: login.to_string(),
                    friendly_name: String::new(),
                    incoming_login: login.to_string(),
                    incoming_password: password.to_string(),
                    server_id: server.id,
                })
                .await
                .unwrap()
        };
        account.used_to_authorize = true;
        store.update_account(&account).await.unwrap();
        account
    }

    #[tokio::test]
    async fn test_existing_account_login() {
        let store = Arc::new(MetadataStore::in_memory().await.unwrap());
        let account = seed_account(&store, "alice@example.com", "correct").await;
        let handler = handler(&store, &directory("correct"), false);

        let request = LoginRequest::new("alice@example.com", "correct").sign_me(true);
        let result = handler.on_login(&request).await.unwrap();

        assert_eq!(result.token, "auth");
        assert!(result.sign_me);
        assert_eq!(Some(result.account_id), account.id);
        assert_eq!(Some(result.user_id), account.owner_user_id);
        assert_eq!(result.account_type, "mail");
    }

    #[tokio::test]
    async fn test_first_login_provisions_account() {
        let store = Arc::new(MetadataStore::in_memory().await.unwrap());
        let server = store
            .create_server(&NewMailServer::new("primary", "example.com").with_threading(true))
            .await
            .unwrap();
        let handler = handler(&store, &directory("correct"), true);

        let request = LoginRequest::new("alice@example.com", "correct");
        let result = handler.on_login(&request).await.unwrap();

        assert!(!result.sign_me);
        assert_eq!(store.count_users().await.unwrap(), 1);

        let account = store.get_account(result.account_id).await.unwrap().unwrap();
        assert!(account.used_to_authorize);
        assert_eq!(account.use_threading, server.enable_threading);
        assert_eq!(account.server_id, server.id);
        assert_eq!(account.owner_user_id, Some(result.user_id));
        assert_eq!(account.incoming_password, "correct");

        // A second login reuses the account
        let again = handler.on_login(&request).await.unwrap();
        assert_eq!(again.account_id, result.account_id);
        assert_eq!(store.count_users().await.unwrap(), 1);
        assert_eq!(store.count_accounts().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_first_login_on_wildcard_server() {
        let store = Arc::new(MetadataStore::in_memory().await.unwrap());
        let wildcard = store
            .create_server(&NewMailServer::new("catch-all", "*"))
            .await
            .unwrap();
        let handler = handler(&store, &directory("correct"), true);

        let result = handler
            .on_login(&LoginRequest::new("alice@example.com", "correct"))
            .await
            .unwrap();

        let account = store.get_account(result.account_id).await.unwrap().unwrap();
        assert_eq!(account.server_id, wildcard.id);
        assert!(!account.use_threading);
    }

    #[tokio::test]
    async fn test_unroutable_domain_creates_nothing() {
        let store = Arc::new(MetadataStore::in_memory().await.unwrap());
        store
            .create_server(&NewMailServer::new("primary", "example.com"))
            .await
            .unwrap();
        let directory = MemoryDirectory::new(SERVICE_DN, SERVICE_PASSWORD).with_user(
            DirectoryEntry::new("uid=bob,ou=people,dc=nowhere,dc=test")
                .with_attribute("mail", "bob@nowhere.test"),
            "correct",
        );
        let handler = handler(&store, &directory, true);

        let outcome = handler
            .authenticate(&LoginRequest::new("bob@nowhere.test", "correct"))
            .await;

        assert_eq!(
            outcome,
            LoginOutcome::Rejected(LoginFailure::NoServer("nowhere.test".to_string()))
        );
        assert_eq!(store.count_users().await.unwrap(), 0);
        assert_eq!(store.count_accounts().await.unwrap(), 0);
        assert_eq!(directory.connect_count(), 0);
    }

    #[tokio::test]
    async fn test_autocreation_disabled_creates_nothing() {
        let store = Arc::new(MetadataStore::in_memory().await.unwrap());
        store
            .create_server(&NewMailServer::new("primary", "example.com"))
            .await
            .unwrap();
        let handler = handler(&store, &directory("correct"), false);

        let outcome = handler
            .authenticate(&LoginRequest::new("alice@example.com", "correct"))
            .await;

        assert_eq!(outcome, LoginOutcome::Rejected(LoginFailure::NoAccount));
        assert_eq!(store.count_users().await.unwrap(), 0);
        assert_eq!(store.count_accounts().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_wrong_password_leaves_account_untouched() {
        let store = Arc::new(MetadataStore::in_memory().await.unwrap());
        let account = seed_account(&store, "alice@example.com", "correct").await;
        let handler = handler(&store, &directory("correct"), false);

        let outcome = handler
            .authenticate(&LoginRequest::new("alice@example.com", "wrong"))
            .await;

        assert_eq!(
            outcome,
            LoginOutcome::Rejected(LoginFailure::Directory(LdapAuthResult::InvalidCredentials))
        );

        let stored = store.get_account(account.id.unwrap()).await.unwrap().unwrap();
        assert_eq!(stored.incoming_password, "correct");
    }

    #[tokio::test]
    async fn test_rotated_directory_password_is_stored() {
        let store = Arc::new(MetadataStore::in_memory().await.unwrap());
        let account = seed_account(&store, "alice@example.com", "old").await;
        let handler = handler(&store, &directory("new"), false);

        let result = handler
            .on_login(&LoginRequest::new("alice@example.com", "new"))
            .await
            .unwrap();
        assert_eq!(Some(result.account_id), account.id);

        let stored = store.get_account(account.id.unwrap()).await.unwrap().unwrap();
        assert_eq!(stored.incoming_password, "new");
    }

    #[tokio::test]
    async fn test_failed_first_login_creates_nothing() {
        let store = Arc::new(MetadataStore::in_memory().await.unwrap());
        store
            .create_server(&NewMailServer::new("primary", "example.com"))
            .await
            .unwrap();
        let handler = handler(&store, &directory("correct"), true);

        let outcome = handler
            .authenticate(&LoginRequest::new("alice@example.com", "wrong"))
            .await;

        assert!(matches!(outcome, LoginOutcome::Rejected(LoginFailure::Directory(_))));
        assert_eq!(store.count_users().await.unwrap(), 0);
    }

    struct FailingMail;

    #[async_trait]
    impl MailProvisioner for FailingMail {
        async fn create_account(&self, _account: &NewMailAccount) -> postern_core::Result<MailAccount> {
            Err(Error::DatabaseError("disk full".to_string()))
        }

        async fn delete_account(&self, _account_id: i64) -> postern_core::Result<()> {
            Err(Error::NoSuchAccount)
        }
    }

    #[tokio::test]
    async fn test_provisioning_failure_rolls_back_user() {
        let store = Arc::new(MetadataStore::in_memory().await.unwrap());
        store
            .create_server(&NewMailServer::new("primary", "example.com"))
            .await
            .unwrap();
        let config = config(true);
        let validator = CredentialValidator::new(
            config.ldap.clone(),
            Some(Arc::new(directory("correct"))),
        );
        let resolver = AccountResolver::new(store.clone(), store.clone(), store.clone(), Arc::new(FailingMail));
        let handler = LoginHandler::new(validator, resolver, &config);

        let outcome = handler
            .authenticate(&LoginRequest::new("alice@example.com", "correct"))
            .await;

        assert!(matches!(outcome, LoginOutcome::Rejected(LoginFailure::Provisioning(_))));
        assert_eq!(store.count_users().await.unwrap(), 0);
        assert_eq!(store.count_accounts().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_directory_outage_is_a_plain_rejection() {
        let store = Arc::new(MetadataStore::in_memory().await.unwrap());
        seed_account(&store, "alice@example.com", "correct").await;
        let handler = handler(&store, &directory("correct").offline(), false);

        let request = LoginRequest::new("alice@example.com", "correct");
        assert!(handler.on_login(&request).await.is_none());
    }

    #[tokio::test]
    async fn test_reserved_login_is_refused() {
        let store = Arc::new(MetadataStore::in_memory().await.unwrap());
        let handler = handler(&store, &directory("correct").offline(), true);

        assert!(matches!(
            handler.on_check_account_exists("superadmin"),
            Err(Error::AccountExists)
        ));
        assert!(handler.on_check_account_exists("alice@example.com").is_ok());
    }
}
