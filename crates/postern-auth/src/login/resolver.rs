//! Mail account resolution and first-login provisioning

use postern_core::privilege::ElevatedScope;
use postern_core::types::{MailAccount, MailServer, NewMailAccount, NewUser};
use postern_core::utils::domain_from_email;
use postern_core::{Result, WILDCARD_DOMAIN};
use postern_metadata::{AccountRepository, IdentityProvisioner, MailProvisioner, ServerRepository};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Account to use for a login attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A persisted account already authorizes this login
    Existing(MailAccount),
    /// No account yet; `draft` will be provisioned on `server` once the
    /// directory confirms the credentials
    New { draft: MailAccount, server: MailServer },
    /// No account and autocreation is disabled
    NoAccount,
    /// No account and no server accepts the login's domain
    NoServer { domain: String },
}

pub struct AccountResolver {
    accounts: Arc<dyn AccountRepository>,
    servers: Arc<dyn ServerRepository>,
    identities: Arc<dyn IdentityProvisioner>,
    mail: Arc<dyn MailProvisioner>,
}

impl AccountResolver {
    pub fn new(
        accounts: Arc<dyn AccountRepository>,
        servers: Arc<dyn ServerRepository>,
        identities: Arc<dyn IdentityProvisioner>,
        mail: Arc<dyn MailProvisioner>,
    ) -> Self {
        Self {
            accounts,
            servers,
            identities,
            mail,
        }
    }

    /// Resolver whose collaborators are all served by one store
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: AccountRepository + ServerRepository + IdentityProvisioner + MailProvisioner + 'static,
    {
        Self::new(store.clone(), store.clone(), store.clone(), store)
    }

    pub async fn resolve(&self, login: &str, password: &str, autocreate: bool) -> Result<Resolution> {
        if let Some(account) = self.accounts.get_account_used_to_authorize(login).await? {
            debug!(login, account_id = ?account.id, "Found account used to authorize");
            return Ok(Resolution::Existing(account));
        }

        if !autocreate {
            return Ok(Resolution::NoAccount);
        }

        let domain = domain_from_email(login);
        match self.route_server(&domain).await? {
            Some(server) => {
                debug!(login, server_id = server.id, "Routing new account to server {}", server.name);
                Ok(Resolution::New {
                    draft: MailAccount::draft(login, password, &server),
                    server,
                })
            }
            None => {
                info!(login, domain = %domain, "No mail server accepts this domain");
                Ok(Resolution::NoServer { domain })
            }
        }
    }

    /// Server for `domain`, falling back to the wildcard server
    pub async fn route_server(&self, domain: &str) -> Result<Option<MailServer>> {
        if !domain.is_empty() {
            if let Some(server) = self.servers.get_server_by_domain(domain).await? {
                return Ok(Some(server));
            }
        }
        self.servers.get_server_by_domain(WILDCARD_DOMAIN).await
    }

    /// Persist refreshed incoming credentials of an existing account
    pub async fn save_credentials(&self, account: &MailAccount) -> Result<()> {
        self.accounts.update_account(account).await?;
        debug!(account_id = ?account.id, "Stored refreshed credentials");
        Ok(())
    }

    /// Create the user and mail account for a first login.
    ///
    /// On failure nothing is left behind: the user, and the mail account if it
    /// was created, are removed again.
    pub async fn provision(&self, login: &str, password: &str, server: &MailServer) -> Result<MailAccount> {
        let user = self.identities.create_user(&NewUser::from_email(login)).await?;

        let request = NewMailAccount {
            user_id: user.id,
            email: login.to_string(),
            friendly_name: login.to_string(),
            incoming_login: login.to_string(),
            incoming_password: password.to_string(),
            server_id: server.id,
        };

        let created = {
            let _scope = ElevatedScope::enter();
            self.mail.create_account(&request).await
        };

        let mut account = match created {
            Ok(account) => account,
            Err(e) => {
                warn!(login, user_id = user.id, error = %e, "Mail account creation failed");
                self.discard(user.id, None).await;
                return Err(e);
            }
        };

        account.used_to_authorize = true;
        account.use_threading = server.enable_threading;

        if let Err(e) = self.accounts.update_account(&account).await {
            warn!(login, account_id = ?account.id, error = %e, "Failed to enable new account for login");
            self.discard(user.id, account.id).await;
            return Err(e);
        }

        info!(login, user_id = user.id, account_id = ?account.id, "Provisioned mail account");
        Ok(account)
    }

    /// Best-effort removal of rows created by an incomplete provisioning
    async fn discard(&self, user_id: i64, account_id: Option<i64>) {
        if let Some(account_id) = account_id {
            if let Err(e) = self.mail.delete_account(account_id).await {
                warn!(account_id, error = %e, "Failed to remove orphaned mail account");
            }
        }
        if let Err(e) = self.identities.delete_user(user_id).await {
            warn!(user_id, error = %e, "Failed to remove orphaned user");
        }
    }
}
