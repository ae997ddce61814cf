//! Collaborator traits
//!
//! The login flow talks to persistence and provisioning only through these
//! interfaces. [`crate::MetadataStore`] implements all four.

use async_trait::async_trait;
use postern_core::types::{MailAccount, MailServer, NewMailAccount, NewUser, User};
use postern_core::Result;

/// Mail account persistence
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Account flagged for authorization whose email matches `login`
    async fn get_account_used_to_authorize(&self, login: &str) -> Result<Option<MailAccount>>;

    /// Persist every mutable field of an existing account
    async fn update_account(&self, account: &MailAccount) -> Result<()>;
}

/// Mail server routing lookups
#[async_trait]
pub trait ServerRepository: Send + Sync {
    /// Server registered for exactly `domain` (`*` selects the catch-all)
    async fn get_server_by_domain(&self, domain: &str) -> Result<Option<MailServer>>;
}

/// User identity provisioning
#[async_trait]
pub trait IdentityProvisioner: Send + Sync {
    async fn create_user(&self, user: &NewUser) -> Result<User>;

    /// Remove a user created by a provisioning attempt that did not complete
    async fn delete_user(&self, user_id: i64) -> Result<()>;
}

/// Mail account provisioning.
///
/// Implementations must refuse to create accounts for other users unless the
/// caller holds a [`postern_core::privilege::ElevatedScope`].
#[async_trait]
pub trait MailProvisioner: Send + Sync {
    async fn create_account(&self, account: &NewMailAccount) -> Result<MailAccount>;

    /// Remove an account created by a provisioning attempt that did not complete
    async fn delete_account(&self, account_id: i64) -> Result<()>;
}
