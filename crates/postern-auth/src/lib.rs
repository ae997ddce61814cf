//! Directory authentication for Postern
//!
//! `ldap` proves a login/password pair against an LDAP directory; `login`
//! reconciles the proven identity with persisted mail accounts.

pub mod ldap;
pub mod login;

pub use ldap::{
    CredentialValidator, DirectoryConnector, DirectoryEndpoint, DirectoryEntry,
    DirectoryError, DirectoryIdentity, DirectorySession, LdapAuthResult, LdapConfig,
    LdapConnector,
};
pub use login::{AccountResolver, LoginFailure, LoginHandler, LoginOutcome, Resolution};
