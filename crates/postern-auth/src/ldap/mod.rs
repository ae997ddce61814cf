//! LDAP directory authentication
//!
//! Proves a login/password pair by:
//! - binding with the service account
//! - searching the user subtree for exactly one matching entry
//! - re-binding as that entry with the submitted password

mod client;
mod types;
mod validator;

#[cfg(test)]
pub(crate) mod memory;

pub use client::{DirectoryConnector, DirectorySession, LdapConnector};
pub use types::*;
pub use validator::CredentialValidator;
