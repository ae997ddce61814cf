//! LDAP Client implementation
//!
//! A session is opened with a service bind, can search the user subtree, and
//! can re-bind as another DN on the same connection.

use crate::ldap::types::*;
use async_trait::async_trait;
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, Scope, SearchEntry};
use tracing::debug;

/// Opens directory sessions
#[async_trait]
pub trait DirectoryConnector: Send + Sync {
    /// Connect to `endpoint` and bind as `bind_dn`
    async fn connect(
        &self,
        endpoint: &DirectoryEndpoint,
        bind_dn: &str,
        bind_password: &str,
    ) -> Result<Box<dyn DirectorySession>, DirectoryError>;
}

/// A bound directory session
#[async_trait]
pub trait DirectorySession: Send {
    /// Subtree search under the endpoint's base DN
    async fn search(&mut self, filter: &str) -> Result<SearchResults, DirectoryError>;

    /// Bind the session as `dn`
    async fn rebind(&mut self, dn: &str, password: &str) -> Result<(), DirectoryError>;

    /// Unbind and release the connection
    async fn close(&mut self);
}

/// [`DirectoryConnector`] backed by `ldap3`
#[derive(Debug, Clone, Copy, Default)]
pub struct LdapConnector;

impl LdapConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DirectoryConnector for LdapConnector {
    async fn connect(
        &self,
        endpoint: &DirectoryEndpoint,
        bind_dn: &str,
        bind_password: &str,
    ) -> Result<Box<dyn DirectorySession>, DirectoryError> {
        let settings = LdapConnSettings::new()
            .set_conn_timeout(endpoint.timeout)
            .set_starttls(endpoint.start_tls);

        let url = endpoint.url();
        debug!("Connecting to LDAP server: {}", url);

        let (conn, mut ldap) = LdapConnAsync::with_settings(settings, &url)
            .await
            .map_err(|e| DirectoryError::Connect(e.to_string()))?;

        ldap3::drive!(conn);

        let result = ldap
            .simple_bind(bind_dn, bind_password)
            .await
            .map_err(|e| DirectoryError::Connect(format!("Service bind failed: {}", e)))?;

        if result.rc != 0 {
            let _ = ldap.unbind().await;
            return Err(DirectoryError::Bind {
                rc: result.rc,
                message: result.text,
            });
        }

        Ok(Box::new(LdapSession {
            ldap,
            base_dn: endpoint.base_dn.clone(),
        }))
    }
}

struct LdapSession {
    ldap: Ldap,
    base_dn: String,
}

#[async_trait]
impl DirectorySession for LdapSession {
    async fn search(&mut self, filter: &str) -> Result<SearchResults, DirectoryError> {
        debug!("Searching {} with filter: {}", self.base_dn, filter);

        let (rs, _res) = self
            .ldap
            .search(&self.base_dn, Scope::Subtree, filter, vec!["*"])
            .await
            .map_err(|e| DirectoryError::Search(e.to_string()))?
            .success()
            .map_err(|e| DirectoryError::Search(e.to_string()))?;

        let entries = rs
            .into_iter()
            .map(SearchEntry::construct)
            .map(|entry| DirectoryEntry {
                dn: entry.dn,
                attributes: entry
                    .attrs
                    .into_iter()
                    .map(|(name, values)| (name, AttributeValue::from(values)))
                    .collect(),
            })
            .collect();

        Ok(SearchResults::new(entries))
    }

    async fn rebind(&mut self, dn: &str, password: &str) -> Result<(), DirectoryError> {
        let result = self
            .ldap
            .simple_bind(dn, password)
            .await
            .map_err(|e| DirectoryError::Connect(format!("User bind failed: {}", e)))?;

        match result.rc {
            0 => Ok(()),
            RC_INVALID_CREDENTIALS => Err(DirectoryError::InvalidCredentials),
            rc => Err(DirectoryError::Bind {
                rc,
                message: result.text,
            }),
        }
    }

    async fn close(&mut self) {
        let _ = self.ldap.unbind().await;
    }
}
