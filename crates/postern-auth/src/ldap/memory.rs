//! In-memory directory used by tests

use crate::ldap::client::{DirectoryConnector, DirectorySession};
use crate::ldap::types::*;
use async_trait::async_trait;
use std::sync::atomic::{AtomicIsize, AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Default)]
struct Counters {
    connects: AtomicUsize,
    searches: AtomicUsize,
    rebinds: AtomicUsize,
    open: AtomicIsize,
}

/// Directory holding a fixed set of entries and their passwords.
///
/// Understands only `(attr=value)` equality filters and the `(attr=*)`
/// presence filter, which is enough to tell escaped logins from raw ones.
#[derive(Clone)]
pub(crate) struct MemoryDirectory {
    service_dn: String,
    service_password: String,
    users: Arc<Vec<(DirectoryEntry, String)>>,
    online: bool,
    counters: Arc<Counters>,
}

impl MemoryDirectory {
    pub(crate) fn new(service_dn: &str, service_password: &str) -> Self {
        Self {
            service_dn: service_dn.to_string(),
            service_password: service_password.to_string(),
            users: Arc::new(Vec::new()),
            online: true,
            counters: Arc::new(Counters::default()),
        }
    }

    pub(crate) fn with_user(mut self, entry: DirectoryEntry, password: &str) -> Self {
        Arc::make_mut(&mut self.users).push((entry, password.to_string()));
        self
    }

    pub(crate) fn offline(mut self) -> Self {
        self.online = false;
        self
    }

    pub(crate) fn connect_count(&self) -> usize {
        self.counters.connects.load(Ordering::SeqCst)
    }

    pub(crate) fn search_count(&self) -> usize {
        self.counters.searches.load(Ordering::SeqCst)
    }

    pub(crate) fn rebind_count(&self) -> usize {
        self.counters.rebinds.load(Ordering::SeqCst)
    }

    pub(crate) fn open_sessions(&self) -> isize {
        self.counters.open.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DirectoryConnector for MemoryDirectory {
    async fn connect(
        &self,
        _endpoint: &DirectoryEndpoint,
        bind_dn: &str,
        bind_password: &str,
    ) -> Result<Box<dyn DirectorySession>, DirectoryError> {
        self.counters.connects.fetch_add(1, Ordering::SeqCst);

        if !self.online {
            return Err(DirectoryError::Connect("connection refused".to_string()));
        }
        if bind_dn != self.service_dn || bind_password != self.service_password {
            return Err(DirectoryError::Bind {
                rc: RC_INVALID_CREDENTIALS,
                message: "invalid service credentials".to_string(),
            });
        }

        self.counters.open.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemorySession {
            directory: self.clone(),
            closed: false,
        }))
    }
}

struct MemorySession {
    directory: MemoryDirectory,
    closed: bool,
}

#[async_trait]
impl DirectorySession for MemorySession {
    async fn search(&mut self, filter: &str) -> Result<SearchResults, DirectoryError> {
        self.directory.counters.searches.fetch_add(1, Ordering::SeqCst);

        let (attribute, raw) = filter
            .strip_prefix('(')
            .and_then(|f| f.strip_suffix(')'))
            .and_then(|f| f.split_once('='))
            .ok_or_else(|| DirectoryError::Search(format!("unsupported filter {}", filter)))?;

        let presence = raw == "*";
        let value = unescape(raw)?;

        let entries = self
            .directory
            .users
            .iter()
            .map(|(entry, _)| entry)
            .filter(|entry| match entry.first_value(attribute) {
                Some(_) if presence => true,
                Some(first) => first.eq_ignore_ascii_case(&value),
                None => false,
            })
            .cloned()
            .collect();

        Ok(SearchResults::new(entries))
    }

    async fn rebind(&mut self, dn: &str, password: &str) -> Result<(), DirectoryError> {
        self.directory.counters.rebinds.fetch_add(1, Ordering::SeqCst);

        let accepted = self
            .directory
            .users
            .iter()
            .any(|(entry, secret)| entry.dn == dn && secret == password);

        if accepted {
            Ok(())
        } else {
            Err(DirectoryError::InvalidCredentials)
        }
    }

    async fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.directory.counters.open.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

fn unescape(raw: &str) -> Result<String, DirectoryError> {
    let mut out = Vec::with_capacity(raw.len());
    let bytes = raw.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' {
            let hex = raw
                .get(i + 1..i + 3)
                .and_then(|h| u8::from_str_radix(h, 16).ok())
                .ok_or_else(|| DirectoryError::Search(format!("bad escape in {}", raw)))?;
            out.push(hex);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).map_err(|e| DirectoryError::Search(e.to_string()))
}
