//! Per-request mail sessions
//!
//! A [`SessionProvider`] holds the loaded [`Credentials`] and hands out
//! a fresh [`MailSession`] for every request. Sessions copy what they
//! need from the credentials, open no connections on creation, and are
//! dropped when the request completes.

use crate::config::{Credentials, Endpoint};
use crate::error::Result;
use crate::search::{self, SearchQuery, SearchResult};
use crate::send::{self, SendResult};
use crate::store::ImapStore;
use crate::transport::SmtpTransport;
use std::fmt;
use std::sync::Arc;

/// Supplies the account's username and password when the store or
/// transport asks for them.
#[derive(Clone)]
pub struct Authenticator {
    username: String,
    password: String,
}

impl Authenticator {
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Authenticator")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// An authenticated handle bound to one account, one IMAP store
/// endpoint and one SMTP transport endpoint.
#[derive(Debug, Clone)]
pub struct MailSession {
    authenticator: Authenticator,
    store: Endpoint,
    transport: Endpoint,
}

impl MailSession {
    /// Create a session from a copy of `credentials`. No network I/O
    /// happens here.
    #[must_use]
    pub fn new(credentials: &Credentials) -> Self {
        Self {
            authenticator: Authenticator::new(
                &credentials.username,
                &credentials.password,
            ),
            store: credentials.store.clone(),
            transport: credentials.transport.clone(),
        }
    }

    /// The account address, used as sender and recipient by `send`.
    #[must_use]
    pub fn identity(&self) -> &str {
        self.authenticator.username()
    }

    /// A disconnected store for this session's IMAP endpoint.
    #[must_use]
    pub fn store(&self) -> ImapStore {
        ImapStore::new(self.store.clone(), self.authenticator.clone())
    }

    /// An SMTP transport for this session's endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Transport`] if TLS parameters cannot be
    /// built for the endpoint.
    pub fn transport(&self) -> Result<SmtpTransport> {
        SmtpTransport::new(&self.transport, &self.authenticator)
    }

    /// Search INBOX by subject, then log out.
    ///
    /// The store connection lives only for this call.
    ///
    /// # Errors
    ///
    /// See [`search::search`].
    pub async fn search(&self, query: &SearchQuery) -> Result<SearchResult> {
        let mut store = self.store();
        let result = search::search(&mut store, query).await;
        store.disconnect().await;
        result
    }

    /// Send the notification message from the account to itself.
    ///
    /// # Errors
    ///
    /// See [`send::send`].
    pub async fn send(&self) -> Result<SendResult> {
        let transport = self.transport()?;
        send::send(&transport, self.identity()).await
    }
}

/// Hands out sessions built from shared, read-only credentials.
#[derive(Debug, Clone)]
pub struct SessionProvider {
    credentials: Arc<Credentials>,
}

impl SessionProvider {
    #[must_use]
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials: Arc::new(credentials),
        }
    }

    #[must_use]
    pub fn create_session(&self) -> MailSession {
        MailSession::new(&self.credentials)
    }
}
