//! Mail store abstraction and its IMAP implementation

use crate::config::Endpoint;
use crate::connection::{self, ImapSession, within};
use crate::error::{Error, Result};
use crate::folder::Folder;
use crate::message::MessageHeaders;
use crate::search::SubjectTerm;
use crate::session::Authenticator;
use futures::StreamExt;
use std::collections::HashMap;
use std::future::Future;
use tracing::{debug, info};

/// A remote mailbox store.
///
/// At most one folder is open at a time. A folder opened with
/// [`MailStore::open`] must be released with [`MailStore::close`].
pub trait MailStore: Send {
    fn is_connected(&self) -> bool;

    /// Connect and authenticate.
    ///
    /// # Errors
    ///
    /// [`Error::Connection`], [`Error::Tls`] or
    /// [`Error::Authentication`] when the store cannot be reached or
    /// refuses the credentials, [`Error::Timeout`] on a deadline.
    fn connect(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Open `folder` read-only (IMAP `EXAMINE`).
    ///
    /// # Errors
    ///
    /// [`Error::Folder`] if the folder does not exist, another folder
    /// is already open, or the store is not connected.
    fn open(&mut self, folder: &Folder) -> impl Future<Output = Result<()>> + Send;

    /// Run a server-side subject search in the open folder and return
    /// the headers of the matches in search order.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidTerm`] if the server cannot accept the term,
    /// [`Error::Imap`] or [`Error::Parse`] if the search or header
    /// fetch fails.
    fn search(
        &mut self,
        term: &SubjectTerm,
    ) -> impl Future<Output = Result<Vec<MessageHeaders>>> + Send;

    /// Close the open folder.
    ///
    /// # Errors
    ///
    /// [`Error::Folder`] if nothing is open, [`Error::Imap`] if the
    /// server rejects the close.
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;
}

/// [`MailStore`] backed by an async-imap session.
pub struct ImapStore {
    endpoint: Endpoint,
    authenticator: Authenticator,
    session: Option<ImapSession>,
    opened: Option<Folder>,
}

impl ImapStore {
    #[must_use]
    pub const fn new(endpoint: Endpoint, authenticator: Authenticator) -> Self {
        Self {
            endpoint,
            authenticator,
            session: None,
            opened: None,
        }
    }

    fn session_mut(&mut self) -> Result<&mut ImapSession> {
        self.session
            .as_mut()
            .ok_or_else(|| Error::Connection("Store is not connected".into()))
    }

    /// Log out and drop the connection. Logout failures are only
    /// logged; the connection is gone either way.
    pub async fn disconnect(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };
        self.opened = None;

        let logout = within(self.endpoint.timeout, "logout", async {
            session
                .logout()
                .await
                .map_err(|e| Error::Imap(e.to_string()))
        })
        .await;

        match logout {
            Ok(()) => debug!("Logged out of {}", self.endpoint.host),
            Err(e) => debug!("Logout from {} failed: {}", self.endpoint.host, e),
        }
    }
}

impl MailStore for ImapStore {
    fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    async fn connect(&mut self) -> Result<()> {
        let session = within(
            self.endpoint.timeout,
            "connect",
            connection::connect(&self.endpoint, &self.authenticator),
        )
        .await?;
        self.session = Some(session);
        Ok(())
    }

    async fn open(&mut self, folder: &Folder) -> Result<()> {
        if let Some(current) = &self.opened {
            return Err(Error::Folder(format!("{current} is already open")));
        }

        let timeout = self.endpoint.timeout;
        let session = self.session_mut()?;
        let name = folder.as_str();

        let mailbox = within(timeout, "open folder", async {
            session
                .examine(name)
                .await
                .map_err(|e| Error::Folder(format!("Failed to open {name}: {e}")))
        })
        .await?;

        debug!("Opened {} read-only ({} messages)", folder, mailbox.exists);
        self.opened = Some(folder.clone());
        Ok(())
    }

    async fn search(&mut self, term: &SubjectTerm) -> Result<Vec<MessageHeaders>> {
        if self.opened.is_none() {
            return Err(Error::Folder("No folder open".into()));
        }

        let timeout = self.endpoint.timeout;
        let session = self.session_mut()?;

        let literals = if term.needs_literal() {
            within(timeout, "capability", non_sync_literals(session, term)).await?
        } else {
            false
        };
        let query = term.to_imap_query(literals)?;

        within(timeout, "search", fetch_matching(session, &query)).await
    }

    async fn close(&mut self) -> Result<()> {
        let Some(folder) = self.opened.take() else {
            return Err(Error::Folder("No folder open".into()));
        };

        let timeout = self.endpoint.timeout;
        let session = self.session_mut()?;

        within(timeout, "close folder", async {
            session
                .close()
                .await
                .map_err(|e| Error::Imap(format!("CLOSE {folder} failed: {e}")))
        })
        .await?;

        debug!("Closed {}", folder);
        Ok(())
    }
}

/// Whether the server takes `{n+}` literals of this term's length
/// (RFC 7888 `LITERAL+`, or `LITERAL-` up to 4096 bytes).
async fn non_sync_literals(
    session: &mut ImapSession,
    term: &SubjectTerm,
) -> Result<bool> {
    let capabilities = session
        .capabilities()
        .await
        .map_err(|e| Error::Imap(format!("CAPABILITY failed: {e}")))?;

    Ok(capabilities.has_str("LITERAL+")
        || (term.as_str().len() <= 4096 && capabilities.has_str("LITERAL-")))
}

/// `UID SEARCH` then one `UID FETCH` for the headers of every match.
///
/// The fetch stream is always drained so the session stays usable for
/// CLOSE, even when one of the responses is bad.
async fn fetch_matching(
    session: &mut ImapSession,
    query: &str,
) -> Result<Vec<MessageHeaders>> {
    let uids = session
        .uid_search(query)
        .await
        .map_err(|e| Error::Imap(format!("Search failed: {e}")))?;

    // UID SEARCH yields an unordered set; ascending UID is mailbox order.
    let mut uid_list: Vec<u32> = uids.into_iter().collect();
    uid_list.sort_unstable();

    if uid_list.is_empty() {
        return Ok(vec![]);
    }

    info!("UID SEARCH matched {} messages", uid_list.len());

    let uid_set = uid_list
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",");

    let mut by_uid = HashMap::with_capacity(uid_list.len());
    let mut failure = None;

    let mut messages = session
        .uid_fetch(&uid_set, "(UID BODY.PEEK[HEADER])")
        .await
        .map_err(|e| Error::Imap(format!("Fetch failed: {e}")))?;

    while let Some(item) = messages.next().await {
        let parsed = item
            .map_err(|e| Error::Imap(format!("Fetch error: {e}")))
            .and_then(|fetch| {
                let Some(uid) = fetch.uid else {
                    return Ok(None);
                };
                let header = fetch.header().ok_or_else(|| {
                    Error::Imap(format!("No header returned for UID {uid}"))
                })?;
                MessageHeaders::parse(uid, header).map(Some)
            });

        match parsed {
            Ok(Some(headers)) => {
                by_uid.insert(headers.uid, headers);
            }
            Ok(None) => {}
            Err(e) => {
                failure.get_or_insert(e);
            }
        }
    }
    drop(messages);

    if let Some(e) = failure {
        return Err(e);
    }

    uid_list
        .into_iter()
        .map(|uid| {
            by_uid.remove(&uid).ok_or_else(|| {
                Error::Imap(format!("No data returned for UID {uid}"))
            })
        })
        .collect()
}
