//! Subject search over a mail store
//!
//! [`search_folder`] drives a [`MailStore`] through connect, read-only
//! open, search and close. An opened folder is closed on every path
//! out of the call; a failed close is reported as
//! [`Error::ResourceRelease`] and never swallowed.

use crate::error::{Error, Result};
use crate::folder::Folder;
use crate::message::MessageHeaders;
use crate::store::MailStore;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Subject term used when the query has none.
pub const DEFAULT_SEARCH_TERM: &str = "helidon";

const STATUS_OK: &str = "OK";

/// Search input. A missing or blank term falls back to
/// [`DEFAULT_SEARCH_TERM`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchQuery {
    pub term: Option<String>,
}

impl SearchQuery {
    #[must_use]
    pub fn new(term: impl Into<String>) -> Self {
        Self {
            term: Some(term.into()),
        }
    }

    /// The effective search term.
    #[must_use]
    pub fn term(&self) -> &str {
        self.term
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(DEFAULT_SEARCH_TERM)
    }
}

/// A subject-contains predicate, validated for use on the IMAP wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectTerm(String);

impl SubjectTerm {
    /// # Errors
    ///
    /// Returns [`Error::InvalidTerm`] if the term contains CR, LF or NUL,
    /// which can appear in neither an IMAP quoted string nor a literal.
    pub fn new(term: impl Into<String>) -> Result<Self> {
        let term = term.into();
        if term.chars().any(|c| matches!(c, '\r' | '\n' | '\0')) {
            return Err(Error::InvalidTerm(format!(
                "{term:?} contains a line break or NUL"
            )));
        }
        Ok(Self(term))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Quoted strings are 7-bit only; anything else goes as a literal.
    #[must_use]
    pub fn needs_literal(&self) -> bool {
        !self.0.is_ascii()
    }

    /// The `SEARCH` criteria for this term, e.g. `SUBJECT "helidon"`.
    ///
    /// A non-ASCII term is sent as `CHARSET UTF-8 SUBJECT {n+}` followed
    /// by its bytes, which needs a server that takes non-synchronizing
    /// literals (`non_sync_literals`). Matching rules (case, substring)
    /// are the server's.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTerm`] for a non-ASCII term when
    /// `non_sync_literals` is false.
    pub fn to_imap_query(&self, non_sync_literals: bool) -> Result<String> {
        if !self.needs_literal() {
            let quoted = self.0.replace('\\', "\\\\").replace('"', "\\\"");
            return Ok(format!("SUBJECT \"{quoted}\""));
        }
        if !non_sync_literals {
            return Err(Error::InvalidTerm(format!(
                "{:?} is not ASCII and the server does not accept LITERAL+",
                self.0
            )));
        }
        Ok(format!(
            "CHARSET UTF-8 SUBJECT {{{}+}}\r\n{}",
            self.0.len(),
            self.0
        ))
    }
}

/// One matched message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResultItem {
    pub from: String,
    pub subject: String,
}

/// The matches of one search, in server order.
///
/// Serializes as `{"message": "OK", "count": n, "result": [...]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchResult {
    #[serde(rename = "message")]
    status: String,
    count: usize,
    #[serde(rename = "result")]
    items: Vec<SearchResultItem>,
}

impl SearchResult {
    #[must_use]
    pub fn ok(items: Vec<SearchResultItem>) -> Self {
        Self {
            status: STATUS_OK.to_string(),
            count: items.len(),
            items,
        }
    }

    #[must_use]
    pub fn status(&self) -> &str {
        &self.status
    }

    #[must_use]
    pub const fn count(&self) -> usize {
        self.count
    }

    #[must_use]
    pub fn items(&self) -> &[SearchResultItem] {
        &self.items
    }
}

/// Search INBOX by subject.
///
/// # Errors
///
/// See [`search_folder`].
pub async fn search<S: MailStore>(
    store: &mut S,
    query: &SearchQuery,
) -> Result<SearchResult> {
    search_folder(store, &Folder::Inbox, query).await
}

/// Search `folder` by subject.
///
/// Connects the store if it is not connected yet, opens `folder`
/// read-only, runs the search and closes the folder again. The store
/// itself stays connected; its lifetime belongs to the caller.
///
/// # Errors
///
/// - [`Error::InvalidTerm`] before any I/O if the term contains a line
///   break or NUL, or after opening the folder if the term is not ASCII
///   and the server lacks `LITERAL+`.
/// - Connection, authentication and timeout errors from `connect`.
/// - [`Error::Folder`] if the folder cannot be opened.
/// - [`Error::Imap`] or [`Error::Parse`] if the search or header
///   mapping fails, including a match with no `From` address.
/// - [`Error::ResourceRelease`] if closing the folder fails, even when
///   the search itself succeeded.
pub async fn search_folder<S: MailStore>(
    store: &mut S,
    folder: &Folder,
    query: &SearchQuery,
) -> Result<SearchResult> {
    let term = SubjectTerm::new(query.term())?;

    if !store.is_connected() {
        store.connect().await?;
    }

    store.open(folder).await?;

    let outcome = store.search(&term).await.and_then(into_items);
    let released = store.close().await;

    match (outcome, released) {
        (Ok(items), Ok(())) => {
            info!(
                "Subject search for {:?} in {} matched {}",
                term.as_str(),
                folder,
                items.len()
            );
            Ok(SearchResult::ok(items))
        }
        (Err(e), Ok(())) => Err(e),
        (outcome, Err(e)) => {
            if let Err(search_err) = outcome {
                warn!(
                    "Search in {} failed before close also failed: {}",
                    folder, search_err
                );
            }
            Err(Error::ResourceRelease {
                folder: folder.to_string(),
                source: Box::new(e),
            })
        }
    }
}

fn into_items(messages: Vec<MessageHeaders>) -> Result<Vec<SearchResultItem>> {
    messages
        .into_iter()
        .map(|message| {
            let uid = message.uid;
            let from = message.from.into_iter().next().ok_or_else(|| {
                Error::Parse(format!("Message UID {uid} has no From address"))
            })?;
            Ok(SearchResultItem {
                from,
                subject: message.subject.unwrap_or_default(),
            })
        })
        .collect()
}
