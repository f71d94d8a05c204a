//! Mail gateway library
//!
//! Two remote-mail operations for an HTTP front end:
//!
//! - subject search over an IMAP inbox ([`search`]), returning the
//!   first sender and subject of every match;
//! - sending a fixed notification from the account to itself over
//!   SMTP ([`send`]).
//!
//! Every request gets its own [`MailSession`] from a
//! [`SessionProvider`]; nothing is pooled or shared between requests
//! except the read-only [`Credentials`]. The [`MailStore`] and
//! [`MailTransport`] traits are the seams between the services and the
//! network.

mod config;
mod connection;
mod error;
mod folder;
mod message;
mod search;
mod send;
mod session;
mod store;
mod transport;

pub use config::{Credentials, Endpoint, Security};
pub use error::{Error, Result};
pub use folder::Folder;
pub use message::MessageHeaders;
pub use search::{
    DEFAULT_SEARCH_TERM, SearchQuery, SearchResult, SearchResultItem, SubjectTerm, search,
    search_folder,
};
pub use send::{
    NOTIFICATION_BODY, NOTIFICATION_SUBJECT, OutboundMessage, SendResult, send,
};
pub use session::{Authenticator, MailSession, SessionProvider};
pub use store::{ImapStore, MailStore};
pub use transport::{MailTransport, SmtpTransport};
