//! Fake IMAP server for integration testing
//!
//! This module provides an in-process IMAP server that speaks enough
//! of the protocol to test the search path end-to-end:
//!
//! TCP -> greeting -> STARTTLS -> TLS handshake -> LOGIN -> EXAMINE ->
//! UID SEARCH -> UID FETCH -> CLOSE -> LOGOUT
//!
//! ## Module layout
//!
//! - `server` -- TCP listener, TLS setup, command log and dispatch
//! - `handlers/` -- one file per IMAP command
//! - `mailbox` -- test data model (folders, emails, failure switches)
//! - `io` -- shared write helpers

mod handlers;

pub use mailbox::MailboxBuilder;
pub use server::FakeImapServer;
