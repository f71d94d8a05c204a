//! IMAP command handlers for the fake server.
//!
//! Each handler lives in its own module and processes a single IMAP
//! command (CAPABILITY, LOGIN, SELECT/EXAMINE, UID SEARCH, UID FETCH,
//! CLOSE, LOGOUT).

mod select;
mod uid_fetch;

pub use capability::handle_capability;
pub use close::handle_close;
pub use login::handle_login;
pub use logout::handle_logout;
pub use select::handle_select;
pub use uid_fetch::handle_uid_fetch;
pub use uid_search::handle_uid_search;
