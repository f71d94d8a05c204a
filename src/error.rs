//! Error types for mail-gateway

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("Folder error: {0}")]
    Folder(String),

    #[error("IMAP error: {0}")]
    Imap(String),

    #[error("Message parsing error: {0}")]
    Parse(String),

    #[error("Invalid search term: {0}")]
    InvalidTerm(String),

    #[error("Invalid address: {0}")]
    AddressFormat(String),

    #[error("Transport error: {0}")]
    Transport(String),

    /// Closing an opened folder failed. Fatal: the folder may be left open
    /// on the server.
    #[error("Failed to release folder {folder}: {source}")]
    ResourceRelease {
        folder: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error came from talking to the remote mail server,
    /// as opposed to bad local input or configuration.
    #[must_use]
    pub const fn is_mail_access(&self) -> bool {
        !matches!(self, Self::Config(_) | Self::InvalidTerm(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
