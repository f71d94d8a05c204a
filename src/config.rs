//! Mail account configuration
//!
//! Credentials and endpoint settings are read from a flat property set
//! (`mail.username`, `mail.imap.host`, ...). The property set can come
//! from `MAIL_*` environment variables or from a `key=value` file.

use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::num::ParseIntError;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// How the connection to a mail server is secured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Security {
    /// Unencrypted TCP. Only sensible for local test servers.
    Plain,
    /// Plain TCP upgraded with STARTTLS before authenticating.
    StartTls,
    /// TLS from the first byte.
    Tls,
}

impl FromStr for Security {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "plain" | "none" => Ok(Self::Plain),
            "starttls" => Ok(Self::StartTls),
            "tls" | "ssl" => Ok(Self::Tls),
            other => Err(Error::Config(format!("Unknown security mode: {other}"))),
        }
    }
}

/// Which side of the mail system an endpoint talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Protocol {
    Imap,
    Smtp,
}

impl Protocol {
    const fn key(self) -> &'static str {
        match self {
            Self::Imap => "imap",
            Self::Smtp => "smtp",
        }
    }

    const fn default_port(self, security: Security) -> u16 {
        match (self, security) {
            (Self::Imap, Security::Plain | Security::StartTls) => 143,
            (Self::Imap, Security::Tls) => 993,
            (Self::Smtp, Security::Plain) => 25,
            (Self::Smtp, Security::StartTls) => 587,
            (Self::Smtp, Security::Tls) => 465,
        }
    }
}

/// Where and how to reach one mail server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub security: Security,
    /// Accept any server certificate (`mail.<proto>.ssl.trust = *`).
    pub trust_all_certs: bool,
    /// Deadline applied to each remote call on this endpoint.
    pub timeout: Duration,
}

impl Endpoint {
    fn from_properties(
        protocol: Protocol,
        props: &BTreeMap<String, String>,
    ) -> Result<Self> {
        let key = |suffix: &str| format!("mail.{}.{suffix}", protocol.key());
        let get = |suffix: &str| props.get(&key(suffix)).map(|v| v.trim());

        let security = get("security").map_or(Ok(Security::StartTls), str::parse)?;

        let invalid = |suffix: &str, e: ParseIntError| {
            Error::Config(format!("Invalid {}: {e}", key(suffix)))
        };

        let port = match get("port") {
            Some(raw) => raw.parse().map_err(|e| invalid("port", e))?,
            None => protocol.default_port(security),
        };

        let timeout_ms = match get("timeout") {
            Some(raw) => raw.parse().map_err(|e| invalid("timeout", e))?,
            None => DEFAULT_TIMEOUT_MS,
        };
        if timeout_ms == 0 {
            return Err(Error::Config(format!(
                "{} must be positive",
                key("timeout")
            )));
        }

        Ok(Self {
            host: get("host").unwrap_or(DEFAULT_HOST).to_string(),
            port,
            security,
            trust_all_certs: get("ssl.trust") == Some("*"),
            timeout: Duration::from_millis(timeout_ms),
        })
    }

    /// `host:port`, ready for `TcpStream::connect`.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Account credentials plus the store and transport endpoints.
///
/// Immutable once loaded. Sessions receive their own copy.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub store: Endpoint,
    pub transport: Endpoint,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("store", &self.store)
            .field("transport", &self.transport)
            .finish()
    }
}

impl Credentials {
    /// Load configuration from `MAIL_*` environment variables
    ///
    /// Reads from `.env` file if present. Each variable maps to a
    /// property key by lowercasing and replacing `_` with `.`, so
    /// `MAIL_IMAP_HOST` becomes `mail.imap.host`. Required variables:
    /// - `MAIL_USERNAME`
    /// - `MAIL_PASSWORD`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a required variable is missing or a
    /// value cannot be parsed.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let props = env::vars()
            .filter(|(key, _)| key.starts_with("MAIL_"))
            .map(|(key, value)| (key.to_ascii_lowercase().replace('_', "."), value));

        Self::from_properties(props)
    }

    /// Load configuration from a `key=value` properties file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file cannot be read or parsed,
    /// or if the properties are invalid.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let failed = |action: &str, e: dotenvy::Error| {
            Error::Config(format!("Cannot {action} {}: {e}", path.display()))
        };

        let entries = dotenvy::from_path_iter(path).map_err(|e| failed("read", e))?;
        let props = entries
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| failed("parse", e))?;

        Self::from_properties(props)
    }

    /// Build credentials from a property set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `mail.username` or `mail.password`
    /// is missing, or an endpoint setting is invalid.
    pub fn from_properties<I, K, V>(props: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let props: BTreeMap<String, String> = props
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        let required = |key: &str| {
            props
                .get(key)
                .filter(|v| !v.is_empty())
                .cloned()
                .ok_or_else(|| Error::Config(format!("{key} not set")))
        };

        Ok(Self {
            username: required("mail.username")?,
            password: required("mail.password")?,
            store: Endpoint::from_properties(Protocol::Imap, &props)?,
            transport: Endpoint::from_properties(Protocol::Smtp, &props)?,
        })
    }
}
