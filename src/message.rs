//! Header fields extracted from fetched messages

use crate::error::{Error, Result};
use mailparse::{MailAddr, MailHeaderMap, SingleInfo};

/// The headers a subject search reports for one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHeaders {
    pub uid: u32,
    /// Every `From` address, formatted `Name <addr>` or `addr`.
    pub from: Vec<String>,
    /// Decoded `Subject`, if present.
    pub subject: Option<String>,
}

impl MessageHeaders {
    /// Parse the RFC 5322 header block of message `uid`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] if the header block or the `From`
    /// address list is malformed.
    pub fn parse(uid: u32, raw: &[u8]) -> Result<Self> {
        let (headers, _) = mailparse::parse_headers(raw)
            .map_err(|e| Error::Parse(format!("UID {uid}: {e}")))?;

        let from = match headers.get_first_header("From") {
            Some(header) => mailparse::addrparse_header(header)
                .map_err(|e| {
                    Error::Parse(format!("UID {uid}: bad From header: {e}"))
                })?
                .iter()
                .flat_map(format_addr)
                .collect(),
            None => Vec::new(),
        };

        Ok(Self {
            uid,
            from,
            subject: headers.get_first_value("Subject"),
        })
    }
}

fn format_addr(addr: &MailAddr) -> Vec<String> {
    match addr {
        MailAddr::Single(info) => vec![format_single(info)],
        MailAddr::Group(group) => group.addrs.iter().map(format_single).collect(),
    }
}

fn format_single(info: &SingleInfo) -> String {
    match info.display_name.as_deref() {
        Some(name) if !name.is_empty() => format!("{name} <{}>", info.addr),
        _ => info.addr.clone(),
    }
}
