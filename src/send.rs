//! The notification sender
//!
//! Sends one fixed message from the account to itself.

use crate::error::{Error, Result};
use crate::transport::MailTransport;
use lettre::Address;
use serde::Serialize;
use tracing::info;

pub const NOTIFICATION_SUBJECT: &str = "Greetings from Helidon!";
pub const NOTIFICATION_BODY: &str = "Sent by Angus Mail/Helidon.";

const STATUS_SENT: &str = "email has been sent!";

/// A plain-text message ready for a [`MailTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub from: Address,
    pub sender: Address,
    pub reply_to: Vec<Address>,
    pub to: Vec<Address>,
    pub subject: String,
    pub body: String,
}

impl OutboundMessage {
    /// The notification message, self-addressed to `identity`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AddressFormat`] if `identity` is not a valid
    /// email address exactly as given. Surrounding whitespace is not
    /// stripped.
    pub fn notification(identity: &str) -> Result<Self> {
        let address: Address = identity
            .parse()
            .map_err(|e| Error::AddressFormat(format!("{identity:?}: {e}")))?;

        Ok(Self {
            from: address.clone(),
            sender: address.clone(),
            reply_to: vec![address.clone()],
            to: vec![address],
            subject: NOTIFICATION_SUBJECT.to_string(),
            body: NOTIFICATION_BODY.to_string(),
        })
    }
}

/// Outcome of a successful send. Serializes as `{"message": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendResult {
    #[serde(rename = "message")]
    status: String,
}

impl SendResult {
    fn sent() -> Self {
        Self {
            status: STATUS_SENT.to_string(),
        }
    }

    #[must_use]
    pub fn status(&self) -> &str {
        &self.status
    }
}

/// Compose the notification for `identity` and hand it to `transport`.
///
/// # Errors
///
/// - [`Error::AddressFormat`] if `identity` does not parse. The
///   transport is not touched.
/// - [`Error::Transport`] or [`Error::Timeout`] from the transport.
pub async fn send<T: MailTransport>(transport: &T, identity: &str) -> Result<SendResult> {
    let message = OutboundMessage::notification(identity)?;
    transport.send(&message).await?;
    info!("Notification sent to {}", message.from);
    Ok(SendResult::sent())
}
