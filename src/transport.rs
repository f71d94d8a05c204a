//! Mail transport abstraction and its SMTP implementation

use crate::config::{Endpoint, Security};
use crate::connection::within;
use crate::error::{Error, Result};
use crate::send::OutboundMessage;
use crate::session::Authenticator;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Something that can deliver an [`OutboundMessage`].
pub trait MailTransport: Send + Sync {
    /// Deliver `message` to all of its recipients.
    ///
    /// # Errors
    ///
    /// [`Error::Transport`] if the message cannot be built or the
    /// server refuses it, [`Error::Timeout`] on a deadline.
    fn send(&self, message: &OutboundMessage) -> impl Future<Output = Result<()>> + Send;
}

/// [`MailTransport`] over SMTP. Opens one connection per message.
pub struct SmtpTransport {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    host: String,
    timeout: Duration,
}

impl SmtpTransport {
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if TLS parameters cannot be built
    /// for the endpoint's host.
    pub fn new(endpoint: &Endpoint, authenticator: &Authenticator) -> Result<Self> {
        let tls = match endpoint.security {
            Security::Plain => Tls::None,
            Security::StartTls => Tls::Required(tls_parameters(endpoint)?),
            Security::Tls => Tls::Wrapper(tls_parameters(endpoint)?),
        };

        let credentials = Credentials::new(
            authenticator.username().to_string(),
            authenticator.password().to_string(),
        );

        let mailer =
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&endpoint.host)
                .port(endpoint.port)
                .tls(tls)
                .credentials(credentials)
                .timeout(Some(endpoint.timeout))
                .build();

        Ok(Self {
            mailer,
            host: endpoint.host.clone(),
            timeout: endpoint.timeout,
        })
    }
}

fn tls_parameters(endpoint: &Endpoint) -> Result<TlsParameters> {
    TlsParameters::builder(endpoint.host.clone())
        .dangerous_accept_invalid_certs(endpoint.trust_all_certs)
        .build()
        .map_err(|e| {
            Error::Transport(format!("TLS setup for {} failed: {e}", endpoint.host))
        })
}

fn build_message(message: &OutboundMessage) -> Result<Message> {
    let mut builder = Message::builder()
        .from(Mailbox::new(None, message.from.clone()))
        .sender(Mailbox::new(None, message.sender.clone()))
        .subject(message.subject.clone());

    for address in &message.reply_to {
        builder = builder.reply_to(Mailbox::new(None, address.clone()));
    }
    for address in &message.to {
        builder = builder.to(Mailbox::new(None, address.clone()));
    }

    builder
        .header(ContentType::TEXT_PLAIN)
        .body(message.body.clone())
        .map_err(|e| Error::Transport(format!("Failed to build message: {e}")))
}

impl MailTransport for SmtpTransport {
    async fn send(&self, message: &OutboundMessage) -> Result<()> {
        let email = build_message(message)?;

        debug!("Sending message via {}", self.host);
        within(self.timeout, "send", async {
            self.mailer
                .send(email)
                .await
                .map_err(|e| {
                    Error::Transport(format!("Send via {} failed: {e}", self.host))
                })
        })
        .await?;

        Ok(())
    }
}
