//! Shared IMAP connection and TLS helpers
//!
//! Provides the low-level `connect()` used by `ImapStore`, and the
//! `within()` deadline wrapper applied to every remote call.

use crate::config::{Endpoint, Security};
use crate::error::{Error, Result};
use crate::session::Authenticator;
use async_imap::Session;
use rustls::crypto::CryptoProvider;
use rustls::pki_types::ServerName;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tokio_util::compat::{Compat, TokioAsyncReadCompatExt};
use tokio_util::either::Either;
use tracing::{debug, info};

/// Plain TCP or TLS, depending on the endpoint's security mode.
pub type MailStream = Either<TcpStream, TlsStream<TcpStream>>;

/// An authenticated IMAP session.
pub type ImapSession = Session<Compat<MailStream>>;

/// Run a remote call under a deadline.
///
/// # Errors
///
/// Returns [`Error::Timeout`] if `fut` does not finish within `limit`,
/// otherwise whatever `fut` returns.
pub async fn within<T, F>(limit: Duration, operation: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| {
            Error::Timeout(format!("{operation} did not complete within {limit:?}"))
        })?
}

/// Build the rustls client config for an endpoint.
///
/// Uses the webpki root store unless the endpoint is configured to
/// trust any certificate (local bridges with self-signed certs).
fn tls_config(endpoint: &Endpoint) -> Result<Arc<rustls::ClientConfig>> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let builder = rustls::ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()
        .map_err(|e| Error::Tls(format!("Unsupported protocol versions: {e}")))?;

    let config = if endpoint.trust_all_certs {
        builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyCert(provider)))
            .with_no_client_auth()
    } else {
        let anchors = webpki_roots::TLS_SERVER_ROOTS.iter().cloned();
        let roots = rustls::RootCertStore::from_iter(anchors);
        builder.with_root_certificates(roots).with_no_client_auth()
    };

    Ok(Arc::new(config))
}

async fn tls_handshake(
    endpoint: &Endpoint,
    tcp_stream: TcpStream,
) -> Result<TlsStream<TcpStream>> {
    let connector = TlsConnector::from(tls_config(endpoint)?);
    let server_name = ServerName::try_from(endpoint.host.clone())
        .map_err(|e| Error::Tls(format!("Invalid server name: {e}")))?;

    connector
        .connect(server_name, tcp_stream)
        .await
        .map_err(|e| Error::Tls(e.to_string()))
}

/// Issue STARTTLS on a fresh plaintext connection, then upgrade it.
async fn starttls(
    endpoint: &Endpoint,
    tcp_stream: TcpStream,
) -> Result<TlsStream<TcpStream>> {
    let mut client = async_imap::Client::new(tcp_stream.compat());

    client
        .run_command_and_check_ok("STARTTLS", None)
        .await
        .map_err(|e| Error::Tls(format!("STARTTLS failed: {e}")))?;

    let inner = client.into_inner().into_inner();
    tls_handshake(endpoint, inner).await
}

fn login_error(err: async_imap::error::Error) -> Error {
    match err {
        async_imap::error::Error::No(msg) | async_imap::error::Error::Bad(msg) => {
            Error::Authentication(msg)
        }
        other => Error::Connection(format!("Login failed: {other}")),
    }
}

/// Open a fresh IMAP session.
///
/// Connects to the endpoint via TCP, secures the stream according to
/// `endpoint.security`, and logs in with the authenticator's
/// credentials.
///
/// # Errors
///
/// - [`Error::Connection`] if the TCP connect fails.
/// - [`Error::Tls`] if STARTTLS or the TLS handshake fails.
/// - [`Error::Authentication`] if the server rejects the login.
pub async fn connect(
    endpoint: &Endpoint,
    authenticator: &Authenticator,
) -> Result<ImapSession> {
    let addr = endpoint.address();
    debug!("Connecting to IMAP server at {} ({:?})", addr, endpoint.security);

    let tcp_stream = TcpStream::connect(&addr)
        .await
        .map_err(|e| Error::Connection(format!("{addr}: {e}")))?;

    let stream: MailStream = match endpoint.security {
        Security::Plain => Either::Left(tcp_stream),
        Security::StartTls => Either::Right(starttls(endpoint, tcp_stream).await?),
        Security::Tls => Either::Right(tls_handshake(endpoint, tcp_stream).await?),
    };

    let client = async_imap::Client::new(stream.compat());
    let session = client
        .login(authenticator.username(), authenticator.password())
        .await
        .map_err(|(e, _)| login_error(e))?;

    info!("Connected to IMAP server at {}", addr);
    Ok(session)
}

/// Certificate verifier that accepts any server certificate chain but
/// still checks handshake signatures against the presented certificate.
#[derive(Debug)]
struct AcceptAnyCert(Arc<CryptoProvider>);

impl rustls::client::danger::ServerCertVerifier for AcceptAnyCert {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> std::result::Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &rustls::pki_types::CertificateDer<'_>,
        dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &rustls::pki_types::CertificateDer<'_>,
        dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}
