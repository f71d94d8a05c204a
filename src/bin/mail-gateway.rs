#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

//! HTTP gateway and CLI for IMAP subject search and SMTP notifications

use std::net::SocketAddr;
use std::path::PathBuf;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use clap::{Parser, Subcommand};
use mail_gateway::{
    Credentials, Error, SearchQuery, SearchResult, SearchResultItem, SendResult,
    SessionProvider,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mail-gateway")]
#[command(about = "IMAP subject search and SMTP notifications over HTTP")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Properties file with mail.* settings (default: MAIL_* env vars)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Serve GET /search and GET /send
    Serve {
        /// Address to listen on
        #[arg(long, default_value = "127.0.0.1:8080")]
        bind: SocketAddr,
    },

    /// Search INBOX by subject
    Search {
        /// Subject term (default: helidon)
        #[arg(long)]
        term: Option<String>,
    },

    /// Send the notification message to the account itself
    Send,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        anyhow::bail!("Failed to install rustls crypto provider");
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let credentials = match &args.config {
        Some(path) => Credentials::from_file(path)?,
        None => Credentials::from_env()?,
    };
    let provider = SessionProvider::new(credentials);

    match &args.command {
        Command::Serve { bind } => cmd_serve(provider, *bind).await?,
        Command::Search { term } => {
            cmd_search(&provider, &args, term.clone()).await?;
        }
        Command::Send => cmd_send(&provider, &args).await?,
    }

    Ok(())
}

fn router(provider: SessionProvider) -> Router {
    Router::new()
        .route("/search", get(search_handler))
        .route("/send", get(send_handler))
        .with_state(provider)
}

async fn cmd_serve(provider: SessionProvider, bind: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    let addr = listener.local_addr()?;
    info!("Listening on {}", addr);
    println!("Listening on http://{addr}");

    axum::serve(listener, router(provider))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

async fn search_handler(
    State(provider): State<SessionProvider>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<SearchResult>, ApiError> {
    let session = provider.create_session();
    Ok(Json(session.search(&query).await?))
}

async fn send_handler(
    State(provider): State<SessionProvider>,
) -> Result<Json<SendResult>, ApiError> {
    let session = provider.create_session();
    Ok(Json(session.send().await?))
}

/// An [`Error`] rendered as `{"error": "..."}` with a matching status.
struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        } else {
            warn!("Request rejected: {}", self.0);
        }
        let body = serde_json::json!({ "error": self.0.to_string() });
        (status, Json(body)).into_response()
    }
}

const fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::InvalidTerm(_) => StatusCode::BAD_REQUEST,
        Error::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        Error::Authentication(_)
        | Error::Connection(_)
        | Error::Tls(_)
        | Error::Folder(_)
        | Error::Imap(_)
        | Error::Parse(_)
        | Error::Transport(_)
        | Error::Io(_) => StatusCode::BAD_GATEWAY,
        Error::AddressFormat(_) | Error::Config(_) | Error::ResourceRelease { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

async fn cmd_search(
    provider: &SessionProvider,
    args: &Args,
    term: Option<String>,
) -> anyhow::Result<()> {
    let query = SearchQuery { term };
    let result = provider.create_session().search(&query).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result_table(result.items());
    }

    Ok(())
}

async fn cmd_send(provider: &SessionProvider, args: &Args) -> anyhow::Result<()> {
    let result = provider.create_session().send().await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", result.status());
    }

    Ok(())
}

fn print_result_table(items: &[SearchResultItem]) {
    if items.is_empty() {
        println!("No emails found.");
        return;
    }

    println!("{:<40} Subject", "From");
    println!("{}", "-".repeat(100));

    for item in items {
        println!(
            "{:<40} {}",
            truncate(&item.from, 38),
            truncate(&item.subject, 58),
        );
    }

    println!("\n{} email(s)", items.len());
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{truncated}...")
    }
}
