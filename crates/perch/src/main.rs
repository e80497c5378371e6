mod cli;
mod server;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use eyre::{eyre, WrapErr};

use perch_core::address::{AddressCodec, NetworkPrefix};
use perch_core::ledger::HttpIndexClient;
use perch_core::MempoolView;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let args = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_file(true)
        .with_line_number(true)
        .with_level(true)
        .init();

    let network = parse_network(&args.network)?;

    // Connect to the indexer backend and verify it is reachable before
    // starting the server.
    let backend = Arc::new(HttpIndexClient::new(
        &args.backend_url,
        Duration::from_secs(args.request_timeout_secs),
    ));
    backend.probe().await.map_err(|err| {
        let message = format_backend_connect_error(&args.backend_url, &err.to_string());
        eyre!(message).wrap_err("while attempting to connect to the indexer backend")
    })?;
    tracing::info!(backend = %args.backend_url, "connected to indexer backend");

    let view = MempoolView::new(backend.clone(), backend, AddressCodec::new(network));
    let router = server::build_router(server::AppState { view: Arc::new(view) });

    let bind_addr = format!("{}:{}", args.bind, args.port);
    if args.bind == "0.0.0.0" {
        tracing::warn!("server is bound to 0.0.0.0 — it is accessible from the network");
    }

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .context("bind TCP listener")?;

    tracing::info!("listening on {bind_addr}");
    axum::serve(listener, router)
        .await
        .context("run HTTP server")?;

    Ok(())
}

fn parse_network(name: &str) -> eyre::Result<NetworkPrefix> {
    match name {
        "mainnet" => Ok(NetworkPrefix::Mainnet),
        "testnet" => Ok(NetworkPrefix::Testnet),
        _ => Err(eyre!("unrecognized network `{name}` (expected mainnet or testnet)")),
    }
}

fn format_backend_connect_error(backend_url: &str, source_error: &str) -> String {
    let mut lines = vec![
        format!("could not connect to indexer backend `{backend_url}`"),
        format!("backend error: {source_error}"),
    ];

    if source_error.contains("Could not resolve host") || source_error.contains("dns error") {
        lines.push(
            "hint: hostname resolution failed; verify the backend hostname and your DNS/network"
                .into(),
        );
    } else if source_error.contains("tls")
        || source_error.contains("certificate")
        || source_error.contains("SSL")
    {
        lines.push(
            "hint: TLS handshake failed; verify certificate trust and that the backend uses HTTPS"
                .into(),
        );
    } else if source_error.contains("404") {
        lines.push("hint: the URL does not serve the view API; verify the base path".into());
    } else if source_error.contains("error sending request for url") {
        lines.push(
            "hint: request could not be sent; verify URL format, network access, and backend \
             reachability"
                .into(),
        );
    }

    lines.join("\n")
}
