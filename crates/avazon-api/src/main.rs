//! Avazon server entry point.
//!
//! Binary name: `avazon`
//!
//! Parses CLI arguments, sets up tracing, then either serves the
//! HTTP/WebSocket API or runs a one-shot command.

mod cli;
mod http;
mod state;

use clap::Parser;
use tracing::{info, warn};

use avazon_infra::config::{Secrets, load_config, resolve_data_dir};
use avazon_observe::{LogFormat, TracingOptions, init_tracing, shutdown_tracing};

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let format = if cli.log_json { LogFormat::Json } else { LogFormat::Pretty };
    init_tracing(
        &TracingOptions::new(cli.log_filter())
            .with_format(format)
            .with_otel(cli.otel),
    )
    .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let result = match cli.command {
        Commands::Token { user_id, ttl_mins } => {
            cli::token::issue_token(Secrets::from_env(), &user_id, ttl_mins)
        }
        Commands::Serve { port, host } => serve(host, port).await,
    };

    shutdown_tracing();
    result
}

async fn serve(host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    let data_dir = resolve_data_dir();
    let config = load_config(&data_dir).await;
    let secrets = Secrets::from_env();
    for key in secrets.missing_provider_keys() {
        warn!(key, "provider key not set; requests to that provider will fail");
    }

    let addr = format!(
        "{}:{}",
        host.unwrap_or_else(|| config.server.host.clone()),
        port.unwrap_or(config.server.port)
    );
    let state = AppState::init(data_dir, config, secrets).await?;
    let sweeper = state.spawn_session_sweeper();

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, data_dir = %state.data_dir.display(), "avazon listening");

    let router = http::router::build_router(state.clone());
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.close();
    if let Err(e) = sweeper.await {
        warn!(error = %e, "session sweeper panicked");
    }
    info!("server stopped");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
