use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing_subscriber::EnvFilter;

use review_domain::config::RuntimeConfig;
use review_gateway::api;
use review_gateway::state::AppState;
use review_providers::AnthropicProvider;

/// The review agent runtime: a long-lived HTTP service that drives an LLM
/// through multi-turn tool-use and streams progress back over SSE.
#[derive(Parser, Debug)]
#[command(name = "review-gateway", version)]
struct Cli {
    /// Path to a TOML config file. Missing file falls back to defaults.
    #[arg(long, default_value = "config.toml")]
    config: std::path::PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    if let Err(e) = run_server(config).await {
        tracing::error!(error = %e, "fatal error, shutting down");
        return Err(e);
    }

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,review_gateway=debug")),
        )
        .json()
        .init();
}

fn load_config(path: &std::path::Path) -> anyhow::Result<RuntimeConfig> {
    if !path.exists() {
        tracing::info!(path = %path.display(), "no config file found, using defaults");
        return Ok(RuntimeConfig::default());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config file {}", path.display()))?;
    let config: RuntimeConfig =
        toml::from_str(&raw).with_context(|| format!("parsing config file {}", path.display()))?;
    Ok(config)
}

async fn run_server(config: RuntimeConfig) -> anyhow::Result<()> {
    tracing::info!("review-gateway starting");

    // Config validation: a missing/invalid API key fails fast, before we
    // bind a socket — the CLI-boundary equivalent of the in-process 500.
    let llm: Arc<dyn review_providers::LlmProvider> = Arc::new(
        AnthropicProvider::from_config(&config.llm).context("initializing LLM provider")?,
    );
    tracing::info!(model = %config.llm.default_model, "LLM provider ready");

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let cors_layer = build_cors_layer(&config.server.cors);

    let state = AppState::new(config, llm);

    // Periodic session sweep: evicts sessions idle past their TTL and
    // prunes their session locks.
    {
        let sessions = state.sessions.clone();
        let sweep_interval = std::time::Duration::from_secs(state.config.sessions.sweep_interval_secs);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(sweep_interval);
            loop {
                interval.tick().await;
                sessions.sweep_expired();
            }
        });
    }

    let app = api::router().layer(cors_layer).with_state(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding to {addr}"))?;
    tracing::info!(addr = %addr, "review-gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("axum server error")?;

    tracing::info!("review-gateway shut down cleanly");
    Ok(())
}

/// Waits for SIGINT or SIGTERM so in-flight turns can finish (or be
/// cancelled) instead of being killed mid-stream.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received SIGINT, shutting down gracefully"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down gracefully"),
    }
}

/// CORS internals are out of scope beyond a minimal allow-list — unlike
/// the teacher's wildcard-port predicate, exact origins only.
fn build_cors_layer(cors: &review_domain::config::CorsConfig) -> CorsLayer {
    use axum::http::header;
    use axum::http::Method;

    if cors.allowed_origins.len() == 1 && cors.allowed_origins[0] == "*" {
        return CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::CONTENT_TYPE]);
    }

    let origins: Vec<_> = cors
        .allowed_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
}
