//! promo-server – entry point.
//!
//! Startup order:
//! 1. Parse configuration from environment variables.
//! 2. Initialise structured tracing (JSON in production, pretty in dev).
//! 3. Build the model clients and start the orchestrator's worker pool.
//! 4. Build the Axum router and start the HTTP server with graceful shutdown.

mod config;
mod error;
mod middleware;
mod routes;
mod schemas;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use promo_core::services::{
    Copywriter, GeminiClient, HostedImageGenerator, ImageEndpoint, TextModel,
};
use promo_core::{Generators, MemorySessionStore, MemoryTaskStore, Orchestrator};
use tracing::{info, warn};

use crate::config::Config;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Configuration ───────────────────────────────────────────────────────
    let cfg = Config::from_env();

    // ── 2. Tracing ─────────────────────────────────────────────────────────────
    let env_filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => match cfg.log_level.parse::<tracing_subscriber::EnvFilter>() {
            Ok(f) => f,
            Err(e) => {
                eprintln!(
                    "WARN: PROMO_LOG='{}' is not a valid tracing filter ({}); \
                     falling back to 'info'",
                    cfg.log_level, e
                );
                tracing_subscriber::EnvFilter::new("info")
            }
        },
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(true);

    if cfg.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    info!(version = env!("CARGO_PKG_VERSION"), "promo-server starting");

    // ── 3. Generators and orchestrator ─────────────────────────────────────────
    let generators = build_generators(&cfg)?;
    let orchestrator = Orchestrator::start(
        Arc::new(MemoryTaskStore::new()),
        Arc::new(MemorySessionStore::new(cfg.session_timeout())),
        generators,
        cfg.orchestrator(),
    );
    info!(
        queue_capacity = cfg.queue_capacity,
        max_workers = cfg.max_workers,
        session_timeout_secs = cfg.session_timeout_secs,
        "orchestrator started"
    );

    let state = Arc::new(AppState {
        config: Arc::new(cfg.clone()),
        orchestrator,
    });

    // ── 4. HTTP server with graceful shutdown ──────────────────────────────────
    let app = routes::build(Arc::clone(&state));
    let addr: SocketAddr = cfg.bind_address.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("promo-server stopped");
    Ok(())
}

/// Wire the Gemini text model into the copywriter and the image pipeline.
fn build_generators(cfg: &Config) -> anyhow::Result<Generators> {
    if cfg.gemini_api_key.is_none() {
        warn!("PROMO_GEMINI_API_KEY is not set; content generation will fail");
    }
    if cfg.image_api_token.is_none() {
        warn!("PROMO_IMAGE_API_TOKEN is not set; image requests are sent unauthenticated");
    }

    let gemini: Arc<dyn TextModel> = Arc::new(GeminiClient::new(
        cfg.gemini_base_url.as_deref(),
        &cfg.gemini_model,
        cfg.gemini_api_key.clone(),
        cfg.upstream_timeout(),
    )?);

    let imager = HostedImageGenerator::new(
        Arc::clone(&gemini),
        ImageEndpoint::new("primary", cfg.image_api_url.clone()),
        cfg.upstream_timeout(),
    )?
    .with_backup(
        cfg.image_backup_api_url
            .clone()
            .map(|url| ImageEndpoint::new("backup", url)),
    )
    .with_token(cfg.image_api_token.clone())
    .with_retry(cfg.retry_policy());

    Ok(Generators {
        content: Arc::new(Copywriter::new(gemini)),
        image: Arc::new(imager),
    })
}

/// Returns a future that resolves when SIGINT (Ctrl-C) or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install CTRL+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => warn!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received; starting graceful shutdown");
}
