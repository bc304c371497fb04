//! Live quiz backend binary entrypoint wiring REST, WebSocket and SSE layers.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use live_quiz_back::{
    config::AppConfig,
    dao::results::LoggingResultSink,
    routes,
    services::room_reaper,
    state::{AppState, SharedState},
};

const DEFAULT_PORT: u16 = 8080;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    info!(
        countdown_ms = config.engine.countdown.as_millis() as u64,
        reveal_ms = config.engine.reveal.as_millis() as u64,
        queue_capacity = config.engine.queue_capacity,
        max_players = config.room_defaults.max_players,
        "engine settings loaded"
    );
    let reaper_interval = config.engine.reaper_interval;
    let app_state = AppState::new(config, Arc::new(LoggingResultSink));

    tokio::spawn(room_reaper::run(
        app_state.registry().clone(),
        reaper_interval,
    ));
    let app = build_router(app_state);

    let addr = listen_addr();
    info!(%addr, "starting live quiz server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// `PORT`, then `SERVER_PORT`, then 8080, on every interface.
fn listen_addr() -> SocketAddr {
    let port = ["PORT", "SERVER_PORT"]
        .into_iter()
        .find_map(|key| env::var(key).ok()?.parse::<u16>().ok())
        .unwrap_or(DEFAULT_PORT);
    SocketAddr::from(([0, 0, 0, 0], port))
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Install the fmt subscriber; `RUST_LOG` overrides the default filter.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
