use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Result;
use axum::extract::Request;
use axum::http::{Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use chatsink_ingest::{IngestPipeline, PipelineBuilder};
use chatsink_store::RollingLimits;
use clap::Parser;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

mod routes;

use crate::routes::{
    analytics, diagnostic, health, ingest_via_get, ingest_via_post, preflight, recent_entries,
};

#[derive(Debug, Parser)]
#[command(name = "chatsink-api")]
#[command(about = "Local sink for chat turns captured from AI chat UIs")]
struct Cli {
    /// Directory holding the rolling log files.
    #[arg(long, default_value = ".")]
    root: PathBuf,
    #[arg(long, default_value = "127.0.0.1:8788")]
    listen: SocketAddr,
    /// Line cap for the verbose and filtered logs.
    #[arg(long, default_value_t = 100)]
    max_lines: usize,
    /// Line cap for the recent-window file.
    #[arg(long, default_value_t = 2)]
    recent_lines: usize,
}

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) pipeline: IngestPipeline,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .json()
        .init();

    let cli = Cli::parse();
    let limits = RollingLimits::default()
        .with_max_lines(cli.max_lines)
        .with_recent_lines(cli.recent_lines);
    let pipeline = PipelineBuilder::new(&cli.root).limits(limits).build()?;

    let app = router(AppState { pipeline });

    let listener = tokio::net::TcpListener::bind(cli.listen).await?;
    info!(listen = %cli.listen, root = %cli.root.display(), "chatsink-api listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route(
            "/log",
            post(ingest_via_post)
                .get(ingest_via_get)
                .options(preflight),
        )
        .route("/diagnostic", post(diagnostic))
        .route("/analytics", post(analytics))
        .route("/logs/{log}", get(recent_entries))
        .with_state(state)
        .layer(cors)
        .layer(middleware::from_fn(preflight_no_content))
        .layer(TraceLayer::new_for_http())
}

/// Preflight answers carry no body; report them as 204.
async fn preflight_no_content(request: Request, next: Next) -> Response {
    let is_preflight = request.method() == Method::OPTIONS;
    let mut response = next.run(request).await;
    if is_preflight && response.status() == StatusCode::OK {
        *response.status_mut() = StatusCode::NO_CONTENT;
    }
    response
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::error!(%error, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    {
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(error) => {
                    tracing::error!(%error, "failed to install SIGTERM handler");
                }
            }
        };

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await;
    }
}
