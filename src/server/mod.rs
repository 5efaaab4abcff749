//! The HTTP application: routes, shared state and the serve loop.

mod cookies;
mod dynamic;
mod encoding;
mod extract;
mod inspect;
mod paced;

pub use extract::{PrettyJson, RequestInfo};

use crate::config::Config;
use crate::layer::CompressionLayer;
use crate::pool::CodecPool;
use crate::select::StatusSelector;
use axum::Router;
use axum::routing::{any, delete, get, patch, post, put};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub pool: CodecPool,
    pub selector: Arc<StatusSelector>,
}

impl AppState {
    /// Builds state from a validated configuration.
    ///
    /// Fails when the configured compression level is unusable, so a bad
    /// level is reported once at startup rather than on every request.
    pub fn new(config: Config) -> crate::Result<Self> {
        let pool = CodecPool::with_max_idle(config.compression_level, config.max_idle_encoders)?;
        Ok(Self {
            config: Arc::new(config),
            pool,
            selector: Arc::new(StatusSelector::new()),
        })
    }

    /// Replaces the status selector, e.g. with a seeded one.
    pub fn with_selector(mut self, selector: StatusSelector) -> Self {
        self.selector = Arc::new(selector);
        self
    }
}

/// Builds the router with every endpoint and the tracing layer.
pub fn app(state: AppState) -> Router {
    let gzip = CompressionLayer::gzip(state.pool.clone());
    let deflate = CompressionLayer::deflate(state.pool.clone());

    Router::new()
        // HTTP methods
        .route("/get", get(inspect::get))
        .route("/post", post(inspect::submitted))
        .route("/put", put(inspect::submitted))
        .route("/patch", patch(inspect::submitted))
        .route("/delete", delete(inspect::submitted))
        .route("/anything", any(inspect::anything))
        .route("/anything/{*rest}", any(inspect::anything))
        // Request inspection
        .route("/ip", get(inspect::ip))
        .route("/headers", get(inspect::headers))
        .route("/user-agent", get(inspect::user_agent))
        // Dynamic data
        .route("/uuid", get(dynamic::uuid))
        .route("/delay/{delay}", any(dynamic::delay))
        .route("/base64/{value}", get(dynamic::base64))
        .route("/bytes/{n}", get(dynamic::bytes))
        .route("/stream-bytes/{n}", get(dynamic::stream_bytes))
        .route("/stream/{n}", get(dynamic::stream))
        .route("/range/{n}", get(paced::range))
        .route("/drip", get(paced::drip))
        .route("/links/{n}/{offset}", get(dynamic::links))
        // Cookies
        .route("/cookies", get(cookies::list))
        .route("/cookies/set", get(cookies::set_from_query))
        .route("/cookies/set/{name}/{value}", get(cookies::set_from_path))
        .route("/cookies/delete", get(cookies::delete))
        // Status codes
        .route("/status/{codes}", any(dynamic::status))
        // Response formats
        .route("/gzip", any(encoding::gzipped).layer(gzip))
        .route("/deflate", any(encoding::deflated).layer(deflate))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Serves the application on `listener` until Ctrl+C.
pub async fn run(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, "HTTP server starting");

    let service = app(state).into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(e) => {
            tracing::error!(error = %e, "failed to listen for Ctrl+C; running until killed");
            std::future::pending::<()>().await;
        }
    }
}
