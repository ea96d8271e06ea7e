use crate::config::Config;
use crate::error::{ErrorResponse, INTERNAL_ERROR_MESSAGE};
use crate::handlers::{
    contact, get_videos, health_check, history_body, history_query, list_diseases, not_found, root,
    save_symptom, symptom_types, AppState, SharedState,
};
use crate::middleware::{logging_middleware, rate_limit_middleware};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{middleware, Json, Router};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::signal;
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Builds the full router for `state`.
pub fn create_app(state: SharedState) -> Router {
    let cors = cors_layer(&state.config);

    Router::new()
        .route("/", get(root))
        .route("/api/health", get(health_check))
        .route("/api/videos/:category", get(get_videos))
        .route("/api/diseases", get(list_diseases))
        .route("/api/symptoms", post(save_symptom))
        .route("/api/symptoms/types", get(symptom_types))
        .route("/api/symptoms/history", post(history_body))
        .route("/api/history", get(history_query))
        .route("/api/contact", get(contact))
        .fallback(not_found)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(middleware::from_fn(logging_middleware))
                .layer(middleware::from_fn_with_state(state.clone(), rate_limit_middleware))
                .layer(CatchPanicLayer::custom(panic_response)),
        )
        .with_state(state)
}

/// Answers a panicking handler with the generic internal error body.
fn panic_response(panic: Box<dyn std::any::Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("non-string panic payload");
    tracing::error!(panic = %detail, "Handler panicked");

    let body = ErrorResponse::new("internal_error", INTERNAL_ERROR_MESSAGE, 500);
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}

fn cors_layer(config: &Config) -> CorsLayer {
    let origins = config.allowed_origins();
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    if origins.iter().any(|origin| origin == "*") {
        return layer.allow_origin(Any);
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Skipping unparsable CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(parsed))
}

/// Periodically drops idle rate limit windows and sheet locks.
pub fn spawn_sweeper(state: SharedState, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // First tick fires immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let clients = state.rate_limiter.cleanup_expired();
            let locks = state.history.locks().prune_idle();
            tracing::debug!(clients, locks, "Sweep complete");
        }
    })
}

pub struct Server {
    state: SharedState,
}

impl Server {
    pub fn new(config: Config) -> Self {
        Self {
            state: AppState::new(config),
        }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let config = &self.state.config;
        let address = config.bind_address();
        let listener = tokio::net::TcpListener::bind(&address).await?;

        tracing::info!("Patient education server listening on {}", address);
        tracing::info!("Health check available at /api/health");

        let sweeper = spawn_sweeper(self.state.clone(), config.cleanup_interval());
        let app = create_app(self.state.clone());

        let served = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .with_graceful_shutdown(shutdown_signal())
            .await;

        sweeper.abort();
        served?;
        tracing::info!("Server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        },
    }
}
