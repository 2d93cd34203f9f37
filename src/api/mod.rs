// HTTP APIs: session endpoints, Gmail relay, text-generation relay

pub mod ai;
pub mod auth;
pub mod gmail;

pub use ai::create_ai_router;
pub use auth::{create_auth_router, GoogleProvider, IdentityProvider};
pub use gmail::create_gmail_router;

use crate::config::{AppConfig, Secrets};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::{services::ServeDir, trace::TraceLayer};

/// Shared application state.
///
/// Immutable for the lifetime of the process: configuration, secrets, the
/// identity provider and a pooled HTTP client. There is no per-user state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub secrets: Arc<Secrets>,
    pub provider: Arc<dyn IdentityProvider>,
    pub http: reqwest::Client,
}

impl AppState {
    /// State backed by the real Google provider.
    pub fn new(config: AppConfig, secrets: Secrets) -> Self {
        let http = reqwest::Client::new();
        let provider = Arc::new(GoogleProvider::new(http.clone(), &config.google));
        Self {
            config: Arc::new(config),
            secrets: Arc::new(secrets),
            provider,
            http,
        }
    }
}

/// JSON error body: `{"error": "..."}`
#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Error response with a status code and a short, non-sensitive message.
#[derive(Debug)]
pub struct ErrorResponse {
    pub status: StatusCode,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(status: StatusCode, error: impl Into<String>) -> Self {
        Self {
            status,
            error: error.into(),
        }
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { error: self.error })).into_response()
    }
}

/// Create the full application router.
///
/// Unmatched paths fall through to the static site when
/// `server.static_dir` exists.
pub fn create_router(state: AppState) -> Router {
    let static_dir = state.config.server.static_dir.clone();
    let state = Arc::new(state);

    let router = Router::new()
        .merge(create_auth_router(Arc::clone(&state)))
        .merge(create_gmail_router(Arc::clone(&state)))
        .merge(create_ai_router(state));

    let router = if static_dir.is_dir() {
        router.fallback_service(ServeDir::new(static_dir))
    } else {
        router
    };

    router.layer(TraceLayer::new_for_http())
}
