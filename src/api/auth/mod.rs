//! Session endpoints: OAuth login, callback, token refresh and logout.
//!
//! Implements the authorization code flow:
//! 1. GET /auth/login → set `oauth_state` cookie, redirect to provider
//! 2. User authorizes on provider's site
//! 3. Provider redirects to /auth/callback?code&state
//! 4. Validate state, exchange code, encrypt refresh token, sign session
//! 5. Set `session` cookie and redirect to /portal.html
//! 6. POST /auth/refresh turns the session into a short-lived access token

pub mod csrf;
pub mod flow;
pub mod provider;
pub mod renewer;

pub use flow::{AuthFailure, AuthorizationFlow, CallbackParams, FlowState, SessionIssued};
pub use provider::{GoogleProvider, IdentityProvider, ProviderError, ProviderTokens, UserInfo};
pub use renewer::{AccessGrant, AccessTokenRenewer, RenewError};

use super::{AppState, ErrorResponse};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Redirect, Response},
    routing::{get, post},
    Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use futures::FutureExt;
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error};

/// Cookie carrying the signed session token
pub const SESSION_COOKIE: &str = "session";

/// Landing page after a successful login
pub const PORTAL_PATH: &str = "/portal.html";

/// `session` cookie for a freshly signed token.
pub fn session_cookie(token: String, ttl_seconds: i64) -> Cookie<'static> {
    csrf::secure_cookie(SESSION_COOKIE, token, ttl_seconds)
}

/// Expired `session` cookie with the same attributes, clearing it.
pub fn clear_session_cookie() -> Cookie<'static> {
    csrf::secure_cookie(SESSION_COOKIE, String::new(), 0)
}

/// Create auth router
pub fn create_auth_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/auth/login", get(login))
        .route("/auth/callback", get(callback))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
        .with_state(state)
}

/// GET /auth/login
///
/// Starts the OAuth flow by redirecting to the provider's consent screen.
///
/// # Security
/// - Generates a CSRF state, stored only in the `oauth_state` cookie (10 minutes)
/// - Fails with 500 and sets no cookie when client id or redirect URI is missing
async fn login(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    let flow = AuthorizationFlow::new(&state.config, &state.secrets, state.provider.as_ref());

    match flow.begin() {
        FlowState::AwaitingCallback { auth_url, state: csrf_state } => {
            let jar = jar.add(csrf::state_cookie(
                &csrf_state,
                state.config.session.state_ttl_seconds,
            ));
            (jar, Redirect::temporary(&auth_url)).into_response()
        }
        other => {
            debug!(state = ?other, "Login could not start");
            ErrorResponse::new(StatusCode::INTERNAL_SERVER_ERROR, "Server configuration error")
                .into_response()
        }
    }
}

/// GET /auth/callback
///
/// Always answers with a redirect: to `/portal.html` with a fresh `session`
/// cookie, or to `/?error=<code>`. The `oauth_state` cookie is cleared on
/// every outcome so a state value cannot be replayed.
async fn callback(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> Response {
    debug!(
        has_code = params.code.is_some(),
        has_error = params.error.is_some(),
        "OAuth callback received"
    );

    let state_cookie = jar.get(csrf::STATE_COOKIE).map(|c| c.value().to_string());
    let flow = AuthorizationFlow::new(&state.config, &state.secrets, state.provider.as_ref());

    // A panic anywhere in the flow still ends in an opaque redirect
    let outcome = AssertUnwindSafe(flow.complete(params, state_cookie.as_deref()))
        .catch_unwind()
        .await
        .unwrap_or_else(|_| {
            error!("OAuth callback panicked");
            FlowState::Failed(AuthFailure::AuthenticationFailed)
        });

    let jar = jar.add(csrf::clear_state_cookie());

    match outcome {
        FlowState::Authenticated(issued) => {
            let jar = jar.add(session_cookie(issued.token, state.config.session.ttl_seconds));
            (jar, Redirect::temporary(PORTAL_PATH)).into_response()
        }
        FlowState::Failed(failure) => {
            (jar, Redirect::temporary(&failure.redirect_target())).into_response()
        }
        FlowState::AwaitingRedirect | FlowState::AwaitingCallback { .. } => {
            error!("OAuth callback ended in a non-terminal state");
            let failure = AuthFailure::AuthenticationFailed;
            (jar, Redirect::temporary(&failure.redirect_target())).into_response()
        }
    }
}

/// POST /auth/refresh
///
/// Returns `{access_token, expires_in}` for the current session.
async fn refresh(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    let session = jar.get(SESSION_COOKIE).map(|c| c.value().to_string());
    let renewer = AccessTokenRenewer::new(&state.config, &state.secrets, state.provider.as_ref());

    match renewer.renew(session.as_deref()).await {
        Ok(grant) => Json(grant).into_response(),
        Err(e) => refresh_error(e).into_response(),
    }
}

/// Maps renewal failures to the refresh endpoint's status codes.
fn refresh_error(err: RenewError) -> ErrorResponse {
    match err {
        RenewError::Unauthenticated => {
            ErrorResponse::new(StatusCode::UNAUTHORIZED, "No session found")
        }
        RenewError::InvalidSession(_) => {
            ErrorResponse::new(StatusCode::UNAUTHORIZED, "Invalid or expired session")
        }
        RenewError::CorruptOrTamperedCredential => {
            ErrorResponse::new(StatusCode::UNAUTHORIZED, "Invalid session credential")
        }
        RenewError::UpstreamRefreshFailed => {
            ErrorResponse::new(StatusCode::UNAUTHORIZED, "Failed to refresh token")
        }
        RenewError::Misconfigured(e) => {
            error!(error = %e, "Token refresh not configured");
            ErrorResponse::new(StatusCode::INTERNAL_SERVER_ERROR, "Server configuration error")
        }
        RenewError::Upstream(e) => {
            error!(error = %e, "Token refresh failed");
            ErrorResponse::new(StatusCode::INTERNAL_SERVER_ERROR, "Token refresh failed")
        }
    }
}

#[derive(Serialize)]
struct LogoutResponse {
    success: bool,
}

/// POST /auth/logout
///
/// Clears the `session` cookie. The token itself stays valid until it
/// expires; there is no server-side revocation.
async fn logout(jar: CookieJar) -> impl IntoResponse {
    (jar.add(clear_session_cookie()), Json(LogoutResponse { success: true }))
}
