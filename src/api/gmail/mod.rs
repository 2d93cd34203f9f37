//! Gmail relay endpoints.
//!
//! Both handlers renew the access token from the session cookie on every
//! request; the access token is never stored server-side.

pub mod client;
pub mod mime;

pub use client::{GmailClient, GmailError, GmailMessage, ListParams};
pub use mime::{extract_body, ExtractedBody};

use super::auth::{AccessTokenRenewer, RenewError, SESSION_COOKIE};
use super::{AppState, ErrorResponse};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use axum_extra::extract::cookie::CookieJar;
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Default page size for listings
const DEFAULT_MAX_RESULTS: u32 = 20;

/// Gmail's own page size ceiling
const MAX_RESULTS_LIMIT: u32 = 500;

/// Headers fetched for each listed message
const LIST_HEADERS: [&str; 3] = ["Subject", "From", "Date"];

/// Query parameters for GET /api/gmail/list-emails
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    page_token: Option<String>,
    max_results: Option<String>,
    label_ids: Option<String>,
}

impl ListQuery {
    fn into_params(self) -> ListParams {
        let max_results = self
            .max_results
            .and_then(|v| v.trim().parse::<u32>().ok())
            .unwrap_or(DEFAULT_MAX_RESULTS)
            .clamp(1, MAX_RESULTS_LIMIT);

        let label_ids = self
            .label_ids
            .unwrap_or_else(|| "INBOX".to_string())
            .split(',')
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();

        ListParams {
            max_results,
            label_ids,
            page_token: self.page_token.filter(|t| !t.is_empty()),
        }
    }
}

/// Query parameters for GET /api/gmail/get-email
#[derive(Debug, Deserialize)]
pub struct GetQuery {
    id: Option<String>,
}

/// Listing entry
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSummary {
    pub id: String,
    pub thread_id: String,
    pub subject: String,
    pub from: String,
    pub date: String,
    pub snippet: String,
    pub label_ids: Vec<String>,
}

impl From<GmailMessage> for MessageSummary {
    fn from(message: GmailMessage) -> Self {
        Self {
            subject: message.payload.header("Subject"),
            from: message.payload.header("From"),
            date: message.payload.header("Date"),
            id: message.id,
            thread_id: message.thread_id,
            snippet: message.snippet,
            label_ids: message.label_ids,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse {
    pub messages: Vec<MessageSummary>,
    pub next_page_token: Option<String>,
}

/// A full message with its extracted body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDetail {
    pub id: String,
    pub thread_id: String,
    pub subject: String,
    pub from: String,
    pub to: String,
    pub date: String,
    pub body: String,
    pub body_html: String,
    pub snippet: String,
    pub label_ids: Vec<String>,
}

impl From<GmailMessage> for MessageDetail {
    fn from(message: GmailMessage) -> Self {
        let body = extract_body(&message.payload);
        Self {
            subject: message.payload.header("Subject"),
            from: message.payload.header("From"),
            to: message.payload.header("To"),
            date: message.payload.header("Date"),
            body: body.text,
            body_html: body.html,
            id: message.id,
            thread_id: message.thread_id,
            snippet: message.snippet,
            label_ids: message.label_ids,
        }
    }
}

/// Create Gmail router
pub fn create_gmail_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/gmail/list-emails", get(list_emails))
        .route("/api/gmail/get-email", get(get_email))
        .with_state(state)
}

/// Renews an access token for the request's session and binds a client to it.
async fn authorized_client(
    state: &AppState,
    jar: &CookieJar,
    failure_message: &'static str,
) -> Result<GmailClient, ErrorResponse> {
    let session = jar.get(SESSION_COOKIE).map(|c| c.value().to_string());
    let renewer = AccessTokenRenewer::new(&state.config, &state.secrets, state.provider.as_ref());

    let grant = renewer.renew(session.as_deref()).await.map_err(|e| match e {
        RenewError::Unauthenticated => ErrorResponse::new(StatusCode::UNAUTHORIZED, "Not authenticated"),
        RenewError::InvalidSession(_) | RenewError::CorruptOrTamperedCredential => {
            ErrorResponse::new(StatusCode::UNAUTHORIZED, "Invalid session")
        }
        RenewError::UpstreamRefreshFailed => {
            ErrorResponse::new(StatusCode::UNAUTHORIZED, "Authentication expired")
        }
        other => {
            error!(error = %other, "Access token renewal failed");
            ErrorResponse::new(StatusCode::INTERNAL_SERVER_ERROR, failure_message)
        }
    })?;

    Ok(GmailClient::new(
        state.http.clone(),
        &state.config.google.gmail_api_url,
        grant.access_token,
    ))
}

fn gmail_error(err: GmailError, failure_message: &'static str) -> ErrorResponse {
    match err {
        GmailError::Unauthorized => {
            warn!("Gmail rejected a freshly renewed access token");
            ErrorResponse::new(StatusCode::UNAUTHORIZED, "Authentication expired")
        }
        other => {
            error!(error = %other, "Gmail request failed");
            ErrorResponse::new(StatusCode::INTERNAL_SERVER_ERROR, failure_message)
        }
    }
}

/// GET /api/gmail/list-emails?pageToken&maxResults&labelIds
///
/// Lists message ids, then fetches subject/from/date for each concurrently.
async fn list_emails(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(query): Query<ListQuery>,
) -> Response {
    const FAILURE: &str = "Failed to fetch emails";

    let client = match authorized_client(&state, &jar, FAILURE).await {
        Ok(client) => client,
        Err(e) => return e.into_response(),
    };

    let params = query.into_params();
    debug!(max_results = params.max_results, labels = ?params.label_ids, "Listing messages");

    let listing = match client.list_messages(&params).await {
        Ok(listing) => listing,
        Err(e) => return gmail_error(e, FAILURE).into_response(),
    };

    if listing.messages.is_empty() {
        return Json(ListResponse {
            messages: Vec::new(),
            next_page_token: None,
        })
        .into_response();
    }

    let fetches = listing
        .messages
        .iter()
        .map(|m| client.get_metadata(&m.id, &LIST_HEADERS));

    match try_join_all(fetches).await {
        Ok(messages) => Json(ListResponse {
            messages: messages.into_iter().map(MessageSummary::from).collect(),
            next_page_token: listing.next_page_token,
        })
        .into_response(),
        Err(e) => gmail_error(e, FAILURE).into_response(),
    }
}

/// GET /api/gmail/get-email?id
async fn get_email(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(query): Query<GetQuery>,
) -> Response {
    const FAILURE: &str = "Failed to fetch email";

    let Some(id) = query.id.filter(|id| !id.is_empty()) else {
        return ErrorResponse::new(StatusCode::BAD_REQUEST, "Email ID required").into_response();
    };

    let client = match authorized_client(&state, &jar, FAILURE).await {
        Ok(client) => client,
        Err(e) => return e.into_response(),
    };

    match client.get_full(&id).await {
        Ok(message) => Json(MessageDetail::from(message)).into_response(),
        Err(e) => gmail_error(e, FAILURE).into_response(),
    }
}
