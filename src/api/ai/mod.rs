//! Text-generation relay: single-email analysis and weekly insights.
//!
//! Pure request/response relay to the Anthropic Messages API. A valid
//! session is required; no provider call is made to check it.

pub mod client;

pub use client::{AnthropicClient, Completion, Usage};

use super::auth::{AccessTokenRenewer, RenewError, SESSION_COOKIE};
use super::{AppState, ErrorResponse};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::post,
    Router,
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info};

const ANALYSIS_MAX_TOKENS: u32 = 1024;
const INSIGHTS_MAX_TOKENS: u32 = 1500;

/// Snippet length per email in the weekly digest prompt
const INSIGHTS_SNIPPET_CHARS: usize = 80;

/// Email fields the client sends for analysis
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmailInput {
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub snippet: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    #[serde(default)]
    email: Option<EmailInput>,
}

#[derive(Debug, Deserialize)]
pub struct InsightsRequest {
    #[serde(default)]
    emails: Option<Vec<EmailInput>>,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub analysis: String,
    pub usage: Usage,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightsResponse {
    pub insights: String,
    pub email_count: usize,
    pub usage: Usage,
}

/// Create text-generation router
pub fn create_ai_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/ai/analyze-email", post(analyze_email))
        .route("/api/ai/weekly-insights", post(weekly_insights))
        .with_state(state)
}

/// Checks the session and returns a client for the configured API key.
fn authorized_client(state: &AppState, jar: &CookieJar) -> Result<AnthropicClient, ErrorResponse> {
    let session = jar.get(SESSION_COOKIE).map(|c| c.value().to_string());
    let renewer = AccessTokenRenewer::new(&state.config, &state.secrets, state.provider.as_ref());

    renewer.verify(session.as_deref()).map_err(|e| match e {
        RenewError::Unauthenticated => ErrorResponse::new(StatusCode::UNAUTHORIZED, "Not authenticated"),
        RenewError::InvalidSession(_) => ErrorResponse::new(StatusCode::UNAUTHORIZED, "Invalid session"),
        other => {
            error!(error = %other, "Session check failed");
            ErrorResponse::new(StatusCode::INTERNAL_SERVER_ERROR, "Server configuration error")
        }
    })?;

    let api_key = state.secrets.anthropic_api_key().map_err(|_| {
        error!("ANTHROPIC_API_KEY not set");
        ErrorResponse::new(StatusCode::INTERNAL_SERVER_ERROR, "Anthropic API key not configured")
    })?;

    Ok(AnthropicClient::new(
        state.http.clone(),
        &state.config.anthropic.api_url,
        api_key,
    ))
}

/// Unreadable request bodies get the same JSON error shape as invalid ones.
fn bad_body(rejection: JsonRejection, message: &'static str) -> ErrorResponse {
    debug!(error = %rejection.body_text(), "Rejected request body");
    ErrorResponse::new(StatusCode::BAD_REQUEST, message)
}

fn field(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("")
}

fn analysis_prompt(email: &EmailInput) -> String {
    let body = email
        .body
        .as_deref()
        .filter(|b| !b.is_empty())
        .unwrap_or(field(&email.snippet));

    format!(
        "Analyze this email and provide actionable recommendations:\n\n\
         Subject: {}\nFrom: {}\nDate: {}\nBody: {}\n\n\
         Please provide:\n\
         1. A brief summary (1-2 sentences)\n\
         2. Priority level (High/Medium/Low)\n\
         3. Recommended action items\n\
         4. Suggested response tone (if reply needed)\n\n\
         Keep your response concise and actionable.",
        field(&email.subject),
        field(&email.from),
        field(&email.date),
        body
    )
}

fn insights_prompt(emails: &[EmailInput]) -> String {
    let digest = emails
        .iter()
        .enumerate()
        .map(|(idx, email)| {
            let snippet: String = field(&email.snippet).chars().take(INSIGHTS_SNIPPET_CHARS).collect();
            format!(
                "{}. From: {}\n   Subject: {}\n   {}...",
                idx + 1,
                field(&email.from),
                field(&email.subject),
                snippet
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "Analyze these {} emails from the past week and provide strategic insights:\n\n\
         {}\n\n\
         Please provide a comprehensive analysis with:\n\n\
         ## Overview\n- Total emails analyzed\n- Key themes and patterns\n\n\
         ## High Priority Items\n- What needs immediate attention (with specific email references)\n- Urgent deadlines or requests\n\n\
         ## Key Insights\n- Notable trends or patterns\n- Important conversations or threads\n- People who need responses\n\n\
         ## Recommended Next Actions\n- Top 3-5 specific action items\n- Prioritized by urgency and impact\n\n\
         ## Communication Breakdown\n- Who's contacting you most\n- Topic distribution\n\n\
         Keep it concise, actionable, and specific. Reference email numbers when recommending actions.",
        emails.len(),
        digest
    )
}

/// POST /api/ai/analyze-email
async fn analyze_email(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    body: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Response {
    let client = match authorized_client(&state, &jar) {
        Ok(client) => client,
        Err(e) => return e.into_response(),
    };

    let email = match body {
        Ok(Json(AnalyzeRequest {
            email: Some(email),
        })) if email.subject.is_some() && email.from.is_some() => email,
        Ok(_) => return ErrorResponse::new(StatusCode::BAD_REQUEST, "Invalid email data").into_response(),
        Err(rejection) => return bad_body(rejection, "Invalid email data").into_response(),
    };

    let model = &state.config.anthropic.analysis_model;
    match client.complete(model, ANALYSIS_MAX_TOKENS, &analysis_prompt(&email)).await {
        Ok(completion) => {
            info!(
                input_tokens = completion.usage.input_tokens,
                output_tokens = completion.usage.output_tokens,
                "Email analysis complete"
            );
            Json(AnalyzeResponse {
                analysis: completion.text,
                usage: completion.usage,
            })
            .into_response()
        }
        Err(e) => {
            error!(error = %e, "Email analysis failed");
            ErrorResponse::new(StatusCode::INTERNAL_SERVER_ERROR, "Failed to analyze email").into_response()
        }
    }
}

/// POST /api/ai/weekly-insights
async fn weekly_insights(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    body: Result<Json<InsightsRequest>, JsonRejection>,
) -> Response {
    let client = match authorized_client(&state, &jar) {
        Ok(client) => client,
        Err(e) => return e.into_response(),
    };

    let emails = match body {
        Ok(Json(InsightsRequest {
            emails: Some(emails),
        })) if !emails.is_empty() => emails,
        Ok(_) => return ErrorResponse::new(StatusCode::BAD_REQUEST, "No emails provided").into_response(),
        Err(rejection) => return bad_body(rejection, "No emails provided").into_response(),
    };

    info!(email_count = emails.len(), "Generating weekly insights");

    let model = &state.config.anthropic.insights_model;
    match client.complete(model, INSIGHTS_MAX_TOKENS, &insights_prompt(&emails)).await {
        Ok(completion) => Json(InsightsResponse {
            insights: completion.text,
            email_count: emails.len(),
            usage: completion.usage,
        })
        .into_response(),
        Err(e) => {
            error!(error = %e, "Weekly insights failed");
            ErrorResponse::new(StatusCode::INTERNAL_SERVER_ERROR, "Failed to generate insights")
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email(subject: &str, from: &str, snippet: &str) -> EmailInput {
        EmailInput {
            subject: Some(subject.to_string()),
            from: Some(from.to_string()),
            snippet: Some(snippet.to_string()),
            ..EmailInput::default()
        }
    }

    #[test]
    fn test_analysis_prompt_prefers_body() {
        let mut input = email("Invoice", "billing@example.com", "snippet text");
        input.body = Some("full body text".to_string());

        let prompt = analysis_prompt(&input);
        assert!(prompt.contains("Subject: Invoice"));
        assert!(prompt.contains("From: billing@example.com"));
        assert!(prompt.contains("Body: full body text"));
    }

    #[test]
    fn test_analysis_prompt_falls_back_to_snippet() {
        let prompt = analysis_prompt(&email("Hi", "a@example.com", "snippet text"));
        assert!(prompt.contains("Body: snippet text"));
    }

    #[test]
    fn test_insights_prompt_numbers_and_truncates() {
        let long_snippet = "x".repeat(200);
        let emails = vec![
            email("First", "a@example.com", "short"),
            email("Second", "b@example.com", &long_snippet),
        ];

        let prompt = insights_prompt(&emails);
        assert!(prompt.contains("these 2 emails"));
        assert!(prompt.contains("1. From: a@example.com\n   Subject: First\n   short..."));
        assert!(prompt.contains(&format!("   {}...", "x".repeat(80))));
        assert!(!prompt.contains(&"x".repeat(81)));
    }
}
