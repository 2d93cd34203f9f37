use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;

/// Gmail API failures.
#[derive(Debug, Error)]
pub enum GmailError {
    /// The access token was refused (HTTP 401)
    #[error("Gmail rejected the access token")]
    Unauthorized,
    #[error("Gmail API error: {0}")]
    Api(StatusCode),
    #[error("Gmail request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Reference to a message in a listing.
#[derive(Debug, Deserialize)]
pub struct MessageRef {
    pub id: String,
}

/// One page of `users.messages.list`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageList {
    #[serde(default)]
    pub messages: Vec<MessageRef>,
    pub next_page_token: Option<String>,
}

/// Message header.
#[derive(Debug, Clone, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

/// Body of a MIME part (base64url data).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartBody {
    pub data: Option<String>,
}

/// MIME part tree.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePart {
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub headers: Vec<Header>,
    pub body: Option<PartBody>,
    #[serde(default)]
    pub parts: Vec<MessagePart>,
}

impl MessagePart {
    /// Value of the first header named `name`, or an empty string.
    pub fn header(&self, name: &str) -> String {
        self.headers
            .iter()
            .find(|h| h.name == name)
            .map(|h| h.value.clone())
            .unwrap_or_default()
    }
}

/// A Gmail message resource.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GmailMessage {
    pub id: String,
    pub thread_id: String,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub label_ids: Vec<String>,
    #[serde(default)]
    pub payload: MessagePart,
}

/// Listing parameters.
#[derive(Debug, Clone)]
pub struct ListParams {
    pub max_results: u32,
    pub label_ids: Vec<String>,
    pub page_token: Option<String>,
}

/// HTTP client for the Gmail REST API, bound to one access token.
pub struct GmailClient {
    http: Client,
    base_url: String,
    access_token: String,
}

impl GmailClient {
    pub fn new(http: Client, base_url: &str, access_token: String) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token,
        }
    }

    fn messages_url(&self) -> String {
        format!("{}/gmail/v1/users/me/messages", self.base_url)
    }

    /// Lists message ids.
    pub async fn list_messages(&self, params: &ListParams) -> Result<MessageList, GmailError> {
        let mut query: Vec<(&str, String)> = vec![("maxResults", params.max_results.to_string())];
        query.extend(params.label_ids.iter().map(|l| ("labelIds", l.clone())));
        if let Some(token) = &params.page_token {
            query.push(("pageToken", token.clone()));
        }

        let response = self
            .http
            .get(self.messages_url())
            .bearer_auth(&self.access_token)
            .query(&query)
            .send()
            .await?;

        Ok(check_response(response)?.json().await?)
    }

    /// Fetches a message with only the given headers.
    pub async fn get_metadata(&self, id: &str, headers: &[&str]) -> Result<GmailMessage, GmailError> {
        let mut query: Vec<(&str, &str)> = vec![("format", "metadata")];
        query.extend(headers.iter().map(|h| ("metadataHeaders", *h)));

        self.get_message(id, &query).await
    }

    /// Fetches a full message including the MIME tree.
    pub async fn get_full(&self, id: &str) -> Result<GmailMessage, GmailError> {
        self.get_message(id, &[("format", "full")]).await
    }

    async fn get_message(&self, id: &str, query: &[(&str, &str)]) -> Result<GmailMessage, GmailError> {
        let url = format!("{}/{}", self.messages_url(), urlencoding::encode(id));
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.access_token)
            .query(query)
            .send()
            .await?;

        Ok(check_response(response)?.json().await?)
    }
}

fn check_response(response: reqwest::Response) -> Result<reqwest::Response, GmailError> {
    match response.status() {
        StatusCode::UNAUTHORIZED => Err(GmailError::Unauthorized),
        s if !s.is_success() => Err(GmailError::Api(s)),
        _ => Ok(response),
    }
}
