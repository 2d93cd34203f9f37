use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Messages API version header value
const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Serialize)]
struct MessageRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: [UserMessage<'a>; 1],
}

#[derive(Serialize)]
struct UserMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessageResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    usage: Usage,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

/// Token accounting reported by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Generated text and its token usage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    pub usage: Usage,
}

/// Minimal client for the Anthropic Messages API.
pub struct AnthropicClient {
    http: Client,
    api_url: String,
    api_key: String,
}

impl AnthropicClient {
    pub fn new(http: Client, api_url: &str, api_key: &str) -> Self {
        Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    /// Sends a single user prompt and returns the first text block.
    pub async fn complete(&self, model: &str, max_tokens: u32, prompt: &str) -> Result<Completion> {
        let request = MessageRequest {
            model,
            max_tokens,
            messages: [UserMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .http
            .post(format!("{}/v1/messages", self.api_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
            .context("Failed to send messages request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow!("Messages API returned {}: {}", status, body));
        }

        let reply: MessageResponse = response
            .json()
            .await
            .context("Failed to parse messages response")?;

        let text = reply
            .content
            .into_iter()
            .find(|block| block.kind == "text")
            .and_then(|block| block.text)
            .ok_or_else(|| anyhow!("Messages response contained no text block"))?;

        Ok(Completion {
            text,
            usage: reply.usage,
        })
    }
}
