//! External assistant client.
//!
//! The fiscal assistant lives behind a hosted conversation API. Each send
//! carries the visitor's message plus an optional conversation id so the
//! provider can thread follow-ups.

use std::time::Duration;

use secrecy::ExposeSecret;
use serde::Deserialize;
use thiserror::Error;
use tracing::instrument;

use crate::config::AssistantConfig;

/// Request timeout for assistant calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors from the assistant provider.
#[derive(Debug, Error)]
pub enum AssistantError {
    /// HTTP transport failed or timed out.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Response carried no usable reply text.
    #[error("empty assistant reply")]
    EmptyReply,

    /// Failed to parse the provider response.
    #[error("parse error: {0}")]
    Parse(String),
}

/// A reply from the assistant.
#[derive(Debug, Clone)]
pub struct AssistantReply {
    pub text: String,
    /// Conversation thread id to pass back on the next turn.
    pub conversation_id: Option<String>,
}

/// Transport that delivers a visitor message and returns the reply.
///
/// Implemented by [`AssistantClient`] in production and by fakes in
/// conversation tests.
#[allow(async_fn_in_trait)]
pub trait AssistantTransport {
    async fn send(
        &self,
        message: &str,
        conversation_id: Option<&str>,
        user_id: Option<&str>,
    ) -> Result<AssistantReply, AssistantError>;
}

// Wire shapes.

#[derive(Debug, Deserialize)]
struct ConversationResponse {
    message: Option<MessageObject>,
    #[serde(default)]
    messages: Vec<MessageObject>,
    #[serde(rename = "conversationId")]
    conversation_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageObject {
    text: Option<String>,
}

/// REST client for the hosted assistant.
#[derive(Clone)]
pub struct AssistantClient {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    bot_id: String,
}

impl AssistantClient {
    /// Create a new assistant client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(config: &AssistantConfig) -> Result<Self, AssistantError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_owned(),
            api_key: config.api_key.expose_secret().to_owned(),
            bot_id: config.bot_id.clone(),
        })
    }
}

impl AssistantTransport for AssistantClient {
    #[instrument(skip(self, message))]
    async fn send(
        &self,
        message: &str,
        conversation_id: Option<&str>,
        user_id: Option<&str>,
    ) -> Result<AssistantReply, AssistantError> {
        let url = format!("{}/v1/chat/{}/conversations", self.api_url, self.bot_id);
        let body = serde_json::json!({
            "message": message,
            "conversationId": conversation_id,
            "userId": user_id,
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AssistantError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ConversationResponse = response
            .json()
            .await
            .map_err(|e| AssistantError::Parse(e.to_string()))?;

        // Providers respond with either a single message or a batch; take
        // the first non-empty text either way.
        let text = parsed
            .message
            .and_then(|m| m.text)
            .or_else(|| parsed.messages.into_iter().find_map(|m| m.text))
            .filter(|t| !t.trim().is_empty())
            .ok_or(AssistantError::EmptyReply)?;

        Ok(AssistantReply {
            text,
            conversation_id: parsed.conversation_id,
        })
    }
}
