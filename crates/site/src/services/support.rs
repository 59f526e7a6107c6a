//! Support contact form delivery.
//!
//! Tickets from the contact form are delivered by a hosted email
//! provider: one notification to the support inbox and one confirmation
//! back to the visitor. The notification is the ticket; the confirmation
//! is best-effort, since the team already has the message by then.

use std::time::Duration;

use secrecy::ExposeSecret;
use serde::Deserialize;
use thiserror::Error;
use tracing::{instrument, warn};

use fizko_core::Email;

use crate::config::SupportConfig;

/// Request timeout for email provider calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors from the support email delivery.
#[derive(Debug, Error)]
pub enum SupportError {
    /// HTTP transport failed or timed out.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse the provider response.
    #[error("parse error: {0}")]
    Parse(String),
}

/// One submitted contact-form ticket.
#[derive(Debug, Clone)]
pub struct SupportTicket {
    pub name: String,
    pub email: Email,
    pub subject: String,
    pub message: String,
}

// Wire shapes.

#[derive(Debug, Deserialize)]
struct SendResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
}

/// REST client for the hosted email provider.
#[derive(Clone)]
pub struct SupportClient {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    inbox: String,
    from_address: String,
}

impl SupportClient {
    /// Create a new support email client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(config: &SupportConfig) -> Result<Self, SupportError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_owned(),
            api_key: config.api_key.expose_secret().to_owned(),
            inbox: config.inbox.clone(),
            from_address: config.from_address.clone(),
        })
    }

    /// Deliver a ticket: notification to the inbox, confirmation to the
    /// visitor.
    ///
    /// # Errors
    ///
    /// Fails only when the inbox notification cannot be delivered; a
    /// failed confirmation is logged and swallowed because the ticket
    /// has already reached the team.
    #[instrument(skip(self, ticket), fields(subject = %ticket.subject))]
    pub async fn submit(&self, ticket: &SupportTicket) -> Result<(), SupportError> {
        let notification = notification_payload(ticket, &self.from_address, &self.inbox);
        self.send_email(&notification).await?;

        let confirmation = confirmation_payload(ticket, &self.from_address);
        if let Err(e) = self.send_email(&confirmation).await {
            warn!(error = %e, "confirmation email failed, ticket already delivered");
        }

        Ok(())
    }

    async fn send_email(&self, payload: &serde_json::Value) -> Result<String, SupportError> {
        let url = format!("{}/emails", self.api_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ApiErrorBody>()
                .await
                .ok()
                .and_then(|e| e.message)
                .unwrap_or_else(|| "unknown provider error".to_owned());
            return Err(SupportError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let sent: SendResponse = response
            .json()
            .await
            .map_err(|e| SupportError::Parse(e.to_string()))?;

        Ok(sent.id)
    }
}

/// Escape the characters that would break out of the email markup.
fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Render free-form message text as email-safe HTML.
fn message_html(message: &str) -> String {
    escape_html(message).replace('\n', "<br>")
}

/// The notification sent to the support inbox.
///
/// Reply-to is the visitor, so the team answers the ticket directly.
fn notification_payload(ticket: &SupportTicket, from: &str, inbox: &str) -> serde_json::Value {
    serde_json::json!({
        "from": from,
        "to": [inbox],
        "reply_to": ticket.email.as_str(),
        "subject": format!("[SUPORTE] {}", ticket.subject),
        "html": format!(
            "<h2>Nova mensagem de suporte</h2>\
             <p><strong>Nome:</strong> {}</p>\
             <p><strong>Email:</strong> {}</p>\
             <p><strong>Assunto:</strong> {}</p>\
             <h3>Mensagem:</h3><p>{}</p>",
            escape_html(&ticket.name),
            escape_html(ticket.email.as_str()),
            escape_html(&ticket.subject),
            message_html(&ticket.message),
        ),
    })
}

/// The confirmation sent back to the visitor.
fn confirmation_payload(ticket: &SupportTicket, from: &str) -> serde_json::Value {
    serde_json::json!({
        "from": from,
        "to": [ticket.email.as_str()],
        "subject": "Mensagem recebida - FIZK.O",
        "html": format!(
            "<h1>Obrigado pelo contato, {}!</h1>\
             <p>Recebemos sua mensagem e nossa equipe entrará em contato em breve.</p>\
             <p><strong>Assunto:</strong> {}</p>\
             <p>{}</p>",
            escape_html(&ticket.name),
            escape_html(&ticket.subject),
            message_html(&ticket.message),
        ),
    })
}
