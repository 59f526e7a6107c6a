//! Identity provider client.
//!
//! Wraps the hosted session/identity provider's REST API (GoTrue-shaped):
//! sign-up, password sign-in, current-user lookup, and sign-out. The
//! provider owns accounts; this client never stores credentials locally.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::Deserialize;
use thiserror::Error;
use tracing::instrument;

use fizko_core::{Email, IdentityId};

use crate::config::IdentityConfig;

/// Request timeout for identity provider calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors from the identity provider.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// HTTP transport failed or timed out.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider rejected the credentials.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Provider returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse the provider response.
    #[error("parse error: {0}")]
    Parse(String),
}

/// A visitor identity as reported by the provider.
#[derive(Debug, Clone)]
pub struct Identity {
    pub id: IdentityId,
    pub email: Email,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
}

/// A provider session: token plus the identity it belongs to.
#[derive(Debug, Clone)]
pub struct ProviderSession {
    pub access_token: String,
    pub identity: Identity,
}

/// Outcome of a sign-up attempt.
///
/// `session` is `None` when the provider requires email confirmation
/// before issuing a token.
#[derive(Debug, Clone)]
pub struct SignUpOutcome {
    pub session: Option<ProviderSession>,
}

// Wire shapes. The provider's payloads are wider than this; only the
// consumed fields are modeled.

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    user: Option<UserResponse>,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    id: String,
    email: String,
    #[serde(default)]
    user_metadata: UserMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct UserMetadata {
    full_name: Option<String>,
    avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(alias = "error_description", alias = "msg")]
    message: Option<String>,
}

impl TryFrom<UserResponse> for Identity {
    type Error = IdentityError;

    fn try_from(user: UserResponse) -> Result<Self, Self::Error> {
        let id: IdentityId = user
            .id
            .parse()
            .map_err(|e| IdentityError::Parse(format!("invalid identity id: {e}")))?;
        let email = Email::parse(&user.email)
            .map_err(|e| IdentityError::Parse(format!("invalid identity email: {e}")))?;

        Ok(Self {
            id,
            email,
            full_name: user.user_metadata.full_name,
            avatar_url: user.user_metadata.avatar_url,
        })
    }
}

/// Client for the hosted identity provider.
#[derive(Clone)]
pub struct IdentityClient {
    client: reqwest::Client,
    api_url: String,
}

impl IdentityClient {
    /// Create a new identity provider client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(config: &IdentityConfig) -> Result<Self, IdentityError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "apikey",
            HeaderValue::from_str(config.api_key.expose_secret())
                .map_err(|e| IdentityError::Parse(format!("invalid API key format: {e}")))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_owned(),
        })
    }

    /// Sign up a new identity with email and password.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider rejects the request.
    #[instrument(skip(self, password))]
    pub async fn sign_up(
        &self,
        email: &Email,
        password: &str,
        full_name: Option<&str>,
    ) -> Result<SignUpOutcome, IdentityError> {
        let url = format!("{}/signup", self.api_url);
        let body = serde_json::json!({
            "email": email.as_str(),
            "password": password,
            "data": { "full_name": full_name },
        });

        let response = self.client.post(&url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(error_from_response(status, response).await);
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| IdentityError::Parse(e.to_string()))?;

        let session = match (token.access_token, token.user) {
            (Some(access_token), Some(user)) => Some(ProviderSession {
                access_token,
                identity: Identity::try_from(user)?,
            }),
            // Confirmation-required flow: no token until the email is verified.
            _ => None,
        };

        Ok(SignUpOutcome { session })
    }

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::InvalidCredentials` when the provider
    /// rejects the credentials, other errors for transport failures.
    #[instrument(skip(self, password))]
    pub async fn sign_in(
        &self,
        email: &Email,
        password: &str,
    ) -> Result<ProviderSession, IdentityError> {
        let url = format!("{}/token?grant_type=password", self.api_url);
        let body = serde_json::json!({
            "email": email.as_str(),
            "password": password,
        });

        let response = self.client.post(&url).json(&body).send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::BAD_REQUEST
            || status == reqwest::StatusCode::UNAUTHORIZED
        {
            return Err(IdentityError::InvalidCredentials);
        }
        if !status.is_success() {
            return Err(error_from_response(status, response).await);
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| IdentityError::Parse(e.to_string()))?;

        match (token.access_token, token.user) {
            (Some(access_token), Some(user)) => Ok(ProviderSession {
                access_token,
                identity: Identity::try_from(user)?,
            }),
            _ => Err(IdentityError::Parse(
                "token response missing access_token or user".to_owned(),
            )),
        }
    }

    /// Fetch the identity behind an access token.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is invalid or the call fails.
    #[instrument(skip(self, access_token))]
    pub async fn get_user(&self, access_token: &str) -> Result<Identity, IdentityError> {
        let url = format!("{}/user", self.api_url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(error_from_response(status, response).await);
        }

        let user: UserResponse = response
            .json()
            .await
            .map_err(|e| IdentityError::Parse(e.to_string()))?;

        Identity::try_from(user)
    }

    /// Invalidate a provider session (sign out).
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails. Callers clear the local session
    /// regardless of the outcome.
    #[instrument(skip(self, access_token))]
    pub async fn sign_out(&self, access_token: &str) -> Result<(), IdentityError> {
        let url = format!("{}/logout", self.api_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(access_token)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(error_from_response(status, response).await);
        }

        Ok(())
    }
}

/// Map a non-success provider response to an `IdentityError`.
async fn error_from_response(
    status: reqwest::StatusCode,
    response: reqwest::Response,
) -> IdentityError {
    let message = response
        .json::<ErrorResponse>()
        .await
        .ok()
        .and_then(|e| e.message)
        .unwrap_or_else(|| "unknown provider error".to_owned());

    IdentityError::Api {
        status: status.as_u16(),
        message,
    }
}
