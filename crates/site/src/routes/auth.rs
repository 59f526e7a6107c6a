//! Authentication routes.
//!
//! The identity provider owns credentials; these handlers exchange them
//! for a provider session and mirror the result into the server-side
//! session cookie. A profile row is ensured on every successful sign-in
//! so first login doubles as profile creation.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::{info, warn};

use fizko_core::Email;

use crate::db::ProfileRepository;
use crate::error::{clear_sentry_user, set_sentry_user, AppError, Result};
use crate::middleware::auth::{clear_current_identity, set_current_identity, OptionalAuth};
use crate::models::CurrentIdentity;
use crate::services::identity::ProviderSession;
use crate::state::AppState;

/// Minimum accepted password length.
const MIN_PASSWORD_LENGTH: usize = 8;

#[derive(Debug, Deserialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub full_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Identity fields safe to expose to the client. The access token never
/// leaves the server-side session.
#[derive(Debug, Serialize)]
pub struct IdentityResponse {
    pub id: String,
    pub email: String,
    pub full_name: Option<String>,
}

impl From<&CurrentIdentity> for IdentityResponse {
    fn from(identity: &CurrentIdentity) -> Self {
        Self {
            id: identity.id.to_string(),
            email: identity.email.as_str().to_owned(),
            full_name: identity.full_name.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<IdentityResponse>,
}

fn validate_password(password: &str) -> Result<()> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(AppError::BadRequest(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

fn parse_email(raw: &str) -> Result<Email> {
    Email::parse(raw).map_err(|e| AppError::BadRequest(format!("invalid email: {e}")))
}

/// Mirror a provider session into the server-side session and ensure the
/// profile row exists.
async fn establish_session(
    state: &AppState,
    session: &Session,
    provider: ProviderSession,
) -> Result<CurrentIdentity> {
    let identity = CurrentIdentity {
        id: provider.identity.id,
        email: provider.identity.email.clone(),
        full_name: provider.identity.full_name.clone(),
        access_token: provider.access_token,
    };

    ProfileRepository::new(state.pool())
        .ensure(identity.id, &identity.email, identity.full_name.as_deref())
        .await?;

    // New principal, new session id.
    session
        .cycle_id()
        .await
        .map_err(|e| AppError::Internal(format!("session error: {e}")))?;
    set_current_identity(session, &identity)
        .await
        .map_err(|e| AppError::Internal(format!("session error: {e}")))?;

    set_sentry_user(&identity.id, Some(identity.email.as_str()));

    Ok(identity)
}

/// POST /api/auth/signup
pub async fn signup(
    State(state): State<AppState>,
    session: Session,
    Json(payload): Json<SignUpRequest>,
) -> Result<impl IntoResponse> {
    let email = parse_email(&payload.email)?;
    validate_password(&payload.password)?;

    let outcome = state
        .identity()
        .sign_up(&email, &payload.password, payload.full_name.as_deref())
        .await?;

    match outcome.session {
        Some(provider) => {
            let identity = establish_session(&state, &session, provider).await?;
            info!(identity_id = %identity.id, "account created");
            Ok((
                StatusCode::CREATED,
                Json(SessionResponse {
                    authenticated: true,
                    identity: Some(IdentityResponse::from(&identity)),
                }),
            ))
        }
        // Provider requires email confirmation before issuing a token.
        None => Ok((
            StatusCode::CREATED,
            Json(SessionResponse {
                authenticated: false,
                identity: None,
            }),
        )),
    }
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<SessionResponse>> {
    let email = parse_email(&payload.email)?;

    let provider = state.identity().sign_in(&email, &payload.password).await?;
    let identity = establish_session(&state, &session, provider).await?;
    info!(identity_id = %identity.id, "signed in");

    Ok(Json(SessionResponse {
        authenticated: true,
        identity: Some(IdentityResponse::from(&identity)),
    }))
}

/// POST /api/auth/logout
///
/// The local session is dropped even when the provider call fails; a
/// stale provider token expires on its own.
pub async fn logout(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(identity): OptionalAuth,
) -> Result<StatusCode> {
    if let Some(identity) = identity {
        if let Err(e) = state.identity().sign_out(&identity.access_token).await {
            warn!(error = %e, "provider sign-out failed, dropping local session anyway");
        }
    }

    clear_current_identity(&session)
        .await
        .map_err(|e| AppError::Internal(format!("session error: {e}")))?;
    session
        .flush()
        .await
        .map_err(|e| AppError::Internal(format!("session error: {e}")))?;
    clear_sentry_user();

    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/auth/session
pub async fn session_info(OptionalAuth(identity): OptionalAuth) -> Json<SessionResponse> {
    Json(SessionResponse {
        authenticated: identity.is_some(),
        identity: identity.as_ref().map(IdentityResponse::from),
    })
}
