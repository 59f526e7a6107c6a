//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::access::AccessError;
use crate::services::assistant::AssistantError;
use crate::services::billing::BillingError;
use crate::services::checkout::CheckoutError;
use crate::services::identity::IdentityError;
use crate::services::postal::PostalError;
use crate::services::support::SupportError;
use crate::services::taxdata::TaxDataError;

/// Application-level error type for the site.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Identity provider operation failed.
    #[error("Identity error: {0}")]
    Identity(#[from] IdentityError),

    /// Payment processor operation failed.
    #[error("Billing error: {0}")]
    Billing(#[from] BillingError),

    /// Assistant provider operation failed.
    #[error("Assistant error: {0}")]
    Assistant(#[from] AssistantError),

    /// Postal lookup failed.
    #[error("Postal error: {0}")]
    Postal(#[from] PostalError),

    /// Tax-data lookup failed.
    #[error("Tax-data error: {0}")]
    TaxData(#[from] TaxDataError),

    /// Support ticket delivery failed.
    #[error("Support error: {0}")]
    Support(#[from] SupportError),

    /// Access resolution failed.
    #[error("Access error: {0}")]
    Access(#[from] AccessError),

    /// Purchase initiation failed.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// The request needs a signed-in identity.
    #[error("Authentication required")]
    AuthenticationRequired,

    /// The identity has no grant for the requested category.
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Server-side faults worth a Sentry event. Client mistakes and
    /// expected denials are not.
    fn is_server_fault(&self) -> bool {
        match self {
            Self::Database(_) | Self::Internal(_) | Self::Access(AccessError::Store(_)) => true,
            Self::Billing(_)
            | Self::Assistant(_)
            | Self::Support(_)
            | Self::Access(AccessError::Unavailable(_)) => true,
            Self::Identity(err) => !matches!(err, IdentityError::InvalidCredentials),
            Self::TaxData(err) => !matches!(err, TaxDataError::NoTableForCategory(_)),
            Self::Postal(err) => matches!(err, PostalError::Http(_) | PostalError::Parse(_)),
            Self::Checkout(err) => !matches!(err, CheckoutError::AuthenticationRequired),
            Self::AuthenticationRequired
            | Self::AccessDenied(_)
            | Self::NotFound(_)
            | Self::BadRequest(_) => false,
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Database(_) | Self::Internal(_) | Self::Access(AccessError::Store(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Access(AccessError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Billing(_) | Self::Assistant(_) | Self::Support(_) => StatusCode::BAD_GATEWAY,
            Self::Identity(err) => match err {
                IdentityError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                IdentityError::Api { status, .. } if *status < 500 => StatusCode::BAD_REQUEST,
                _ => StatusCode::BAD_GATEWAY,
            },
            Self::Postal(err) => match err {
                PostalError::InvalidCep => StatusCode::BAD_REQUEST,
                PostalError::NotFound => StatusCode::NOT_FOUND,
                PostalError::Http(_) | PostalError::Parse(_) => StatusCode::BAD_GATEWAY,
            },
            Self::TaxData(err) => match err {
                TaxDataError::NoTableForCategory(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::BAD_GATEWAY,
            },
            Self::Checkout(err) => match err {
                CheckoutError::AuthenticationRequired => StatusCode::UNAUTHORIZED,
                CheckoutError::MissingRedirectUrl | CheckoutError::Billing(_) => {
                    StatusCode::BAD_GATEWAY
                }
            },
            Self::AuthenticationRequired => StatusCode::UNAUTHORIZED,
            Self::AccessDenied(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Client-facing message. Internal and provider details stay out of
    /// responses.
    fn public_message(&self) -> String {
        match self {
            Self::Database(_) | Self::Internal(_) | Self::Access(AccessError::Store(_)) => {
                "Internal server error".to_owned()
            }
            Self::Access(AccessError::Unavailable(_)) => {
                "Access status temporarily unavailable, please try again".to_owned()
            }
            Self::Billing(_) | Self::Assistant(_) => "External service error".to_owned(),
            Self::Support(_) => {
                "Could not send your message, please try again".to_owned()
            }
            Self::Identity(err) => match err {
                IdentityError::InvalidCredentials => "Invalid credentials".to_owned(),
                IdentityError::Api { status, message } if *status < 500 => message.clone(),
                _ => "External service error".to_owned(),
            },
            Self::Postal(err) => match err {
                PostalError::InvalidCep => "Invalid CEP: expected 8 digits".to_owned(),
                PostalError::NotFound => "CEP not found".to_owned(),
                PostalError::Http(_) | PostalError::Parse(_) => {
                    "External service error".to_owned()
                }
            },
            Self::TaxData(err) => match err {
                TaxDataError::NoTableForCategory(_) => err.to_string(),
                _ => "External service error".to_owned(),
            },
            Self::Checkout(err) => match err {
                CheckoutError::AuthenticationRequired => "Authentication required".to_owned(),
                CheckoutError::MissingRedirectUrl | CheckoutError::Billing(_) => {
                    "Could not start checkout, please try again".to_owned()
                }
            },
            Self::AuthenticationRequired => "Authentication required".to_owned(),
            Self::AccessDenied(_) | Self::NotFound(_) | Self::BadRequest(_) => self.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.is_server_fault() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = self.status();
        let body = Json(serde_json::json!({ "error": self.public_message() }));

        (status, body).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from an identity.
///
/// Call this after successful authentication to associate errors with
/// identities.
pub fn set_sentry_user(identity_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(identity_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the identity.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::AuthenticationRequired),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::AccessDenied("tabelas_farmacia".to_owned())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(AppError::NotFound("profile".to_owned())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::BadRequest("invalid input".to_owned())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Internal("boom".to_owned())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_unavailable_access_is_not_a_denial() {
        let err = AppError::Access(AccessError::Unavailable(BillingError::Api {
            status: 503,
            message: "down".to_owned(),
        }));
        assert_eq!(get_status(err), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_postal_statuses() {
        assert_eq!(
            get_status(AppError::Postal(PostalError::InvalidCep)),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Postal(PostalError::NotFound)),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_internal_details_are_not_exposed() {
        let err = AppError::Database(RepositoryError::DataCorruption(
            "invalid tier: Platinum".to_owned(),
        ));
        assert_eq!(err.public_message(), "Internal server error");
    }

    #[test]
    fn test_support_failure_gets_retry_message() {
        let err = AppError::Support(SupportError::Api {
            status: 500,
            message: "provider down".to_owned(),
        });
        assert_eq!(
            err.public_message(),
            "Could not send your message, please try again"
        );
        assert_eq!(get_status(err), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_checkout_missing_url_gets_generic_message() {
        let err = AppError::Checkout(CheckoutError::MissingRedirectUrl);
        assert_eq!(get_status(err), StatusCode::BAD_GATEWAY);
        let err = AppError::Checkout(CheckoutError::MissingRedirectUrl);
        assert_eq!(
            err.public_message(),
            "Could not start checkout, please try again"
        );
    }
}
