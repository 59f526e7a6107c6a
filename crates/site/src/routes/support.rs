//! Support contact form route.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use fizko_core::Email;

use crate::error::{AppError, Result};
use crate::services::support::SupportTicket;
use crate::state::AppState;

const MAX_SUBJECT_LENGTH: usize = 200;
const MAX_MESSAGE_LENGTH: usize = 5000;

#[derive(Debug, Deserialize)]
pub struct SupportBody {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct SupportResponse {
    pub received: bool,
}

/// POST /api/support
///
/// Open to anonymous visitors; the form asks for a contact email instead
/// of requiring an account.
pub async fn submit(
    State(state): State<AppState>,
    Json(payload): Json<SupportBody>,
) -> Result<Json<SupportResponse>> {
    let ticket = validate_ticket(payload)?;

    state.support().submit(&ticket).await?;

    Ok(Json(SupportResponse { received: true }))
}

/// Normalize and validate the contact form fields.
fn validate_ticket(body: SupportBody) -> Result<SupportTicket> {
    let name = body.name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("name must not be empty".to_owned()));
    }

    let email = Email::parse(body.email.trim())
        .map_err(|e| AppError::BadRequest(format!("invalid email: {e}")))?;

    let subject = body.subject.trim();
    if subject.is_empty() {
        return Err(AppError::BadRequest("subject must not be empty".to_owned()));
    }
    if subject.len() > MAX_SUBJECT_LENGTH {
        return Err(AppError::BadRequest(format!(
            "subject must be at most {MAX_SUBJECT_LENGTH} characters"
        )));
    }

    let message = body.message.trim();
    if message.is_empty() {
        return Err(AppError::BadRequest("message must not be empty".to_owned()));
    }
    if message.len() > MAX_MESSAGE_LENGTH {
        return Err(AppError::BadRequest(format!(
            "message must be at most {MAX_MESSAGE_LENGTH} characters"
        )));
    }

    Ok(SupportTicket {
        name: name.to_owned(),
        email,
        subject: subject.to_owned(),
        message: message.to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body() -> SupportBody {
        SupportBody {
            name: "  Maria  ".to_owned(),
            email: "maria@fizko.com.br".to_owned(),
            subject: "Dúvida".to_owned(),
            message: "Como funciona a tabela?".to_owned(),
        }
    }

    #[test]
    fn test_validate_ticket_trims_fields() {
        let ticket = validate_ticket(body()).expect("valid");
        assert_eq!(ticket.name, "Maria");
        assert_eq!(ticket.email.as_str(), "maria@fizko.com.br");
    }

    #[test]
    fn test_validate_ticket_rejects_blank_message() {
        let result = validate_ticket(SupportBody {
            message: "   \n".to_owned(),
            ..body()
        });
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_validate_ticket_rejects_bad_email() {
        let result = validate_ticket(SupportBody {
            email: "not-an-email".to_owned(),
            ..body()
        });
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_validate_ticket_rejects_oversized_message() {
        let result = validate_ticket(SupportBody {
            message: "x".repeat(MAX_MESSAGE_LENGTH + 1),
            ..body()
        });
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }
}
