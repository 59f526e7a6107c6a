//! Chat routes.
//!
//! The conversation lives in the session; every gate (auth, quota,
//! in-flight) is enforced by [`ChatConversation`] before the assistant is
//! called. Gate rejections surface as messages inside the conversation,
//! not as HTTP errors, so the widget renders them like any other reply.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::warn;

use fizko_core::ProductCategory;

use crate::db::SubscriptionRepository;
use crate::error::{AppError, Result};
use crate::middleware::OptionalAuth;
use crate::models::chat::ChatMessage;
use crate::models::{session_keys, CurrentIdentity};
use crate::services::access::AccessResolver;
use crate::services::assistant::AssistantTransport;
use crate::services::chat::{ChatConversation, TurnGate};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SendBody {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ConversationResponse {
    pub messages: Vec<ChatMessage>,
    pub remaining_free: u32,
    pub subscribed: bool,
}

impl From<&ChatConversation> for ConversationResponse {
    fn from(conversation: &ChatConversation) -> Self {
        Self {
            messages: conversation.messages().to_vec(),
            remaining_free: conversation.remaining_free(),
            subscribed: conversation.is_subscribed(),
        }
    }
}

async fn load_conversation(
    session: &Session,
    free_allotment: u32,
) -> Result<ChatConversation> {
    let existing: Option<ChatConversation> = session
        .get(session_keys::CHAT_CONVERSATION)
        .await
        .map_err(|e| AppError::Internal(format!("session error: {e}")))?;

    Ok(existing.unwrap_or_else(|| ChatConversation::new(free_allotment, false)))
}

async fn save_conversation(session: &Session, conversation: &ChatConversation) -> Result<()> {
    session
        .insert(session_keys::CHAT_CONVERSATION, conversation)
        .await
        .map_err(|e| AppError::Internal(format!("session error: {e}")))
}

/// Refresh the subscribed flag from the access resolver.
///
/// A resolver failure keeps the previous flag; a processor outage must
/// not lock a subscriber out of the chat mid-conversation.
async fn refresh_subscribed(
    state: &AppState,
    identity: &CurrentIdentity,
    conversation: &mut ChatConversation,
) {
    let repo = SubscriptionRepository::new(state.pool());
    let resolver = AccessResolver::new(&state.config().admin_emails, state.billing(), &repo);

    match resolver
        .resolve(identity.id, &identity.email, ProductCategory::ChatbotPremium)
        .await
    {
        Ok(decision) => conversation.set_subscribed(decision.granted),
        Err(e) => {
            warn!(error = %e, "chat access resolution failed, keeping previous flag");
        }
    }
}

/// GET /api/chat
pub async fn conversation(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(identity): OptionalAuth,
) -> Result<Json<ConversationResponse>> {
    let mut conversation = load_conversation(&session, state.config().chat_free_queries).await?;
    if let Some(identity) = &identity {
        refresh_subscribed(&state, identity, &mut conversation).await;
    }
    save_conversation(&session, &conversation).await?;

    Ok(Json(ConversationResponse::from(&conversation)))
}

/// POST /api/chat/send
pub async fn send(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(identity): OptionalAuth,
    Json(payload): Json<SendBody>,
) -> Result<Json<ConversationResponse>> {
    let mut conversation = load_conversation(&session, state.config().chat_free_queries).await?;

    // Turns the gate will reject (blank input, mid-turn, anonymous) must
    // not touch the cache or the processor.
    if let Some(identity) = &identity {
        if conversation.needs_access_refresh(true, &payload.message) {
            refresh_subscribed(&state, identity, &mut conversation).await;
        }
    }

    let gate = conversation.begin_turn(identity.is_some(), &payload.message);
    if gate == TurnGate::Proceed {
        // Persist the in-flight guard before the slow call so a second
        // send from the same session gets rejected.
        save_conversation(&session, &conversation).await?;

        let thread_id = conversation.conversation_id().map(str::to_owned);
        let user_id = identity.as_ref().map(|i| i.id.to_string());

        match state
            .assistant()
            .send(&payload.message, thread_id.as_deref(), user_id.as_deref())
            .await
        {
            Ok(reply) => conversation.complete_turn(&payload.message, reply),
            Err(e) => {
                warn!(error = %e, "assistant call failed");
                conversation.fail_turn(&payload.message);
            }
        }
    }

    save_conversation(&session, &conversation).await?;

    Ok(Json(ConversationResponse::from(&conversation)))
}
