//! Session-related types.
//!
//! Types stored in the session for authentication state. The session layer
//! is the single subscription point for identity changes: login and signup
//! write `CurrentIdentity`, logout removes it, and every handler reads the
//! same cached copy.

use serde::{Deserialize, Serialize};

use fizko_core::{Email, IdentityId};

/// Session-stored visitor identity.
///
/// A read-only cached copy of the identity provider's record, valid for the
/// duration of the session entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentIdentity {
    /// Provider-issued identity id.
    pub id: IdentityId,
    /// Identity email address.
    pub email: Email,
    /// Optional display name from provider metadata.
    pub full_name: Option<String>,
    /// Provider access token for delegated calls (sign-out).
    pub access_token: String,
}

/// Session keys for stored data.
pub mod keys {
    /// Key for storing the current logged-in identity.
    pub const CURRENT_IDENTITY: &str = "current_identity";

    /// Key for the chat widget conversation state.
    pub const CHAT_CONVERSATION: &str = "chat_conversation";
}
