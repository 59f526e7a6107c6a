//! Chat conversation state machine.
//!
//! One [`ChatConversation`] lives in each visitor session and holds the
//! message log, the free-query counter, and an in-flight guard. Every
//! gate is evaluated here, before any network call, so a rejected turn
//! costs nothing and decrements nothing. The external transport only
//! sees turns that passed every gate.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::models::chat::ChatMessage;
use crate::services::assistant::AssistantReply;

/// Assistant calls time out after 10 seconds; a guard older than this is
/// an abandoned turn (crashed process, lost session write) and must not
/// block the conversation forever.
const IN_FLIGHT_EXPIRY_SECONDS: i64 = 15;

/// Greeting seeded into every new conversation.
const GREETING: &str =
    "Olá! Sou o assistente fiscal da FIZK.O. Como posso ajudar com suas dúvidas tributárias?";

/// System message shown when an anonymous visitor tries to send.
const LOGIN_PROMPT: &str =
    "Para conversar com o assistente, faça login ou crie uma conta gratuita.";

/// System message shown when the free allotment runs out.
const UPGRADE_PROMPT: &str =
    "Suas consultas gratuitas acabaram. Assine o Chatbot Premium para consultas ilimitadas.";

/// Local apology appended when the assistant call fails.
const APOLOGY: &str =
    "Desculpe, não consegui responder agora. Tente novamente em alguns instantes.";

/// Gate verdict for one send attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnGate {
    /// All gates passed; the caller must follow up with
    /// [`ChatConversation::complete_turn`] or
    /// [`ChatConversation::fail_turn`].
    Proceed,
    /// Empty or whitespace-only input. Nothing was appended.
    EmptyInput,
    /// No identity. A login prompt was appended; the visitor's text was
    /// discarded without entering the log.
    LoginRequired,
    /// Free allotment exhausted. An upgrade prompt was appended; the
    /// counter is unchanged.
    QuotaExhausted,
    /// A previous turn is still in flight.
    Busy,
}

/// Session-persisted conversation state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConversation {
    messages: Vec<ChatMessage>,
    remaining_free: u32,
    subscribed: bool,
    /// Provider-side thread id, set after the first successful turn.
    conversation_id: Option<String>,
    /// When the current turn started, while one is in flight.
    #[serde(default)]
    in_flight_since: Option<DateTime<Utc>>,
}

impl ChatConversation {
    /// Start a conversation seeded with the assistant greeting.
    #[must_use]
    pub fn new(free_allotment: u32, subscribed: bool) -> Self {
        Self {
            messages: vec![ChatMessage::new(1, GREETING, true)],
            remaining_free: free_allotment,
            subscribed,
            conversation_id: None,
            in_flight_since: None,
        }
    }

    #[must_use]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    #[must_use]
    pub const fn remaining_free(&self) -> u32 {
        self.remaining_free
    }

    #[must_use]
    pub const fn is_subscribed(&self) -> bool {
        self.subscribed
    }

    #[must_use]
    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation_id.as_deref()
    }

    /// Whether a turn is currently in flight.
    ///
    /// A guard older than the assistant timeout counts as settled: the
    /// turn it protected can no longer produce a reply.
    #[must_use]
    pub fn turn_in_flight(&self) -> bool {
        self.in_flight_since
            .is_some_and(|since| Utc::now() - since < Duration::seconds(IN_FLIGHT_EXPIRY_SECONDS))
    }

    /// Whether a send attempt warrants refreshing the subscribed flag.
    ///
    /// Input that the gate will reject anyway (blank, mid-turn) and
    /// anonymous visitors must not trigger a cache read or a processor
    /// call; the flag only matters once the quota gate can be reached.
    #[must_use]
    pub fn needs_access_refresh(&self, authenticated: bool, input: &str) -> bool {
        authenticated && !input.trim().is_empty() && !self.turn_in_flight()
    }

    /// Update the subscribed flag from a fresh access decision.
    ///
    /// Flipping to subscribed stops future counter checks; the remaining
    /// allotment is kept in case the subscription lapses.
    pub const fn set_subscribed(&mut self, subscribed: bool) {
        self.subscribed = subscribed;
    }

    /// Evaluate every gate for a send attempt.
    ///
    /// On [`TurnGate::Proceed`] the in-flight guard is set and the caller
    /// owns the turn: exactly one of `complete_turn` or `fail_turn` must
    /// follow. Any other verdict leaves the counter untouched.
    pub fn begin_turn(&mut self, authenticated: bool, input: &str) -> TurnGate {
        if input.trim().is_empty() {
            return TurnGate::EmptyInput;
        }
        if self.turn_in_flight() {
            return TurnGate::Busy;
        }
        if !authenticated {
            self.append_system(LOGIN_PROMPT);
            return TurnGate::LoginRequired;
        }
        if !self.subscribed && self.remaining_free == 0 {
            self.append_system(UPGRADE_PROMPT);
            return TurnGate::QuotaExhausted;
        }

        self.in_flight_since = Some(Utc::now());
        TurnGate::Proceed
    }

    /// Record a successful turn: user message, assistant reply, and a
    /// counter decrement on the free tier only.
    pub fn complete_turn(&mut self, input: &str, reply: AssistantReply) {
        self.append(input, false);
        self.append(&reply.text, true);
        if let Some(id) = reply.conversation_id {
            self.conversation_id = Some(id);
        }
        if !self.subscribed {
            self.remaining_free = self.remaining_free.saturating_sub(1);
        }
        self.in_flight_since = None;
    }

    /// Record a failed turn: the user message stays in the log, followed
    /// by a locally generated apology. The counter is not decremented.
    pub fn fail_turn(&mut self, input: &str) {
        self.append(input, false);
        self.append(APOLOGY, true);
        self.in_flight_since = None;
    }

    fn append(&mut self, text: &str, from_assistant: bool) {
        let id = self.messages.len() as u64 + 1;
        self.messages.push(ChatMessage::new(id, text, from_assistant));
    }

    fn append_system(&mut self, text: &str) {
        self.append(text, true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(text: &str) -> AssistantReply {
        AssistantReply {
            text: text.to_owned(),
            conversation_id: Some("conv_1".to_owned()),
        }
    }

    #[test]
    fn new_conversation_starts_with_greeting() {
        let conversation = ChatConversation::new(10, false);
        assert_eq!(conversation.messages().len(), 1);
        assert!(conversation.messages()[0].from_assistant);
        assert_eq!(conversation.remaining_free(), 10);
    }

    #[test]
    fn empty_input_is_rejected_without_log_change() {
        let mut conversation = ChatConversation::new(10, false);
        assert_eq!(conversation.begin_turn(true, "   \n\t"), TurnGate::EmptyInput);
        assert_eq!(conversation.messages().len(), 1);
        assert_eq!(conversation.remaining_free(), 10);
    }

    #[test]
    fn anonymous_send_appends_login_prompt_only() {
        let mut conversation = ChatConversation::new(10, false);
        let gate = conversation.begin_turn(false, "qual a aliquota do tomate?");

        assert_eq!(gate, TurnGate::LoginRequired);
        assert_eq!(conversation.messages().len(), 2);
        // The visitor's text never enters the log.
        assert!(conversation
            .messages()
            .iter()
            .all(|m| !m.text.contains("tomate")));
        assert!(conversation.messages()[1].from_assistant);
        assert_eq!(conversation.remaining_free(), 10);
    }

    #[test]
    fn exhausted_free_tier_gets_upgrade_prompt_without_decrement() {
        let mut conversation = ChatConversation::new(0, false);
        let gate = conversation.begin_turn(true, "pergunta");

        assert_eq!(gate, TurnGate::QuotaExhausted);
        assert_eq!(conversation.remaining_free(), 0);
        let last = conversation.messages().last().unwrap();
        assert!(last.from_assistant);
        assert_eq!(last.text, UPGRADE_PROMPT);
    }

    #[test]
    fn successful_turn_appends_both_messages_and_decrements_once() {
        let mut conversation = ChatConversation::new(3, false);
        assert_eq!(conversation.begin_turn(true, "pergunta"), TurnGate::Proceed);
        conversation.complete_turn("pergunta", reply("resposta"));

        assert_eq!(conversation.messages().len(), 3);
        assert!(!conversation.messages()[1].from_assistant);
        assert!(conversation.messages()[2].from_assistant);
        assert_eq!(conversation.remaining_free(), 2);
        assert_eq!(conversation.conversation_id(), Some("conv_1"));
    }

    #[test]
    fn failed_turn_keeps_user_message_and_counter() {
        let mut conversation = ChatConversation::new(3, false);
        assert_eq!(conversation.begin_turn(true, "pergunta"), TurnGate::Proceed);
        conversation.fail_turn("pergunta");

        assert_eq!(conversation.messages().len(), 3);
        assert_eq!(conversation.messages()[1].text, "pergunta");
        assert_eq!(conversation.messages()[2].text, APOLOGY);
        assert_eq!(conversation.remaining_free(), 3);
    }

    #[test]
    fn in_flight_turn_blocks_a_second_send() {
        let mut conversation = ChatConversation::new(3, false);
        assert_eq!(conversation.begin_turn(true, "primeira"), TurnGate::Proceed);
        assert_eq!(conversation.begin_turn(true, "segunda"), TurnGate::Busy);

        conversation.complete_turn("primeira", reply("ok"));
        // Guard clears once the turn settles.
        assert_eq!(conversation.begin_turn(true, "segunda"), TurnGate::Proceed);
    }

    #[test]
    fn stale_in_flight_guard_does_not_block_forever() {
        let mut conversation = ChatConversation::new(3, false);
        assert_eq!(conversation.begin_turn(true, "primeira"), TurnGate::Proceed);

        // A turn whose final session write was lost leaves the guard set
        // in the stored blob. Age it past the assistant timeout.
        let mut stored = serde_json::to_value(&conversation).expect("serialize");
        stored["in_flight_since"] =
            serde_json::to_value(Utc::now() - Duration::seconds(60)).expect("timestamp");
        let mut restored: ChatConversation =
            serde_json::from_value(stored).expect("deserialize");

        assert!(!restored.turn_in_flight());
        assert_eq!(restored.begin_turn(true, "segunda"), TurnGate::Proceed);
    }

    #[test]
    fn conversations_stored_without_a_guard_field_still_load() {
        let conversation = ChatConversation::new(3, false);
        let mut stored = serde_json::to_value(&conversation).expect("serialize");
        stored.as_object_mut().expect("object").remove("in_flight_since");

        let restored: ChatConversation =
            serde_json::from_value(stored).expect("deserialize");
        assert!(!restored.turn_in_flight());
    }

    #[test]
    fn access_refresh_is_skipped_for_rejectable_turns() {
        let mut conversation = ChatConversation::new(3, false);

        assert!(!conversation.needs_access_refresh(false, "pergunta"));
        assert!(!conversation.needs_access_refresh(true, "   \n"));
        assert!(conversation.needs_access_refresh(true, "pergunta"));

        conversation.begin_turn(true, "pergunta");
        assert!(!conversation.needs_access_refresh(true, "outra"));
    }

    #[test]
    fn subscribed_user_never_consults_the_counter() {
        let mut conversation = ChatConversation::new(0, true);
        for i in 0..5 {
            assert_eq!(conversation.begin_turn(true, "pergunta"), TurnGate::Proceed);
            conversation.complete_turn("pergunta", reply(&format!("resposta {i}")));
        }
        assert_eq!(conversation.remaining_free(), 0);
        // Greeting plus five user/assistant pairs.
        assert_eq!(conversation.messages().len(), 11);
    }

    #[test]
    fn free_counter_reaches_zero_then_gates() {
        let mut conversation = ChatConversation::new(1, false);
        assert_eq!(conversation.begin_turn(true, "pergunta"), TurnGate::Proceed);
        conversation.complete_turn("pergunta", reply("resposta"));
        assert_eq!(conversation.remaining_free(), 0);

        assert_eq!(
            conversation.begin_turn(true, "outra"),
            TurnGate::QuotaExhausted
        );
    }

    #[test]
    fn message_ids_are_sequential() {
        let mut conversation = ChatConversation::new(5, false);
        conversation.begin_turn(true, "a");
        conversation.complete_turn("a", reply("b"));

        let ids: Vec<u64> = conversation.messages().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn session_round_trips_through_json() {
        let mut conversation = ChatConversation::new(5, false);
        conversation.begin_turn(true, "a");
        conversation.complete_turn("a", reply("b"));

        let json = serde_json::to_string(&conversation).expect("serialize");
        let restored: ChatConversation = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(restored.remaining_free(), 4);
        assert_eq!(restored.messages().len(), 3);
        assert_eq!(restored.conversation_id(), Some("conv_1"));
    }
}
