use std::str::FromStr;

use serde::Serialize;

use super::history::HistoryEntry;
use crate::locale::Locale;
use crate::models::enums::MessageRole;

/// One role/content pair in the order the provider receives them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Everything a completion source may draw on for one turn.
#[derive(Debug, Clone)]
pub struct PromptInput {
    /// Safety preamble followed by the filtered transcript.
    pub messages: Vec<ChatMessage>,
    /// Last patient utterance, or empty when the patient has not spoken yet.
    pub tail: String,
}

impl PromptInput {
    pub fn from_history(history: &[HistoryEntry], locale: Locale) -> Self {
        Self {
            messages: assemble(history, locale),
            tail: fallback_tail(history),
        }
    }
}

/// Build the provider prompt: the fixed safety preamble first, then every
/// history entry with a known role, in order.
///
/// A system entry already in the history does not replace the preamble;
/// both are sent.
pub fn assemble(history: &[HistoryEntry], locale: Locale) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.push(ChatMessage::new(
        MessageRole::System,
        locale.intake_system_prompt(),
    ));

    for entry in history {
        match MessageRole::from_str(&entry.role) {
            Ok(role) => messages.push(ChatMessage::new(role, entry.content.clone())),
            Err(_) => {
                tracing::warn!(message_id = %entry.id, role = %entry.role, "Dropping history entry with unknown role");
            }
        }
    }

    messages
}

/// Content of the most recent user entry, or `""`.
pub fn fallback_tail(history: &[HistoryEntry]) -> String {
    history
        .iter()
        .rev()
        .find(|entry| entry.role == MessageRole::User.as_str())
        .map(|entry| entry.content.clone())
        .unwrap_or_default()
}
