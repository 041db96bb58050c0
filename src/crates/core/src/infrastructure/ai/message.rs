//! Conversion of conversation history into the flat message list both backends accept.

use tarx_core_types::{ConversationTurn, Message, MessageRole};

/// Flattens `history` behind an optional system prompt.
///
/// Turns without any text are dropped; order is preserved.
pub fn build_message_array(system_prompt: &str, history: &[ConversationTurn]) -> Vec<Message> {
    let mut messages = Vec::with_capacity(history.len() + 1);

    if !system_prompt.is_empty() {
        messages.push(Message::system(system_prompt));
    }

    messages.extend(history.iter().filter_map(|turn| {
        let content = turn.content.flatten_text();
        (!content.is_empty()).then(|| Message::new(turn.role, content))
    }));

    messages
}

/// Latest user-authored message, which drives routing.
pub fn latest_user_message(messages: &[Message]) -> Option<&Message> {
    messages
        .iter()
        .rev()
        .find(|message| message.role == MessageRole::User)
}

/// First system message, forwarded to the mesh as `systemPrompt`.
pub fn system_prompt_of(messages: &[Message]) -> Option<&str> {
    messages
        .iter()
        .find(|message| message.role == MessageRole::System)
        .map(|message| message.content.as_str())
}
