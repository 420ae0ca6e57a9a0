//! Ordered message log of the active conversation

use rho_api::Message;

/// Transcript of a conversation in display order.
///
/// Append-only, except that the trailing assistant message may be replaced
/// through [`Transcript::mutate_last`] while its answer is still streaming.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a message at the end
    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Replace the whole sequence (history load, conversation switch)
    pub fn reset(&mut self, messages: Vec<Message>) {
        self.messages = messages;
    }

    /// Drop every message
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Apply `f` to a copy of the last message and store the result, but only
    /// if that message is from the assistant. Returns whether it applied.
    pub fn mutate_last(&mut self, f: impl FnOnce(Message) -> Message) -> bool {
        match self.messages.last_mut() {
            Some(last) if last.is_assistant() => {
                *last = f(last.clone());
                true
            }
            _ => false,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
