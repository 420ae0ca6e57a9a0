//! Session event types

use rho_api::ConversationId;
use serde::{Deserialize, Serialize};

use crate::{readiness::ReadinessStatus, session::SendOutcome};

/// Events emitted by the active session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A conversation became active
    ConversationOpened { conversation_id: ConversationId },

    /// Persisted history replaced the transcript
    HistoryLoaded {
        conversation_id: ConversationId,
        count: usize,
    },

    /// The active conversation was torn down
    ConversationClosed { conversation_id: ConversationId },

    /// The document index status changed
    ReadinessChanged {
        conversation_id: ConversationId,
        status: ReadinessStatus,
    },

    /// A question was accepted and its exchange started
    ExchangeStart {
        conversation_id: ConversationId,
        question: String,
    },

    /// A fragment was folded into the streaming answer
    Fragment {
        conversation_id: ConversationId,
        delta: String,
    },

    /// The exchange finished
    ExchangeEnd {
        conversation_id: ConversationId,
        outcome: SendOutcome,
    },
}

impl SessionEvent {
    /// Conversation the event belongs to
    pub fn conversation_id(&self) -> ConversationId {
        match self {
            SessionEvent::ConversationOpened { conversation_id }
            | SessionEvent::HistoryLoaded { conversation_id, .. }
            | SessionEvent::ConversationClosed { conversation_id }
            | SessionEvent::ReadinessChanged { conversation_id, .. }
            | SessionEvent::ExchangeStart { conversation_id, .. }
            | SessionEvent::Fragment { conversation_id, .. }
            | SessionEvent::ExchangeEnd { conversation_id, .. } => *conversation_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_tagging() {
        let event = SessionEvent::Fragment {
            conversation_id: ConversationId(4),
            delta: "lo".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "fragment");
        assert_eq!(json["conversation_id"], 4);
        assert_eq!(event.conversation_id(), ConversationId(4));
    }
}
