//! Session controller for one active conversation

use std::sync::Arc;

use futures::StreamExt;
use rho_api::{ChatRequest, ConversationId, Message, StreamFrame, stream::frames};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::{
    error::Result,
    events::SessionEvent,
    handle::SessionHandle,
    readiness::{PollConfig, ReadinessMonitor, ReadinessStatus},
    transcript::Transcript,
    transport::Transport,
};

/// Session configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Readiness polling
    pub poll: PollConfig,
    /// Capacity of the event broadcast channel
    pub event_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poll: PollConfig::default(),
            event_capacity: 256,
        }
    }
}

/// Why a send was refused
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Nothing but whitespace
    EmptyInput,
    /// No conversation is active
    NoConversation,
    /// Another exchange is still in flight
    Busy,
    /// The document index is not ready
    NotReady(ReadinessStatus),
}

/// Result of [`Session::send`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendOutcome {
    /// A precondition failed; nothing changed and no request was made
    Rejected(RejectReason),
    /// The answer streamed to its end
    Completed,
    /// Stopped on request; partial content was kept
    Cancelled,
    /// The transport failed; an error notice was appended
    Failed(String),
}

impl SendOutcome {
    /// Whether the question reached the backend
    pub fn was_sent(&self) -> bool {
        !matches!(self, SendOutcome::Rejected(_))
    }
}

/// Transient state of one question/answer round
struct Exchange {
    cancel: CancellationToken,
    /// Transcript index of the assistant message being filled
    assistant_index: usize,
}

/// Clears the in-flight flag even if the `send` future is dropped early
struct ExchangeGuard(SessionHandle);

impl Drop for ExchangeGuard {
    fn drop(&mut self) {
        self.0.end_exchange();
    }
}

/// Controller for the active conversation: owns its transcript and
/// readiness monitor and runs one exchange at a time.
///
/// Dropping the session tears it down: the exchange in flight and any
/// pending readiness poll are cancelled.
pub struct Session {
    conversation_id: ConversationId,
    transcript: Transcript,
    readiness: ReadinessMonitor,
    transport: Arc<dyn Transport>,
    event_tx: broadcast::Sender<SessionEvent>,
    handle: SessionHandle,
    root: CancellationToken,
}

impl Session {
    /// Activate a conversation: empty transcript, readiness `Checking`, first
    /// poll scheduled immediately.
    pub fn start(
        conversation_id: ConversationId,
        transport: Arc<dyn Transport>,
        config: &SessionConfig,
        event_tx: broadcast::Sender<SessionEvent>,
    ) -> Self {
        let root = CancellationToken::new();
        let _ = event_tx.send(SessionEvent::ConversationOpened { conversation_id });

        let readiness = ReadinessMonitor::start(
            conversation_id,
            transport.clone(),
            config.poll.clone(),
            event_tx.clone(),
            &root,
        );

        Self {
            conversation_id,
            transcript: Transcript::new(),
            readiness,
            transport,
            event_tx,
            handle: SessionHandle::new(),
            root,
        }
    }

    pub fn conversation_id(&self) -> ConversationId {
        self.conversation_id
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn messages(&self) -> &[Message] {
        self.transcript.messages()
    }

    pub fn readiness(&self) -> &ReadinessMonitor {
        &self.readiness
    }

    /// Whether a send would currently be accepted (ignoring input)
    pub fn can_send(&self) -> bool {
        self.readiness.can_send() && !self.handle.is_streaming()
    }

    /// Get a cloneable handle for stopping exchanges from outside.
    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Stop the exchange in flight, if any
    pub fn stop(&self) -> bool {
        self.handle.stop()
    }

    /// Replace the transcript with the persisted history.
    ///
    /// Refused while an exchange is in flight, since it would clobber the
    /// streaming answer.
    pub async fn load_history(&mut self) -> Result<usize> {
        if self.handle.is_streaming() {
            return Ok(self.transcript.len());
        }

        let history = self.transport.history(self.conversation_id).await?;
        let count = history.len();
        self.transcript.reset(history);
        let _ = self.event_tx.send(SessionEvent::HistoryLoaded {
            conversation_id: self.conversation_id,
            count,
        });
        Ok(count)
    }

    /// Ask a question and stream the answer into the transcript.
    ///
    /// Never fails: refused preconditions, transport failures and
    /// cancellation are all reported through [`SendOutcome`].
    pub async fn send(&mut self, text: &str) -> SendOutcome {
        if text.trim().is_empty() {
            return SendOutcome::Rejected(RejectReason::EmptyInput);
        }
        if self.handle.is_streaming() {
            return SendOutcome::Rejected(RejectReason::Busy);
        }
        let status = self.readiness.status();
        if !status.can_send() {
            return SendOutcome::Rejected(RejectReason::NotReady(status));
        }
        let Some(cancel) = self.handle.begin_exchange(&self.root) else {
            return SendOutcome::Rejected(RejectReason::Busy);
        };
        let guard = ExchangeGuard(self.handle.clone());

        // Shown before the backend has seen anything; never reconciled with
        // the server-side copy.
        self.transcript.append(Message::user(text));
        self.transcript.append(Message::assistant(""));
        let exchange = Exchange {
            cancel,
            assistant_index: self.transcript.len() - 1,
        };

        let _ = self.event_tx.send(SessionEvent::ExchangeStart {
            conversation_id: self.conversation_id,
            question: text.to_string(),
        });

        let request = ChatRequest::new(self.conversation_id, text);
        let outcome = self.run_exchange(&exchange, &request).await;

        if let SendOutcome::Failed(ref reason) = outcome {
            tracing::warn!(
                "Exchange for conversation {} failed: {}",
                self.conversation_id,
                reason
            );
            self.transcript.append(Message::error(format!(
                "Could not get an answer from the server: {}",
                reason
            )));
        }

        drop(guard);
        let _ = self.event_tx.send(SessionEvent::ExchangeEnd {
            conversation_id: self.conversation_id,
            outcome: outcome.clone(),
        });

        outcome
    }

    async fn run_exchange(&mut self, exchange: &Exchange, request: &ChatRequest) -> SendOutcome {
        let cancel = &exchange.cancel;

        let body = tokio::select! {
            biased;
            _ = cancel.cancelled() => return SendOutcome::Cancelled,
            body = self.transport.open_exchange(request) => body,
        };
        let body = match body {
            Ok(body) => body,
            Err(e) => return SendOutcome::Failed(e.user_message()),
        };

        let mut frames = frames(body);
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return SendOutcome::Cancelled,
                next = frames.next() => next,
            };

            match next {
                None | Some(Ok(StreamFrame::Done)) => return SendOutcome::Completed,
                Some(Ok(StreamFrame::Data(payload))) => {
                    if cancel.is_cancelled() {
                        return SendOutcome::Cancelled;
                    }
                    self.fold(exchange, payload);
                }
                Some(Err(e)) => {
                    if cancel.is_cancelled() {
                        return SendOutcome::Cancelled;
                    }
                    return SendOutcome::Failed(e.user_message());
                }
            }
        }
    }

    /// Append a fragment to the exchange's assistant message
    fn fold(&mut self, exchange: &Exchange, payload: String) {
        if self.transcript.len() != exchange.assistant_index + 1 {
            tracing::warn!("Assistant message is no longer last; dropping fragment");
            return;
        }

        let applied = self.transcript.mutate_last(|mut message| {
            message.content.push_str(&payload);
            message
        });
        if applied {
            let _ = self.event_tx.send(SessionEvent::Fragment {
                conversation_id: self.conversation_id,
                delta: payload,
            });
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.root.cancel();
        self.readiness.shutdown();
        let _ = self.event_tx.send(SessionEvent::ConversationClosed {
            conversation_id: self.conversation_id,
        });
    }
}
