//! Conversation selection on top of [`Session`]

use std::sync::Arc;

use rho_api::{ConversationId, Message};
use tokio::sync::broadcast;

use crate::{
    error::{Error, Result},
    events::SessionEvent,
    handle::SessionHandle,
    readiness::ReadinessStatus,
    session::{RejectReason, SendOutcome, Session, SessionConfig},
    transport::Transport,
};

/// Owns at most one active [`Session`] and switches between conversations.
///
/// Events from every session it creates go out on one channel, so a front
/// end subscribes once and filters by conversation id if it needs to.
pub struct Client {
    transport: Arc<dyn Transport>,
    config: SessionConfig,
    event_tx: broadcast::Sender<SessionEvent>,
    active: Option<Session>,
}

impl Client {
    /// Create a client with no active conversation
    pub fn new(transport: Arc<dyn Transport>, config: SessionConfig) -> Self {
        let (event_tx, _) = broadcast::channel(config.event_capacity);
        Self {
            transport,
            config,
            event_tx,
            active: None,
        }
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    /// Make `conversation_id` the active conversation.
    ///
    /// The previous session is torn down first, cancelling its exchange and
    /// readiness polling. The new session starts polling right away; its
    /// history is then loaded. A history failure is returned but leaves the
    /// new conversation selected with an empty transcript.
    pub async fn select(&mut self, conversation_id: ConversationId) -> Result<()> {
        self.deselect();

        tracing::debug!("Selecting conversation {}", conversation_id);
        let session = Session::start(
            conversation_id,
            self.transport.clone(),
            &self.config,
            self.event_tx.clone(),
        );
        let session = self.active.insert(session);
        session.load_history().await?;
        Ok(())
    }

    /// Tear down the active conversation, if any
    pub fn deselect(&mut self) {
        if let Some(session) = self.active.take() {
            tracing::debug!("Closing conversation {}", session.conversation_id());
        }
    }

    /// Re-fetch the active conversation's history
    pub async fn reload_history(&mut self) -> Result<usize> {
        let session = self.active.as_mut().ok_or(Error::NoConversation)?;
        session.load_history().await
    }

    /// Ask a question in the active conversation
    pub async fn send(&mut self, text: &str) -> SendOutcome {
        match self.active.as_mut() {
            Some(session) => session.send(text).await,
            None => SendOutcome::Rejected(RejectReason::NoConversation),
        }
    }

    /// Stop the exchange in flight, if any
    pub fn stop(&self) -> bool {
        self.active.as_ref().is_some_and(Session::stop)
    }

    /// Stop handle for the active session. It stays tied to that session;
    /// fetch a new one after switching.
    pub fn handle(&self) -> Option<SessionHandle> {
        self.active.as_ref().map(Session::handle)
    }

    pub fn active_conversation(&self) -> Option<ConversationId> {
        self.active.as_ref().map(Session::conversation_id)
    }

    pub fn session(&self) -> Option<&Session> {
        self.active.as_ref()
    }

    /// Readiness of the active conversation
    pub fn readiness(&self) -> Option<ReadinessStatus> {
        self.active.as_ref().map(|s| s.readiness().status())
    }

    /// Wait for the active conversation's index to settle
    pub async fn wait_settled(&self) -> Option<ReadinessStatus> {
        match &self.active {
            Some(session) => session.readiness().wait_settled().await,
            None => None,
        }
    }

    pub fn can_send(&self) -> bool {
        self.active.as_ref().is_some_and(Session::can_send)
    }

    /// Messages of the active conversation; empty when none is active
    pub fn transcript(&self) -> &[Message] {
        self.active.as_ref().map(Session::messages).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockTransport, status};

    fn client(transport: &Arc<MockTransport>) -> Client {
        let transport: Arc<dyn Transport> = transport.clone();
        Client::new(transport, SessionConfig::default())
    }

    #[tokio::test]
    async fn test_send_without_conversation() {
        let transport = Arc::new(MockTransport::new());
        let mut client = client(&transport);

        assert_eq!(
            client.send("hello").await,
            SendOutcome::Rejected(RejectReason::NoConversation)
        );
        assert!(!client.can_send());
        assert!(!client.stop());
        assert!(client.transcript().is_empty());
        assert!(matches!(
            client.reload_history().await,
            Err(Error::NoConversation)
        ));
    }

    #[tokio::test]
    async fn test_select_loads_history() {
        let transport = Arc::new(MockTransport::new());
        transport.set_history(7, Ok(vec![Message::user("hi"), Message::assistant("hello")]));
        let mut client = client(&transport);

        client.select(ConversationId(7)).await.unwrap();

        assert_eq!(client.active_conversation(), Some(ConversationId(7)));
        assert_eq!(client.transcript().len(), 2);
        assert_eq!(
            client.wait_settled().await,
            Some(ReadinessStatus::Ready { doc_count: None })
        );
        assert!(client.can_send());
    }

    #[tokio::test]
    async fn test_history_failure_keeps_selection() {
        let transport = Arc::new(MockTransport::new());
        transport.set_history(3, Err(rho_api::Error::api(404, "Conversation not found")));
        let mut client = client(&transport);

        assert!(client.select(ConversationId(3)).await.is_err());
        assert_eq!(client.active_conversation(), Some(ConversationId(3)));
        assert!(client.transcript().is_empty());
    }

    #[tokio::test]
    async fn test_deselect_clears_transcript() {
        let transport = Arc::new(MockTransport::new());
        let mut client = client(&transport);
        client.select(ConversationId(1)).await.unwrap();
        client.wait_settled().await;
        assert_eq!(client.send("q").await, SendOutcome::Completed);
        assert_eq!(client.transcript().len(), 2);

        client.deselect();

        assert!(client.transcript().is_empty());
        assert_eq!(client.active_conversation(), None);
        assert_eq!(client.readiness(), None);
    }

    #[tokio::test]
    async fn test_stale_poll_never_reaches_new_conversation() {
        let transport = Arc::new(MockTransport::new());
        let gate = transport.hold_status(1);
        transport.script_status(1, vec![Ok(status("error"))]);
        let mut client = client(&transport);
        let mut events = client.subscribe();

        client.select(ConversationId(1)).await.unwrap();
        while transport.status_calls(1) == 0 {
            tokio::task::yield_now().await;
        }

        client.select(ConversationId(2)).await.unwrap();
        gate.notify_one();
        assert_eq!(
            client.wait_settled().await,
            Some(ReadinessStatus::Ready { doc_count: None })
        );
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        assert!(client.can_send());
        while let Ok(event) = events.try_recv() {
            if let SessionEvent::ReadinessChanged {
                conversation_id,
                status,
            } = event
            {
                if conversation_id == ConversationId(1) {
                    assert_eq!(status, ReadinessStatus::Checking);
                }
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_gates_until_new_selection() {
        let transport = Arc::new(MockTransport::new());
        transport.script_status(1, vec![Ok(status("building")), Ok(status("error"))]);
        let mut client = client(&transport);

        client.select(ConversationId(1)).await.unwrap();
        let settled = client.wait_settled().await;
        assert!(matches!(settled, Some(ReadinessStatus::Error { .. })));

        tokio::time::sleep(std::time::Duration::from_secs(60)).await;
        assert!(!client.can_send());
        assert!(matches!(
            client.send("q").await,
            SendOutcome::Rejected(RejectReason::NotReady(ReadinessStatus::Error { .. }))
        ));
        assert_eq!(transport.status_calls(1), 2);

        client.select(ConversationId(2)).await.unwrap();
        client.wait_settled().await;
        assert!(client.can_send());
        assert_eq!(client.send("q").await, SendOutcome::Completed);
        assert_eq!(transport.requests().len(), 1);
    }
}
