//! In-memory transport for unit tests

use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
};

use async_trait::async_trait;
use parking_lot::Mutex;
use rho_api::{ByteStream, ChatRequest, ConversationId, IndexStatus, Message, Result};
use tokio::sync::{Notify, mpsc};
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::transport::Transport;

pub(crate) fn status(label: &str) -> IndexStatus {
    IndexStatus {
        status: label.to_string(),
        doc_count: None,
        error_message: None,
    }
}

/// Response body handed out by the next `open_exchange`
pub(crate) enum MockBody {
    /// All chunks available at once
    Chunks(Vec<Vec<u8>>),
    /// Chunks pushed by the test while the exchange runs
    Channel(mpsc::UnboundedReceiver<Result<Vec<u8>>>),
    /// The request itself fails
    Fail(rho_api::Error),
}

/// Scripted transport. Index status answers `ready` once a conversation's
/// script runs out (or was never set).
#[derive(Default)]
pub(crate) struct MockTransport {
    statuses: Mutex<HashMap<ConversationId, VecDeque<Result<IndexStatus>>>>,
    status_calls: Mutex<HashMap<ConversationId, usize>>,
    gates: Mutex<HashMap<ConversationId, Arc<Notify>>>,
    bodies: Mutex<VecDeque<MockBody>>,
    histories: Mutex<HashMap<ConversationId, Result<Vec<Message>>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn script_status(&self, id: i64, script: Vec<Result<IndexStatus>>) {
        self.statuses
            .lock()
            .insert(ConversationId(id), script.into_iter().collect());
    }

    /// Make status polls for `id` block until the returned gate is notified
    pub(crate) fn hold_status(&self, id: i64) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates.lock().insert(ConversationId(id), gate.clone());
        gate
    }

    pub(crate) fn status_calls(&self, id: i64) -> usize {
        self.status_calls
            .lock()
            .get(&ConversationId(id))
            .copied()
            .unwrap_or(0)
    }

    pub(crate) fn push_body(&self, body: MockBody) {
        self.bodies.lock().push_back(body);
    }

    /// Queue a body whose chunks are fed through the returned sender
    pub(crate) fn push_channel_body(&self) -> mpsc::UnboundedSender<Result<Vec<u8>>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.push_body(MockBody::Channel(rx));
        tx
    }

    pub(crate) fn set_history(&self, id: i64, history: Result<Vec<Message>>) {
        self.histories.lock().insert(ConversationId(id), history);
    }

    pub(crate) fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn open_exchange(&self, request: &ChatRequest) -> Result<ByteStream> {
        self.requests.lock().push(request.clone());
        let body = self
            .bodies
            .lock()
            .pop_front()
            .unwrap_or(MockBody::Chunks(vec![b"data: [DONE]\n\n".to_vec()]));

        match body {
            MockBody::Chunks(chunks) => Ok(Box::pin(futures::stream::iter(
                chunks.into_iter().map(Ok::<_, rho_api::Error>),
            ))),
            MockBody::Channel(rx) => Ok(Box::pin(UnboundedReceiverStream::new(rx))),
            MockBody::Fail(e) => Err(e),
        }
    }

    async fn index_status(&self, conversation_id: ConversationId) -> Result<IndexStatus> {
        *self.status_calls.lock().entry(conversation_id).or_default() += 1;

        let gate = self.gates.lock().get(&conversation_id).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        self.statuses
            .lock()
            .get_mut(&conversation_id)
            .and_then(|script| script.pop_front())
            .unwrap_or_else(|| Ok(status("ready")))
    }

    async fn history(&self, conversation_id: ConversationId) -> Result<Vec<Message>> {
        match self.histories.lock().remove(&conversation_id) {
            Some(history) => history,
            None => Ok(Vec::new()),
        }
    }
}
