//! Transport abstraction over the chat backend

use std::time::Duration;

use async_trait::async_trait;
use rho_api::{ApiClient, ByteStream, ChatRequest, ConversationId, IndexStatus, Message, Result};

/// Retry configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Initial delay between retries
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// No retries at all
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Calculate delay for a given attempt (0-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay_secs =
            self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(attempt as i32);
        Duration::from_secs_f64(delay_secs.min(self.max_delay.as_secs_f64()))
    }
}

/// The backend operations a session depends on
#[async_trait]
pub trait Transport: Send + Sync {
    /// Start a streamed exchange; the body is consumed lazily and dropping
    /// it cancels the request
    async fn open_exchange(&self, request: &ChatRequest) -> Result<ByteStream>;

    /// Poll the document index status of a conversation
    async fn index_status(&self, conversation_id: ConversationId) -> Result<IndexStatus>;

    /// Load the persisted history of a conversation
    async fn history(&self, conversation_id: ConversationId) -> Result<Vec<Message>>;
}

/// HTTP transport talking to the real backend
pub struct HttpTransport {
    client: ApiClient,
}

impl HttpTransport {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn open_exchange(&self, request: &ChatRequest) -> Result<ByteStream> {
        self.client.chat_stream(request).await
    }

    async fn index_status(&self, conversation_id: ConversationId) -> Result<IndexStatus> {
        self.client.index_status(conversation_id).await
    }

    async fn history(&self, conversation_id: ConversationId) -> Result<Vec<Message>> {
        self.client.messages(conversation_id).await
    }
}
