//! HTTP client for the chat backend

use std::time::Duration;

use crate::{
    error::{Error, Result},
    stream::{ByteStream, body_stream},
    types::{ChatRequest, ConversationId, ErrorBody, HistoryMessage, IndexStatus, Message},
};

/// Default API root of a locally running backend
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api/v1";

/// Connection settings for [`ApiClient`]
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API root, e.g. `http://localhost:8000/api/v1`
    pub base_url: String,
    /// Bearer token of the authenticated user
    pub token: String,
    /// Timeout for establishing a connection. Streamed bodies have no
    /// overall timeout since answers can take arbitrarily long.
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token: String::new(),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Chat backend client
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl ApiClient {
    /// Create a new client
    pub fn new(config: ClientConfig) -> Result<Self> {
        if config.token.is_empty() {
            return Err(Error::InvalidConfig("missing access token".to_string()));
        }
        if !config.base_url.starts_with("http://") && !config.base_url.starts_with("https://") {
            return Err(Error::InvalidConfig(format!(
                "base URL must be http(s): {}",
                config.base_url
            )));
        }

        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token,
        })
    }

    /// API root without trailing slash
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Open a streamed answer for a question. The returned body is read
    /// lazily; dropping it aborts the request.
    pub async fn chat_stream(&self, request: &ChatRequest) -> Result<ByteStream> {
        tracing::debug!(
            "Opening answer stream for conversation {}",
            request.conversation_id
        );

        let response = self
            .client
            .post(self.url("/chat/stream"))
            .bearer_auth(&self.token)
            .header("accept", "text/event-stream")
            .json(request)
            .send()
            .await?;

        let response = check_status(response).await?;
        Ok(body_stream(response))
    }

    /// Fetch the document index status of a conversation
    pub async fn index_status(&self, conversation_id: ConversationId) -> Result<IndexStatus> {
        let response = self
            .client
            .get(self.url(&format!("/conversations/{}/vector-status", conversation_id)))
            .bearer_auth(&self.token)
            .send()
            .await?;

        let response = check_status(response).await?;
        Ok(response.json().await?)
    }

    /// Fetch the persisted message history of a conversation, oldest first
    pub async fn messages(&self, conversation_id: ConversationId) -> Result<Vec<Message>> {
        let response = self
            .client
            .get(self.url(&format!("/conversations/{}/messages", conversation_id)))
            .bearer_auth(&self.token)
            .send()
            .await?;

        let response = check_status(response).await?;
        let history: Vec<HistoryMessage> = response.json().await?;
        Ok(history.into_iter().map(Message::from).collect())
    }
}

/// Turn a non-success response into `Error::Api`, using the backend's
/// `detail` field when the body carries one.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ErrorBody>(&text)
        .map(|body| body.detail_text())
        .unwrap_or(text);

    Err(Error::api(status.as_u16(), detail))
}
