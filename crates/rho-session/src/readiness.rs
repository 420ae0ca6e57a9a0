//! Readiness polling for a conversation's document index
//!
//! After a conversation becomes active the backend may still be building its
//! document index. [`ReadinessMonitor`] polls the status endpoint on a fixed
//! interval until the index reports a terminal label, and gates sending on
//! the result.
//!
//! Each monitor owns its status cell and a cancellation token. Results are
//! applied only while holding the cell lock and only if the token is still
//! live; teardown cancels under the same lock. A poll issued before teardown
//! therefore cannot write anything afterwards, and a successor monitor (with
//! its own cell) is never touched by it.

use std::{sync::Arc, time::Duration};

use parking_lot::Mutex;
use rho_api::{ConversationId, IndexStatus};
use serde::{Deserialize, Serialize};
use tokio::{
    sync::{broadcast, watch},
    task::JoinHandle,
};
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::{
    events::SessionEvent,
    transport::{RetryConfig, Transport},
};

/// Readiness of a conversation's document index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ReadinessStatus {
    /// No poll response yet
    Checking,
    /// The backend reported a non-terminal label
    Processing {
        label: String,
        doc_count: Option<u32>,
    },
    /// The index can be queried
    Ready { doc_count: Option<u32> },
    /// Indexing failed; sending stays disabled for this conversation
    Error { message: Option<String> },
}

impl ReadinessStatus {
    /// Map a status report onto the state machine
    pub fn from_report(report: IndexStatus) -> Self {
        if report.is_ready() {
            ReadinessStatus::Ready {
                doc_count: report.doc_count,
            }
        } else if report.is_error() {
            ReadinessStatus::Error {
                message: report.error_message,
            }
        } else {
            ReadinessStatus::Processing {
                label: report.status,
                doc_count: report.doc_count,
            }
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReadinessStatus::Ready { .. } | ReadinessStatus::Error { .. }
        )
    }

    /// Whether an exchange may be started
    pub fn can_send(&self) -> bool {
        matches!(self, ReadinessStatus::Ready { .. })
    }

    /// Short label for display
    pub fn label(&self) -> &str {
        match self {
            ReadinessStatus::Checking => "checking",
            ReadinessStatus::Processing { label, .. } => label,
            ReadinessStatus::Ready { .. } => IndexStatus::READY,
            ReadinessStatus::Error { .. } => IndexStatus::ERROR,
        }
    }
}

/// Polling configuration
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Constant delay between a non-terminal response and the next poll
    pub interval: Duration,
    /// Budget and backoff for failed polls. A successful response resets the
    /// budget; once it is spent polling stops with the status unchanged.
    pub retry: RetryConfig,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            retry: RetryConfig::default(),
        }
    }
}

/// The write side shared between a monitor and its poll task
#[derive(Clone)]
pub(crate) struct Poller {
    conversation_id: ConversationId,
    cell: Arc<Mutex<watch::Sender<ReadinessStatus>>>,
    cancel: CancellationToken,
    /// Fired when the poll task exits for any reason
    done: CancellationToken,
    event_tx: broadcast::Sender<SessionEvent>,
}

impl Poller {
    /// Store a poll result unless the owning monitor was torn down.
    pub(crate) fn apply(&self, status: ReadinessStatus) -> bool {
        let cell = self.cell.lock();
        if self.cancel.is_cancelled() {
            return false;
        }
        cell.send_replace(status.clone());
        let _ = self.event_tx.send(SessionEvent::ReadinessChanged {
            conversation_id: self.conversation_id,
            status,
        });
        true
    }
}

/// Polls the index status of one conversation until it settles
pub struct ReadinessMonitor {
    poller: Poller,
    status_rx: watch::Receiver<ReadinessStatus>,
    task: JoinHandle<()>,
}

impl ReadinessMonitor {
    /// Enter `Checking` and start polling right away.
    ///
    /// `parent` scopes the monitor: cancelling it tears the monitor down.
    pub fn start(
        conversation_id: ConversationId,
        transport: Arc<dyn Transport>,
        config: PollConfig,
        event_tx: broadcast::Sender<SessionEvent>,
        parent: &CancellationToken,
    ) -> Self {
        let (status_tx, status_rx) = watch::channel(ReadinessStatus::Checking);
        let poller = Poller {
            conversation_id,
            cell: Arc::new(Mutex::new(status_tx)),
            cancel: parent.child_token(),
            done: CancellationToken::new(),
            event_tx,
        };

        let _ = poller.event_tx.send(SessionEvent::ReadinessChanged {
            conversation_id,
            status: ReadinessStatus::Checking,
        });

        let done = poller.done.clone().drop_guard();
        let task = tokio::spawn(poll_loop(poller.clone(), transport, config, done));

        Self {
            poller,
            status_rx,
            task,
        }
    }

    pub fn conversation_id(&self) -> ConversationId {
        self.poller.conversation_id
    }

    /// Current status
    pub fn status(&self) -> ReadinessStatus {
        self.status_rx.borrow().clone()
    }

    /// Whether an exchange may be started
    pub fn can_send(&self) -> bool {
        self.status_rx.borrow().can_send()
    }

    /// Watch status changes
    pub fn subscribe(&self) -> watch::Receiver<ReadinessStatus> {
        self.status_rx.clone()
    }

    /// Wait until the status is terminal. Returns `None` if the monitor is
    /// torn down or gives up polling first.
    pub async fn wait_settled(&self) -> Option<ReadinessStatus> {
        let mut rx = self.status_rx.clone();
        tokio::select! {
            biased;
            _ = self.poller.cancel.cancelled() => None,
            status = rx.wait_for(ReadinessStatus::is_terminal) => {
                status.ok().map(|s| s.clone())
            }
            _ = self.poller.done.cancelled() => {
                Some(self.status()).filter(ReadinessStatus::is_terminal)
            }
        }
    }

    /// Whether the poll task is still scheduled
    pub fn is_polling(&self) -> bool {
        !self.poller.done.is_cancelled() && !self.poller.cancel.is_cancelled()
    }

    /// Stop polling and discard any in-flight result
    pub fn shutdown(&self) {
        {
            let _cell = self.poller.cell.lock();
            self.poller.cancel.cancel();
        }
        self.task.abort();
    }

    #[cfg(test)]
    pub(crate) fn poller(&self) -> Poller {
        self.poller.clone()
    }
}

impl Drop for ReadinessMonitor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn poll_loop(
    poller: Poller,
    transport: Arc<dyn Transport>,
    config: PollConfig,
    _done: DropGuard,
) {
    let conversation_id = poller.conversation_id;
    let mut failures = 0u32;

    loop {
        let result = tokio::select! {
            biased;
            _ = poller.cancel.cancelled() => return,
            result = transport.index_status(conversation_id) => result,
        };

        let delay = match result {
            Ok(report) => {
                failures = 0;
                let status = ReadinessStatus::from_report(report);
                let terminal = status.is_terminal();
                tracing::debug!(
                    "Conversation {} index status: {}",
                    conversation_id,
                    status.label()
                );
                if !poller.apply(status) || terminal {
                    return;
                }
                config.interval
            }
            Err(e) => {
                if !e.is_retryable() {
                    tracing::warn!(
                        "Index status for conversation {} failed permanently: {}",
                        conversation_id,
                        e
                    );
                    return;
                }
                if failures >= config.retry.max_retries {
                    tracing::warn!(
                        "Giving up on index status for conversation {} after {} failed polls: {}",
                        conversation_id,
                        failures + 1,
                        e
                    );
                    return;
                }
                let delay = config.retry.delay_for_attempt(failures);
                failures += 1;
                tracing::warn!(
                    "Index status poll failed (attempt {}/{}): {}. Retrying in {:?}...",
                    failures,
                    config.retry.max_retries + 1,
                    e,
                    delay
                );
                delay
            }
        };

        tokio::select! {
            biased;
            _ = poller.cancel.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
