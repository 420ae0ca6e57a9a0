//! rho-session: conversation session runtime
//!
//! This crate owns the client-side state of the active conversation: the
//! transcript, the readiness poller for the conversation's document index,
//! and the controller that runs streamed question/answer exchanges.

pub mod client;
pub mod error;
pub mod events;
pub mod handle;
pub mod readiness;
pub mod session;
pub mod transcript;
pub mod transport;

#[cfg(test)]
mod testing;

pub use client::Client;
pub use error::{Error, Result};
pub use events::SessionEvent;
pub use handle::SessionHandle;
pub use readiness::{PollConfig, ReadinessMonitor, ReadinessStatus};
pub use session::{RejectReason, SendOutcome, Session, SessionConfig};
pub use transcript::Transcript;
pub use transport::{HttpTransport, RetryConfig, Transport};
